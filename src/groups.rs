//! Capture-group tuples produced by regex checks.

use regex::Captures;
use serde::Serialize;
use std::fmt;

use crate::error::ConversionError;
use crate::value::{CheckValue, Value, ValueKind};

/// What a regex match contributes to the extracted sequence.
///
/// Returns `None` when the match lacks a requested group (or the group did
/// not participate); such matches are skipped.
pub trait GroupExtractor: CheckValue {
    fn extract(captures: &Captures<'_>) -> Option<Self>;
}

impl GroupExtractor for String {
    /// The first group when the pattern declares one, the whole match
    /// otherwise.
    fn extract(captures: &Captures<'_>) -> Option<Self> {
        let index = if captures.len() > 1 { 1 } else { 0 };
        captures.get(index).map(|m| m.as_str().to_string())
    }
}

/// The first `n` groups of a match as a list of strings.
pub(crate) fn extract_groups(captures: &Captures<'_>, n: usize) -> Option<Vec<String>> {
    (1..=n)
        .map(|i| captures.get(i).map(|m| m.as_str().to_string()))
        .collect()
}

macro_rules! tuple {
    ($(#[$doc:meta])* $name:ident, $arity:literal, $($field:ident),+) => {
        $(#[$doc])*
        #[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
        pub struct $name {
            $($field: String,)+
        }

        impl $name {
            pub fn new($($field: impl Into<String>),+) -> Self {
                $name { $($field: $field.into(),)+ }
            }

            $(
                pub fn $field(&self) -> &str {
                    &self.$field
                }
            )+
        }

        impl GroupExtractor for $name {
            fn extract(captures: &Captures<'_>) -> Option<Self> {
                let mut groups = extract_groups(captures, $arity)?.into_iter();
                Some($name { $($field: groups.next()?,)+ })
            }
        }

        impl CheckValue for $name {
            const KIND: ValueKind = ValueKind::List;

            fn into_value(self) -> Value {
                Value::List(vec![$(Value::String(self.$field),)+])
            }

            fn from_value(value: Value) -> Result<Self, ConversionError> {
                let items = Vec::<String>::from_value(value)?;
                if items.len() != $arity {
                    return Err(ConversionError::TypeMismatch {
                        value: format!("{:?}", items),
                        expected: ValueKind::List,
                    });
                }
                let mut items = items.into_iter();
                let mut next = || items.next().unwrap_or_default();
                Ok($name { $($field: next(),)+ })
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                let fields: [&str; $arity] = [$(&self.$field),+];
                write!(f, "({})", fields.join(","))
            }
        }
    };
}

tuple!(
    /// Two capture groups.
    Tuple2, 2, v1, v2
);
tuple!(Tuple3, 3, v1, v2, v3);
tuple!(Tuple4, 4, v1, v2, v3, v4);
tuple!(Tuple5, 5, v1, v2, v3, v4, v5);
tuple!(Tuple6, 6, v1, v2, v3, v4, v5, v6);
tuple!(Tuple7, 7, v1, v2, v3, v4, v5, v6, v7);
tuple!(Tuple8, 8, v1, v2, v3, v4, v5, v6, v7, v8);

#[cfg(test)]
mod tests {
    use super::*;
    use regex::Regex;

    #[test]
    fn string_prefers_first_group() {
        let re = Regex::new(r"id=(\d+)").unwrap();
        let caps = re.captures("id=17").unwrap();
        assert_eq!(String::extract(&caps).as_deref(), Some("17"));

        let re = Regex::new(r"id=\d+").unwrap();
        let caps = re.captures("id=17").unwrap();
        assert_eq!(String::extract(&caps).as_deref(), Some("id=17"));
    }

    #[test]
    fn short_match_is_skipped() {
        let re = Regex::new(r"(\w)(\w)").unwrap();
        let caps = re.captures("ab").unwrap();
        assert!(Tuple3::extract(&caps).is_none());
        assert_eq!(Tuple2::extract(&caps), Some(Tuple2::new("a", "b")));
    }

    #[test]
    fn non_participating_group_is_skipped() {
        let re = Regex::new(r"(a)|(b)").unwrap();
        let caps = re.captures("a").unwrap();
        assert!(Tuple2::extract(&caps).is_none());
    }

    #[test]
    fn tuple_round_trips_through_value() {
        let t = Tuple3::new("x", "y", "z");
        assert_eq!(t.to_string(), "(x,y,z)");
        assert_eq!(Tuple3::from_value(t.clone().into_value()), Ok(t));
    }
}
