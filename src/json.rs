//! Narrowing JSON nodes to the type a check asks for.
//!
//! JSON path and JMES path extraction produce raw nodes; the `of_*` methods
//! on the JSON check builders pick a [`JsonFilter`] that keeps the nodes of
//! the requested shape and drops the rest. A node that does not narrow is
//! not an error, it is simply not part of the result.

use crate::value::{CheckValue, parse_bool};

type Json = serde_json::Value;
type JsonObject = serde_json::Map<String, Json>;

pub trait JsonFilter: CheckValue {
    fn filter(node: &Json) -> Option<Self>;
}

impl JsonFilter for String {
    /// Strings verbatim, other scalars rendered, containers as compact JSON.
    /// `null` is dropped.
    fn filter(node: &Json) -> Option<Self> {
        match node {
            Json::Null => None,
            Json::String(s) => Some(s.clone()),
            Json::Bool(b) => Some(b.to_string()),
            Json::Number(n) => Some(n.to_string()),
            Json::Array(_) | Json::Object(_) => Some(node.to_string()),
        }
    }
}

impl JsonFilter for bool {
    fn filter(node: &Json) -> Option<Self> {
        match node {
            Json::Bool(b) => Some(*b),
            Json::String(s) => parse_bool(s),
            _ => None,
        }
    }
}

impl JsonFilter for i32 {
    fn filter(node: &Json) -> Option<Self> {
        match node {
            Json::Number(n) => n.as_i64().and_then(|i| i32::try_from(i).ok()),
            Json::String(s) => s.parse().ok(),
            _ => None,
        }
    }
}

impl JsonFilter for i64 {
    fn filter(node: &Json) -> Option<Self> {
        match node {
            Json::Number(n) => n.as_i64(),
            Json::String(s) => s.parse().ok(),
            _ => None,
        }
    }
}

impl JsonFilter for f64 {
    fn filter(node: &Json) -> Option<Self> {
        match node {
            Json::Number(n) => n.as_f64(),
            Json::String(s) => s.parse().ok(),
            _ => None,
        }
    }
}

impl JsonFilter for Vec<Json> {
    fn filter(node: &Json) -> Option<Self> {
        node.as_array().cloned()
    }
}

impl JsonFilter for JsonObject {
    fn filter(node: &Json) -> Option<Self> {
        node.as_object().cloned()
    }
}

/// Every node, `null` included.
impl JsonFilter for Json {
    fn filter(node: &Json) -> Option<Self> {
        Some(node.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn string_renders_scalars_and_containers() {
        assert_eq!(String::filter(&json!("a")).as_deref(), Some("a"));
        assert_eq!(String::filter(&json!(3)).as_deref(), Some("3"));
        assert_eq!(String::filter(&json!([1, 2])).as_deref(), Some("[1,2]"));
        assert_eq!(String::filter(&json!(null)), None);
    }

    #[test]
    fn int_rejects_fractions_and_overflow() {
        assert_eq!(i32::filter(&json!(7)), Some(7));
        assert_eq!(i32::filter(&json!("7")), Some(7));
        assert_eq!(i32::filter(&json!(1.5)), None);
        assert_eq!(i32::filter(&json!(9_000_000_000i64)), None);
        assert_eq!(i64::filter(&json!(9_000_000_000i64)), Some(9_000_000_000));
    }

    #[test]
    fn containers_narrow_by_shape() {
        assert!(Vec::<Json>::filter(&json!({"a": 1})).is_none());
        assert_eq!(JsonObject::filter(&json!({"a": 1})).map(|m| m.len()), Some(1));
    }
}
