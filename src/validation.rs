//! Predicates applied to the value a check extracted.
//!
//! A [`Validator`] receives the found-or-absent value and the session, and
//! either passes the value on or rejects it with a message describing what
//! was actually found. Comparison operands are [`Expression`]s resolved at
//! validation time.

use std::fmt::Display;
use std::sync::Arc;

use crate::error::CheckError;
use crate::expression::Expression;
use crate::session::Session;
use crate::value::CheckValue;

type ValidateFn<X> =
    Arc<dyn Fn(Option<X>, &Session) -> Result<Option<X>, CheckError> + Send + Sync>;

pub struct Validator<X> {
    name: Arc<str>,
    run: ValidateFn<X>,
}

impl<X> Clone for Validator<X> {
    fn clone(&self) -> Self {
        Validator {
            name: self.name.clone(),
            run: self.run.clone(),
        }
    }
}

const FOUND_NOTHING: &str = "found nothing";

fn actually_found<X: CheckValue>(value: &X) -> CheckError {
    CheckError::validation(format!("but actually found {}", value.describe()))
}

fn unexpectedly_found<X: CheckValue>(value: &X) -> CheckError {
    CheckError::validation(format!("but actually unexpectedly found {}", value.describe()))
}

impl<X: CheckValue> Validator<X> {
    fn new<F>(name: impl Into<Arc<str>>, run: F) -> Self
    where
        F: Fn(Option<X>, &Session) -> Result<Option<X>, CheckError> + Send + Sync + 'static,
    {
        Validator {
            name: name.into(),
            run: Arc::new(run),
        }
    }

    /// The name shown as the last segment of a check description.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn apply(&self, actual: Option<X>, session: &Session) -> Result<Option<X>, CheckError> {
        (self.run)(actual, session)
    }

    // ─── Existence ───────────────────────────────────────────────────────────

    /// Requires a value; an empty collection counts as nothing found.
    pub fn exists() -> Self {
        Self::new("exists", |actual, _| match actual {
            Some(value) if !value.is_empty() => Ok(Some(value)),
            _ => Err(CheckError::validation(FOUND_NOTHING)),
        })
    }

    pub fn not_exists() -> Self {
        Self::new("notExists", |actual, _| match actual {
            Some(value) if !value.is_empty() => Err(actually_found(&value)),
            _ => Ok(None),
        })
    }

    /// Always succeeds and passes the value through.
    pub fn optional() -> Self {
        Self::new("optional", |actual, _| Ok(actual))
    }

    /// Succeeds on an absent value or a null one.
    pub fn is_null() -> Self {
        Self::new("isNull", |actual, _| match actual {
            None => Ok(None),
            Some(value) if value.is_null() => Ok(Some(value)),
            Some(value) => Err(actually_found(&value)),
        })
    }

    pub fn not_null() -> Self {
        Self::new("notNull", |actual, _| match actual {
            None => Err(CheckError::validation(FOUND_NOTHING)),
            Some(value) if value.is_null() => Err(CheckError::validation("but actually found null")),
            Some(value) => Ok(Some(value)),
        })
    }

    // ─── Custom ──────────────────────────────────────────────────────────────

    /// A user predicate. An `Err` is the failure message.
    pub fn custom<F, E>(name: impl Into<Arc<str>>, f: F) -> Self
    where
        F: Fn(Option<&X>, &Session) -> Result<(), E> + Send + Sync + 'static,
        E: Display,
    {
        Self::new(name, move |actual, session| {
            f(actual.as_ref(), session)
                .map_err(|e| CheckError::validation(e.to_string()))?;
            Ok(actual)
        })
    }
}

impl<X: CheckValue + PartialEq> Validator<X> {
    pub fn is(expected: Expression<X>) -> Self {
        let name = format!("is({})", expected.label());
        Self::new(name, move |actual, session| {
            let expected = expected.resolve(session)?;
            match actual {
                None => Err(CheckError::validation(FOUND_NOTHING)),
                Some(value) if value == expected => Ok(Some(value)),
                Some(value) => Err(actually_found(&value)),
            }
        })
    }

    pub fn not(unexpected: Expression<X>) -> Self {
        let name = format!("not({})", unexpected.label());
        Self::new(name, move |actual, session| {
            let unexpected = unexpected.resolve(session)?;
            match actual {
                None => Err(CheckError::validation(FOUND_NOTHING)),
                Some(value) if value == unexpected => Err(unexpectedly_found(&value)),
                Some(value) => Ok(Some(value)),
            }
        })
    }

    pub fn is_in(expected: Expression<Vec<X>>) -> Self {
        let name = format!("in({})", expected.label());
        Self::new(name, move |actual, session| {
            let expected = expected.resolve(session)?;
            match actual {
                None => Err(CheckError::validation(FOUND_NOTHING)),
                Some(value) if expected.contains(&value) => Ok(Some(value)),
                Some(value) => Err(actually_found(&value)),
            }
        })
    }

    pub fn not_in(unexpected: Expression<Vec<X>>) -> Self {
        let name = format!("notIn({})", unexpected.label());
        Self::new(name, move |actual, session| {
            let unexpected = unexpected.resolve(session)?;
            match actual {
                None => Err(CheckError::validation(FOUND_NOTHING)),
                Some(value) if unexpected.contains(&value) => Err(unexpectedly_found(&value)),
                Some(value) => Ok(Some(value)),
            }
        })
    }
}

/// Ordering comparisons.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Comparison {
    LessThan,
    LessThanOrEqual,
    GreaterThan,
    GreaterThanOrEqual,
}

impl Comparison {
    pub fn name(self) -> &'static str {
        match self {
            Comparison::LessThan => "lessThan",
            Comparison::LessThanOrEqual => "lessThanOrEqual",
            Comparison::GreaterThan => "greaterThan",
            Comparison::GreaterThanOrEqual => "greaterThanOrEqual",
        }
    }

    /// `None` when the operands do not compare (a NaN double).
    fn holds<X: PartialOrd>(self, actual: &X, operand: &X) -> Option<bool> {
        let ordering = actual.partial_cmp(operand)?;
        Some(match self {
            Comparison::LessThan => ordering.is_lt(),
            Comparison::LessThanOrEqual => ordering.is_le(),
            Comparison::GreaterThan => ordering.is_gt(),
            Comparison::GreaterThanOrEqual => ordering.is_ge(),
        })
    }
}

impl<X: CheckValue + PartialOrd> Validator<X> {
    pub fn compare(comparison: Comparison, operand: Expression<X>) -> Self {
        let name = format!("{}({})", comparison.name(), operand.label());
        Self::new(name, move |actual, session| {
            let operand = operand.resolve(session)?;
            let Some(value) = actual else {
                return Err(CheckError::validation(FOUND_NOTHING));
            };
            match comparison.holds(&value, &operand) {
                Some(true) => Ok(Some(value)),
                Some(false) => Err(actually_found(&value)),
                None => Err(CheckError::validation(format!(
                    "{} can't be compared with {}",
                    value.describe(),
                    operand.describe()
                ))),
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CheckErrorKind;

    fn session() -> Session {
        Session::new("scn", 1).set("limit", 10)
    }

    #[test]
    fn exists_rejects_empty_collections() {
        let v = Validator::<Vec<String>>::exists();
        let err = v.apply(Some(Vec::new()), &session()).unwrap_err();
        assert_eq!(err.message, "found nothing");
    }

    #[test]
    fn is_reports_actual_value() {
        let v = Validator::is(Expression::constant(17));
        assert_eq!(v.name(), "is(17)");
        assert_eq!(v.apply(Some(17), &session()), Ok(Some(17)));
        let err = v.apply(Some(18), &session()).unwrap_err();
        assert_eq!(err.message, "but actually found 18");
    }

    #[test]
    fn not_reports_unexpected_value() {
        let v = Validator::not(Expression::constant("a".to_string()));
        let err = v.apply(Some("a".to_string()), &session()).unwrap_err();
        assert_eq!(err.message, "but actually unexpectedly found a");
    }

    #[test]
    fn comparison_operand_is_late_bound() {
        let v = Validator::compare(Comparison::LessThan, Expression::el("#{limit}"));
        assert_eq!(v.name(), "lessThan(#{limit})");
        assert!(v.apply(Some(3), &session()).is_ok());
        assert!(v.apply(Some(10), &session()).is_err());
    }

    #[test]
    fn unresolvable_operand_is_expression_error() {
        let v = Validator::<i32>::is(Expression::el("#{missing}"));
        let err = v.apply(Some(1), &session()).unwrap_err();
        assert_eq!(err.kind, CheckErrorKind::Expression);
    }

    #[test]
    fn is_null_accepts_absent() {
        let v = Validator::<serde_json::Value>::is_null();
        assert_eq!(v.apply(None, &session()), Ok(None));
        assert!(v.apply(Some(serde_json::Value::Null), &session()).is_ok());
        assert!(v.apply(Some(serde_json::json!(1)), &session()).is_err());
    }

    #[test]
    fn custom_predicate_message_is_kept() {
        let v = Validator::<i32>::custom("even", |x: Option<&i32>, _: &Session| match x {
            Some(x) if x % 2 == 0 => Ok(()),
            _ => Err("not even"),
        });
        assert!(v.apply(Some(4), &session()).is_ok());
        assert_eq!(v.apply(Some(3), &session()).unwrap_err().message, "not even");
    }
}
