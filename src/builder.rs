//! The staged check builder.
//!
//! ```text
//! Find<X> ──find()──────────────────────┐
//!                                       ▼
//! MultipleFind<X> ──find/find_nth/...──► Validate<X'> ──transform/with_default──► Validate<Y>
//!                                       │
//!                                       └──is/exists/lt/...──► Check
//! ```
//!
//! Every stage is an immutable value; each method consumes the stage and
//! returns the next one. Stages can only be entered from the DSL functions
//! in [`crate::dsl`], and the step traits are sealed, so no stage can be
//! skipped. Calling a validator directly on a find stage uses `find()`.

use std::fmt::Display;
use std::sync::Arc;

use crate::cardinality::{self, Cardinality};
use crate::check::Check;
use crate::error::{CheckError, CheckErrorKind};
use crate::expression::Expression;
use crate::extract::Extraction;
use crate::response::Response;
use crate::session::Session;
use crate::validation::{Comparison, Validator};
use crate::value::CheckValue;

pub(crate) mod sealed {
    pub trait Sealed {}
}

type ValueFn<X> =
    Arc<dyn Fn(&Response, &Session) -> Result<Option<X>, CheckError> + Send + Sync>;

// ─── Find ────────────────────────────────────────────────────────────────────

/// Families that always extract exactly one value (checksums, body, status).
pub struct Find<X> {
    extraction: Extraction<X>,
}

impl<X: CheckValue> Find<X> {
    pub(crate) fn new(extraction: Extraction<X>) -> Self {
        Find { extraction }
    }

    pub fn find(self) -> Validate<X> {
        Validate::narrowed(self.extraction, Cardinality::Nth(0), cardinality::first)
    }
}

impl<X> sealed::Sealed for Find<X> {}

impl<X: CheckValue> ValidateStep for Find<X> {
    type Value = X;

    fn into_validate(self) -> Validate<X> {
        self.find()
    }
}

// ─── MultipleFind ────────────────────────────────────────────────────────────

/// Families that extract any number of values.
pub struct MultipleFind<X> {
    extraction: Extraction<X>,
}

impl<X: CheckValue> MultipleFind<X> {
    pub(crate) fn new(extraction: Extraction<X>) -> Self {
        MultipleFind { extraction }
    }
}

impl<X> sealed::Sealed for MultipleFind<X> {}

impl<X: CheckValue> MultipleFindStep for MultipleFind<X> {
    type Item = X;

    fn into_multiple_find(self) -> MultipleFind<X> {
        self
    }
}

impl<X: CheckValue> ValidateStep for MultipleFind<X> {
    type Value = X;

    fn into_validate(self) -> Validate<X> {
        self.find()
    }
}

/// Cardinality selection, available on every multi-valued family.
pub trait MultipleFindStep: Sized + sealed::Sealed {
    type Item: CheckValue;

    fn into_multiple_find(self) -> MultipleFind<Self::Item>;

    /// The first occurrence.
    fn find(self) -> Validate<Self::Item> {
        self.find_nth(0)
    }

    /// The k-th occurrence, 0-based.
    fn find_nth(self, k: usize) -> Validate<Self::Item> {
        let extraction = self.into_multiple_find().extraction;
        Validate::narrowed(extraction, Cardinality::Nth(k), move |values| {
            cardinality::nth(values, k)
        })
    }

    /// Every occurrence. An empty list is found; only `exists` rejects it.
    fn find_all(self) -> Validate<Vec<Self::Item>> {
        let extraction = self.into_multiple_find().extraction;
        Validate::narrowed(extraction, Cardinality::All, Some)
    }

    fn find_random(self) -> Validate<Self::Item> {
        let extraction = self.into_multiple_find().extraction;
        Validate::narrowed(extraction, Cardinality::RandomOne, cardinality::random_one)
    }

    /// Up to `n` occurrences sampled without replacement.
    fn find_random_n(self, n: usize, fail_if_fewer: bool) -> Validate<Vec<Self::Item>> {
        let extraction = self.into_multiple_find().extraction;
        let description = format!(
            "{}.{}",
            extraction.description(),
            Cardinality::RandomN { n, fail_if_fewer }
        );
        Validate::new(description, move |response, session| {
            let values = extraction.extract(response, session)?;
            cardinality::random_n(values, n, fail_if_fewer).map(Some)
        })
    }

    /// The number of occurrences. Never absent.
    fn count(self) -> Validate<i32> {
        let extraction = self.into_multiple_find().extraction;
        Validate::narrowed(extraction, Cardinality::Count, |values| {
            Some(cardinality::count(&values))
        })
    }
}

// ─── Validate ────────────────────────────────────────────────────────────────

/// A cardinality-narrowed value, optionally transformed, awaiting a
/// validator.
pub struct Validate<X> {
    description: Arc<str>,
    run: ValueFn<X>,
}

impl<X> Clone for Validate<X> {
    fn clone(&self) -> Self {
        Validate {
            description: self.description.clone(),
            run: self.run.clone(),
        }
    }
}

impl<X: CheckValue> Validate<X> {
    fn new<F>(description: impl Into<Arc<str>>, run: F) -> Self
    where
        F: Fn(&Response, &Session) -> Result<Option<X>, CheckError> + Send + Sync + 'static,
    {
        Validate {
            description: description.into(),
            run: Arc::new(run),
        }
    }

    fn narrowed<Raw, F>(extraction: Extraction<Raw>, cardinality: Cardinality, narrow: F) -> Self
    where
        Raw: 'static,
        F: Fn(Vec<Raw>) -> Option<X> + Send + Sync + 'static,
    {
        let description = format!("{}.{}", extraction.description(), cardinality);
        Validate::new(description, move |response, session| {
            extraction.extract(response, session).map(&narrow)
        })
    }

    /// `family(criterion).cardinality`, e.g. `regex(id=(\d+)).find`.
    pub fn description(&self) -> &str {
        &self.description
    }

    /// Runs extraction, cardinality and transformations without validating.
    pub fn resolve(&self, response: &Response, session: &Session) -> Result<Option<X>, CheckError> {
        (self.run)(response, session)
    }

    fn chain<Y, F>(self, f: F) -> Validate<Y>
    where
        Y: CheckValue,
        F: Fn(Option<X>, &Session) -> Result<Option<Y>, CheckError> + Send + Sync + 'static,
    {
        let inner = self.run;
        Validate::new(self.description, move |response, session| {
            f(inner(response, session)?, session)
        })
    }
}

impl<X> sealed::Sealed for Validate<X> {}

impl<X: CheckValue> ValidateStep for Validate<X> {
    type Value = X;

    fn into_validate(self) -> Validate<X> {
        self
    }
}

fn transform_error(message: impl Display) -> CheckError {
    CheckError::new(CheckErrorKind::Transform, format!("transform crashed: {}", message))
}

/// Transformations and validators.
pub trait ValidateStep: Sized + sealed::Sealed {
    type Value: CheckValue;

    fn into_validate(self) -> Validate<Self::Value>;

    // ─── Transform ───────────────────────────────────────────────────────────

    /// Maps a found value. Absent values stay absent.
    fn transform<Y, F>(self, f: F) -> Validate<Y>
    where
        Y: CheckValue,
        F: Fn(Self::Value) -> Y + Send + Sync + 'static,
    {
        self.into_validate().chain(move |value, _| Ok(value.map(&f)))
    }

    fn transform_with_session<Y, F>(self, f: F) -> Validate<Y>
    where
        Y: CheckValue,
        F: Fn(Self::Value, &Session) -> Y + Send + Sync + 'static,
    {
        self.into_validate()
            .chain(move |value, session| Ok(value.map(|v| f(v, session))))
    }

    /// A fallible transformation; an `Err` fails the check.
    fn try_transform<Y, E, F>(self, f: F) -> Validate<Y>
    where
        Y: CheckValue,
        E: Display,
        F: Fn(Self::Value) -> Result<Y, E> + Send + Sync + 'static,
    {
        self.into_validate().chain(move |value, _| {
            value.map(|v| f(v).map_err(transform_error)).transpose()
        })
    }

    /// Sees the absent case too, and may turn a found value into an absent
    /// one or the other way round.
    fn transform_option<Y, E, F>(self, f: F) -> Validate<Y>
    where
        Y: CheckValue,
        E: Display,
        F: Fn(Option<Self::Value>, &Session) -> Result<Option<Y>, E> + Send + Sync + 'static,
    {
        self.into_validate()
            .chain(move |value, session| f(value, session).map_err(transform_error))
    }

    /// Substitutes `default` when nothing was found.
    fn with_default(self, default: Self::Value) -> Validate<Self::Value> {
        self.with_default_expr(Expression::constant(default))
    }

    fn with_default_el(self, template: &str) -> Validate<Self::Value> {
        self.with_default_expr(Expression::el(template))
    }

    fn with_default_fn<F>(self, f: F) -> Validate<Self::Value>
    where
        F: Fn(&Session) -> Self::Value + Send + Sync + 'static,
    {
        self.with_default_expr(Expression::from_fn(f))
    }

    fn with_default_expr(self, default: Expression<Self::Value>) -> Validate<Self::Value> {
        self.into_validate().chain(move |value, session| match value {
            Some(value) => Ok(Some(value)),
            None => Ok(Some(default.resolve(session)?)),
        })
    }

    // ─── Validate ────────────────────────────────────────────────────────────

    fn validate_with(self, validator: Validator<Self::Value>) -> Check {
        let validate = self.into_validate();
        let description = format!("{}.{}", validate.description, validator.name());
        let run = validate.run;
        Check::new(description, move |response, session| {
            let value = run(response, session)?;
            let value = validator.apply(value, session)?;
            Ok(value.map(CheckValue::into_value))
        })
    }

    /// A named custom predicate; an `Err` is the failure message.
    fn validate<E, F>(self, name: &str, f: F) -> Check
    where
        E: Display,
        F: Fn(Option<&Self::Value>, &Session) -> Result<(), E> + Send + Sync + 'static,
    {
        self.validate_with(Validator::custom(name.to_string(), f))
    }

    fn exists(self) -> Check {
        self.validate_with(Validator::exists())
    }

    fn not_exists(self) -> Check {
        self.validate_with(Validator::not_exists())
    }

    fn optional(self) -> Check {
        self.validate_with(Validator::optional())
    }

    fn is_null(self) -> Check {
        self.validate_with(Validator::is_null())
    }

    fn not_null(self) -> Check {
        self.validate_with(Validator::not_null())
    }

    fn is(self, expected: Self::Value) -> Check
    where
        Self::Value: PartialEq,
    {
        self.validate_with(Validator::is(Expression::constant(expected)))
    }

    fn is_el(self, expected: &str) -> Check
    where
        Self::Value: PartialEq,
    {
        self.validate_with(Validator::is(Expression::el(expected)))
    }

    fn is_fn<F>(self, expected: F) -> Check
    where
        Self::Value: PartialEq,
        F: Fn(&Session) -> Self::Value + Send + Sync + 'static,
    {
        self.validate_with(Validator::is(Expression::from_fn(expected)))
    }

    fn not(self, unexpected: Self::Value) -> Check
    where
        Self::Value: PartialEq,
    {
        self.validate_with(Validator::not(Expression::constant(unexpected)))
    }

    fn not_el(self, unexpected: &str) -> Check
    where
        Self::Value: PartialEq,
    {
        self.validate_with(Validator::not(Expression::el(unexpected)))
    }

    fn not_fn<F>(self, unexpected: F) -> Check
    where
        Self::Value: PartialEq,
        F: Fn(&Session) -> Self::Value + Send + Sync + 'static,
    {
        self.validate_with(Validator::not(Expression::from_fn(unexpected)))
    }

    fn is_in(self, expected: Vec<Self::Value>) -> Check
    where
        Self::Value: PartialEq,
    {
        self.validate_with(Validator::is_in(Expression::constant(expected)))
    }

    /// The template must resolve to a list attribute.
    fn is_in_el(self, expected: &str) -> Check
    where
        Self::Value: PartialEq,
    {
        self.validate_with(Validator::is_in(Expression::el(expected)))
    }

    fn is_in_fn<F>(self, expected: F) -> Check
    where
        Self::Value: PartialEq,
        F: Fn(&Session) -> Vec<Self::Value> + Send + Sync + 'static,
    {
        self.validate_with(Validator::is_in(Expression::from_fn(expected)))
    }

    fn not_in(self, unexpected: Vec<Self::Value>) -> Check
    where
        Self::Value: PartialEq,
    {
        self.validate_with(Validator::not_in(Expression::constant(unexpected)))
    }

    fn not_in_el(self, unexpected: &str) -> Check
    where
        Self::Value: PartialEq,
    {
        self.validate_with(Validator::not_in(Expression::el(unexpected)))
    }

    fn not_in_fn<F>(self, unexpected: F) -> Check
    where
        Self::Value: PartialEq,
        F: Fn(&Session) -> Vec<Self::Value> + Send + Sync + 'static,
    {
        self.validate_with(Validator::not_in(Expression::from_fn(unexpected)))
    }

    fn compare(self, comparison: Comparison, operand: Expression<Self::Value>) -> Check
    where
        Self::Value: PartialOrd,
    {
        self.validate_with(Validator::compare(comparison, operand))
    }

    fn lt(self, operand: Self::Value) -> Check
    where
        Self::Value: PartialOrd,
    {
        self.compare(Comparison::LessThan, Expression::constant(operand))
    }

    fn lt_el(self, operand: &str) -> Check
    where
        Self::Value: PartialOrd,
    {
        self.compare(Comparison::LessThan, Expression::el(operand))
    }

    fn lt_fn<F>(self, operand: F) -> Check
    where
        Self::Value: PartialOrd,
        F: Fn(&Session) -> Self::Value + Send + Sync + 'static,
    {
        self.compare(Comparison::LessThan, Expression::from_fn(operand))
    }

    fn lte(self, operand: Self::Value) -> Check
    where
        Self::Value: PartialOrd,
    {
        self.compare(Comparison::LessThanOrEqual, Expression::constant(operand))
    }

    fn lte_el(self, operand: &str) -> Check
    where
        Self::Value: PartialOrd,
    {
        self.compare(Comparison::LessThanOrEqual, Expression::el(operand))
    }

    fn lte_fn<F>(self, operand: F) -> Check
    where
        Self::Value: PartialOrd,
        F: Fn(&Session) -> Self::Value + Send + Sync + 'static,
    {
        self.compare(Comparison::LessThanOrEqual, Expression::from_fn(operand))
    }

    fn gt(self, operand: Self::Value) -> Check
    where
        Self::Value: PartialOrd,
    {
        self.compare(Comparison::GreaterThan, Expression::constant(operand))
    }

    fn gt_el(self, operand: &str) -> Check
    where
        Self::Value: PartialOrd,
    {
        self.compare(Comparison::GreaterThan, Expression::el(operand))
    }

    fn gt_fn<F>(self, operand: F) -> Check
    where
        Self::Value: PartialOrd,
        F: Fn(&Session) -> Self::Value + Send + Sync + 'static,
    {
        self.compare(Comparison::GreaterThan, Expression::from_fn(operand))
    }

    fn gte(self, operand: Self::Value) -> Check
    where
        Self::Value: PartialOrd,
    {
        self.compare(Comparison::GreaterThanOrEqual, Expression::constant(operand))
    }

    fn gte_el(self, operand: &str) -> Check
    where
        Self::Value: PartialOrd,
    {
        self.compare(Comparison::GreaterThanOrEqual, Expression::el(operand))
    }

    fn gte_fn<F>(self, operand: F) -> Check
    where
        Self::Value: PartialOrd,
        F: Fn(&Session) -> Self::Value + Send + Sync + 'static,
    {
        self.compare(Comparison::GreaterThanOrEqual, Expression::from_fn(operand))
    }
}

impl<X: CheckValue> From<Find<X>> for Check {
    fn from(find: Find<X>) -> Self {
        find.exists()
    }
}

impl<X: CheckValue> From<MultipleFind<X>> for Check {
    fn from(find: MultipleFind<X>) -> Self {
        find.exists()
    }
}

impl<X: CheckValue> From<Validate<X>> for Check {
    fn from(validate: Validate<X>) -> Self {
        validate.exists()
    }
}
