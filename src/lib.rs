//! Response checks and per-virtual-user session state for load-testing
//! tools.
//!
//! A check extracts a value from an already fetched response, narrows the
//! matches to the occurrences it targets, optionally transforms and
//! validates the result, and optionally saves it into the virtual user's
//! [`Session`]:
//!
//! ```text
//! Response + Session → extraction → cardinality → transform → validation → save
//!                    → Ok(CheckOutcome { value, session }) | Err(CheckError)
//! ```
//!
//! Sessions are immutable; every mutator returns a new session, so a
//! session is threaded from step to step as a plain value.
//!
//! # Quick Start
//!
//! ```rust
//! use loadcheck::prelude::*;
//!
//! let response = Response::builder()
//!     .header("Content-Type", "application/json")
//!     .body(r#"{"id": 17, "tags": ["a", "b"]}"#)
//!     .build();
//! let session = Session::new("checkout", 1);
//!
//! let checks = vec![
//!     json_path("$.id").of_int().find().is(17).save_as("id"),
//!     json_path("$.tags[*]").count().gte(1),
//! ];
//!
//! let outcome = run_checks(&checks, &response, session);
//! assert!(outcome.failure.is_none());
//! assert_eq!(outcome.session.get_int("id"), Ok(17));
//! ```

pub mod attributes;
pub mod builder;
pub mod cardinality;
pub mod check;
pub mod config;
pub mod dsl;
pub mod error;
pub mod expression;
pub mod extract;
pub mod groups;
pub mod json;
pub mod response;
pub mod session;
pub mod validation;
pub mod value;

pub use error::*;

pub use attributes::AttributeStore;
pub use builder::{Find, MultipleFind, MultipleFindStep, Validate, ValidateStep};
pub use check::{Check, CheckOutcome, ChecksOutcome, check_if, run_checks};
pub use config::{CoreConfig, parse};
pub use expression::Expression;
pub use response::{Charset, Response, ResponseBuilder};
pub use session::{Session, Status};
pub use value::{CheckValue, Value, ValueKind};

/// Everything needed to build and run checks.
pub mod prelude {
    pub use crate::builder::{MultipleFindStep, ValidateStep};
    pub use crate::check::{Check, check_if, run_checks};
    pub use crate::dsl::*;
    pub use crate::expression::Expression;
    pub use crate::groups::{Tuple2, Tuple3, Tuple4, Tuple5, Tuple6, Tuple7, Tuple8};
    pub use crate::response::Response;
    pub use crate::session::Session;
    pub use crate::value::Value;
}
