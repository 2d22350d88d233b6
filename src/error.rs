use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

use crate::value::ValueKind;

/// Error kind for configuration loading failures.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConfigErrorKind {
    Syntax,
    TypeMismatch,
}

/// Produced by [`crate::config::parse`] when the YAML cannot be turned into a
/// [`crate::config::CoreConfig`].
#[derive(Clone, Debug, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct ConfigError {
    pub kind: ConfigErrorKind,
    pub message: String,
}

/// A value could not be coerced into the requested kind.
///
/// Carries no attribute key; [`ConversionError::at`] attaches one when the
/// value came out of a [`crate::session::Session`].
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum ConversionError {
    #[error("'{value}' can't be parsed into {expected}")]
    Parse { value: String, expected: ValueKind },
    #[error("{value} is not {expected}")]
    TypeMismatch { value: String, expected: ValueKind },
}

impl ConversionError {
    /// Lifts the error into a [`SessionError`] naming the offending attribute.
    pub fn at(self, key: &str) -> SessionError {
        match self {
            ConversionError::Parse { value, expected } => SessionError::Parse {
                key: key.to_string(),
                value,
                expected,
            },
            ConversionError::TypeMismatch { value, expected } => SessionError::TypeMismatch {
                key: key.to_string(),
                value,
                expected,
            },
        }
    }
}

/// Typed access to a session attribute failed.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum SessionError {
    #[error("No attribute named '{key}' is defined")]
    MissingValue { key: String },
    #[error("Attribute '{key}' value '{value}' can't be parsed into {expected}")]
    Parse {
        key: String,
        value: String,
        expected: ValueKind,
    },
    #[error("Attribute '{key}' value {value} is not {expected}")]
    TypeMismatch {
        key: String,
        value: String,
        expected: ValueKind,
    },
}

impl SessionError {
    /// The attribute key the error is about.
    pub fn key(&self) -> &str {
        match self {
            SessionError::MissingValue { key }
            | SessionError::Parse { key, .. }
            | SessionError::TypeMismatch { key, .. } => key,
        }
    }
}

/// Error kind for check failures.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckErrorKind {
    /// The extraction expression could not be evaluated against the payload.
    Extraction,
    /// A late-bound parameter could not be resolved against the session.
    Expression,
    /// `find_random_n` with `fail_if_fewer` saw too few values.
    Cardinality,
    /// A user transformation failed.
    Transform,
    /// The validation predicate rejected the extracted value.
    Validation,
}

/// Produced when a check fails.
///
/// Failures are returned, never raised: the caller decides whether a failed
/// check fails the request, the virtual user or nothing at all.
#[derive(Clone, Debug, PartialEq, Eq, Error, Serialize, Deserialize)]
pub struct CheckError {
    pub kind: CheckErrorKind,
    pub message: String,
    /// Description (or custom name) of the check that produced the error.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub check: Option<String>,
}

impl CheckError {
    pub fn new(kind: CheckErrorKind, message: impl Into<String>) -> Self {
        CheckError {
            kind,
            message: message.into(),
            check: None,
        }
    }

    pub fn extraction(message: impl Into<String>) -> Self {
        Self::new(CheckErrorKind::Extraction, message)
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::new(CheckErrorKind::Validation, message)
    }

    /// Attaches the check label unless one is already present.
    pub(crate) fn tagged(mut self, check: &str) -> Self {
        if self.check.is_none() {
            self.check = Some(check.to_string());
        }
        self
    }
}

impl fmt::Display for CheckError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.check {
            Some(check) => write!(f, "{}, {}", check, self.message),
            None => write!(f, "{}", self.message),
        }
    }
}

impl From<SessionError> for CheckError {
    fn from(e: SessionError) -> Self {
        CheckError::new(CheckErrorKind::Expression, e.to_string())
    }
}
