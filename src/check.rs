//! Built checks and their execution against a response.

use std::fmt;
use std::sync::Arc;

use tracing::{debug, trace};

use crate::error::CheckError;
use crate::expression::Expression;
use crate::response::Response;
use crate::session::Session;
use crate::value::Value;

type CheckFn = Arc<dyn Fn(&Response, &Session) -> Result<Option<Value>, CheckError> + Send + Sync>;

/// A fully built check: extraction, cardinality, transformations and a
/// validator, plus an optional name and save key.
#[derive(Clone)]
pub struct Check {
    description: Arc<str>,
    name: Option<Arc<str>>,
    save_as: Option<Arc<str>>,
    condition: Option<Expression<bool>>,
    run: CheckFn,
}

/// What a successful check produced.
#[derive(Clone, Debug, PartialEq)]
pub struct CheckOutcome {
    /// The validated value, `None` when absence was accepted.
    pub value: Option<Value>,
    /// The session with the saved attribute. `None` when nothing was saved
    /// and the input session is still current.
    pub session: Option<Session>,
}

impl Check {
    pub(crate) fn new<F>(description: impl Into<Arc<str>>, run: F) -> Self
    where
        F: Fn(&Response, &Session) -> Result<Option<Value>, CheckError> + Send + Sync + 'static,
    {
        Check {
            description: description.into(),
            name: None,
            save_as: None,
            condition: None,
            run: Arc::new(run),
        }
    }

    /// Label used in failure messages instead of the bare description.
    pub fn name(mut self, name: impl Into<Arc<str>>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Saves the validated value under `key` on success.
    pub fn save_as(mut self, key: impl Into<Arc<str>>) -> Self {
        self.save_as = Some(key.into());
        self
    }

    /// `family(criterion).cardinality.validator`.
    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn save_key(&self) -> Option<&str> {
        self.save_as.as_deref()
    }

    fn label(&self) -> String {
        match &self.name {
            Some(name) => format!("{}: {}", name, self.description),
            None => self.description.to_string(),
        }
    }

    pub fn check(&self, response: &Response, session: &Session) -> Result<CheckOutcome, CheckError> {
        self.run_inner(response, session).map_err(|e| {
            let e = e.tagged(&self.label());
            debug!(
                scenario = session.scenario(),
                user_id = session.user_id(),
                kind = ?e.kind,
                "check failed: {}",
                e
            );
            e
        })
    }

    fn run_inner(&self, response: &Response, session: &Session) -> Result<CheckOutcome, CheckError> {
        if let Some(condition) = &self.condition {
            if !condition.resolve(session)? {
                return Ok(CheckOutcome {
                    value: None,
                    session: None,
                });
            }
        }

        let value = (self.run)(response, session)?;
        let session = match (&self.save_as, &value) {
            (Some(key), Some(value)) => {
                trace!(key = %key, "saving check result");
                Some(session.set(key.as_ref(), value.clone()))
            }
            _ => None,
        };
        Ok(CheckOutcome { value, session })
    }
}

impl fmt::Debug for Check {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Check")
            .field("description", &self.description)
            .field("name", &self.name)
            .field("save_as", &self.save_as)
            .field("conditional", &self.condition.is_some())
            .finish()
    }
}

/// Runs `check` only when `condition` resolves to true; otherwise the check
/// succeeds without touching the session.
pub fn check_if(condition: impl Into<Expression<bool>>, check: impl Into<Check>) -> Check {
    let mut check = check.into();
    check.condition = Some(condition.into());
    check
}

/// Result of running a batch of checks against one response.
#[derive(Clone, Debug)]
pub struct ChecksOutcome {
    /// The session after every save, marked failed when a check failed.
    pub session: Session,
    /// The first failure, if any.
    pub failure: Option<CheckError>,
}

/// Runs every check against the same response, threading saves through the
/// session.
///
/// All checks run even after a failure, so later saves still happen; only
/// the first failure is reported.
pub fn run_checks(checks: &[Check], response: &Response, session: Session) -> ChecksOutcome {
    let mut session = session;
    let mut failure: Option<CheckError> = None;

    for check in checks {
        match check.check(response, &session) {
            Ok(CheckOutcome {
                session: Some(updated),
                ..
            }) => session = updated,
            Ok(_) => {}
            Err(e) => {
                if failure.is_none() {
                    failure = Some(e);
                }
            }
        }
    }

    if failure.is_some() {
        session = session.mark_as_failed();
    }
    ChecksOutcome { session, failure }
}
