//! Per-virtual-user state threaded through a scenario.
//!
//! A [`Session`] is an immutable value. Mutators return a new session and
//! never touch the receiver, so a session can be handed from step to step
//! (and kept around for comparison) without any locking.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::sync::Arc;

use crate::attributes::AttributeStore;
use crate::error::{ConversionError, SessionError};
use crate::value::{CheckValue, Value, ValueKind};

/// Attribute keys with this prefix belong to the runtime and survive
/// [`Session::reset`].
pub const INTERNAL_PREFIX: &str = "loadcheck.";

/// Pass/fail status of a virtual user.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Status {
    #[default]
    Succeeded,
    Failed,
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Status::Succeeded => f.write_str("OK"),
            Status::Failed => f.write_str("KO"),
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Session {
    scenario: Arc<str>,
    user_id: u64,
    attributes: AttributeStore,
    groups: Vec<String>,
    status: Status,
}

impl Session {
    /// A fresh session: no attributes, no open group, status succeeded.
    pub fn new(scenario: impl Into<Arc<str>>, user_id: u64) -> Self {
        Session {
            scenario: scenario.into(),
            user_id,
            attributes: AttributeStore::new(),
            groups: Vec::new(),
            status: Status::Succeeded,
        }
    }

    pub fn scenario(&self) -> &str {
        &self.scenario
    }

    pub fn user_id(&self) -> u64 {
        self.user_id
    }

    /// Open groups, shallowest first.
    pub fn groups(&self) -> &[String] {
        &self.groups
    }

    pub fn status(&self) -> Status {
        self.status
    }

    pub fn is_failed(&self) -> bool {
        self.status == Status::Failed
    }

    pub fn attributes(&self) -> &AttributeStore {
        &self.attributes
    }

    // ─── Raw access ──────────────────────────────────────────────────────────

    pub fn contains(&self, key: &str) -> bool {
        self.attributes.contains(key)
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.attributes.get(key)
    }

    /// Like [`Session::get`] but fails with `MissingValue` when absent.
    pub fn require(&self, key: &str) -> Result<&Value, SessionError> {
        self.get(key).ok_or_else(|| SessionError::MissingValue {
            key: key.to_string(),
        })
    }

    // ─── Typed getters ───────────────────────────────────────────────────────

    /// Coerces the attribute into `T`. Absent or null attributes yield
    /// `Ok(None)`.
    pub fn get_as<T: CheckValue>(&self, key: &str) -> Result<Option<T>, SessionError> {
        match self.get(key) {
            None => Ok(None),
            Some(value) if value.is_null() => Ok(None),
            Some(value) => T::from_value(value.clone())
                .map(Some)
                .map_err(|e| e.at(key)),
        }
    }

    fn get_required<T: CheckValue>(&self, key: &str) -> Result<T, SessionError> {
        self.get_as(key)?.ok_or_else(|| SessionError::MissingValue {
            key: key.to_string(),
        })
    }

    /// Any scalar rendered as text.
    pub fn get_string(&self, key: &str) -> Result<Option<String>, SessionError> {
        self.get_as(key)
    }

    pub fn get_int_wrapper(&self, key: &str) -> Result<Option<i32>, SessionError> {
        self.get_as(key)
    }

    pub fn get_int(&self, key: &str) -> Result<i32, SessionError> {
        self.get_required(key)
    }

    pub fn get_long_wrapper(&self, key: &str) -> Result<Option<i64>, SessionError> {
        self.get_as(key)
    }

    pub fn get_long(&self, key: &str) -> Result<i64, SessionError> {
        self.get_required(key)
    }

    pub fn get_double_wrapper(&self, key: &str) -> Result<Option<f64>, SessionError> {
        self.get_as(key)
    }

    /// Strings are parsed as doubles, so `"2.5"` yields `2.5`.
    pub fn get_double(&self, key: &str) -> Result<f64, SessionError> {
        self.get_required(key)
    }

    pub fn get_boolean_wrapper(&self, key: &str) -> Result<Option<bool>, SessionError> {
        self.get_as(key)
    }

    pub fn get_boolean(&self, key: &str) -> Result<bool, SessionError> {
        self.get_required(key)
    }

    /// The attribute as a list. Sets keep their sort order, JSON arrays are
    /// converted element-wise, an absent key yields an empty list.
    pub fn get_list(&self, key: &str) -> Result<Vec<Value>, SessionError> {
        match self.get(key) {
            None | Some(Value::Null) => Ok(Vec::new()),
            Some(Value::List(items)) => Ok(items.clone()),
            Some(Value::Set(items)) => Ok(items.iter().cloned().collect()),
            Some(Value::Json(serde_json::Value::Array(items))) => {
                Ok(items.iter().cloned().map(Value::from_json).collect())
            }
            Some(other) => Err(collection_mismatch(key, other, ValueKind::List)),
        }
    }

    pub fn get_set(&self, key: &str) -> Result<BTreeSet<Value>, SessionError> {
        match self.get(key) {
            None | Some(Value::Null) => Ok(BTreeSet::new()),
            Some(Value::Set(items)) => Ok(items.clone()),
            Some(Value::List(items)) => Ok(items.iter().cloned().collect()),
            Some(Value::Json(serde_json::Value::Array(items))) => {
                Ok(items.iter().cloned().map(Value::from_json).collect())
            }
            Some(other) => Err(collection_mismatch(key, other, ValueKind::Set)),
        }
    }

    pub fn get_map(&self, key: &str) -> Result<BTreeMap<String, Value>, SessionError> {
        match self.get(key) {
            None | Some(Value::Null) => Ok(BTreeMap::new()),
            Some(Value::Map(map)) => Ok(map.clone()),
            Some(Value::Json(serde_json::Value::Object(map))) => Ok(map
                .iter()
                .map(|(k, v)| (k.clone(), Value::from_json(v.clone())))
                .collect()),
            Some(other) => Err(collection_mismatch(key, other, ValueKind::Map)),
        }
    }

    // ─── Mutators ────────────────────────────────────────────────────────────

    pub fn set(&self, key: impl Into<String>, value: impl Into<Value>) -> Session {
        self.with_attributes(self.attributes.with(key, value.into()))
    }

    pub fn set_all<K: Into<String>, V: Into<Value>>(
        &self,
        entries: impl IntoIterator<Item = (K, V)>,
    ) -> Session {
        self.with_attributes(
            self.attributes
                .with_all(entries.into_iter().map(|(k, v)| (k, v.into()))),
        )
    }

    pub fn remove(&self, key: &str) -> Session {
        self.with_attributes(self.attributes.without(key))
    }

    pub fn remove_all<K: AsRef<str>>(&self, keys: impl IntoIterator<Item = K>) -> Session {
        self.with_attributes(self.attributes.without_all(keys))
    }

    /// Drops every user attribute. Identity, groups, status and internal
    /// attributes are kept.
    pub fn reset(&self) -> Session {
        self.with_attributes(
            self.attributes
                .retain(|key| key.starts_with(INTERNAL_PREFIX)),
        )
    }

    pub fn mark_as_succeeded(&self) -> Session {
        self.with_status(Status::Succeeded)
    }

    pub fn mark_as_failed(&self) -> Session {
        self.with_status(Status::Failed)
    }

    pub fn enter_group(&self, name: impl Into<String>) -> Session {
        let mut next = self.clone();
        next.groups.push(name.into());
        next
    }

    /// Closes the deepest group. A session with no open group is returned
    /// as is.
    pub fn exit_group(&self) -> Session {
        let mut next = self.clone();
        next.groups.pop();
        next
    }

    fn with_attributes(&self, attributes: AttributeStore) -> Session {
        Session {
            attributes,
            ..self.clone()
        }
    }

    fn with_status(&self, status: Status) -> Session {
        Session {
            status,
            ..self.clone()
        }
    }
}

fn collection_mismatch(key: &str, value: &Value, expected: ValueKind) -> SessionError {
    ConversionError::TypeMismatch {
        value: value.to_string(),
        expected,
    }
    .at(key)
}

impl fmt::Display for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Session({},{},{},{{",
            self.scenario, self.user_id, self.status
        )?;
        for (i, (key, value)) in self.attributes.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{}={}", key, value)?;
        }
        write!(f, "}},[{}])", self.groups.join(", "))
    }
}
