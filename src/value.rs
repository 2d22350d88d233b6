//! Untyped attribute values and the typed conversions layered over them.
//!
//! Session attributes and check results travel as [`Value`]. Typed code
//! crosses into and out of that representation through [`CheckValue`], which
//! carries an explicit [`ValueKind`] tag instead of relying on runtime type
//! recovery.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fmt;

use crate::error::ConversionError;

// ─── ValueKind ───────────────────────────────────────────────────────────────

/// The target kind of a coercion, used in conversion errors.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValueKind {
    Null,
    Boolean,
    Int,
    Long,
    Double,
    String,
    Bytes,
    List,
    Set,
    Map,
    Json,
    Any,
}

impl fmt::Display for ValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ValueKind::Null => "null",
            ValueKind::Boolean => "a Boolean",
            ValueKind::Int => "an Int",
            ValueKind::Long => "a Long",
            ValueKind::Double => "a Double",
            ValueKind::String => "a String",
            ValueKind::Bytes => "a byte array",
            ValueKind::List => "a List",
            ValueKind::Set => "a Set",
            ValueKind::Map => "a Map",
            ValueKind::Json => "a JSON node",
            ValueKind::Any => "a value",
        };
        f.write_str(name)
    }
}

// ─── Value ───────────────────────────────────────────────────────────────────

/// An untyped attribute value.
///
/// `Json` holds a node exactly as a JSON extractor produced it; the typed
/// getters adapt JSON arrays and objects to `List`/`Set`/`Map` on demand.
///
/// Equality and ordering are total: doubles compare with `total_cmp`, values
/// of different variants order by variant.
#[derive(Clone, Debug, Serialize)]
#[serde(untagged)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i32),
    Long(i64),
    Double(f64),
    String(String),
    Bytes(Vec<u8>),
    List(Vec<Value>),
    Set(BTreeSet<Value>),
    Map(BTreeMap<String, Value>),
    Json(serde_json::Value),
}

impl Value {
    pub fn kind(&self) -> ValueKind {
        match self {
            Value::Null => ValueKind::Null,
            Value::Bool(_) => ValueKind::Boolean,
            Value::Int(_) => ValueKind::Int,
            Value::Long(_) => ValueKind::Long,
            Value::Double(_) => ValueKind::Double,
            Value::String(_) => ValueKind::String,
            Value::Bytes(_) => ValueKind::Bytes,
            Value::List(_) => ValueKind::List,
            Value::Set(_) => ValueKind::Set,
            Value::Map(_) => ValueKind::Map,
            Value::Json(_) => ValueKind::Json,
        }
    }

    pub fn list<V: Into<Value>>(items: impl IntoIterator<Item = V>) -> Value {
        Value::List(items.into_iter().map(Into::into).collect())
    }

    pub fn set<V: Into<Value>>(items: impl IntoIterator<Item = V>) -> Value {
        Value::Set(items.into_iter().map(Into::into).collect())
    }

    pub fn map<K: Into<String>, V: Into<Value>>(entries: impl IntoIterator<Item = (K, V)>) -> Value {
        Value::Map(
            entries
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            Value::Json(serde_json::Value::String(s)) => Some(s),
            _ => None,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null | Value::Json(serde_json::Value::Null))
    }

    /// Converts a JSON node into the native representation.
    ///
    /// Integers become `Int` when they fit, `Long` otherwise.
    pub fn from_json(node: serde_json::Value) -> Value {
        match node {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Bool(b),
            serde_json::Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    match i32::try_from(i) {
                        Ok(small) => Value::Int(small),
                        Err(_) => Value::Long(i),
                    }
                } else {
                    Value::Double(n.as_f64().unwrap_or(f64::NAN))
                }
            }
            serde_json::Value::String(s) => Value::String(s),
            serde_json::Value::Array(items) => {
                Value::List(items.into_iter().map(Value::from_json).collect())
            }
            serde_json::Value::Object(map) => Value::Map(
                map.into_iter()
                    .map(|(k, v)| (k, Value::from_json(v)))
                    .collect(),
            ),
        }
    }

    /// Renders the value as a JSON node. Bytes become an array of numbers.
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Value::Json(node) => node.clone(),
            Value::Double(d) => serde_json::Number::from_f64(*d)
                .map(serde_json::Value::Number)
                .unwrap_or(serde_json::Value::Null),
            other => serde_json::to_value(other).unwrap_or(serde_json::Value::Null),
        }
    }

    fn rank(&self) -> u8 {
        match self {
            Value::Null => 0,
            Value::Bool(_) => 1,
            Value::Int(_) => 2,
            Value::Long(_) => 3,
            Value::Double(_) => 4,
            Value::String(_) => 5,
            Value::Bytes(_) => 6,
            Value::List(_) => 7,
            Value::Set(_) => 8,
            Value::Map(_) => 9,
            Value::Json(_) => 10,
        }
    }
}

impl Ord for Value {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (Value::Null, Value::Null) => Ordering::Equal,
            (Value::Bool(a), Value::Bool(b)) => a.cmp(b),
            (Value::Int(a), Value::Int(b)) => a.cmp(b),
            (Value::Long(a), Value::Long(b)) => a.cmp(b),
            (Value::Double(a), Value::Double(b)) => a.total_cmp(b),
            (Value::String(a), Value::String(b)) => a.cmp(b),
            (Value::Bytes(a), Value::Bytes(b)) => a.cmp(b),
            (Value::List(a), Value::List(b)) => a.cmp(b),
            (Value::Set(a), Value::Set(b)) => a.cmp(b),
            (Value::Map(a), Value::Map(b)) => a.cmp(b),
            (Value::Json(a), Value::Json(b)) => json_cmp(a, b),
            _ => self.rank().cmp(&other.rank()),
        }
    }
}

impl PartialOrd for Value {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Value {}

/// Total order over JSON nodes. Object key order is irrelevant.
fn json_cmp(a: &serde_json::Value, b: &serde_json::Value) -> Ordering {
    use serde_json::Value as J;

    fn rank(v: &J) -> u8 {
        match v {
            J::Null => 0,
            J::Bool(_) => 1,
            J::Number(_) => 2,
            J::String(_) => 3,
            J::Array(_) => 4,
            J::Object(_) => 5,
        }
    }

    match (a, b) {
        (J::Bool(x), J::Bool(y)) => x.cmp(y),
        (J::Number(x), J::Number(y)) => match (x.as_i64(), y.as_i64()) {
            (Some(i), Some(j)) => i.cmp(&j),
            _ => {
                let fx = x.as_f64().unwrap_or(f64::NAN);
                let fy = y.as_f64().unwrap_or(f64::NAN);
                fx.total_cmp(&fy)
            }
        },
        (J::String(x), J::String(y)) => x.cmp(y),
        (J::Array(x), J::Array(y)) => {
            for (l, r) in x.iter().zip(y.iter()) {
                let ord = json_cmp(l, r);
                if ord != Ordering::Equal {
                    return ord;
                }
            }
            x.len().cmp(&y.len())
        }
        (J::Object(x), J::Object(y)) => {
            let mut xs: Vec<_> = x.iter().collect();
            let mut ys: Vec<_> = y.iter().collect();
            xs.sort_by(|l, r| l.0.cmp(r.0));
            ys.sort_by(|l, r| l.0.cmp(r.0));
            for ((lk, lv), (rk, rv)) in xs.iter().zip(ys.iter()) {
                let ord = lk.cmp(rk).then_with(|| json_cmp(lv, rv));
                if ord != Ordering::Equal {
                    return ord;
                }
            }
            xs.len().cmp(&ys.len())
        }
        _ => rank(a).cmp(&rank(b)),
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => f.write_str("null"),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Int(i) => write!(f, "{}", i),
            Value::Long(l) => write!(f, "{}", l),
            Value::Double(d) => write!(f, "{}", d),
            Value::String(s) => f.write_str(s),
            Value::Bytes(b) => f.write_str(&String::from_utf8_lossy(b)),
            Value::List(items) => write_seq(f, items.iter()),
            Value::Set(items) => write_seq(f, items.iter()),
            Value::Map(map) => {
                f.write_str("{")?;
                for (i, (k, v)) in map.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{}={}", k, v)?;
                }
                f.write_str("}")
            }
            Value::Json(serde_json::Value::String(s)) => f.write_str(s),
            Value::Json(node) => write!(f, "{}", node),
        }
    }
}

fn write_seq<'a>(f: &mut fmt::Formatter<'_>, items: impl Iterator<Item = &'a Value>) -> fmt::Result {
    f.write_str("[")?;
    for (i, item) in items.enumerate() {
        if i > 0 {
            f.write_str(", ")?;
        }
        write!(f, "{}", item)?;
    }
    f.write_str("]")
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<i32> for Value {
    fn from(i: i32) -> Self {
        Value::Int(i)
    }
}

impl From<i64> for Value {
    fn from(l: i64) -> Self {
        Value::Long(l)
    }
}

impl From<f64> for Value {
    fn from(d: f64) -> Self {
        Value::Double(d)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<Vec<u8>> for Value {
    fn from(b: Vec<u8>) -> Self {
        Value::Bytes(b)
    }
}

impl From<Vec<Value>> for Value {
    fn from(items: Vec<Value>) -> Self {
        Value::List(items)
    }
}

impl From<Vec<String>> for Value {
    fn from(items: Vec<String>) -> Self {
        Value::list(items)
    }
}

impl From<Vec<&str>> for Value {
    fn from(items: Vec<&str>) -> Self {
        Value::list(items)
    }
}

impl From<Vec<i32>> for Value {
    fn from(items: Vec<i32>) -> Self {
        Value::list(items)
    }
}

impl From<BTreeSet<Value>> for Value {
    fn from(items: BTreeSet<Value>) -> Self {
        Value::Set(items)
    }
}

impl From<BTreeMap<String, Value>> for Value {
    fn from(map: BTreeMap<String, Value>) -> Self {
        Value::Map(map)
    }
}

impl From<HashMap<String, Value>> for Value {
    fn from(map: HashMap<String, Value>) -> Self {
        Value::Map(map.into_iter().collect())
    }
}

impl From<serde_json::Value> for Value {
    fn from(node: serde_json::Value) -> Self {
        Value::Json(node)
    }
}

// ─── CheckValue ──────────────────────────────────────────────────────────────

/// A type that can flow through a check and be stored in a session.
///
/// `from_value` is the coercion used by typed session getters and by
/// late-bound operands: a value of the requested kind passes through, a
/// string is parsed, anything else is a type mismatch.
pub trait CheckValue: Clone + Send + Sync + 'static {
    const KIND: ValueKind;

    fn into_value(self) -> Value;

    fn from_value(value: Value) -> Result<Self, ConversionError>;

    /// Text used for this value in failure messages.
    fn describe(&self) -> String {
        self.clone().into_value().to_string()
    }

    fn is_null(&self) -> bool {
        false
    }

    /// Whether the value is an empty collection; `exists` rejects those.
    fn is_empty(&self) -> bool {
        false
    }
}

fn mismatch(value: &Value, expected: ValueKind) -> ConversionError {
    ConversionError::TypeMismatch {
        value: value.to_string(),
        expected,
    }
}

fn number_mismatch(n: &serde_json::Number, expected: ValueKind) -> ConversionError {
    ConversionError::TypeMismatch {
        value: n.to_string(),
        expected,
    }
}

fn parse_error(value: &str, expected: ValueKind) -> ConversionError {
    ConversionError::Parse {
        value: value.to_string(),
        expected,
    }
}

/// Parses `true`/`false`, ignoring ASCII case.
pub(crate) fn parse_bool(s: &str) -> Option<bool> {
    if s.eq_ignore_ascii_case("true") {
        Some(true)
    } else if s.eq_ignore_ascii_case("false") {
        Some(false)
    } else {
        None
    }
}

impl CheckValue for Value {
    const KIND: ValueKind = ValueKind::Any;

    fn into_value(self) -> Value {
        self
    }

    fn from_value(value: Value) -> Result<Self, ConversionError> {
        Ok(value)
    }

    fn is_null(&self) -> bool {
        Value::is_null(self)
    }
}

impl CheckValue for String {
    const KIND: ValueKind = ValueKind::String;

    fn into_value(self) -> Value {
        Value::String(self)
    }

    fn from_value(value: Value) -> Result<Self, ConversionError> {
        match value {
            Value::String(s) => Ok(s),
            Value::Bool(_) | Value::Int(_) | Value::Long(_) | Value::Double(_) => {
                Ok(value.to_string())
            }
            Value::Bytes(b) => {
                String::from_utf8(b).map_err(|e| parse_error(&e.to_string(), ValueKind::String))
            }
            Value::Json(
                node @ (serde_json::Value::String(_)
                | serde_json::Value::Number(_)
                | serde_json::Value::Bool(_)),
            ) => Ok(Value::Json(node).to_string()),
            other => Err(mismatch(&other, ValueKind::String)),
        }
    }

    fn describe(&self) -> String {
        self.clone()
    }
}

impl CheckValue for bool {
    const KIND: ValueKind = ValueKind::Boolean;

    fn into_value(self) -> Value {
        Value::Bool(self)
    }

    fn from_value(value: Value) -> Result<Self, ConversionError> {
        match value {
            Value::Bool(b) | Value::Json(serde_json::Value::Bool(b)) => Ok(b),
            Value::String(s) | Value::Json(serde_json::Value::String(s)) => {
                parse_bool(&s).ok_or_else(|| parse_error(&s, ValueKind::Boolean))
            }
            other => Err(mismatch(&other, ValueKind::Boolean)),
        }
    }
}

impl CheckValue for i32 {
    const KIND: ValueKind = ValueKind::Int;

    fn into_value(self) -> Value {
        Value::Int(self)
    }

    fn from_value(value: Value) -> Result<Self, ConversionError> {
        match value {
            Value::Int(i) => Ok(i),
            Value::String(s) | Value::Json(serde_json::Value::String(s)) => {
                s.parse().map_err(|_| parse_error(&s, ValueKind::Int))
            }
            Value::Json(serde_json::Value::Number(n)) => n
                .as_i64()
                .and_then(|i| i32::try_from(i).ok())
                .ok_or_else(|| number_mismatch(&n, ValueKind::Int)),
            other => Err(mismatch(&other, ValueKind::Int)),
        }
    }
}

impl CheckValue for i64 {
    const KIND: ValueKind = ValueKind::Long;

    fn into_value(self) -> Value {
        Value::Long(self)
    }

    fn from_value(value: Value) -> Result<Self, ConversionError> {
        match value {
            Value::Int(i) => Ok(i64::from(i)),
            Value::Long(l) => Ok(l),
            Value::String(s) | Value::Json(serde_json::Value::String(s)) => {
                s.parse().map_err(|_| parse_error(&s, ValueKind::Long))
            }
            Value::Json(serde_json::Value::Number(n)) => n
                .as_i64()
                .ok_or_else(|| number_mismatch(&n, ValueKind::Long)),
            other => Err(mismatch(&other, ValueKind::Long)),
        }
    }
}

impl CheckValue for f64 {
    const KIND: ValueKind = ValueKind::Double;

    fn into_value(self) -> Value {
        Value::Double(self)
    }

    fn from_value(value: Value) -> Result<Self, ConversionError> {
        match value {
            Value::Int(i) => Ok(f64::from(i)),
            Value::Long(l) => Ok(l as f64),
            Value::Double(d) => Ok(d),
            Value::String(s) | Value::Json(serde_json::Value::String(s)) => {
                s.parse().map_err(|_| parse_error(&s, ValueKind::Double))
            }
            Value::Json(serde_json::Value::Number(n)) => n
                .as_f64()
                .ok_or_else(|| number_mismatch(&n, ValueKind::Double)),
            other => Err(mismatch(&other, ValueKind::Double)),
        }
    }
}

impl CheckValue for Vec<u8> {
    const KIND: ValueKind = ValueKind::Bytes;

    fn into_value(self) -> Value {
        Value::Bytes(self)
    }

    fn from_value(value: Value) -> Result<Self, ConversionError> {
        match value {
            Value::Bytes(b) => Ok(b),
            Value::String(s) => Ok(s.into_bytes()),
            other => Err(mismatch(&other, ValueKind::Bytes)),
        }
    }

    fn describe(&self) -> String {
        format!("{:?}", self)
    }
}

impl CheckValue for serde_json::Value {
    const KIND: ValueKind = ValueKind::Json;

    fn into_value(self) -> Value {
        Value::Json(self)
    }

    fn from_value(value: Value) -> Result<Self, ConversionError> {
        match value {
            Value::Json(node) => Ok(node),
            other => Ok(other.to_json()),
        }
    }

    fn describe(&self) -> String {
        self.to_string()
    }

    fn is_null(&self) -> bool {
        serde_json::Value::is_null(self)
    }
}

impl CheckValue for serde_json::Map<String, serde_json::Value> {
    const KIND: ValueKind = ValueKind::Map;

    fn into_value(self) -> Value {
        Value::Json(serde_json::Value::Object(self))
    }

    fn from_value(value: Value) -> Result<Self, ConversionError> {
        match value {
            Value::Json(serde_json::Value::Object(map)) => Ok(map),
            Value::Map(_) => match value.to_json() {
                serde_json::Value::Object(map) => Ok(map),
                _ => Err(mismatch(&value, ValueKind::Map)),
            },
            other => Err(mismatch(&other, ValueKind::Map)),
        }
    }

    fn describe(&self) -> String {
        serde_json::Value::Object(self.clone()).to_string()
    }

    fn is_empty(&self) -> bool {
        serde_json::Map::is_empty(self)
    }
}

impl<X: CheckValue> CheckValue for Vec<X> {
    const KIND: ValueKind = ValueKind::List;

    fn into_value(self) -> Value {
        Value::List(self.into_iter().map(CheckValue::into_value).collect())
    }

    fn from_value(value: Value) -> Result<Self, ConversionError> {
        match value {
            Value::List(items) => items.into_iter().map(X::from_value).collect(),
            Value::Set(items) => items.into_iter().map(X::from_value).collect(),
            Value::Json(serde_json::Value::Array(items)) => items
                .into_iter()
                .map(|item| X::from_value(Value::Json(item)))
                .collect(),
            other => Err(mismatch(&other, ValueKind::List)),
        }
    }

    fn describe(&self) -> String {
        let items: Vec<String> = self.iter().map(CheckValue::describe).collect();
        format!("[{}]", items.join(", "))
    }

    fn is_empty(&self) -> bool {
        Vec::is_empty(self)
    }
}

impl<X: CheckValue> CheckValue for BTreeMap<String, X> {
    const KIND: ValueKind = ValueKind::Map;

    fn into_value(self) -> Value {
        Value::Map(self.into_iter().map(|(k, v)| (k, v.into_value())).collect())
    }

    fn from_value(value: Value) -> Result<Self, ConversionError> {
        match value {
            Value::Map(map) => map
                .into_iter()
                .map(|(k, v)| X::from_value(v).map(|v| (k, v)))
                .collect(),
            Value::Json(serde_json::Value::Object(map)) => map
                .into_iter()
                .map(|(k, v)| X::from_value(Value::Json(v)).map(|v| (k, v)))
                .collect(),
            other => Err(mismatch(&other, ValueKind::Map)),
        }
    }

    fn is_empty(&self) -> bool {
        BTreeMap::is_empty(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn doubles_compare_totally() {
        assert_eq!(Value::Double(f64::NAN), Value::Double(f64::NAN));
        assert!(Value::Double(1.0) < Value::Double(2.0));
    }

    #[test]
    fn json_objects_ignore_key_order() {
        let a = Value::Json(json!({"a": 1, "b": 2}));
        let b = Value::Json(json!({"b": 2, "a": 1}));
        assert_eq!(a, b);
    }

    #[test]
    fn from_json_narrows_integers() {
        assert_eq!(Value::from_json(json!(7)), Value::Int(7));
        assert_eq!(
            Value::from_json(json!(9_000_000_000i64)),
            Value::Long(9_000_000_000)
        );
        assert_eq!(Value::from_json(json!(1.5)), Value::Double(1.5));
    }

    #[test]
    fn string_coercion_parses_numbers() {
        assert_eq!(i32::from_value(Value::from("42")), Ok(42));
        assert!(matches!(
            i32::from_value(Value::from("abc")),
            Err(ConversionError::Parse { .. })
        ));
        assert!(matches!(
            i32::from_value(Value::Bool(true)),
            Err(ConversionError::TypeMismatch { .. })
        ));
    }

    #[test]
    fn double_coercion_parses_fractions() {
        assert_eq!(f64::from_value(Value::from("2.5")), Ok(2.5));
        assert_eq!(f64::from_value(Value::Long(3)), Ok(3.0));
    }

    #[test]
    fn list_coercion_adapts_json_arrays() {
        let items = Vec::<String>::from_value(Value::Json(json!(["a", "b"]))).unwrap();
        assert_eq!(items, vec!["a".to_string(), "b".to_string()]);
    }

    #[test]
    fn display_renders_collections() {
        let v = Value::list(["a", "b"]);
        assert_eq!(v.to_string(), "[a, b]");
        let m = Value::map([("k", 1)]);
        assert_eq!(m.to_string(), "{k=1}");
    }
}
