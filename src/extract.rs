//! Extraction: from a response to the raw sequence of candidate values.
//!
//! Each family has a pure function here operating on an already
//! materialized view of the response. [`Extraction`] binds one of them to
//! its late-bound parameters; the DSL in [`crate::dsl`] builds those.
//!
//! An expression that cannot be evaluated (malformed pattern, unparsable
//! document) is a [`CheckErrorKind::Extraction`] error. Zero matches is not
//! an error, it is an empty sequence.

use md5::{Digest, Md5};
use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use serde::Serialize;
use serde_json_path::JsonPath;
use sha1::Sha1;
use std::collections::BTreeMap;
use std::sync::Arc;
use sxd_document::Package;
use sxd_xpath::{Context, Factory};

use crate::error::{CheckError, ConversionError};
use crate::groups::{GroupExtractor, extract_groups};
use crate::response::Response;
use crate::session::Session;
use crate::value::{CheckValue, Value, ValueKind};

type ExtractFn<X> = Arc<dyn Fn(&Response, &Session) -> Result<Vec<X>, CheckError> + Send + Sync>;

/// A family bound to its parameters, e.g. `regex(id=(\d+))`.
pub struct Extraction<X> {
    description: Arc<str>,
    run: ExtractFn<X>,
}

impl<X> Clone for Extraction<X> {
    fn clone(&self) -> Self {
        Extraction {
            description: self.description.clone(),
            run: self.run.clone(),
        }
    }
}

impl<X> Extraction<X> {
    pub fn new<F>(description: impl Into<Arc<str>>, run: F) -> Self
    where
        F: Fn(&Response, &Session) -> Result<Vec<X>, CheckError> + Send + Sync + 'static,
    {
        Extraction {
            description: description.into(),
            run: Arc::new(run),
        }
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn extract(&self, response: &Response, session: &Session) -> Result<Vec<X>, CheckError> {
        (self.run)(response, session)
    }
}

// ─── Regex ───────────────────────────────────────────────────────────────────

pub fn compile_regex(pattern: &str) -> Result<Regex, CheckError> {
    Regex::new(pattern)
        .map_err(|e| CheckError::extraction(format!("invalid regex '{}': {}", pattern, e)))
}

/// One value per match; matches the extractor rejects are skipped.
pub fn regex_matches<G: GroupExtractor>(re: &Regex, text: &str) -> Vec<G> {
    re.captures_iter(text)
        .filter_map(|caps| G::extract(&caps))
        .collect()
}

/// The first `n` groups of every match that has them all.
pub fn regex_groups(re: &Regex, text: &str, n: usize) -> Vec<Vec<String>> {
    re.captures_iter(text)
        .filter_map(|caps| extract_groups(&caps, n))
        .collect()
}

// ─── JSON ────────────────────────────────────────────────────────────────────

pub fn compile_json_path(path: &str) -> Result<JsonPath, CheckError> {
    JsonPath::parse(path)
        .map_err(|e| CheckError::extraction(format!("invalid JSON path '{}': {}", path, e)))
}

pub fn json_path_nodes(path: &JsonPath, json: &serde_json::Value) -> Vec<serde_json::Value> {
    path.query(json).all().into_iter().cloned().collect()
}

pub fn compile_jmes_path(path: &str) -> Result<jmespath::Expression<'static>, CheckError> {
    jmespath::compile(path)
        .map_err(|e| CheckError::extraction(format!("invalid JMES path '{}': {}", path, e)))
}

/// JMES path yields a single result node; `null` means no match.
///
/// The tree is handed to the search as is; jmespath converts it to its own
/// variable type in one pass.
pub fn jmes_path_nodes(
    expression: &jmespath::Expression<'_>,
    json: &serde_json::Value,
) -> Result<Vec<serde_json::Value>, CheckError> {
    let result = expression.search(json).map_err(|e| {
        CheckError::extraction(format!("JMES path '{}' failed: {}", expression.as_str(), e))
    })?;
    if result.is_null() {
        return Ok(Vec::new());
    }
    let node = serde_json::to_value(&*result).map_err(|e| CheckError::extraction(e.to_string()))?;
    Ok(vec![node])
}

// ─── CSS ─────────────────────────────────────────────────────────────────────

pub fn parse_selector(selector: &str) -> Result<Selector, CheckError> {
    Selector::parse(selector)
        .map_err(|e| CheckError::extraction(format!("invalid CSS selector '{}': {:?}", selector, e)))
}

fn element_text(element: &ElementRef<'_>) -> String {
    element.text().collect()
}

/// Text of every matched element, or the value of `attribute` for the
/// elements that carry it.
pub fn css_select(html: &Html, selector: &Selector, attribute: Option<&str>) -> Vec<String> {
    html.select(selector)
        .filter_map(|element| match attribute {
            Some(name) => element.value().attr(name).map(str::to_string),
            None => Some(element_text(&element)),
        })
        .collect()
}

/// An owned snapshot of a matched element.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct CssNode {
    pub name: String,
    pub attributes: BTreeMap<String, String>,
    pub text: String,
}

impl CssNode {
    fn from_element(element: &ElementRef<'_>) -> Self {
        CssNode {
            name: element.value().name().to_string(),
            attributes: element
                .value()
                .attrs()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
            text: element_text(element),
        }
    }

    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attributes.get(name).map(String::as_str)
    }
}

impl CheckValue for CssNode {
    const KIND: ValueKind = ValueKind::Map;

    fn into_value(self) -> Value {
        Value::map([
            ("name", Value::String(self.name)),
            (
                "attributes",
                Value::map(self.attributes.into_iter().map(|(k, v)| (k, Value::String(v)))),
            ),
            ("text", Value::String(self.text)),
        ])
    }

    fn from_value(value: Value) -> Result<Self, ConversionError> {
        let mismatch = |value: &Value| ConversionError::TypeMismatch {
            value: value.to_string(),
            expected: ValueKind::Map,
        };
        let mut map = match value {
            Value::Map(map) => map,
            other => return Err(mismatch(&other)),
        };
        let name = map.remove("name").map(String::from_value).transpose()?;
        let text = map.remove("text").map(String::from_value).transpose()?;
        let attributes = map
            .remove("attributes")
            .map(BTreeMap::<String, String>::from_value)
            .transpose()?;
        match (name, text) {
            (Some(name), Some(text)) => Ok(CssNode {
                name,
                attributes: attributes.unwrap_or_default(),
                text,
            }),
            _ => Err(mismatch(&Value::Map(map))),
        }
    }

    fn describe(&self) -> String {
        format!("<{}>{}", self.name, self.text)
    }
}

pub fn css_nodes(html: &Html, selector: &Selector) -> Vec<CssNode> {
    html.select(selector)
        .map(|element| CssNode::from_element(&element))
        .collect()
}

/// The submitted values of every form matched by `selector`: input name to
/// value, or to a list of values when the name repeats.
pub fn form_values(html: &Html, selector: &Selector) -> Result<Vec<BTreeMap<String, Value>>, CheckError> {
    let fields = parse_selector("input, select, textarea")?;
    let options = parse_selector("option")?;

    Ok(html
        .select(selector)
        .map(|form| {
            let mut values: Vec<(String, String)> = Vec::new();
            for field in form.select(&fields) {
                let element = field.value();
                let Some(name) = element.attr("name") else {
                    continue;
                };
                match element.name() {
                    "input" => {
                        let kind = element.attr("type").unwrap_or("text").to_ascii_lowercase();
                        let checkable = kind == "checkbox" || kind == "radio";
                        if checkable && element.attr("checked").is_none() {
                            continue;
                        }
                        if matches!(kind.as_str(), "submit" | "button" | "image" | "reset" | "file") {
                            continue;
                        }
                        let default = if checkable { "on" } else { "" };
                        values.push((name.to_string(), element.attr("value").unwrap_or(default).to_string()));
                    }
                    "select" => {
                        let all: Vec<ElementRef<'_>> = field.select(&options).collect();
                        let mut selected: Vec<&ElementRef<'_>> =
                            all.iter().filter(|o| o.value().attr("selected").is_some()).collect();
                        if selected.is_empty() && element.attr("multiple").is_none() {
                            selected.extend(all.first());
                        }
                        for option in selected {
                            let value = option
                                .value()
                                .attr("value")
                                .map(str::to_string)
                                .unwrap_or_else(|| element_text(option).trim().to_string());
                            values.push((name.to_string(), value));
                        }
                    }
                    _ => values.push((name.to_string(), element_text(&field))),
                }
            }
            group_by_name(values)
        })
        .collect())
}

fn group_by_name(values: Vec<(String, String)>) -> BTreeMap<String, Value> {
    let mut grouped: BTreeMap<String, Value> = BTreeMap::new();
    for (name, value) in values {
        match grouped.remove(&name) {
            None => {
                grouped.insert(name, Value::String(value));
            }
            Some(Value::List(mut items)) => {
                items.push(Value::String(value));
                grouped.insert(name, Value::List(items));
            }
            Some(previous) => {
                grouped.insert(name, Value::List(vec![previous, Value::String(value)]));
            }
        }
    }
    grouped
}

// ─── XPath ───────────────────────────────────────────────────────────────────

/// String values of the selected nodes, or the single scalar result.
pub fn xpath_select(
    package: &Package,
    path: &str,
    namespaces: &[(String, String)],
) -> Result<Vec<String>, CheckError> {
    let xpath = Factory::new()
        .build(path)
        .map_err(|e| CheckError::extraction(format!("invalid XPath '{}': {:?}", path, e)))?
        .ok_or_else(|| CheckError::extraction(format!("empty XPath '{}'", path)))?;

    let mut context = Context::new();
    for (prefix, uri) in namespaces {
        context.set_namespace(prefix, uri);
    }

    let document = package.as_document();
    let value = xpath
        .evaluate(&context, document.root())
        .map_err(|e| CheckError::extraction(format!("XPath '{}' failed: {:?}", path, e)))?;

    Ok(match value {
        sxd_xpath::Value::Nodeset(nodes) => nodes
            .document_order()
            .into_iter()
            .map(|node| node.string_value())
            .collect(),
        sxd_xpath::Value::String(s) => vec![s],
        sxd_xpath::Value::Boolean(b) => vec![b.to_string()],
        sxd_xpath::Value::Number(n) if n.fract() == 0.0 && n.is_finite() => vec![(n as i64).to_string()],
        sxd_xpath::Value::Number(n) => vec![n.to_string()],
    })
}

// ─── Body ────────────────────────────────────────────────────────────────────

/// Character offsets of every non-overlapping occurrence of `pattern`.
/// An empty pattern matches nowhere.
pub fn substring_offsets(text: &str, pattern: &str) -> Vec<i32> {
    if pattern.is_empty() {
        return Vec::new();
    }
    let mut offsets = Vec::new();
    let mut last_byte = 0;
    let mut last_char = 0usize;
    for (byte, _) in text.match_indices(pattern) {
        last_char += text[last_byte..byte].chars().count();
        last_byte = byte;
        offsets.push(saturate(last_char));
    }
    offsets
}

pub fn md5_hex(body: &[u8]) -> String {
    let mut hasher = Md5::new();
    hasher.update(body);
    hex::encode(hasher.finalize())
}

pub fn sha1_hex(body: &[u8]) -> String {
    let mut hasher = Sha1::new();
    hasher.update(body);
    hex::encode(hasher.finalize())
}

pub(crate) fn saturate(n: usize) -> i32 {
    i32::try_from(n).unwrap_or(i32::MAX)
}
