//! Entry points for building checks, one function per check family.
//!
//! ```ignore
//! use loadcheck::prelude::*;
//!
//! let id = regex(r"id=(\d+)").find().exists().save_as("id");
//! let total = json_path("$.items[*]").count().gt(0);
//! let title = css("h1").is("Welcome".to_string());
//! ```

use regex::Regex;
use std::collections::BTreeMap;
use std::sync::Arc;

use crate::builder::{Find, MultipleFind, MultipleFindStep, Validate, ValidateStep, sealed};
use crate::check::Check;
use crate::error::CheckError;
use crate::expression::Expression;
use crate::extract::{self, CssNode, Extraction, saturate};
use crate::groups::{
    GroupExtractor, Tuple2, Tuple3, Tuple4, Tuple5, Tuple6, Tuple7, Tuple8,
};
use crate::json::JsonFilter;
use crate::response::Response;
use crate::session::Session;
use crate::value::Value;

type Json = serde_json::Value;
type Resolver<T> = Arc<dyn Fn(&Session) -> Result<Arc<T>, CheckError> + Send + Sync>;

/// Static sources compile once, at build time; late-bound ones on every run.
/// A static source that does not compile fails every run with the same error.
fn resolver<T, C>(source: &Expression<String>, compile: C) -> Resolver<T>
where
    T: Send + Sync + 'static,
    C: Fn(&str) -> Result<T, CheckError> + Send + Sync + 'static,
{
    match source.as_constant() {
        Some(constant) => {
            let compiled = compile(constant).map(Arc::new);
            Arc::new(move |_| compiled.clone())
        }
        None => {
            let source = source.clone();
            Arc::new(move |session| compile(&source.resolve(session)?).map(Arc::new))
        }
    }
}

// ─── Regex ───────────────────────────────────────────────────────────────────

#[derive(Clone)]
enum TextSource {
    Body,
    Header(Expression<String>),
    Location,
}

/// A regex check. Without capture-group selection each match contributes
/// its first group, or the whole match when the pattern has no group.
#[derive(Clone)]
pub struct RegexCheck {
    description: Arc<str>,
    source: TextSource,
    pattern: Expression<String>,
}

impl RegexCheck {
    fn matches<X, F>(self, collect: F) -> Extraction<X>
    where
        X: 'static,
        F: Fn(&Regex, &str) -> Vec<X> + Send + Sync + 'static,
    {
        let resolver = resolver(&self.pattern, extract::compile_regex);
        let source = self.source;
        Extraction::new(self.description, move |response, session| {
            let re = resolver(session)?;
            match &source {
                TextSource::Body => Ok(collect(&re, response.text())),
                TextSource::Location => Ok(collect(&re, response.url())),
                TextSource::Header(name) => {
                    let name = name.resolve(session)?;
                    Ok(response
                        .header_values(&name)
                        .flat_map(|value| collect(&re, value))
                        .collect())
                }
            }
        })
    }

    fn groups<G: GroupExtractor>(self) -> MultipleFind<G> {
        MultipleFind::new(self.matches(extract::regex_matches::<G>))
    }

    pub fn capture2(self) -> MultipleFind<Tuple2> {
        self.groups()
    }

    pub fn capture3(self) -> MultipleFind<Tuple3> {
        self.groups()
    }

    pub fn capture4(self) -> MultipleFind<Tuple4> {
        self.groups()
    }

    pub fn capture5(self) -> MultipleFind<Tuple5> {
        self.groups()
    }

    pub fn capture6(self) -> MultipleFind<Tuple6> {
        self.groups()
    }

    pub fn capture7(self) -> MultipleFind<Tuple7> {
        self.groups()
    }

    pub fn capture8(self) -> MultipleFind<Tuple8> {
        self.groups()
    }

    /// The first `n` groups of each match as a list; `n` must be in `2..=8`.
    pub fn capture_groups(self, n: usize) -> Result<MultipleFind<Vec<String>>, CheckError> {
        if !(2..=8).contains(&n) {
            return Err(CheckError::extraction(format!(
                "capture group count must be between 2 and 8, got {}",
                n
            )));
        }
        Ok(MultipleFind::new(
            self.matches(move |re, text| extract::regex_groups(re, text, n)),
        ))
    }
}

impl sealed::Sealed for RegexCheck {}

impl MultipleFindStep for RegexCheck {
    type Item = String;

    fn into_multiple_find(self) -> MultipleFind<String> {
        self.groups()
    }
}

impl ValidateStep for RegexCheck {
    type Value = String;

    fn into_validate(self) -> Validate<String> {
        self.find()
    }
}

impl From<RegexCheck> for Check {
    fn from(check: RegexCheck) -> Self {
        check.exists()
    }
}

pub fn regex(pattern: impl Into<Expression<String>>) -> RegexCheck {
    let pattern = pattern.into();
    RegexCheck {
        description: format!("regex({})", pattern).into(),
        source: TextSource::Body,
        pattern,
    }
}

/// A regex applied to every value of the header `name`.
pub fn header_regex(
    name: impl Into<Expression<String>>,
    pattern: impl Into<Expression<String>>,
) -> RegexCheck {
    let name = name.into();
    let pattern = pattern.into();
    RegexCheck {
        description: format!("headerRegex({},{})", name, pattern).into(),
        source: TextSource::Header(name),
        pattern,
    }
}

/// A regex applied to the request URL.
pub fn current_location_regex(pattern: impl Into<Expression<String>>) -> RegexCheck {
    let pattern = pattern.into();
    RegexCheck {
        description: format!("currentLocationRegex({})", pattern).into(),
        source: TextSource::Location,
        pattern,
    }
}

// ─── JSON ────────────────────────────────────────────────────────────────────

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum JsonFamily {
    JsonPath,
    JmesPath,
    JsonpJsonPath,
    JsonpJmesPath,
}

impl JsonFamily {
    fn name(self) -> &'static str {
        match self {
            JsonFamily::JsonPath => "jsonPath",
            JsonFamily::JmesPath => "jmesPath",
            JsonFamily::JsonpJsonPath => "jsonpJsonPath",
            JsonFamily::JsonpJmesPath => "jsonpJmesPath",
        }
    }

    fn tree(self, response: &Response) -> Result<&Json, CheckError> {
        match self {
            JsonFamily::JsonPath | JsonFamily::JmesPath => response.json(),
            JsonFamily::JsonpJsonPath | JsonFamily::JsonpJmesPath => response.jsonp(),
        }
    }

    fn compile(self, path: &str) -> Result<JsonQuery, CheckError> {
        match self {
            JsonFamily::JsonPath | JsonFamily::JsonpJsonPath => {
                extract::compile_json_path(path).map(JsonQuery::Path)
            }
            JsonFamily::JmesPath | JsonFamily::JsonpJmesPath => {
                extract::compile_jmes_path(path).map(JsonQuery::Jmes)
            }
        }
    }
}

enum JsonQuery {
    Path(serde_json_path::JsonPath),
    Jmes(jmespath::Expression<'static>),
}

impl JsonQuery {
    fn nodes(&self, json: &Json) -> Result<Vec<Json>, CheckError> {
        match self {
            JsonQuery::Path(path) => Ok(extract::json_path_nodes(path, json)),
            JsonQuery::Jmes(expression) => extract::jmes_path_nodes(expression, json),
        }
    }
}

/// A JSON check. Nodes are rendered as strings unless an `of_*` narrowing
/// is picked; nodes that do not narrow are dropped.
#[derive(Clone)]
pub struct JsonCheck {
    family: JsonFamily,
    path: Expression<String>,
}

impl JsonCheck {
    pub fn of_type<X: JsonFilter>(self) -> MultipleFind<X> {
        let family = self.family;
        let description = format!("{}({})", family.name(), self.path);
        let query = resolver(&self.path, move |path| family.compile(path));
        MultipleFind::new(Extraction::new(description, move |response, session| {
            let query = query(session)?;
            let json = family.tree(response)?;
            let nodes = query.nodes(json)?;
            Ok(nodes.iter().filter_map(X::filter).collect())
        }))
    }

    pub fn of_string(self) -> MultipleFind<String> {
        self.of_type()
    }

    pub fn of_boolean(self) -> MultipleFind<bool> {
        self.of_type()
    }

    pub fn of_int(self) -> MultipleFind<i32> {
        self.of_type()
    }

    pub fn of_long(self) -> MultipleFind<i64> {
        self.of_type()
    }

    pub fn of_double(self) -> MultipleFind<f64> {
        self.of_type()
    }

    pub fn of_list(self) -> MultipleFind<Vec<Json>> {
        self.of_type()
    }

    pub fn of_map(self) -> MultipleFind<serde_json::Map<String, Json>> {
        self.of_type()
    }

    /// Any node, `null` included.
    pub fn of_object(self) -> MultipleFind<Json> {
        self.of_type()
    }
}

impl sealed::Sealed for JsonCheck {}

impl MultipleFindStep for JsonCheck {
    type Item = String;

    fn into_multiple_find(self) -> MultipleFind<String> {
        self.of_string()
    }
}

impl ValidateStep for JsonCheck {
    type Value = String;

    fn into_validate(self) -> Validate<String> {
        self.find()
    }
}

impl From<JsonCheck> for Check {
    fn from(check: JsonCheck) -> Self {
        check.exists()
    }
}

fn json_check(family: JsonFamily, path: impl Into<Expression<String>>) -> JsonCheck {
    JsonCheck {
        family,
        path: path.into(),
    }
}

pub fn json_path(path: impl Into<Expression<String>>) -> JsonCheck {
    json_check(JsonFamily::JsonPath, path)
}

/// JMES path yields at most one node; projections come back as one array.
pub fn jmes_path(path: impl Into<Expression<String>>) -> JsonCheck {
    json_check(JsonFamily::JmesPath, path)
}

pub fn jsonp_json_path(path: impl Into<Expression<String>>) -> JsonCheck {
    json_check(JsonFamily::JsonpJsonPath, path)
}

pub fn jsonp_jmes_path(path: impl Into<Expression<String>>) -> JsonCheck {
    json_check(JsonFamily::JsonpJmesPath, path)
}

// ─── Markup ──────────────────────────────────────────────────────────────────

/// A CSS selector check over the HTML body. Yields element text, or an
/// attribute value when built with [`css_attribute`].
#[derive(Clone)]
pub struct CssCheck {
    selector: Expression<String>,
    attribute: Option<String>,
}

impl CssCheck {
    fn description(&self) -> String {
        match &self.attribute {
            Some(attribute) => format!("css({}, {})", self.selector, attribute),
            None => format!("css({})", self.selector),
        }
    }

    /// Matched elements as owned snapshots (tag, attributes, text).
    pub fn of_node(self) -> MultipleFind<CssNode> {
        let description = format!("css({})", self.selector);
        let selector = resolver(&self.selector, extract::parse_selector);
        MultipleFind::new(Extraction::new(description, move |response, session| {
            let selector = selector(session)?;
            Ok(extract::css_nodes(response.html(), &selector))
        }))
    }
}

impl sealed::Sealed for CssCheck {}

impl MultipleFindStep for CssCheck {
    type Item = String;

    fn into_multiple_find(self) -> MultipleFind<String> {
        let description = self.description();
        let CssCheck {
            selector,
            attribute,
        } = self;
        let selector = resolver(&selector, extract::parse_selector);
        MultipleFind::new(Extraction::new(description, move |response, session| {
            let selector = selector(session)?;
            Ok(extract::css_select(
                response.html(),
                &selector,
                attribute.as_deref(),
            ))
        }))
    }
}

impl ValidateStep for CssCheck {
    type Value = String;

    fn into_validate(self) -> Validate<String> {
        self.find()
    }
}

impl From<CssCheck> for Check {
    fn from(check: CssCheck) -> Self {
        check.exists()
    }
}

pub fn css(selector: impl Into<Expression<String>>) -> CssCheck {
    CssCheck {
        selector: selector.into(),
        attribute: None,
    }
}

pub fn css_attribute(selector: impl Into<Expression<String>>, attribute: &str) -> CssCheck {
    CssCheck {
        selector: selector.into(),
        attribute: Some(attribute.to_string()),
    }
}

/// The values each matched form would submit.
pub fn form(selector: impl Into<Expression<String>>) -> MultipleFind<BTreeMap<String, Value>> {
    let selector = selector.into();
    let description = format!("form({})", selector);
    let selector = resolver(&selector, extract::parse_selector);
    MultipleFind::new(Extraction::new(description, move |response, session| {
        let selector = selector(session)?;
        extract::form_values(response.html(), &selector)
    }))
}

pub fn xpath(path: impl Into<Expression<String>>) -> MultipleFind<String> {
    xpath_with_namespaces(path, &[])
}

/// XPath with `(prefix, uri)` namespace bindings. The compiled path is not
/// `Send`, so it is rebuilt on every run.
pub fn xpath_with_namespaces(
    path: impl Into<Expression<String>>,
    namespaces: &[(&str, &str)],
) -> MultipleFind<String> {
    let path = path.into();
    let namespaces: Vec<(String, String)> = namespaces
        .iter()
        .map(|(prefix, uri)| (prefix.to_string(), uri.to_string()))
        .collect();
    let description = format!("xpath({})", path);
    MultipleFind::new(Extraction::new(description, move |response, session| {
        let path = path.resolve(session)?;
        extract::xpath_select(response.xml()?, &path, &namespaces)
    }))
}

// ─── Body ────────────────────────────────────────────────────────────────────

/// Character offsets of every occurrence of `pattern` in the body.
pub fn substring(pattern: impl Into<Expression<String>>) -> MultipleFind<i32> {
    let pattern = pattern.into();
    let description = format!("substring({})", pattern);
    MultipleFind::new(Extraction::new(description, move |response, session| {
        let pattern = pattern.resolve(session)?;
        Ok(extract::substring_offsets(response.text(), &pattern))
    }))
}

fn single<X, F>(description: &str, f: F) -> Find<X>
where
    X: crate::value::CheckValue,
    F: Fn(&Response) -> X + Send + Sync + 'static,
{
    Find::new(Extraction::new(description, move |response, _| {
        Ok(vec![f(response)])
    }))
}

/// Lowercase hex MD5 of the raw body.
pub fn md5() -> Find<String> {
    single("md5", |response| extract::md5_hex(response.body()))
}

/// Lowercase hex SHA-1 of the raw body.
pub fn sha1() -> Find<String> {
    single("sha1", |response| extract::sha1_hex(response.body()))
}

pub fn body_string() -> Find<String> {
    single("bodyString", |response| response.text().to_string())
}

pub fn body_bytes() -> Find<Vec<u8>> {
    single("bodyBytes", |response| response.body().to_vec())
}

/// Body length in bytes.
pub fn body_length() -> Find<i32> {
    single("bodyLength", |response| saturate(response.body().len()))
}

pub fn response_time_in_millis() -> Find<i32> {
    single("responseTimeInMillis", |response| {
        i32::try_from(response.elapsed().as_millis()).unwrap_or(i32::MAX)
    })
}

pub fn status() -> Find<i32> {
    single("status", |response| i32::from(response.status()))
}

pub fn current_location() -> Find<String> {
    single("currentLocation", |response| response.url().to_string())
}

/// Every value of the header `name` (case-insensitive).
pub fn header(name: impl Into<Expression<String>>) -> MultipleFind<String> {
    let name = name.into();
    let description = format!("header({})", name);
    MultipleFind::new(Extraction::new(description, move |response, session| {
        let name = name.resolve(session)?;
        Ok(response.header_values(&name).map(str::to_string).collect())
    }))
}
