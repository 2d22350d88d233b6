//! Late-bound parameters resolved against a [`Session`].
//!
//! Patterns, selectors, comparison operands and defaults may all depend on
//! the virtual user's state. Each of them is an [`Expression<T>`]: a pure
//! function from a session to a `T` (or a [`SessionError`]). Static values
//! are constant expressions and keep their value around so extractors can
//! precompile them.
//!
//! String templates ("EL strings") interpolate attributes with `#{name}` or
//! `${name}`. A backslash before the sigil keeps the text literal.

use std::fmt;
use std::sync::Arc;

use crate::error::SessionError;
use crate::session::Session;
use crate::value::{CheckValue, Value};

type Resolver<T> = Arc<dyn Fn(&Session) -> Result<T, SessionError> + Send + Sync>;

pub struct Expression<T> {
    label: Arc<str>,
    constant: Option<T>,
    resolve: Resolver<T>,
}

impl<T: Clone + Send + Sync + 'static> Expression<T> {
    /// An expression that ignores the session. `label` is the text used for
    /// it in check descriptions.
    pub fn constant_labeled(label: impl Into<Arc<str>>, value: T) -> Self {
        let captured = value.clone();
        Expression {
            label: label.into(),
            constant: Some(value),
            resolve: Arc::new(move |_| Ok(captured.clone())),
        }
    }

    pub fn from_fn<F>(f: F) -> Self
    where
        F: Fn(&Session) -> T + Send + Sync + 'static,
    {
        Self::try_from_fn(move |session| Ok(f(session)))
    }

    pub fn try_from_fn<F>(f: F) -> Self
    where
        F: Fn(&Session) -> Result<T, SessionError> + Send + Sync + 'static,
    {
        Expression {
            label: Arc::from("<function>"),
            constant: None,
            resolve: Arc::new(f),
        }
    }

    pub fn resolve(&self, session: &Session) -> Result<T, SessionError> {
        (self.resolve)(session)
    }

    /// The value when the expression does not depend on the session.
    pub fn as_constant(&self) -> Option<&T> {
        self.constant.as_ref()
    }

    pub fn label(&self) -> &str {
        &self.label
    }
}

impl<T: CheckValue> Expression<T> {
    pub fn constant(value: T) -> Self {
        let label = value.describe();
        Self::constant_labeled(label, value)
    }

    /// Parses an EL template. A template without placeholders becomes a
    /// constant when its text coerces into `T`.
    pub fn el(template: &str) -> Self {
        let parts = parse_template(template);
        let label: Arc<str> = Arc::from(template);

        if let [Part::Attribute(name)] = parts.as_slice() {
            let name = name.clone();
            return Expression {
                label,
                constant: None,
                resolve: Arc::new(move |session| {
                    let value = session.require(&name)?.clone();
                    T::from_value(value).map_err(|e| e.at(&name))
                }),
            };
        }
        if parts.iter().all(|p| matches!(p, Part::Literal(_))) {
            let text: String = parts
                .into_iter()
                .filter_map(|p| match p {
                    Part::Literal(text) => Some(text),
                    Part::Attribute(_) => None,
                })
                .collect();
            return literal_expression(label, text);
        }

        let key = label.clone();
        Expression {
            label,
            constant: None,
            resolve: Arc::new(move |session| {
                let rendered = render(&parts, session)?;
                T::from_value(Value::String(rendered)).map_err(|e| e.at(&key))
            }),
        }
    }
}

fn literal_expression<T: CheckValue>(label: Arc<str>, text: String) -> Expression<T> {
    match T::from_value(Value::String(text)) {
        Ok(value) => Expression::constant_labeled(label, value),
        Err(e) => {
            let error = e.at(&label);
            Expression {
                label,
                constant: None,
                resolve: Arc::new(move |_| Err(error.clone())),
            }
        }
    }
}

impl<T: CheckValue> From<&str> for Expression<T> {
    fn from(template: &str) -> Self {
        Expression::el(template)
    }
}

impl<T: CheckValue> From<String> for Expression<T> {
    fn from(template: String) -> Self {
        Expression::el(&template)
    }
}

impl<T: Clone> Clone for Expression<T> {
    fn clone(&self) -> Self {
        Expression {
            label: self.label.clone(),
            constant: self.constant.clone(),
            resolve: self.resolve.clone(),
        }
    }
}

impl<T> fmt::Debug for Expression<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Expression")
            .field("label", &self.label)
            .field("constant", &self.constant.is_some())
            .finish()
    }
}

impl<T> fmt::Display for Expression<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.label)
    }
}

// ─── Templates ───────────────────────────────────────────────────────────────

#[derive(Clone, Debug, PartialEq, Eq)]
enum Part {
    Literal(String),
    Attribute(String),
}

fn parse_template(template: &str) -> Vec<Part> {
    let mut parts = Vec::new();
    let mut literal = String::new();
    let mut rest = template;

    while let Some(start) = find_open(rest) {
        let (before, from_sigil) = rest.split_at(start);
        if let Some(escaped) = before.strip_suffix('\\') {
            literal.push_str(escaped);
            literal.push_str(&from_sigil[..2]);
            rest = &from_sigil[2..];
            continue;
        }
        literal.push_str(before);

        let body = &from_sigil[2..];
        match body.find('}') {
            Some(end) => {
                if !literal.is_empty() {
                    parts.push(Part::Literal(std::mem::take(&mut literal)));
                }
                parts.push(Part::Attribute(body[..end].trim().to_string()));
                rest = &body[end + 1..];
            }
            None => {
                // Unclosed placeholder stays literal
                literal.push_str(from_sigil);
                rest = "";
            }
        }
    }
    literal.push_str(rest);
    if !literal.is_empty() {
        parts.push(Part::Literal(literal));
    }
    parts
}

fn find_open(s: &str) -> Option<usize> {
    s.match_indices("#{")
        .chain(s.match_indices("${"))
        .map(|(i, _)| i)
        .min()
}

fn render(parts: &[Part], session: &Session) -> Result<String, SessionError> {
    let mut out = String::new();
    for part in parts {
        match part {
            Part::Literal(text) => out.push_str(text),
            Part::Attribute(name) => out.push_str(&session.require(name)?.to_string()),
        }
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session() -> Session {
        Session::new("scn", 1).set("id", 17).set("name", "joe")
    }

    #[test]
    fn parses_both_sigils() {
        assert_eq!(
            parse_template("a#{x}b${y}"),
            vec![
                Part::Literal("a".into()),
                Part::Attribute("x".into()),
                Part::Literal("b".into()),
                Part::Attribute("y".into()),
            ]
        );
    }

    #[test]
    fn escaped_sigil_is_literal() {
        assert_eq!(
            parse_template(r"cost \${price}"),
            vec![Part::Literal("cost ${price}".into())]
        );
    }

    #[test]
    fn unclosed_placeholder_is_literal() {
        assert_eq!(parse_template("a#{b"), vec![Part::Literal("a#{b".into())]);
    }

    #[test]
    fn single_placeholder_keeps_attribute_type() {
        let expr: Expression<i32> = "#{id}".into();
        assert_eq!(expr.resolve(&session()), Ok(17));
    }

    #[test]
    fn mixed_template_renders_then_coerces() {
        let expr: Expression<String> = "user-${name}-#{id}".into();
        assert_eq!(expr.resolve(&session()).unwrap(), "user-joe-17");
    }

    #[test]
    fn literal_template_is_constant() {
        let expr: Expression<String> = "plain".into();
        assert_eq!(expr.as_constant().map(String::as_str), Some("plain"));
    }

    #[test]
    fn missing_attribute_fails() {
        let expr: Expression<String> = "#{nope}".into();
        assert!(matches!(
            expr.resolve(&session()),
            Err(SessionError::MissingValue { key }) if key == "nope"
        ));
    }
}
