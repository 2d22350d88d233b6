use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, ConfigErrorKind};
use crate::response::Charset;

/// Settings shared by every check of a run.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CoreConfig {
    /// Body charset used when a response declares none. Any WHATWG
    /// encoding label is accepted.
    #[serde(default = "default_charset")]
    pub charset: String,
}

fn default_charset() -> String {
    "utf-8".to_string()
}

impl Default for CoreConfig {
    fn default() -> Self {
        CoreConfig {
            charset: default_charset(),
        }
    }
}

impl CoreConfig {
    /// The configured default charset. Labels that [`parse`] accepted always
    /// resolve; anything else falls back to UTF-8.
    pub fn default_charset(&self) -> Charset {
        Charset::from_label(&self.charset).unwrap_or_default()
    }
}

/// Parse a YAML string into a [`CoreConfig`].
///
/// The root must be a mapping; unknown keys and unsupported charsets are
/// rejected.
pub fn parse(input: &str) -> Result<CoreConfig, ConfigError> {
    if input.trim().is_empty() {
        return Err(ConfigError {
            kind: ConfigErrorKind::Syntax,
            message: "empty input".to_string(),
        });
    }

    let value: serde_json::Value = serde_saphyr::from_str(input).map_err(|e| {
        let msg = e.to_string();
        ConfigError {
            kind: classify_error(&msg),
            message: msg,
        }
    })?;

    if !value.is_object() {
        return Err(ConfigError {
            kind: ConfigErrorKind::TypeMismatch,
            message: "configuration root must be a YAML mapping".to_string(),
        });
    }

    let config: CoreConfig = serde_json::from_value(value).map_err(|e| {
        let msg = e.to_string();
        ConfigError {
            kind: classify_error(&msg),
            message: msg,
        }
    })?;

    if Charset::from_label(&config.charset).is_none() {
        return Err(ConfigError {
            kind: ConfigErrorKind::TypeMismatch,
            message: format!("unsupported charset: {}", config.charset),
        });
    }

    Ok(config)
}

fn classify_error(msg: &str) -> ConfigErrorKind {
    let lower = msg.to_lowercase();
    if lower.contains("unknown field")
        || lower.contains("invalid type")
        || lower.contains("expected")
    {
        ConfigErrorKind::TypeMismatch
    } else {
        ConfigErrorKind::Syntax
    }
}
