//! Tool parameter tables.
//!
//! Each tool declares its parameters as a static table of [`Param`]s. The
//! table drives both the advertised JSON schema and the argument check that
//! runs before the arguments are decoded into the tool's typed parameter
//! struct. Every parameter is advertised as a string; booleans use
//! `"true"`/`"false"` and numbers their decimal form.

use std::fmt::Display;
use std::str::FromStr;

use serde::de::{DeserializeOwned, Error as _};
use serde::{Deserialize, Deserializer};
use serde_json::{json, Map, Value};
use thiserror::Error;

/// What a parameter's value must look like.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamKind {
    Text,
    /// A non-negative integer, as a JSON number or its decimal string form.
    Number,
    /// `"true"`, `"false"` or a JSON boolean.
    Flag,
}

impl ParamKind {
    fn expected(&self) -> &'static str {
        match self {
            ParamKind::Text => "a string",
            ParamKind::Number => "a non-negative integer",
            ParamKind::Flag => "\"true\" or \"false\"",
        }
    }
}

/// One named tool parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Param {
    pub name: &'static str,
    pub description: &'static str,
    pub required: bool,
    pub kind: ParamKind,
}

impl Param {
    pub const fn required(name: &'static str, description: &'static str) -> Self {
        Self {
            name,
            description,
            required: true,
            kind: ParamKind::Text,
        }
    }

    pub const fn optional(name: &'static str, description: &'static str) -> Self {
        Self {
            name,
            description,
            required: false,
            kind: ParamKind::Text,
        }
    }

    pub const fn number(self) -> Self {
        Self {
            kind: ParamKind::Number,
            ..self
        }
    }

    pub const fn flag(self) -> Self {
        Self {
            kind: ParamKind::Flag,
            ..self
        }
    }
}

/// JSON schema advertised in `tools/list`.
pub fn input_schema(params: &[Param]) -> Value {
    let mut properties = Map::new();
    for param in params {
        properties.insert(
            param.name.to_string(),
            json!({ "type": "string", "description": param.description }),
        );
    }

    let required: Vec<&str> = params
        .iter()
        .filter(|p| p.required)
        .map(|p| p.name)
        .collect();

    json!({
        "type": "object",
        "properties": properties,
        "required": required,
    })
}

/// A tool argument that does not match its parameter table.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ArgumentError {
    #[error("{0} parameter is required")]
    Missing(&'static str),
    #[error("{name} parameter must be {expected}")]
    WrongType {
        name: &'static str,
        expected: &'static str,
    },
}

/// Check the arguments against the parameter table.
///
/// Required parameters are checked first, in declaration order. A required
/// value that is absent, `null`, empty or of the wrong kind is reported as
/// missing. Optional parameters may be absent, `null` or empty, but a value
/// of the wrong kind is rejected.
pub fn check_arguments(params: &[Param], arguments: &Value) -> Result<(), ArgumentError> {
    if let Some(param) = params
        .iter()
        .filter(|p| p.required)
        .find(|p| !is_usable(p.kind, arguments.get(p.name)))
    {
        return Err(ArgumentError::Missing(param.name));
    }

    for param in params.iter().filter(|p| !p.required) {
        match arguments.get(param.name) {
            None | Some(Value::Null) => {}
            Some(Value::String(s)) if s.trim().is_empty() => {}
            value if is_usable(param.kind, value) => {}
            _ => {
                return Err(ArgumentError::WrongType {
                    name: param.name,
                    expected: param.kind.expected(),
                })
            }
        }
    }

    Ok(())
}

fn is_usable(kind: ParamKind, value: Option<&Value>) -> bool {
    match (kind, value) {
        (ParamKind::Text, Some(Value::String(s))) => !s.is_empty(),
        (ParamKind::Number, Some(Value::Number(n))) => n.is_u64(),
        (ParamKind::Number, Some(Value::String(s))) => s.trim().parse::<u64>().is_ok(),
        (ParamKind::Flag, Some(Value::Bool(_))) => true,
        (ParamKind::Flag, Some(Value::String(s))) => s == "true" || s == "false",
        _ => false,
    }
}

/// Accepts `"true"`, `"false"`, a JSON boolean, an empty string or `null`.
///
/// Use with `#[serde(default, deserialize_with = "flag")]`.
pub fn flag<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::Bool(b) => Ok(b),
        Value::Null => Ok(false),
        Value::String(s) => match s.as_str() {
            "true" => Ok(true),
            "false" | "" => Ok(false),
            other => Err(D::Error::custom(format!(
                "expected \"true\" or \"false\", got \"{}\"",
                other
            ))),
        },
        other => Err(D::Error::custom(format!(
            "expected \"true\" or \"false\", got {}",
            other
        ))),
    }
}

/// Accepts a JSON number or its decimal string form. Empty strings and
/// `null` decode to `None`.
///
/// Use with `#[serde(default, deserialize_with = "opt_number")]`.
pub fn opt_number<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: FromStr + DeserializeOwned,
    <T as FromStr>::Err: Display,
{
    match Value::deserialize(deserializer)? {
        Value::Null => Ok(None),
        Value::String(s) if s.trim().is_empty() => Ok(None),
        Value::String(s) => s
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|e| D::Error::custom(format!("invalid number \"{}\": {}", s, e))),
        number @ Value::Number(_) => serde_json::from_value(number)
            .map(Some)
            .map_err(D::Error::custom),
        other => Err(D::Error::custom(format!("expected a number, got {}", other))),
    }
}

/// Like [`opt_number`] for a parameter that must be present.
pub fn number<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: FromStr + DeserializeOwned,
    <T as FromStr>::Err: Display,
{
    opt_number(deserializer)?.ok_or_else(|| D::Error::custom("expected a number"))
}

/// Parameters of tools that take none.
#[derive(Debug, Default, Deserialize)]
pub struct NoParams {}
