use std::fmt;
use std::path::Path;

use serde_json::{Map, Number, Value};

use crate::error::SpeccatError;

/// Declared serialization of a specification document.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SpecFormat {
    Json,
    Yaml,
}

impl SpecFormat {
    /// Picks the format from the file extension; anything but `.json` is read as
    /// YAML, which also accepts JSON content.
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|ext| ext.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("json") => SpecFormat::Json,
            _ => SpecFormat::Yaml,
        }
    }

    pub fn from_url_path(path: &str) -> Self {
        Self::from_path(Path::new(path))
    }
}

/// Parses `content` into an order-preserving document tree.
pub fn parse_document(
    content: &str,
    format: SpecFormat,
    origin: impl fmt::Display,
) -> Result<Value, SpeccatError> {
    let content = content.strip_prefix('\u{feff}').unwrap_or(content);
    match format {
        SpecFormat::Json => serde_json::from_str(content)
            .map_err(|err| SpeccatError::parse(&origin, format!("invalid JSON: {err}"))),
        SpecFormat::Yaml => {
            let yaml: serde_yaml::Value = serde_yaml::from_str(content)
                .map_err(|err| SpeccatError::parse(&origin, format!("invalid YAML: {err}")))?;
            yaml_to_json(yaml).map_err(|message| SpeccatError::parse(&origin, message))
        }
    }
}

fn yaml_to_json(value: serde_yaml::Value) -> Result<Value, String> {
    Ok(match value {
        serde_yaml::Value::Null => Value::Null,
        serde_yaml::Value::Bool(b) => Value::Bool(b),
        serde_yaml::Value::Number(n) => yaml_number(&n),
        serde_yaml::Value::String(s) => Value::String(s),
        serde_yaml::Value::Sequence(items) => Value::Array(
            items
                .into_iter()
                .map(yaml_to_json)
                .collect::<Result<_, _>>()?,
        ),
        serde_yaml::Value::Mapping(mapping) => {
            let mut map = Map::with_capacity(mapping.len());
            for (key, value) in mapping {
                map.insert(mapping_key(key)?, yaml_to_json(value)?);
            }
            Value::Object(map)
        }
        serde_yaml::Value::Tagged(tagged) => yaml_to_json(tagged.value)?,
    })
}

// Status codes such as `200:` arrive as numeric keys.
fn mapping_key(key: serde_yaml::Value) -> Result<String, String> {
    match key {
        serde_yaml::Value::String(s) => Ok(s),
        serde_yaml::Value::Number(n) => Ok(n.to_string()),
        serde_yaml::Value::Bool(b) => Ok(b.to_string()),
        serde_yaml::Value::Null => Ok("null".to_string()),
        serde_yaml::Value::Tagged(tagged) => mapping_key(tagged.value),
        other => Err(format!("unsupported mapping key {other:?}")),
    }
}

fn yaml_number(n: &serde_yaml::Number) -> Value {
    if let Some(u) = n.as_u64() {
        Value::Number(u.into())
    } else if let Some(i) = n.as_i64() {
        Value::Number(i.into())
    } else {
        n.as_f64()
            .and_then(Number::from_f64)
            .map(Value::Number)
            .unwrap_or_else(|| Value::String(n.to_string()))
    }
}
