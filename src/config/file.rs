//! Site configuration file (TOML) flattened into dotted keys.
//!
//! ```toml
//! [index.orga]
//! path = "/var/lib/indexes/orga"
//! analyzerClass = "english"
//! ```

use std::path::Path;

use toml::Value;

use super::ConfigError;
use super::properties::IndexProperties;

pub fn load_properties_file(path: &Path) -> Result<IndexProperties, ConfigError> {
    let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::ReadFile {
        path: path.to_path_buf(),
        source,
    })?;
    parse_properties(&raw).map_err(|e| match e {
        ConfigError::ParseToml { source, .. } => ConfigError::ParseToml {
            path: path.to_path_buf(),
            source,
        },
        other => other,
    })
}

pub fn parse_properties(raw: &str) -> Result<IndexProperties, ConfigError> {
    let table: toml::Table = raw.parse().map_err(|source| ConfigError::ParseToml {
        path: Default::default(),
        source,
    })?;
    let mut props = IndexProperties::new();
    for (key, value) in &table {
        flatten_into(&mut props, key.clone(), value)?;
    }
    Ok(props)
}

fn flatten_into(
    props: &mut IndexProperties,
    key: String,
    value: &Value,
) -> Result<(), ConfigError> {
    let scalar = match value {
        Value::Table(inner) => {
            for (k, v) in inner {
                flatten_into(props, format!("{key}.{k}"), v)?;
            }
            return Ok(());
        }
        Value::String(s) => s.clone(),
        Value::Integer(i) => i.to_string(),
        Value::Float(f) => f.to_string(),
        Value::Boolean(b) => b.to_string(),
        Value::Datetime(dt) => dt.to_string(),
        Value::Array(_) => {
            return Err(ConfigError::UnsupportedValue {
                key,
                kind: "array",
            });
        }
    };
    props.set(key, scalar);
    Ok(())
}
