//! Configuration loading from disk.

use std::fs;
use std::path::Path;

use crate::config::properties::Properties;
use crate::error::ConfigError;

/// Load properties from a TOML file.
///
/// Nested tables become dotted keys, so
///
/// ```toml
/// [client]
/// host = "example.com"
/// peerNames = ["a.example.com", "b.example.com"]
/// ssl.verifyPeer = true
/// ```
///
/// yields `client.host`, `client.peerNames` (space separated) and
/// `client.ssl.verifyPeer`.
pub fn load_properties(path: &Path) -> Result<Properties, ConfigError> {
    let content = fs::read_to_string(path)?;
    parse_properties(&content)
}

/// Parse TOML text into flat properties.
pub fn parse_properties(content: &str) -> Result<Properties, ConfigError> {
    let table: toml::Table = toml::from_str(content)?;
    let mut props = Properties::new();
    flatten("", &table, &mut props);
    Ok(props)
}

fn flatten(prefix: &str, table: &toml::Table, out: &mut Properties) {
    for (name, value) in table {
        let key = format!("{prefix}{name}");
        match value {
            toml::Value::Table(inner) => flatten(&format!("{key}."), inner, out),
            other => {
                out.set(key, scalar(other));
            }
        }
    }
}

fn scalar(value: &toml::Value) -> String {
    match value {
        toml::Value::String(s) => s.clone(),
        toml::Value::Array(items) => items.iter().map(scalar).collect::<Vec<_>>().join(" "),
        other => other.to_string(),
    }
}
