//! Flat key/value configuration properties.

use std::collections::BTreeMap;
use std::str::FromStr;

/// Ordered string properties, addressed by dotted keys such as
/// `client.host` or `client.ssl.CAFile`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Properties {
    values: BTreeMap<String, String>,
}

impl Properties {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a value, replacing any previous one.
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) -> &mut Self {
        self.values.insert(key.into(), value.into());
        self
    }

    /// Remove a key, returning its value.
    pub fn remove(&mut self, key: &str) -> Option<String> {
        self.values.remove(key)
    }

    /// Raw string value.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }

    /// Parse a value, falling back to `default` when the key is absent or
    /// the value does not parse.
    pub fn get_value<T: FromStr>(&self, key: &str, default: T) -> T {
        match self.get(key) {
            None => default,
            Some(raw) => match raw.trim().parse() {
                Ok(v) => v,
                Err(_) => {
                    tracing::warn!(key = %key, value = %raw, "Ignoring unparsable property");
                    default
                }
            },
        }
    }

    /// Boolean value. Accepts integers (non-zero is true) and `true`/`false`.
    pub fn get_bool(&self, key: &str, default: bool) -> bool {
        let Some(raw) = self.get(key) else {
            return default;
        };
        let raw = raw.trim();
        if let Ok(n) = raw.parse::<i64>() {
            return n != 0;
        }
        match raw.to_ascii_lowercase().as_str() {
            "true" | "yes" | "on" => true,
            "false" | "no" | "off" => false,
            _ => {
                tracing::warn!(key = %key, value = %raw, "Ignoring unparsable boolean property");
                default
            }
        }
    }

    /// Copy every property whose key starts with `prefix`, with the prefix
    /// stripped from the copied keys.
    pub fn copy_with_prefix(&self, prefix: &str) -> Properties {
        let values = self
            .values
            .range(prefix.to_string()..)
            .take_while(|(k, _)| k.starts_with(prefix))
            .map(|(k, v)| (k[prefix.len()..].to_string(), v.clone()))
            .collect();
        Properties { values }
    }

    /// Properties under `prefix`, keys kept as they are.
    pub fn scoped(&self, prefix: &str) -> Properties {
        let values = self
            .values
            .range(prefix.to_string()..)
            .take_while(|(k, _)| k.starts_with(prefix))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        Properties { values }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for Properties {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Properties {
            values: iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn typed_getters_fall_back_to_default() {
        let props: Properties = [("port", "8080"), ("timeout", "soon")].into_iter().collect();
        assert_eq!(props.get_value("port", 443u16), 8080);
        assert_eq!(props.get_value("timeout", 20u64), 20);
        assert_eq!(props.get_value("missing", 7i32), 7);
    }

    #[test]
    fn booleans_accept_numbers_and_words() {
        let props: Properties = [("a", "0"), ("b", "1"), ("c", "false"), ("d", "TRUE"), ("e", "maybe")]
            .into_iter()
            .collect();
        assert!(!props.get_bool("a", true));
        assert!(props.get_bool("b", false));
        assert!(!props.get_bool("c", true));
        assert!(props.get_bool("d", false));
        assert!(props.get_bool("e", true));
        assert!(!props.get_bool("missing", false));
    }

    #[test]
    fn copy_with_prefix_strips_prefix() {
        let props: Properties = [
            ("client.host", "example.com"),
            ("client.ssl.CAFile", "/etc/ca.pem"),
            ("client.ssl.verifyPeer", "1"),
            ("client.sslx", "nope"),
            ("other.ssl.CAFile", "/x"),
        ]
        .into_iter()
        .collect();
        let ssl = props.copy_with_prefix("client.ssl.");
        assert_eq!(ssl.len(), 2);
        assert_eq!(ssl.get("CAFile"), Some("/etc/ca.pem"));
        assert_eq!(ssl.get("verifyPeer"), Some("1"));
        assert!(props.copy_with_prefix("none.").is_empty());

        let client = props.scoped("client.");
        assert_eq!(client.len(), 4);
        assert_eq!(client.get("client.ssl.verifyPeer"), Some("1"));
        assert!(client.get("other.ssl.CAFile").is_none());
    }
}
