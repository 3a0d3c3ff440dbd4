//! Pool configuration schema.
//!
//! Every option is read from [`Properties`] under a caller supplied prefix.
//! Options that are absent keep their current value, so a pool can be
//! reconfigured incrementally.

use std::time::Duration;

use crate::config::properties::Properties;
use crate::net::location::ServerLocation;
use crate::security::verify::PeerNames;

/// Endpoint, timeouts and TLS naming of a transactional client pool.
#[derive(Debug, Clone)]
pub struct PoolConfig {
    /// Endpoint every slot connects to.
    pub location: ServerLocation,

    /// Connect and request inactivity timeout in seconds.
    pub timeout_secs: u64,

    /// Inactivity timeout of idle connections in seconds.
    pub idle_timeout_secs: u64,

    /// Derive the TLS server name and the accepted peer names from the host.
    pub https_host_name: bool,

    /// TLS server name. Empty means "use the host".
    pub server_name: String,

    /// Accepted TLS peer identities. Empty accepts any valid chain.
    pub peer_names: PeerNames,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            location: ServerLocation::default(),
            timeout_secs: 20,
            idle_timeout_secs: 60,
            https_host_name: true,
            server_name: String::new(),
            peer_names: PeerNames::default(),
        }
    }
}

impl PoolConfig {
    /// Apply the options found under `prefix`.
    ///
    /// Returns the `ssl.*` sub-namespace with the prefix stripped; building the
    /// TLS context from it is left to the pool.
    pub fn apply(&mut self, prefix: &str, props: &Properties) -> Properties {
        let key = |name: &str| format!("{prefix}{name}");
        let prev_host = self.location.hostname.clone();

        if let Some(host) = props.get(&key("host")) {
            self.location.hostname = host.trim().to_string();
        }
        self.location.port = props.get_value(&key("port"), self.location.port);
        self.timeout_secs = props.get_value(&key("timeout"), self.timeout_secs);
        self.idle_timeout_secs = props.get_value(&key("idleTimeout"), self.idle_timeout_secs);
        self.https_host_name = props.get_bool(&key("httpsHostName"), self.https_host_name);

        if let Some(list) = props.get(&key("peerNames")) {
            self.peer_names = PeerNames::parse_list(list);
        } else if self.https_host_name
            && (self.peer_names.is_empty() || prev_host != self.location.hostname)
        {
            self.peer_names = PeerNames::default();
            let host = &self.location.hostname;
            if !host.is_empty() {
                self.peer_names.insert(host.clone());
                // The parent domain wildcard is derived but deliberately not
                // inserted; certificates are matched on the exact host only.
                if let Some(wildcard) = parent_wildcard(host) {
                    tracing::debug!(host = %host, wildcard = %wildcard, "Wildcard peer name not accepted");
                }
            }
        }

        if let Some(name) = props.get(&key("serverName")) {
            self.server_name = name.to_string();
        } else if self.https_host_name {
            self.server_name = self.location.hostname.clone();
        }

        props.copy_with_prefix(&key("ssl."))
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn idle_timeout(&self) -> Duration {
        Duration::from_secs(self.idle_timeout_secs)
    }

    /// Name presented to the server during the TLS handshake.
    pub fn tls_server_name(&self) -> &str {
        if self.server_name.is_empty() {
            &self.location.hostname
        } else {
            &self.server_name
        }
    }
}

/// `*` followed by the parent domain of `host`, e.g. `*.example.com` for
/// `www.example.com`. `None` when the first dot is leading or trailing.
pub fn parent_wildcard(host: &str) -> Option<String> {
    let pos = host.find('.')?;
    if pos == 0 || pos + 1 >= host.len() {
        return None;
    }
    Some(format!("*{}", &host[pos..]))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn props(pairs: &[(&str, &str)]) -> Properties {
        pairs.iter().copied().collect()
    }

    #[test]
    fn defaults() {
        let config = PoolConfig::default();
        assert_eq!(config.location.port, 443);
        assert_eq!(config.timeout_secs, 20);
        assert_eq!(config.idle_timeout_secs, 60);
        assert!(config.https_host_name);
    }

    #[test]
    fn host_derives_peer_and_server_name() {
        let mut config = PoolConfig::default();
        let ssl = config.apply(
            "c.",
            &props(&[("c.host", "www.example.com"), ("c.port", "8443"), ("c.idleTimeout", "5")]),
        );
        assert!(ssl.is_empty());
        assert_eq!(config.location, ServerLocation::new("www.example.com", 8443));
        assert_eq!(config.idle_timeout_secs, 5);
        assert_eq!(config.server_name, "www.example.com");
        assert_eq!(config.peer_names.len(), 1);
        assert!(config.peer_names.contains("www.example.com"));
        assert!(!config.peer_names.contains("*.example.com"));
    }

    #[test]
    fn explicit_peer_names_override_derivation() {
        let mut config = PoolConfig::default();
        config.apply(
            "",
            &props(&[("host", "a.example.com"), ("peerNames", "  one.example.com\ttwo.example.com \n")]),
        );
        assert_eq!(config.peer_names.len(), 2);
        assert!(config.peer_names.contains("one.example.com"));
        assert!(config.peer_names.contains("two.example.com"));
        assert!(!config.peer_names.contains("a.example.com"));
    }

    #[test]
    fn host_change_rederives_peer_names() {
        let mut config = PoolConfig::default();
        config.apply("", &props(&[("host", "a.example.com")]));
        config.apply("", &props(&[("host", "b.example.com")]));
        assert!(config.peer_names.contains("b.example.com"));
        assert!(!config.peer_names.contains("a.example.com"));
    }

    #[test]
    fn disabled_host_name_keeps_names_empty() {
        let mut config = PoolConfig::default();
        config.apply("", &props(&[("host", "example.com"), ("httpsHostName", "0")]));
        assert!(config.peer_names.is_empty());
        assert!(config.server_name.is_empty());
        assert_eq!(config.tls_server_name(), "example.com");
    }

    #[test]
    fn explicit_server_name_wins() {
        let mut config = PoolConfig::default();
        config.apply("", &props(&[("host", "10.0.0.1"), ("serverName", "api.example.com")]));
        assert_eq!(config.tls_server_name(), "api.example.com");
    }

    #[test]
    fn wildcard_is_computed_from_parent_domain() {
        assert_eq!(parent_wildcard("www.example.com").as_deref(), Some("*.example.com"));
        assert_eq!(parent_wildcard("localhost"), None);
        assert_eq!(parent_wildcard(".example.com"), None);
        assert_eq!(parent_wildcard("example."), None);
    }

    #[test]
    fn ssl_namespace_is_returned_stripped() {
        let mut config = PoolConfig::default();
        let ssl = config.apply(
            "c.",
            &props(&[("c.host", "example.com"), ("c.ssl.verifyPeer", "0"), ("c.ssl.protocols", "TLSv1.3")]),
        );
        assert_eq!(ssl.get("verifyPeer"), Some("0"));
        assert_eq!(ssl.get("protocols"), Some("TLSv1.3"));
    }
}
