//! TLS client context and per-connection handshake filter.
//!
//! # Responsibilities
//! - Build the shared rustls client configuration from `ssl.*` properties
//! - Wire the peer name verifier into that configuration
//! - Provide the per-connection filter the record layer drives
//!
//! # Design Decisions
//! - A context is immutable; reconfiguration builds a new one and only slots
//!   created afterwards use it
//! - The filter is sans-I/O: ciphertext in, plaintext out, the connection
//!   implementation moves the bytes

use std::fs::File;
use std::io::{self, BufReader, Read as _, Write as _};
use std::path::Path;
use std::sync::Arc;

use arc_swap::ArcSwap;
use bytes::BytesMut;
use rustls::client::WebPkiServerVerifier;
use rustls::pki_types::{CertificateDer, PrivateKeyDer, ServerName};
use rustls::{ClientConfig, ClientConnection, RootCertStore, SupportedProtocolVersion};

use crate::config::properties::Properties;
use crate::error::ConfigError;
use crate::security::verify::{ChainValidator, PeerNameVerifier, PeerNames};

const KNOWN_KEYS: &[&str] = &["verifyPeer", "CAFile", "X509PemFile", "PKeyPemFile", "protocols", "alpn"];

/// Shared TLS client context of a pool.
#[derive(Debug)]
pub struct TlsContext {
    config: Arc<ClientConfig>,
    params: Properties,
}

impl TlsContext {
    /// Build a context from `ssl.*` parameters (keys without the prefix).
    ///
    /// `peer_names` is the live set consulted by the verifier on every
    /// handshake made with this context.
    pub fn new(params: &Properties, peer_names: Arc<ArcSwap<PeerNames>>) -> Result<Self, ConfigError> {
        for (key, _) in params.iter() {
            if !KNOWN_KEYS.contains(&key) {
                tracing::warn!(key = %key, "Ignoring unknown TLS parameter");
            }
        }

        let provider = Arc::new(rustls::crypto::ring::default_provider());

        let chain = if params.get_bool("verifyPeer", true) {
            let roots = match params.get("CAFile") {
                Some(path) => load_roots(Path::new(path))?,
                None => default_roots(),
            };
            let webpki = WebPkiServerVerifier::builder_with_provider(Arc::new(roots), provider.clone())
                .build()
                .map_err(|e| ConfigError::Tls(e.to_string()))?;
            ChainValidator::WebPki(webpki)
        } else {
            tracing::warn!("TLS peer chain verification disabled");
            ChainValidator::AcceptAny
        };
        let verifier = Arc::new(PeerNameVerifier::new(chain, peer_names, provider.clone()));

        let versions = parse_protocols(params.get("protocols"))?;
        let builder = ClientConfig::builder_with_provider(provider)
            .with_protocol_versions(&versions)
            .map_err(tls_error)?
            .dangerous()
            .with_custom_certificate_verifier(verifier);

        let mut config = match (params.get("X509PemFile"), params.get("PKeyPemFile")) {
            (Some(cert), Some(key)) => builder
                .with_client_auth_cert(load_certs(Path::new(cert))?, load_key(Path::new(key))?)
                .map_err(tls_error)?,
            (None, None) => builder.with_no_client_auth(),
            _ => {
                return Err(ConfigError::Tls(
                    "X509PemFile and PKeyPemFile must be set together".to_string(),
                ))
            }
        };
        if let Some(alpn) = params.get("alpn") {
            config.alpn_protocols = alpn.split_whitespace().map(|p| p.as_bytes().to_vec()).collect();
        }

        tracing::debug!(params = params.len(), "TLS context created");
        Ok(Self {
            config: Arc::new(config),
            params: params.clone(),
        })
    }

    pub fn client_config(&self) -> &Arc<ClientConfig> {
        &self.config
    }

    /// Parameters this context was built from.
    pub fn params(&self) -> &Properties {
        &self.params
    }
}

fn tls_error(e: rustls::Error) -> ConfigError {
    ConfigError::Tls(e.to_string())
}

fn default_roots() -> RootCertStore {
    let mut roots = RootCertStore::empty();
    roots.extend(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());
    roots
}

fn load_roots(path: &Path) -> Result<RootCertStore, ConfigError> {
    let mut roots = RootCertStore::empty();
    for cert in load_certs(path)? {
        roots.add(cert).map_err(tls_error)?;
    }
    Ok(roots)
}

fn load_certs(path: &Path) -> Result<Vec<CertificateDer<'static>>, ConfigError> {
    let mut reader = BufReader::new(File::open(path)?);
    let certs = rustls_pemfile::certs(&mut reader).collect::<Result<Vec<_>, _>>()?;
    if certs.is_empty() {
        return Err(ConfigError::Tls(format!("no certificates found in {}", path.display())));
    }
    Ok(certs)
}

fn load_key(path: &Path) -> Result<PrivateKeyDer<'static>, ConfigError> {
    let mut reader = BufReader::new(File::open(path)?);
    rustls_pemfile::private_key(&mut reader)?
        .ok_or_else(|| ConfigError::Tls(format!("no private key found in {}", path.display())))
}

fn parse_protocols(value: Option<&str>) -> Result<Vec<&'static SupportedProtocolVersion>, ConfigError> {
    let Some(value) = value else {
        return Ok(vec![&rustls::version::TLS13, &rustls::version::TLS12]);
    };
    let mut versions = Vec::new();
    for name in value.split_whitespace() {
        let version = match name.to_ascii_lowercase().as_str() {
            "tlsv1.2" => &rustls::version::TLS12,
            "tlsv1.3" => &rustls::version::TLS13,
            other => return Err(ConfigError::Tls(format!("unsupported protocol: {other}"))),
        };
        versions.push(version);
    }
    if versions.is_empty() {
        return Err(ConfigError::Tls("no protocols enabled".to_string()));
    }
    Ok(versions)
}

/// Outcome of feeding ciphertext into a [`TlsFilter`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TlsRecv {
    Ok,
    /// The handshake completed with this input.
    HandshakeJustCompleted,
    /// The peer sent close_notify.
    Closed,
}

/// Client side TLS session for one connection.
pub struct TlsFilter {
    session: ClientConnection,
    server_name: String,
    handshake_complete: bool,
}

impl TlsFilter {
    /// Start a client session against `server_name` using `context`.
    pub fn new(context: &TlsContext, server_name: &str) -> io::Result<Self> {
        let name = ServerName::try_from(server_name.to_string())
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, format!("{server_name}: {e}")))?;
        let session = ClientConnection::new(context.config.clone(), name).map_err(io::Error::other)?;
        Ok(Self {
            session,
            server_name: server_name.to_string(),
            handshake_complete: false,
        })
    }

    pub fn server_name(&self) -> &str {
        &self.server_name
    }

    pub fn is_handshaking(&self) -> bool {
        self.session.is_handshaking()
    }

    pub fn wants_write(&self) -> bool {
        self.session.wants_write()
    }

    /// Underlying rustls session.
    pub fn session(&mut self) -> &mut ClientConnection {
        &mut self.session
    }

    /// Feed received ciphertext; decrypted bytes are appended to `plaintext`.
    pub fn feed(&mut self, ciphertext: &[u8], plaintext: &mut BytesMut) -> Result<TlsRecv, rustls::Error> {
        let mut cursor = io::Cursor::new(ciphertext);
        while (cursor.position() as usize) < ciphertext.len() {
            match self.session.read_tls(&mut cursor) {
                Ok(0) => break,
                Ok(_) => {}
                Err(e) => return Err(rustls::Error::General(e.to_string())),
            }
            let state = self.session.process_new_packets()?;
            if state.plaintext_bytes_to_read() > 0 {
                let mut chunk = vec![0u8; state.plaintext_bytes_to_read()];
                let n = self
                    .session
                    .reader()
                    .read(&mut chunk)
                    .map_err(|e| rustls::Error::General(e.to_string()))?;
                plaintext.extend_from_slice(&chunk[..n]);
            }
            if state.peer_has_closed() {
                return Ok(TlsRecv::Closed);
            }
        }

        if !self.handshake_complete && !self.session.is_handshaking() {
            self.handshake_complete = true;
            return Ok(TlsRecv::HandshakeJustCompleted);
        }
        Ok(TlsRecv::Ok)
    }

    /// Queue plaintext for encryption.
    pub fn encrypt(&mut self, plaintext: &[u8]) -> io::Result<()> {
        self.session.writer().write_all(plaintext)
    }

    /// Drain pending ciphertext (handshake messages, alerts, records).
    pub fn take_ciphertext(&mut self, out: &mut Vec<u8>) -> io::Result<usize> {
        let mut total = 0;
        while self.session.wants_write() {
            total += self.session.write_tls(out)?;
        }
        Ok(total)
    }

    /// Identity of the verified peer, once the handshake has completed.
    pub fn peer_identity(&self) -> Option<String> {
        let leaf = self.session.peer_certificates()?.first()?;
        crate::security::verify::CertIdentity::parse(leaf.as_ref()).and_then(|id| id.display_name())
    }
}

impl std::fmt::Debug for TlsFilter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TlsFilter")
            .field("server_name", &self.server_name)
            .field("handshake_complete", &self.handshake_complete)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn live_peers() -> Arc<ArcSwap<PeerNames>> {
        Arc::new(ArcSwap::from_pointee(PeerNames::default()))
    }

    #[test]
    fn context_without_verification_builds() {
        let params: Properties = [("verifyPeer", "0")].into_iter().collect();
        let ctx = TlsContext::new(&params, live_peers()).unwrap();
        assert_eq!(ctx.params(), &params);
    }

    #[test]
    fn default_roots_build() {
        let params: Properties = [("protocols", "TLSv1.3"), ("alpn", "h2 http/1.1")].into_iter().collect();
        let ctx = TlsContext::new(&params, live_peers()).unwrap();
        assert_eq!(ctx.client_config().alpn_protocols.len(), 2);
    }

    #[test]
    fn bad_protocol_is_rejected() {
        let params: Properties = [("protocols", "SSLv3")].into_iter().collect();
        assert!(matches!(TlsContext::new(&params, live_peers()), Err(ConfigError::Tls(_))));
    }

    #[test]
    fn missing_ca_file_is_an_error() {
        let params: Properties = [("CAFile", "/nonexistent/ca.pem")].into_iter().collect();
        assert!(matches!(TlsContext::new(&params, live_peers()), Err(ConfigError::Io(_))));
    }

    #[test]
    fn half_configured_client_auth_is_rejected() {
        let params: Properties = [("verifyPeer", "0"), ("X509PemFile", "/tmp/cert.pem")].into_iter().collect();
        assert!(matches!(TlsContext::new(&params, live_peers()), Err(ConfigError::Tls(_))));
    }

    #[test]
    fn filter_rejects_unusable_server_name() {
        let params: Properties = [("verifyPeer", "0")].into_iter().collect();
        let ctx = TlsContext::new(&params, live_peers()).unwrap();
        assert!(TlsFilter::new(&ctx, "").is_err());
        let filter = TlsFilter::new(&ctx, "example.com").unwrap();
        assert_eq!(filter.server_name(), "example.com");
        assert!(filter.is_handshaking());
        assert!(filter.wants_write());
    }
}
