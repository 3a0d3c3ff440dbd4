//! TLS peer verification against an allowed peer name set.
//!
//! # Responsibilities
//! - Hold the set of acceptable peer identities
//! - Decide per certificate of the presented chain, leaf last
//! - Plug into rustls as the client's server certificate verifier
//!
//! # Design Decisions
//! - Chain validation is delegated (webpki); its verdict is final for
//!   intermediates
//! - The leaf must additionally present an identity from the set, unless the
//!   set is empty
//! - Host name mismatches alone do not fail chain validation: which names are
//!   acceptable is the peer set's decision
//! - The set is swapped atomically on reconfiguration and read on every
//!   handshake

use std::collections::BTreeSet;
use std::sync::Arc;

use arc_swap::ArcSwap;
use rustls::client::danger::{HandshakeSignatureValid, ServerCertVerified, ServerCertVerifier};
use rustls::client::WebPkiServerVerifier;
use rustls::crypto::CryptoProvider;
use rustls::pki_types::{CertificateDer, ServerName, UnixTime};
use rustls::{CertificateError, DigitallySignedStruct, SignatureScheme};
use x509_parser::prelude::{FromDer, GeneralName, X509Certificate};

/// Set of acceptable TLS peer identities.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PeerNames(BTreeSet<String>);

impl PeerNames {
    /// Parse a whitespace (or control character) separated list.
    pub fn parse_list(list: &str) -> Self {
        list.split(|c: char| c <= ' ')
            .filter(|name| !name.is_empty())
            .map(str::to_string)
            .collect()
    }

    pub fn insert(&mut self, name: impl Into<String>) -> bool {
        self.0.insert(name.into())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.0.contains(name)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }
}

impl<S: Into<String>> FromIterator<S> for PeerNames {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        PeerNames(iter.into_iter().map(Into::into).collect())
    }
}

/// Names and expiry extracted from a DER certificate.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CertIdentity {
    pub common_name: Option<String>,
    pub dns_names: Vec<String>,
    /// `notAfter`, seconds since the Unix epoch.
    pub not_after: Option<i64>,
}

impl CertIdentity {
    /// `None` if the certificate does not parse.
    pub fn parse(der: &[u8]) -> Option<Self> {
        let (_, cert) = X509Certificate::from_der(der).ok()?;
        let common_name = cert
            .subject()
            .iter_common_name()
            .next()
            .and_then(|cn| cn.as_str().ok())
            .map(str::to_string);
        let dns_names = match cert.subject_alternative_name() {
            Ok(Some(san)) => san
                .value
                .general_names
                .iter()
                .filter_map(|name| match name {
                    GeneralName::DNSName(dns) => Some(dns.to_string()),
                    _ => None,
                })
                .collect(),
            _ => Vec::new(),
        };
        Some(Self {
            common_name,
            dns_names,
            not_after: Some(cert.validity().not_after.timestamp()),
        })
    }

    /// Common name, or the first DNS name.
    pub fn display_name(&self) -> Option<String> {
        self.common_name.clone().or_else(|| self.dns_names.first().cloned())
    }

    /// The identity this certificate presents against `peers`: the first of
    /// its names that is in the set, otherwise its display name.
    pub fn presented_name(&self, peers: &PeerNames) -> String {
        self.common_name
            .iter()
            .chain(self.dns_names.iter())
            .find(|name| peers.contains(name))
            .cloned()
            .or_else(|| self.display_name())
            .unwrap_or_default()
    }
}

/// One certificate as seen by [`PeerVerifier::verify`].
#[derive(Debug, Clone, Copy)]
pub struct PeerCert<'a> {
    /// Position in the chain, 0 is the leaf.
    pub depth: usize,
    pub peer_name: &'a str,
    /// Expiry, seconds since the Unix epoch.
    pub end_time: i64,
    /// Whether `end_time` could be read from the certificate.
    pub end_time_valid: bool,
}

/// Peer name policy applied per certificate.
#[derive(Debug, Clone)]
pub struct PeerVerifier {
    peer_names: Arc<ArcSwap<PeerNames>>,
}

impl PeerVerifier {
    pub fn new(peer_names: Arc<ArcSwap<PeerNames>>) -> Self {
        Self { peer_names }
    }

    /// Current allowed set.
    pub fn peer_names(&self) -> Arc<PeerNames> {
        self.peer_names.load_full()
    }

    /// Verify one certificate.
    ///
    /// `preverify_ok` is the chain validator's verdict. On the leaf,
    /// `auth_name` becomes the peer name when accepted and is cleared when
    /// rejected.
    pub fn verify(&self, auth_name: &mut String, preverify_ok: bool, cert: &PeerCert<'_>, now: i64) -> bool {
        if cert.depth > 0 {
            return preverify_ok;
        }
        let peers = self.peer_names.load();
        let ok = preverify_ok && (peers.is_empty() || peers.contains(cert.peer_name));
        if ok {
            tracing::debug!(
                peer = %cert.peer_name,
                prev_name = %auth_name,
                preverify = preverify_ok,
                depth = cert.depth,
                end_time = cert.end_time - now,
                end_time_valid = cert.end_time_valid,
                "peer verify: ok"
            );
            *auth_name = cert.peer_name.to_string();
        } else {
            tracing::error!(
                peer = %cert.peer_name,
                prev_name = %auth_name,
                preverify = preverify_ok,
                depth = cert.depth,
                end_time = cert.end_time - now,
                end_time_valid = cert.end_time_valid,
                "peer verify: failed"
            );
            auth_name.clear();
        }
        ok
    }
}

/// Underlying certificate chain validation.
#[derive(Debug)]
pub enum ChainValidator {
    /// webpki path validation against a root store.
    WebPki(Arc<WebPkiServerVerifier>),
    /// Every chain is accepted (`ssl.verifyPeer = 0`).
    AcceptAny,
}

impl ChainValidator {
    fn validate(
        &self,
        end_entity: &CertificateDer<'_>,
        intermediates: &[CertificateDer<'_>],
        server_name: &ServerName<'_>,
        ocsp_response: &[u8],
        now: UnixTime,
    ) -> Result<(), rustls::Error> {
        let ChainValidator::WebPki(webpki) = self else {
            return Ok(());
        };
        match webpki.verify_server_cert(end_entity, intermediates, server_name, ocsp_response, now) {
            Ok(_) => Ok(()),
            Err(rustls::Error::InvalidCertificate(
                CertificateError::NotValidForName | CertificateError::NotValidForNameContext { .. },
            )) => Ok(()),
            Err(e) => Err(e),
        }
    }
}

/// rustls server certificate verifier enforcing a [`PeerVerifier`] policy on
/// top of a [`ChainValidator`].
#[derive(Debug)]
pub struct PeerNameVerifier {
    chain: ChainValidator,
    policy: PeerVerifier,
    provider: Arc<CryptoProvider>,
}

impl PeerNameVerifier {
    pub fn new(chain: ChainValidator, peer_names: Arc<ArcSwap<PeerNames>>, provider: Arc<CryptoProvider>) -> Self {
        Self {
            chain,
            policy: PeerVerifier::new(peer_names),
            provider,
        }
    }
}

impl ServerCertVerifier for PeerNameVerifier {
    fn verify_server_cert(
        &self,
        end_entity: &CertificateDer<'_>,
        intermediates: &[CertificateDer<'_>],
        server_name: &ServerName<'_>,
        ocsp_response: &[u8],
        now: UnixTime,
    ) -> Result<ServerCertVerified, rustls::Error> {
        let preverify = self
            .chain
            .validate(end_entity, intermediates, server_name, ocsp_response, now);
        let preverify_ok = preverify.is_ok();
        let now = now.as_secs() as i64;
        let mut auth_name = String::new();
        let mut accepted = true;

        for (i, der) in intermediates.iter().enumerate().rev() {
            let identity = CertIdentity::parse(der.as_ref()).unwrap_or_default();
            let name = identity.display_name().unwrap_or_default();
            let cert = PeerCert {
                depth: i + 1,
                peer_name: &name,
                end_time: identity.not_after.unwrap_or_default(),
                end_time_valid: identity.not_after.is_some(),
            };
            accepted &= self.policy.verify(&mut auth_name, preverify_ok, &cert, now);
        }

        let identity = CertIdentity::parse(end_entity.as_ref()).unwrap_or_default();
        let name = identity.presented_name(&self.policy.peer_names());
        let cert = PeerCert {
            depth: 0,
            peer_name: &name,
            end_time: identity.not_after.unwrap_or_default(),
            end_time_valid: identity.not_after.is_some(),
        };
        accepted &= self.policy.verify(&mut auth_name, preverify_ok, &cert, now);

        if accepted {
            return Ok(ServerCertVerified::assertion());
        }
        Err(preverify
            .err()
            .unwrap_or(rustls::Error::InvalidCertificate(CertificateError::ApplicationVerificationFailure)))
    }

    fn verify_tls12_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        rustls::crypto::verify_tls12_signature(message, cert, dss, &self.provider.signature_verification_algorithms)
    }

    fn verify_tls13_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        rustls::crypto::verify_tls13_signature(message, cert, dss, &self.provider.signature_verification_algorithms)
    }

    fn supported_verify_schemes(&self) -> Vec<SignatureScheme> {
        self.provider.signature_verification_algorithms.supported_schemes()
    }
}
