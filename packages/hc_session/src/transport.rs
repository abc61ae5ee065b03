//! Transport settings shared by the login client and the event stream.
//!
//! Teamservers ship with self-signed certificates, so by default the client
//! accepts whatever certificate the server presents. Handshake signatures are
//! still verified; only the chain of trust is skipped.

use std::sync::Arc;
use std::time::Duration;

use rustls::client::danger::{HandshakeSignatureValid, ServerCertVerified, ServerCertVerifier};
use rustls::crypto::WebPkiSupportedAlgorithms;
use rustls::pki_types::{CertificateDer, ServerName, UnixTime};
use rustls::{ClientConfig, DigitallySignedStruct, RootCertStore, SignatureScheme};

/// Path of the login endpoint.
pub const LOGIN_PATH: &str = "/api/login";
/// Path of the persistent event stream.
pub const EVENT_PATH: &str = "/api/event";
/// Header carrying the session token on authenticated requests.
pub const TOKEN_HEADER: &str = "x-havoc-token";

/// How to reach a teamserver.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TransportOptions {
    /// Use https/wss. Plain http/ws is only useful against local test servers.
    pub secure: bool,
    /// Skip certificate chain validation.
    pub accept_invalid_certs: bool,
    pub connect_timeout: Duration,
}

impl Default for TransportOptions {
    fn default() -> Self {
        Self {
            secure: true,
            accept_invalid_certs: true,
            connect_timeout: Duration::from_secs(10),
        }
    }
}

impl TransportOptions {
    pub fn base_url(&self, host: &str, port: u16) -> String {
        let scheme = if self.secure { "https" } else { "http" };
        format!("{scheme}://{host}:{port}")
    }

    pub fn event_url(&self, host: &str, port: u16) -> String {
        let scheme = if self.secure { "wss" } else { "ws" };
        format!("{scheme}://{host}:{port}{EVENT_PATH}")
    }
}

#[derive(Debug)]
struct AcceptAnyServerCert {
    algorithms: WebPkiSupportedAlgorithms,
}

impl ServerCertVerifier for AcceptAnyServerCert {
    fn verify_server_cert(
        &self,
        _end_entity: &CertificateDer<'_>,
        _intermediates: &[CertificateDer<'_>],
        _server_name: &ServerName<'_>,
        _ocsp_response: &[u8],
        _now: UnixTime,
    ) -> Result<ServerCertVerified, rustls::Error> {
        Ok(ServerCertVerified::assertion())
    }

    fn verify_tls12_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        rustls::crypto::verify_tls12_signature(message, cert, dss, &self.algorithms)
    }

    fn verify_tls13_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        rustls::crypto::verify_tls13_signature(message, cert, dss, &self.algorithms)
    }

    fn supported_verify_schemes(&self) -> Vec<SignatureScheme> {
        self.algorithms.supported_schemes()
    }
}

/// Build the rustls config used for `wss://` connections.
pub(crate) fn client_config(accept_invalid_certs: bool) -> Result<ClientConfig, rustls::Error> {
    let provider = Arc::new(rustls::crypto::ring::default_provider());
    let builder = ClientConfig::builder_with_provider(provider.clone())
        .with_safe_default_protocol_versions()?;

    let config = if accept_invalid_certs {
        builder
            .dangerous()
            .with_custom_certificate_verifier(Arc::new(AcceptAnyServerCert {
                algorithms: provider.signature_verification_algorithms,
            }))
            .with_no_client_auth()
    } else {
        let roots = RootCertStore {
            roots: webpki_roots::TLS_SERVER_ROOTS.to_vec(),
        };
        builder.with_root_certificates(roots).with_no_client_auth()
    };
    Ok(config)
}
