//! TLS 1.2 mutual-auth configuration: self-signed certificates, identity
//! proved by `NodeId` rather than hostname, adapted from the teacher's QUIC
//! transport's certificate generation to a TCP-oriented `tokio-rustls` setup.

use std::sync::Arc;

use rustls::pki_types::{CertificateDer, PrivateKeyDer, UnixTime};
use rustls::{DigitallySignedStruct, SignatureScheme};

use crate::transport::error::TransportError;

/// A freshly generated self-signed identity for this node's TLS endpoint.
pub struct NodeIdentity {
    pub cert_der: CertificateDer<'static>,
    pub key_der: PrivateKeyDer<'static>,
}

impl NodeIdentity {
    /// Generates a throwaway self-signed certificate. Peers never validate
    /// the subject; they authenticate each other by `NodeId` at the
    /// application layer once the handshake completes.
    pub fn generate() -> Result<Self, TransportError> {
        use rcgen::{generate_simple_self_signed, CertifiedKey};

        let CertifiedKey { cert, key_pair } = generate_simple_self_signed(vec!["localhost".to_string()])
            .map_err(|e| TransportError::Tls(e.to_string()))?;
        let cert_der = CertificateDer::from(cert.der().to_vec());
        let key_der = PrivateKeyDer::try_from(key_pair.serialize_der())
            .map_err(|e| TransportError::Tls(format!("invalid private key: {e:?}")))?;
        Ok(Self { cert_der, key_der })
    }
}

pub fn server_config(identity: &NodeIdentity) -> Result<Arc<rustls::ServerConfig>, TransportError> {
    let cert_chain = vec![identity.cert_der.clone()];
    let key = identity.key_der.clone_key();

    let mut config = rustls::ServerConfig::builder_with_protocol_versions(&[&rustls::version::TLS12])
        .with_client_cert_verifier(Arc::new(AcceptAnyClientCert))
        .with_single_cert(cert_chain, key)
        .map_err(|e| TransportError::Tls(e.to_string()))?;
    config.alpn_protocols = vec![];
    Ok(Arc::new(config))
}

pub fn client_config(identity: &NodeIdentity) -> Result<Arc<rustls::ClientConfig>, TransportError> {
    let cert_chain = vec![identity.cert_der.clone()];
    let key = identity.key_der.clone_key();

    let config = rustls::ClientConfig::builder_with_protocol_versions(&[&rustls::version::TLS12])
        .dangerous()
        .with_custom_certificate_verifier(Arc::new(AcceptAnyServerCert))
        .with_client_auth_cert(cert_chain, key)
        .map_err(|e| TransportError::Tls(e.to_string()))?;
    Ok(Arc::new(config))
}

/// Accepts any server certificate: peers are identified by `NodeId` proven
/// through the DHT's own PING/PONG exchange, not by certificate chain.
#[derive(Debug)]
struct AcceptAnyServerCert;

impl rustls::client::danger::ServerCertVerifier for AcceptAnyServerCert {
    fn verify_server_cert(
        &self,
        _end_entity: &CertificateDer<'_>,
        _intermediates: &[CertificateDer<'_>],
        _server_name: &rustls::pki_types::ServerName<'_>,
        _ocsp_response: &[u8],
        _now: UnixTime,
    ) -> Result<rustls::client::danger::ServerCertVerified, rustls::Error> {
        Ok(rustls::client::danger::ServerCertVerified::assertion())
    }

    fn verify_tls12_signature(
        &self,
        _message: &[u8],
        _cert: &CertificateDer<'_>,
        _dss: &DigitallySignedStruct,
    ) -> Result<rustls::client::danger::HandshakeSignatureValid, rustls::Error> {
        Ok(rustls::client::danger::HandshakeSignatureValid::assertion())
    }

    fn verify_tls13_signature(
        &self,
        _message: &[u8],
        _cert: &CertificateDer<'_>,
        _dss: &DigitallySignedStruct,
    ) -> Result<rustls::client::danger::HandshakeSignatureValid, rustls::Error> {
        Ok(rustls::client::danger::HandshakeSignatureValid::assertion())
    }

    fn supported_verify_schemes(&self) -> Vec<SignatureScheme> {
        supported_schemes()
    }
}

/// Accepts any client certificate presented during the mutual-auth
/// handshake, for the same identify-by-`NodeId` reason.
#[derive(Debug)]
struct AcceptAnyClientCert;

impl rustls::server::danger::ClientCertVerifier for AcceptAnyClientCert {
    fn offer_client_auth(&self) -> bool {
        true
    }

    fn client_auth_mandatory(&self) -> bool {
        true
    }

    fn root_hint_subjects(&self) -> &[rustls::DistinguishedName] {
        &[]
    }

    fn verify_client_cert(
        &self,
        _end_entity: &CertificateDer<'_>,
        _intermediates: &[CertificateDer<'_>],
        _now: UnixTime,
    ) -> Result<rustls::server::danger::ClientCertVerified, rustls::Error> {
        Ok(rustls::server::danger::ClientCertVerified::assertion())
    }

    fn verify_tls12_signature(
        &self,
        _message: &[u8],
        _cert: &CertificateDer<'_>,
        _dss: &DigitallySignedStruct,
    ) -> Result<rustls::client::danger::HandshakeSignatureValid, rustls::Error> {
        Ok(rustls::client::danger::HandshakeSignatureValid::assertion())
    }

    fn verify_tls13_signature(
        &self,
        _message: &[u8],
        _cert: &CertificateDer<'_>,
        _dss: &DigitallySignedStruct,
    ) -> Result<rustls::client::danger::HandshakeSignatureValid, rustls::Error> {
        Ok(rustls::client::danger::HandshakeSignatureValid::assertion())
    }

    fn supported_verify_schemes(&self) -> Vec<SignatureScheme> {
        supported_schemes()
    }
}

/// ECDHE/DHE + AES-256-GCM/SHA-384 only, per §6.
fn supported_schemes() -> Vec<SignatureScheme> {
    vec![
        SignatureScheme::ECDSA_NISTP384_SHA384,
        SignatureScheme::ECDSA_NISTP256_SHA256,
        SignatureScheme::RSA_PSS_SHA384,
        SignatureScheme::ED25519,
    ]
}
