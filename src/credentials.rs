//! TLS credential set handed to the proxy.

use std::net::{IpAddr, Ipv4Addr};
use std::sync::Arc;

use axum_server::tls_rustls::RustlsConfig;
use rustls_pki_types::pem::PemObject;
use rustls_pki_types::{CertificateDer, PrivateKeyDer};

use crate::error::ProxyError;

/// Certificate and key for the HTTPS listener, plus the address to bind.
///
/// `cert` and `key` are PEM bytes. Only their presence is checked when the
/// proxy is constructed.
#[derive(Debug, Clone)]
pub struct HttpsOptions {
    pub cert: Option<Vec<u8>>,
    pub key: Option<Vec<u8>>,
    pub bind_addr: IpAddr,
}

impl Default for HttpsOptions {
    fn default() -> Self {
        Self {
            cert: None,
            key: None,
            bind_addr: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
        }
    }
}

impl HttpsOptions {
    pub fn new(cert: impl Into<Vec<u8>>, key: impl Into<Vec<u8>>) -> Self {
        Self {
            cert: Some(cert.into()),
            key: Some(key.into()),
            ..Self::default()
        }
    }

    pub fn with_bind_addr(mut self, bind_addr: IpAddr) -> Self {
        self.bind_addr = bind_addr;
        self
    }
}

/// A credential set known to carry both a certificate and a key.
#[derive(Clone)]
pub struct TlsCredentials {
    pub cert: Vec<u8>,
    pub key: Vec<u8>,
    pub bind_addr: IpAddr,
}

impl std::fmt::Debug for TlsCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TlsCredentials")
            .field("cert", &format_args!("{} bytes", self.cert.len()))
            .field("key", &"<redacted>")
            .field("bind_addr", &self.bind_addr)
            .finish()
    }
}

impl TlsCredentials {
    /// Check that `options` exists and carries a non-empty cert and key.
    pub fn validate(options: Option<HttpsOptions>) -> Result<Self, ProxyError> {
        let options = options.ok_or(ProxyError::InvalidHttpsOptions)?;
        match (options.cert, options.key) {
            (Some(cert), Some(key)) if !cert.is_empty() && !key.is_empty() => Ok(Self {
                cert,
                key,
                bind_addr: options.bind_addr,
            }),
            _ => Err(ProxyError::InvalidHttpsOptions),
        }
    }

    /// Build the rustls configuration for the HTTPS listener.
    pub fn rustls_config(&self) -> Result<RustlsConfig, ProxyError> {
        let certs = CertificateDer::pem_slice_iter(&self.cert)
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| ProxyError::Tls(format!("Failed to parse certificate: {}", e)))?;
        if certs.is_empty() {
            return Err(ProxyError::Tls("No certificate found in cert".to_string()));
        }
        let key = PrivateKeyDer::from_pem_slice(&self.key)
            .map_err(|e| ProxyError::Tls(format!("Failed to parse private key: {}", e)))?;

        let provider = Arc::new(rustls::crypto::aws_lc_rs::default_provider());
        let mut sc = rustls::ServerConfig::builder_with_provider(provider)
            .with_safe_default_protocol_versions()
            .map_err(|e| ProxyError::Tls(e.to_string()))?
            .with_no_client_auth()
            .with_single_cert(certs, key)
            .map_err(|e| ProxyError::Tls(e.to_string()))?;
        sc.alpn_protocols = vec![b"h2".to_vec(), b"http/1.1".to_vec()];

        Ok(RustlsConfig::from_config(Arc::new(sc)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn absent_options_are_rejected() {
        let err = TlsCredentials::validate(None).unwrap_err();
        assert_eq!(err.to_string(), "Invalid httpsOptions provided");
    }

    #[test]
    fn missing_cert_or_key_is_rejected() {
        let cases = [
            HttpsOptions::default(),
            HttpsOptions {
                cert: Some(b"cert".to_vec()),
                ..HttpsOptions::default()
            },
            HttpsOptions {
                key: Some(b"key".to_vec()),
                ..HttpsOptions::default()
            },
            HttpsOptions::new(Vec::new(), b"key".to_vec()),
        ];
        for options in cases {
            assert!(matches!(
                TlsCredentials::validate(Some(options)),
                Err(ProxyError::InvalidHttpsOptions)
            ));
        }
    }

    #[test]
    fn content_is_not_inspected_by_validation() {
        let creds = TlsCredentials::validate(Some(HttpsOptions::new("cert", "key"))).unwrap();
        assert_eq!(creds.cert, b"cert");
        assert_eq!(creds.bind_addr, IpAddr::V4(Ipv4Addr::UNSPECIFIED));
    }

    #[test]
    fn garbage_pem_fails_rustls_config() {
        let creds = TlsCredentials::validate(Some(HttpsOptions::new("cert", "key"))).unwrap();
        assert!(matches!(creds.rustls_config(), Err(ProxyError::Tls(_))));
    }

    #[test]
    fn debug_output_hides_key() {
        let creds = TlsCredentials::validate(Some(HttpsOptions::new("cert", "secret"))).unwrap();
        assert!(!format!("{:?}", creds).contains("secret"));
    }
}
