//! Error types.
//!
//! Two tiers: [`ProxyError`] is returned from construction and means no proxy
//! exists, [`ServerError`] is the payload of the `error` event once one does.

use std::io;

/// Fault raised while constructing a [`crate::LocalHttpsProxy`].
#[derive(Debug, thiserror::Error)]
pub enum ProxyError {
    #[error("Invalid httpsOptions provided")]
    InvalidHttpsOptions,

    #[error("Failed to derive HTTP server requestListener from Nest application")]
    DispatcherUnavailable,

    #[error("Failed to load TLS configuration: {0}")]
    Tls(String),
}

/// Error reported through the proxy's `error` event.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ServerError {
    #[error(
        "Unable to start LocalHttpsProxy on port {} because it is already listening on port {bound}",
        port_label(.requested)
    )]
    AlreadyListening { requested: Option<u16>, bound: u16 },

    #[error("Failed to bind HTTPS server: {message}")]
    Bind { kind: io::ErrorKind, message: String },

    #[error("HTTPS server error: {message}")]
    Serve { kind: io::ErrorKind, message: String },

    #[error("Unable to start HTTPS server outside of a Tokio runtime")]
    NoRuntime,

    #[error("{0}")]
    Native(String),
}

impl ServerError {
    pub fn bind(error: &io::Error) -> Self {
        ServerError::Bind {
            kind: error.kind(),
            message: error.to_string(),
        }
    }

    pub fn serve(error: &io::Error) -> Self {
        ServerError::Serve {
            kind: error.kind(),
            message: error.to_string(),
        }
    }

    /// Human-readable message, identical to the `Display` output.
    pub fn message(&self) -> String {
        self.to_string()
    }

    /// Kind of the underlying socket error, for bind and serve failures.
    pub fn io_kind(&self) -> Option<io::ErrorKind> {
        match self {
            ServerError::Bind { kind, .. } | ServerError::Serve { kind, .. } => Some(*kind),
            _ => None,
        }
    }
}

// An omitted port asks the OS for an ephemeral one, which is port 0 on the wire.
fn port_label(port: &Option<u16>) -> u16 {
    port.unwrap_or(0)
}
