//! HTTPS serving for the proxy.
//!
//! - [`TlsServer`]: the native server surface the proxy drives
//! - [`RustlsServer`]: `axum-server` + rustls implementation
//! - Ctrl+C / SIGTERM handling for the demo binary

mod server;
pub mod shutdown;

pub use server::{RustlsServer, ServerHooks, TlsServer};
