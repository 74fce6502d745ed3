//! local-https-proxy - serve a local development axum application over HTTPS
//!
//! [`LocalHttpsProxy`] takes the router of an already configured application,
//! terminates TLS in front of it with rustls, and reports its lifecycle through
//! `listening` and `error` events. It is meant for local development only.

pub mod adapter;
pub mod config;
pub mod credentials;
pub mod error;
pub mod events;
pub mod http;
pub mod middleware;
pub mod proxy;

pub use adapter::{DeriveDispatcher, Dispatcher, HostApplication, HttpAdapter, RoutedInstance};
pub use credentials::{HttpsOptions, TlsCredentials};
pub use error::{ProxyError, ServerError};
pub use events::{ErrorCallback, ListeningCallback};
pub use http::{RustlsServer, ServerHooks, TlsServer};
pub use proxy::LocalHttpsProxy;
