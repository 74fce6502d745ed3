//! The HTTPS front door.
//!
//! **For local development only.** [`LocalHttpsProxy`] serves an existing
//! application's router over TLS so it can be reached at `https://` while
//! the application keeps serving plain HTTP on its own port. It is not meant
//! for production or public-facing use.

use std::sync::Arc;

use crate::adapter::{resolve_dispatcher, Dispatcher, HostApplication};
use crate::credentials::{HttpsOptions, TlsCredentials};
use crate::error::{ProxyError, ServerError};
use crate::events::{ErrorCallback, EventRegistry, ListeningCallback};
use crate::http::{RustlsServer, ServerHooks, TlsServer};

/// HTTPS proxy in front of a host application's dispatcher.
///
/// Emits `listening` with the bound port once the TLS server accepts
/// connections, and `error` for any failure after construction. Failures
/// during construction are returned as [`ProxyError`] instead, since no
/// subscriber can exist yet.
///
/// ```no_run
/// # use std::sync::Arc;
/// # use local_https_proxy::{HttpsOptions, LocalHttpsProxy, ServerError};
/// # async fn demo(cert: Vec<u8>, key: Vec<u8>) -> Result<(), local_https_proxy::ProxyError> {
/// let app = axum::Router::new();
/// let proxy = LocalHttpsProxy::new(&app, Some(HttpsOptions::new(cert, key)), None, None)?;
/// proxy
///     .on_listening(|port| println!("HTTPS listening on https://0.0.0.0:{port}"))
///     .on_error(|e: &ServerError| eprintln!("HTTPS proxy error occurred: {e}"));
/// proxy.start(Some(43000));
/// # Ok(())
/// # }
/// ```
pub struct LocalHttpsProxy<S: TlsServer = RustlsServer> {
    server: S,
    events: Arc<EventRegistry>,
}

impl LocalHttpsProxy<RustlsServer> {
    /// Build a proxy backed by [`RustlsServer`].
    ///
    /// `options` must carry both a certificate and a key. The dispatcher is
    /// taken from `app`'s HTTP adapter. Nothing is bound until
    /// [`start`](Self::start).
    pub fn new<A: HostApplication + ?Sized>(
        app: &A,
        options: Option<HttpsOptions>,
        on_error: Option<ErrorCallback>,
        on_listening: Option<ListeningCallback>,
    ) -> Result<Self, ProxyError> {
        Self::with_server(app, options, on_error, on_listening, RustlsServer::new)
    }
}

impl<S: TlsServer> LocalHttpsProxy<S> {
    /// Build a proxy whose TLS server is produced by `create_server`.
    pub fn with_server<A, F>(
        app: &A,
        options: Option<HttpsOptions>,
        on_error: Option<ErrorCallback>,
        on_listening: Option<ListeningCallback>,
        create_server: F,
    ) -> Result<Self, ProxyError>
    where
        A: HostApplication + ?Sized,
        F: FnOnce(TlsCredentials, Dispatcher, ServerHooks) -> Result<S, ProxyError>,
    {
        // Validate and resolve before anything can emit.
        let credentials = TlsCredentials::validate(options)?;
        let dispatcher = resolve_dispatcher(app).ok_or(ProxyError::DispatcherUnavailable)?;

        let events = Arc::new(EventRegistry::new());
        let server = create_server(credentials, dispatcher, ServerHooks::new(events.clone()))?;

        if let Some(callback) = on_error {
            events.on_error(callback);
        }
        if let Some(callback) = on_listening {
            events.on_listening(callback);
        }

        Ok(Self { server, events })
    }

    /// Start accepting HTTPS connections on `port`, or an ephemeral port.
    ///
    /// Completion is reported by the `listening` event. If the proxy is
    /// already listening, an `error` event is emitted before this returns.
    pub fn start(&self, port: Option<u16>) {
        if !self.server.is_listening() {
            tracing::debug!(port = ?port, "Binding HTTPS proxy");
            self.server.listen(port);
            return;
        }

        let bound = self.server.local_port().unwrap_or_default();
        self.events.emit_error(&ServerError::AlreadyListening {
            requested: port,
            bound,
        });
    }

    /// Close every open connection and stop listening. No-op when not listening.
    pub fn close(&self) {
        if self.server.is_listening() {
            self.server.close_all_connections();
        }
    }

    pub fn is_listening(&self) -> bool {
        self.server.is_listening()
    }

    pub fn local_port(&self) -> Option<u16> {
        self.server.local_port()
    }

    /// Subscribe to the `listening` event.
    pub fn on_listening<F>(&self, callback: F) -> &Self
    where
        F: Fn(u16) + Send + Sync + 'static,
    {
        self.events.on_listening(Arc::new(callback));
        self
    }

    /// Subscribe to the `error` event.
    pub fn on_error<F>(&self, callback: F) -> &Self
    where
        F: Fn(&ServerError) + Send + Sync + 'static,
    {
        self.events.on_error(Arc::new(callback));
        self
    }
}
