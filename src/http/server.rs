//! HTTPS listener backing the proxy.
//!
//! [`TlsServer`] is the surface the proxy drives. [`RustlsServer`] implements
//! it on top of `axum-server` with a rustls acceptor and reports its lifecycle
//! through [`ServerHooks`].

use std::net::{IpAddr, SocketAddr};
use std::sync::{Arc, Mutex};

use axum_server::tls_rustls::RustlsConfig;
use axum_server::Handle;
use tower_http::trace::TraceLayer;

use crate::adapter::Dispatcher;
use crate::credentials::TlsCredentials;
use crate::error::{ProxyError, ServerError};
use crate::events::{lock, EventRegistry};
use crate::middleware::https_forwarding;

/// Native TLS server controlled by a [`crate::LocalHttpsProxy`].
///
/// Implementations report bind success and runtime failures through the
/// [`ServerHooks`] they were created with, never through return values.
pub trait TlsServer: Send + Sync {
    /// Bind and start accepting. `None` asks for an ephemeral port.
    ///
    /// Once this returns after a successful bind, [`is_listening`](Self::is_listening)
    /// is true. Failures are reported through [`ServerHooks::error`].
    fn listen(&self, port: Option<u16>);

    fn is_listening(&self) -> bool;

    /// Port actually bound, if listening.
    fn local_port(&self) -> Option<u16>;

    /// Drop every open connection and stop accepting new ones.
    fn close_all_connections(&self);
}

/// Channel through which a [`TlsServer`] reports native occurrences.
#[derive(Clone)]
pub struct ServerHooks {
    events: Arc<EventRegistry>,
}

impl ServerHooks {
    pub(crate) fn new(events: Arc<EventRegistry>) -> Self {
        Self { events }
    }

    /// The server bound `port` and accepts connections.
    pub fn listening(&self, port: u16) {
        self.events.emit_listening(port);
    }

    pub fn error(&self, error: ServerError) {
        self.events.emit_error(&error);
    }
}

enum Phase {
    Idle,
    Listening { handle: Handle, port: u16 },
}

struct State {
    phase: Phase,
    // Bumped on every listen and close so tasks from an earlier bind leave
    // the current state alone.
    generation: u64,
}

/// [`TlsServer`] serving a [`Dispatcher`] over rustls.
pub struct RustlsServer {
    config: RustlsConfig,
    bind_addr: IpAddr,
    dispatcher: Dispatcher,
    hooks: ServerHooks,
    state: Arc<Mutex<State>>,
}

impl RustlsServer {
    /// Load the credentials into a rustls config. Does not bind.
    pub fn new(
        credentials: TlsCredentials,
        dispatcher: Dispatcher,
        hooks: ServerHooks,
    ) -> Result<Self, ProxyError> {
        let config = credentials.rustls_config()?;
        Ok(Self {
            config,
            bind_addr: credentials.bind_addr,
            dispatcher,
            hooks,
            state: Arc::new(Mutex::new(State {
                phase: Phase::Idle,
                generation: 0,
            })),
        })
    }
}

impl RustlsServer {
    fn bind(&self, port: Option<u16>) -> std::io::Result<std::net::TcpListener> {
        let addr = SocketAddr::new(self.bind_addr, port.unwrap_or(0));
        let listener = std::net::TcpListener::bind(addr)?;
        listener.set_nonblocking(true)?;
        Ok(listener)
    }
}

impl TlsServer for RustlsServer {
    /// Binds the socket before returning, so a second call sees the server
    /// as listening. `listening` is still emitted from the serving task.
    fn listen(&self, port: Option<u16>) {
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            self.hooks.error(ServerError::NoRuntime);
            return;
        };

        let mut state = lock(&self.state);
        if let Phase::Listening { port: bound, .. } = state.phase {
            drop(state);
            self.hooks.error(ServerError::AlreadyListening {
                requested: port,
                bound,
            });
            return;
        }

        let (listener, addr) = match self
            .bind(port)
            .and_then(|l| l.local_addr().map(|addr| (l, addr)))
        {
            Ok(bound) => bound,
            Err(e) => {
                drop(state);
                tracing::error!(port = ?port, error = %e, "Failed to bind HTTPS proxy server");
                let hooks = self.hooks.clone();
                let error = ServerError::bind(&e);
                runtime.spawn(async move { hooks.error(error) });
                return;
            }
        };

        let handle = Handle::new();
        state.generation += 1;
        state.phase = Phase::Listening {
            handle: handle.clone(),
            port: addr.port(),
        };
        let generation = state.generation;
        drop(state);

        tracing::info!(%addr, "Starting HTTPS proxy server");

        let app = self
            .dispatcher
            .clone()
            .layer(axum::middleware::from_fn(https_forwarding))
            .layer(TraceLayer::new_for_http());
        let server =
            axum_server::from_tcp_rustls(listener, self.config.clone()).handle(handle.clone());

        let state = self.state.clone();
        let hooks = self.hooks.clone();
        runtime.spawn(async move {
            let result = server
                .serve(app.into_make_service_with_connect_info::<SocketAddr>())
                .await;
            {
                let mut state = lock(&state);
                if state.generation != generation {
                    return;
                }
                state.phase = Phase::Idle;
            }
            report_serve_exit(addr, result, &hooks);
        });

        let state = self.state.clone();
        let hooks = self.hooks.clone();
        runtime.spawn(async move {
            let Some(bound) = handle.listening().await else {
                return;
            };
            if lock(&state).generation != generation {
                return;
            }
            tracing::info!(addr = %bound, "HTTPS proxy server listening");
            hooks.listening(bound.port());
        });
    }

    fn is_listening(&self) -> bool {
        matches!(lock(&self.state).phase, Phase::Listening { .. })
    }

    fn local_port(&self) -> Option<u16> {
        match lock(&self.state).phase {
            Phase::Listening { port, .. } => Some(port),
            Phase::Idle => None,
        }
    }

    fn close_all_connections(&self) {
        let mut state = lock(&self.state);
        let phase = std::mem::replace(&mut state.phase, Phase::Idle);
        state.generation += 1;
        if let Phase::Listening { handle, port } = phase {
            tracing::info!(
                port,
                connections = handle.connection_count(),
                "Closing HTTPS proxy connections"
            );
            handle.shutdown();
        }
    }
}

impl Drop for RustlsServer {
    fn drop(&mut self) {
        self.close_all_connections();
    }
}

fn report_serve_exit(addr: SocketAddr, result: std::io::Result<()>, hooks: &ServerHooks) {
    match result {
        Ok(()) => tracing::debug!(%addr, "HTTPS proxy server stopped"),
        Err(e) => {
            tracing::error!(%addr, error = %e, "HTTPS proxy server failed");
            hooks.error(ServerError::serve(&e));
        }
    }
}
