//! Host application capabilities used to obtain a request dispatcher.
//!
//! A host application hands out an [`HttpAdapter`], a tagged variant over the
//! adapter families this crate knows how to read. Each family resolves to a
//! [`Dispatcher`] through [`DeriveDispatcher`], so the proxy never has to
//! guess at the shape of the adapter's internals.

use std::sync::Arc;

use axum::Router;

/// Request dispatcher the TLS server forwards decrypted requests to.
pub type Dispatcher = Router;

/// Capability of yielding the request dispatcher for an adapter family.
pub trait DeriveDispatcher: Send + Sync {
    fn derive_dispatcher(&self) -> Option<Dispatcher>;
}

/// Adapter instance that keeps its request entry point in a dedicated
/// routing slot, separate from the instance itself.
#[derive(Clone, Default)]
pub struct RoutedInstance {
    /// Routing entry point. Preferred whenever present.
    pub routing: Option<Dispatcher>,
    /// The instance's own dispatcher, used when it has no routing entry.
    pub instance: Option<Dispatcher>,
}

impl RoutedInstance {
    pub fn new(routing: Dispatcher) -> Self {
        Self {
            routing: Some(routing),
            instance: None,
        }
    }
}

impl DeriveDispatcher for RoutedInstance {
    fn derive_dispatcher(&self) -> Option<Dispatcher> {
        self.routing.clone().or_else(|| self.instance.clone())
    }
}

/// HTTP adapter exposed by a host application.
#[derive(Clone)]
pub enum HttpAdapter {
    /// The adapter's instance exposes a routing entry point.
    Routed(RoutedInstance),
    /// The adapter's instance is itself the dispatcher.
    Direct(Dispatcher),
    /// Any other adapter family, resolved by its own implementation.
    Custom(Arc<dyn DeriveDispatcher>),
}

impl DeriveDispatcher for HttpAdapter {
    fn derive_dispatcher(&self) -> Option<Dispatcher> {
        match self {
            HttpAdapter::Routed(instance) => instance.derive_dispatcher(),
            HttpAdapter::Direct(router) => Some(router.clone()),
            HttpAdapter::Custom(resolver) => resolver.derive_dispatcher(),
        }
    }
}

impl std::fmt::Debug for HttpAdapter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            HttpAdapter::Routed(_) => f.write_str("HttpAdapter::Routed"),
            HttpAdapter::Direct(_) => f.write_str("HttpAdapter::Direct"),
            HttpAdapter::Custom(_) => f.write_str("HttpAdapter::Custom"),
        }
    }
}

/// An already configured web application whose requests the proxy serves.
pub trait HostApplication {
    /// The application's HTTP adapter, if it has one.
    fn http_adapter(&self) -> Option<HttpAdapter>;
}

impl HostApplication for Router {
    fn http_adapter(&self) -> Option<HttpAdapter> {
        Some(HttpAdapter::Direct(self.clone()))
    }
}

impl HostApplication for HttpAdapter {
    fn http_adapter(&self) -> Option<HttpAdapter> {
        Some(self.clone())
    }
}

impl<T: HostApplication + ?Sized> HostApplication for Arc<T> {
    fn http_adapter(&self) -> Option<HttpAdapter> {
        (**self).http_adapter()
    }
}

/// Resolve the dispatcher of `app`, or `None` if no adapter family yields one.
pub(crate) fn resolve_dispatcher<A: HostApplication + ?Sized>(app: &A) -> Option<Dispatcher> {
    let adapter = app.http_adapter()?;
    let dispatcher = adapter.derive_dispatcher();
    if dispatcher.is_none() {
        tracing::debug!(adapter = ?adapter, "HTTP adapter yielded no dispatcher");
    }
    dispatcher
}
