//! End-to-end tests against the rustls-backed proxy.
//!
//! A self-signed certificate for `localhost` is generated per test and the
//! client trusts exactly that certificate.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::routing::get;
use axum::Router;
use local_https_proxy::{
    HttpAdapter, HttpsOptions, LocalHttpsProxy, ProxyError, RoutedInstance, ServerError,
};
use tokio::sync::mpsc;

const LOCALHOST: IpAddr = IpAddr::V4(Ipv4Addr::LOCALHOST);

struct TestCert {
    cert_pem: String,
    key_pem: String,
}

fn test_cert() -> TestCert {
    let rcgen::CertifiedKey { cert, key_pair } =
        rcgen::generate_simple_self_signed(vec!["localhost".to_string()]).expect("rcgen");
    TestCert {
        cert_pem: cert.pem(),
        key_pem: key_pair.serialize_pem(),
    }
}

fn options(cert: &TestCert) -> Option<HttpsOptions> {
    Some(
        HttpsOptions::new(cert.cert_pem.clone(), cert.key_pem.clone()).with_bind_addr(LOCALHOST),
    )
}

fn app() -> Router {
    Router::new().route("/hello", get(|| async { "hello over tls" }))
}

fn client(cert: &TestCert, port: u16) -> reqwest::Client {
    let _ = rustls::crypto::aws_lc_rs::default_provider().install_default();
    let root = reqwest::Certificate::from_pem(cert.cert_pem.as_bytes()).expect("cacert");
    reqwest::ClientBuilder::new()
        .add_root_certificate(root)
        .resolve("localhost", SocketAddr::new(LOCALHOST, port))
        .build()
        .expect("client")
}

/// Proxy whose events are forwarded into channels.
struct Harness {
    proxy: LocalHttpsProxy,
    listening: mpsc::UnboundedReceiver<u16>,
    errors: mpsc::UnboundedReceiver<ServerError>,
}

fn harness<A: local_https_proxy::HostApplication>(app: &A, cert: &TestCert) -> Harness {
    let (listening_tx, listening) = mpsc::unbounded_channel();
    let (errors_tx, errors) = mpsc::unbounded_channel();
    let proxy = LocalHttpsProxy::new(
        app,
        options(cert),
        Some(Arc::new(move |e: &ServerError| {
            let _ = errors_tx.send(e.clone());
        })),
        Some(Arc::new(move |port: u16| {
            let _ = listening_tx.send(port);
        })),
    )
    .expect("proxy");
    Harness {
        proxy,
        listening,
        errors,
    }
}

async fn next<T>(rx: &mut mpsc::UnboundedReceiver<T>) -> T {
    tokio::time::timeout(Duration::from_secs(5), rx.recv())
        .await
        .expect("timed out waiting for event")
        .expect("event channel closed")
}

#[tokio::test]
async fn serves_host_router_over_https() {
    let cert = test_cert();
    let mut h = harness(&app(), &cert);

    h.proxy.start(None);
    let port = next(&mut h.listening).await;
    assert_ne!(port, 0);
    assert!(h.proxy.is_listening());
    assert_eq!(h.proxy.local_port(), Some(port));

    let url = format!("https://localhost:{}/hello", port);
    let text = client(&cert, port)
        .get(&url)
        .send()
        .await
        .expect(&url)
        .text()
        .await
        .expect(&url);
    assert_eq!(text, "hello over tls");

    h.proxy.close();
}

#[tokio::test]
async fn host_sees_forwarded_https_request() {
    let cert = test_cert();
    let app = Router::new().route(
        "/whoami",
        get(|headers: axum::http::HeaderMap| async move {
            let get = |name: &str| {
                headers
                    .get(name)
                    .and_then(|v| v.to_str().ok())
                    .unwrap_or_default()
                    .to_string()
            };
            format!("{} {}", get("x-forwarded-proto"), get("x-forwarded-for"))
        }),
    );
    let mut h = harness(&app, &cert);

    h.proxy.start(None);
    let port = next(&mut h.listening).await;

    let url = format!("https://localhost:{}/whoami", port);
    let resp = client(&cert, port).get(&url).send().await.expect(&url);
    assert!(resp.headers().contains_key("x-request-id"));
    assert_eq!(resp.text().await.expect(&url), "https 127.0.0.1");

    h.proxy.close();
}

#[tokio::test]
async fn serves_routing_entry_of_routed_adapter() {
    let cert = test_cert();
    let adapter = HttpAdapter::Routed(RoutedInstance::new(app()));
    let mut h = harness(&adapter, &cert);

    h.proxy.start(None);
    let port = next(&mut h.listening).await;

    let url = format!("https://localhost:{}/hello", port);
    let resp = client(&cert, port).get(&url).send().await.expect(&url);
    assert_eq!(resp.status(), reqwest::StatusCode::OK);

    let url = format!("https://localhost:{}/missing", port);
    let resp = client(&cert, port).get(&url).send().await.expect(&url);
    assert_eq!(resp.status(), reqwest::StatusCode::NOT_FOUND);

    h.proxy.close();
}

#[tokio::test]
async fn second_start_errors_before_returning() {
    let cert = test_cert();
    let mut h = harness(&app(), &cert);
    h.proxy.start(None);
    let port = next(&mut h.listening).await;

    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = seen.clone();
    h.proxy
        .on_error(move |e: &ServerError| sink.lock().unwrap().push(e.message()));

    h.proxy.start(Some(43000));

    assert_eq!(
        *seen.lock().unwrap(),
        vec![format!(
            "Unable to start LocalHttpsProxy on port 43000 because it is already listening on port {}",
            port
        )]
    );
    assert_eq!(h.proxy.local_port(), Some(port));

    h.proxy.close();
}

#[tokio::test]
async fn back_to_back_starts_report_already_listening() {
    let cert = test_cert();
    let mut h = harness(&app(), &cert);

    h.proxy.start(Some(0));
    h.proxy.start(Some(0));

    let bound = h.proxy.local_port().expect("bound before start returns");
    assert_ne!(bound, 0);
    let error = next(&mut h.errors).await;
    assert_eq!(
        error.message(),
        format!(
            "Unable to start LocalHttpsProxy on port 0 because it is already listening on port {}",
            bound
        )
    );
    assert_eq!(next(&mut h.listening).await, bound);
    assert!(h.errors.try_recv().is_err());

    h.proxy.close();
}

#[tokio::test]
async fn port_in_use_is_reported_as_error_event() {
    let taken = std::net::TcpListener::bind(SocketAddr::new(LOCALHOST, 0)).expect("bind");
    let port = taken.local_addr().expect("addr").port();

    let cert = test_cert();
    let mut h = harness(&app(), &cert);
    h.proxy.start(Some(port));

    assert!(!h.proxy.is_listening());
    let error = next(&mut h.errors).await;
    assert!(matches!(error, ServerError::Bind { .. }), "{:?}", error);
    assert_eq!(error.io_kind(), Some(std::io::ErrorKind::AddrInUse));
    assert!(!h.proxy.is_listening());
    assert!(h.listening.try_recv().is_err());
}

#[tokio::test]
async fn close_stops_accepting_and_allows_restart() {
    let cert = test_cert();
    let mut h = harness(&app(), &cert);
    h.proxy.start(None);
    let port = next(&mut h.listening).await;

    h.proxy.close();
    assert!(!h.proxy.is_listening());

    let url = format!("https://localhost:{}/hello", port);
    let mut refused = false;
    for _ in 0..50 {
        if client(&cert, port).get(&url).send().await.is_err() {
            refused = true;
            break;
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    assert!(refused, "proxy still accepting after close");

    h.proxy.start(None);
    let port = next(&mut h.listening).await;
    let url = format!("https://localhost:{}/hello", port);
    let resp = client(&cert, port).get(&url).send().await.expect(&url);
    assert_eq!(resp.status(), reqwest::StatusCode::OK);

    h.proxy.close();
    assert!(h.errors.try_recv().is_err());
}

#[test]
fn start_outside_runtime_is_reported() {
    let cert = test_cert();
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = seen.clone();
    let proxy = LocalHttpsProxy::new(
        &app(),
        options(&cert),
        Some(Arc::new(move |e: &ServerError| sink.lock().unwrap().push(e.clone()))),
        None,
    )
    .expect("proxy");

    proxy.start(None);

    assert_eq!(*seen.lock().unwrap(), vec![ServerError::NoRuntime]);
}

#[test]
fn unparseable_pem_fails_construction() {
    let result = LocalHttpsProxy::new(
        &app(),
        Some(HttpsOptions::new("cert", "key")),
        None,
        None,
    );
    assert!(matches!(result, Err(ProxyError::Tls(_))));
}

#[test]
fn missing_key_fails_before_tls_is_loaded() {
    let cert = test_cert();
    let options = HttpsOptions {
        cert: Some(cert.cert_pem.into_bytes()),
        ..HttpsOptions::default()
    };
    let result = LocalHttpsProxy::new(&app(), Some(options), None, None);
    assert_eq!(
        result.err().map(|e| e.to_string()).as_deref(),
        Some("Invalid httpsOptions provided")
    );
}
