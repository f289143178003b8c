//! Shared utilities for integration tests.
#![allow(dead_code)]

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpSocket};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;

use simplelb::config::{BackendConfig, LbMethod, ProxyConfig};
use simplelb::load_balancer::BackendRegistry;
use simplelb::net::Listener;
use simplelb::{Server, Shutdown};

pub const REQUEST: &[u8] = b"GET /index.html HTTP/1.1\r\nHost: test\r\n\r\n";

/// A mock backend answering every request with its own name as the body.
pub struct MockBackend {
    pub addr: SocketAddr,
    handle: JoinHandle<()>,
}

impl MockBackend {
    /// Stop accepting; the port is closed once the task is torn down.
    pub async fn stop(self) {
        self.handle.abort();
        let _ = self.handle.await;
    }
}

pub async fn start_mock_backend(name: &'static str) -> MockBackend {
    let (_tx, release) = watch::channel(true);
    let (received, _rx) = mpsc::unbounded_channel();
    start_backend(name, release, received).await
}

/// A backend that reports every request it reads, then holds the response until released.
pub async fn start_held_backend(
    name: &'static str,
    release: watch::Receiver<bool>,
) -> (MockBackend, mpsc::UnboundedReceiver<&'static str>) {
    let (tx, rx) = mpsc::unbounded_channel();
    (start_backend(name, release, tx).await, rx)
}

async fn start_backend(
    name: &'static str,
    release: watch::Receiver<bool>,
    received: mpsc::UnboundedSender<&'static str>,
) -> MockBackend {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let handle = tokio::spawn(async move {
        loop {
            let Ok((mut socket, _)) = listener.accept().await else { break };
            let mut release = release.clone();
            let received = received.clone();
            tokio::spawn(async move {
                let mut buf = [0u8; 4096];
                // health probes connect and leave without sending anything
                let n = socket.read(&mut buf).await.unwrap_or(0);
                if n == 0 {
                    return;
                }
                let _ = received.send(name);
                while !*release.borrow() {
                    if release.changed().await.is_err() {
                        break;
                    }
                }
                let response = format!(
                    "HTTP/1.1 200 OK\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                    name.len(),
                    name
                );
                let _ = socket.write_all(response.as_bytes()).await;
                let _ = socket.shutdown().await;
            });
        }
    });

    MockBackend { addr, handle }
}

/// A persistent-connection backend: answers each request on the same socket
/// and only closes when the peer does, or after a long idle period.
pub async fn start_keepalive_backend(name: &'static str) -> MockBackend {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let handle = tokio::spawn(async move {
        loop {
            let Ok((mut socket, _)) = listener.accept().await else { break };
            tokio::spawn(async move {
                let mut buf = [0u8; 4096];
                loop {
                    let read = tokio::time::timeout(Duration::from_secs(30), socket.read(&mut buf)).await;
                    match read {
                        Ok(Ok(n)) if n > 0 => {}
                        _ => break,
                    }
                    let response = format!(
                        "HTTP/1.1 200 OK\r\nContent-Length: {}\r\nConnection: keep-alive\r\n\r\n{}",
                        name.len(),
                        name
                    );
                    if socket.write_all(response.as_bytes()).await.is_err() {
                        break;
                    }
                }
            });
        }
    });

    MockBackend { addr, handle }
}

/// Build a config for the given backends, with health checks off.
pub fn config(method: LbMethod, backends: &[(&str, SocketAddr)]) -> ProxyConfig {
    let mut config = ProxyConfig::default();
    config.balancer.method = method;
    config.health_check.enabled = false;
    config.rate_limit.max_requests = 100;
    config.backends = backends
        .iter()
        .map(|(name, addr)| BackendConfig {
            name: name.to_string(),
            address: addr.to_string(),
        })
        .collect();
    config
}

/// A running load balancer on an ephemeral port.
pub struct RunningProxy {
    pub addr: SocketAddr,
    pub registry: Arc<BackendRegistry>,
    pub shutdown: Arc<Shutdown>,
}

impl Drop for RunningProxy {
    fn drop(&mut self) {
        self.shutdown.trigger();
    }
}

pub async fn start_proxy(config: ProxyConfig) -> RunningProxy {
    let listener = Listener::bind("127.0.0.1:0", None).await.unwrap();
    let addr = listener.local_addr().unwrap();
    let server = Server::new(config);
    let registry = server.registry();
    let shutdown = Arc::new(Shutdown::new());

    let run_shutdown = shutdown.clone();
    tokio::spawn(async move {
        server.run(listener, None, &run_shutdown).await;
    });
    // let the accept loop and health monitor subscribe
    tokio::time::sleep(Duration::from_millis(50)).await;

    RunningProxy { addr, registry, shutdown }
}

/// Loopback client identity `127.0.0.<last>`.
pub fn client_ip(last: u8) -> IpAddr {
    IpAddr::V4(Ipv4Addr::new(127, 0, 0, last))
}

/// Send one request from `client` and return the full response.
pub async fn send_from(client: IpAddr, proxy: SocketAddr, request: &[u8]) -> String {
    let socket = TcpSocket::new_v4().unwrap();
    socket.bind(SocketAddr::new(client, 0)).unwrap();
    let mut stream = socket.connect(proxy).await.unwrap();

    // the proxy may answer and close before reading when it rejects early
    let _ = stream.write_all(request).await;
    let mut response = Vec::new();
    let _ = tokio::time::timeout(Duration::from_secs(10), stream.read_to_end(&mut response)).await;
    String::from_utf8_lossy(&response).into_owned()
}

/// The body of a response produced by a mock backend.
pub fn body(response: &str) -> &str {
    response.split("\r\n\r\n").nth(1).unwrap_or("")
}
