//! Shared utilities for integration tests.

#![allow(dead_code)]

use std::future::Future;
use std::net::SocketAddr;
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

use fault_breaker::config::{BreakerConfig, StoreBackend};
use fault_breaker::http::{AppState, HttpServer};
use fault_breaker::lifecycle::{self, Services, Shutdown};

/// One request seen by the mock control plane.
#[derive(Debug, Clone)]
pub struct SeenRequest {
    pub method: String,
    pub target: String,
    pub authorization: Option<String>,
}

/// Requests recorded by a mock control plane.
#[derive(Debug, Clone, Default)]
pub struct Recorder(Arc<Mutex<Vec<SeenRequest>>>);

impl Recorder {
    pub fn requests(&self) -> Vec<SeenRequest> {
        self.0.lock().unwrap().clone()
    }

    pub fn count(&self) -> usize {
        self.0.lock().unwrap().len()
    }
}

/// Start a programmable mock control plane on an ephemeral port. `f` is
/// called with the 1-based request number and returns status and body.
pub async fn start_control_plane<F, Fut>(f: F) -> (SocketAddr, Recorder)
where
    F: Fn(usize) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = (u16, String)> + Send + 'static,
{
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let recorder = Recorder::default();
    let f = Arc::new(f);

    let seen = recorder.clone();
    tokio::spawn(async move {
        loop {
            match listener.accept().await {
                Ok((mut socket, _)) => {
                    let f = f.clone();
                    let seen = seen.clone();
                    tokio::spawn(async move {
                        let Some(request) = read_request(&mut socket).await else {
                            return;
                        };
                        let n = {
                            let mut all = seen.0.lock().unwrap();
                            all.push(request);
                            all.len()
                        };

                        let (status, body) = f(n).await;
                        let status_text = match status {
                            200 => "200 OK",
                            202 => "202 Accepted",
                            403 => "403 Forbidden",
                            404 => "404 Not Found",
                            500 => "500 Internal Server Error",
                            503 => "503 Service Unavailable",
                            _ => "200 OK",
                        };

                        let response_str = format!(
                            "HTTP/1.1 {}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                            status_text,
                            body.len(),
                            body
                        );
                        let _ = socket.write_all(response_str.as_bytes()).await;
                        let _ = socket.shutdown().await;
                    });
                }
                Err(_) => break,
            }
        }
    });

    (addr, recorder)
}

/// Read the request head and drain any body.
async fn read_request(socket: &mut TcpStream) -> Option<SeenRequest> {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 1024];
    let head_end = loop {
        let n = socket.read(&mut chunk).await.ok()?;
        if n == 0 {
            return None;
        }
        buf.extend_from_slice(&chunk[..n]);
        if let Some(pos) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
            break pos + 4;
        }
    };

    let head = String::from_utf8_lossy(&buf[..head_end]).to_string();
    let mut lines = head.lines();
    let mut request_line = lines.next()?.split_whitespace();
    let method = request_line.next()?.to_string();
    let target = request_line.next()?.to_string();

    let mut authorization = None;
    let mut content_length = 0usize;
    for line in lines {
        if let Some((name, value)) = line.split_once(':') {
            match name.trim().to_ascii_lowercase().as_str() {
                "authorization" => authorization = Some(value.trim().to_string()),
                "content-length" => content_length = value.trim().parse().unwrap_or(0),
                _ => {}
            }
        }
    }

    let mut remaining = content_length.saturating_sub(buf.len() - head_end);
    while remaining > 0 {
        let n = socket.read(&mut chunk).await.ok()?;
        if n == 0 {
            break;
        }
        remaining = remaining.saturating_sub(n);
    }

    Some(SeenRequest { method, target, authorization })
}

/// Config pointing the stop action at `control_plane`.
pub fn test_config(control_plane: SocketAddr, threshold: u32) -> BreakerConfig {
    let mut config = BreakerConfig::default();
    config.listener.bind_address = "127.0.0.1:0".to_string();
    config.breaker.failure_threshold = threshold;
    config.control_plane.base_url = format!("http://{}", control_plane);
    config.control_plane.bearer_token_env = None;
    config.remediation.timeout_secs = 2;
    config.remediation.base_delay_ms = 10;
    config.remediation.max_delay_ms = 50;
    config.observability.metrics_enabled = false;
    config.admin.enabled = true;
    config.admin.api_key = "test-admin-key".to_string();
    config
}

pub fn with_file_store(mut config: BreakerConfig, dir: &Path) -> BreakerConfig {
    config.persistence.backend = StoreBackend::File;
    config.persistence.data_dir = dir.to_string_lossy().to_string();
    config
}

/// A service running on an ephemeral port.
pub struct TestService {
    pub addr: SocketAddr,
    pub shutdown: Shutdown,
    pub services: Services,
}

impl TestService {
    pub fn url(&self) -> String {
        format!("http://{}", self.addr)
    }

    pub async fn stop(self) {
        self.shutdown.trigger();
        self.services.join().await;
    }
}

pub async fn start_service(config: BreakerConfig) -> TestService {
    let shutdown = Shutdown::new();
    let services = lifecycle::start(&config, None, None, &shutdown).await.unwrap();

    let listener = TcpListener::bind(&config.listener.bind_address).await.unwrap();
    let addr = listener.local_addr().unwrap();
    let server = HttpServer::new(AppState::new(services.directory.clone(), services.store.clone(), config));
    tokio::spawn(server.run(listener, shutdown.subscribe()));

    TestService { addr, shutdown, services }
}

/// Poll `check` until it returns true or the deadline passes.
pub async fn eventually<F, Fut>(mut check: F) -> bool
where
    F: FnMut() -> Fut,
    Fut: Future<Output = bool>,
{
    for _ in 0..300 {
        if check().await {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    false
}
