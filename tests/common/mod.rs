//! Shared utilities for integration tests: a running server and scripted remote peers.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use http_tpc::config::TpcConfig;
use http_tpc::http::HttpServer;
use http_tpc::lifecycle::startup::build_service;
use http_tpc::lifecycle::Shutdown;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::runtime::Handle;
use tokio::sync::mpsc;

/// A copy server listening on an ephemeral port over a scratch storage root.
pub struct TestServer {
    pub addr: SocketAddr,
    pub root: PathBuf,
    shutdown: Shutdown,
}

impl TestServer {
    pub async fn start(name: &str) -> Self {
        Self::start_with(name, |_| {}).await
    }

    /// Start with `tweak` applied to the test configuration.
    pub async fn start_with(name: &str, tweak: impl FnOnce(&mut TpcConfig)) -> Self {
        let root = std::env::temp_dir().join(format!("http-tpc-it-{}-{}", name, std::process::id()));
        let _ = std::fs::remove_dir_all(&root);
        std::fs::create_dir_all(&root).unwrap();

        let mut config = TpcConfig::default();
        config.storage.root = root.display().to_string();
        config.observability.metrics_enabled = false;
        config.transfer.expect_continue_ms = 200;
        tweak(&mut config);

        let (service, transfer) = build_service(&config, Handle::current()).unwrap();
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let server = HttpServer::new(config, service, transfer);

        let shutdown = Shutdown::new();
        let (_updates_tx, updates) = mpsc::unbounded_channel();
        let signal = shutdown.subscribe();
        tokio::spawn(async move {
            let _keep = _updates_tx;
            server.run(listener, updates, signal).await.unwrap();
        });

        Self { addr, root, shutdown }
    }

    pub fn url(&self, path: &str) -> String {
        format!("http://{}/{}", self.addr, path.trim_start_matches('/'))
    }

    pub fn local(&self, path: &str) -> PathBuf {
        self.root.join(path.trim_start_matches('/'))
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.shutdown.trigger();
        let _ = std::fs::remove_dir_all(&self.root);
    }
}

/// What a scripted peer saw: the request head and body.
#[derive(Debug, Default, Clone)]
pub struct Received {
    pub head: String,
    pub body: Vec<u8>,
}

impl Received {
    /// Value of the first header named `name` (case-insensitive).
    pub fn header(&self, name: &str) -> Option<String> {
        self.head.lines().skip(1).find_map(|line| {
            let (n, v) = line.split_once(':')?;
            n.trim().eq_ignore_ascii_case(name).then(|| v.trim().to_string())
        })
    }

    /// Request target of the request line.
    pub fn path(&self) -> &str {
        self.head.split_whitespace().nth(1).unwrap_or("")
    }
}

/// Response a scripted peer sends back.
#[derive(Debug, Clone)]
pub struct Reply {
    pub status: String,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
}

impl Reply {
    pub fn new(status: &str, body: &[u8]) -> Self {
        Self {
            status: status.to_string(),
            headers: Vec::new(),
            body: body.to_vec(),
        }
    }

    pub fn header(mut self, name: &str, value: &str) -> Self {
        self.headers.push((name.to_string(), value.to_string()));
        self
    }
}

pub type PeerLog = Arc<Mutex<Vec<Received>>>;

/// Start a peer that answers every request with `status` and `body`.
pub async fn start_peer(status: &'static str, body: &'static [u8]) -> (SocketAddr, PeerLog) {
    start_responder(move |_| Reply::new(status, body)).await
}

/// Start a peer whose reply is chosen per request from its head.
///
/// Request bodies announced with `Content-Length` are read in full, after a
/// `100 Continue` when the client asked for one and the reply is a success.
pub async fn start_responder<F>(respond: F) -> (SocketAddr, PeerLog)
where
    F: Fn(&Received) -> Reply + Send + Sync + 'static,
{
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let log = Arc::new(Mutex::new(Vec::new()));
    let seen = Arc::clone(&log);
    let respond = Arc::new(respond);

    tokio::spawn(async move {
        while let Ok((socket, _)) = listener.accept().await {
            let seen = Arc::clone(&seen);
            let respond = Arc::clone(&respond);
            tokio::spawn(async move {
                let _ = serve_one(socket, respond.as_ref(), &seen).await;
            });
        }
    });

    (addr, log)
}

/// Serve one request. It is logged before the reply goes out.
async fn serve_one<F>(mut socket: TcpStream, respond: &F, seen: &PeerLog) -> Option<()>
where
    F: Fn(&Received) -> Reply,
{
    let mut buf = Vec::new();
    let mut chunk = [0u8; 4096];
    let head_end = loop {
        if let Some(pos) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
            break pos + 4;
        }
        let n = socket.read(&mut chunk).await.ok()?;
        if n == 0 {
            return None;
        }
        buf.extend_from_slice(&chunk[..n]);
    };

    let mut received = Received {
        head: String::from_utf8_lossy(&buf[..head_end]).into_owned(),
        body: buf[head_end..].to_vec(),
    };
    let reply = respond(&received);
    let accepting = reply.status.starts_with('2');

    let expected: usize = received
        .header("content-length")
        .and_then(|v| v.parse().ok())
        .unwrap_or(0);
    if expected > 0 && accepting {
        let wants_continue = received
            .header("expect")
            .is_some_and(|v| v.eq_ignore_ascii_case("100-continue"));
        if wants_continue {
            socket.write_all(b"HTTP/1.1 100 Continue\r\n\r\n").await.ok()?;
        }
        while received.body.len() < expected {
            let n = socket.read(&mut chunk).await.ok()?;
            if n == 0 {
                break;
            }
            received.body.extend_from_slice(&chunk[..n]);
        }
    }

    seen.lock().unwrap().push(received);

    let mut response = format!("HTTP/1.1 {}\r\n", reply.status);
    for (name, value) in &reply.headers {
        response.push_str(&format!("{}: {}\r\n", name, value));
    }
    response.push_str(&format!(
        "Content-Length: {}\r\nConnection: close\r\n\r\n",
        reply.body.len()
    ));
    socket.write_all(response.as_bytes()).await.ok()?;
    socket.write_all(&reply.body).await.ok()?;
    let _ = socket.shutdown().await;
    Some(())
}

/// Client that leaves redirects to the caller.
pub fn client() -> reqwest::Client {
    reqwest::Client::builder()
        .redirect(reqwest::redirect::Policy::none())
        .build()
        .unwrap()
}

pub fn copy() -> reqwest::Method {
    reqwest::Method::from_bytes(b"COPY").unwrap()
}
