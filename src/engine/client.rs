//! Blocking exchange engine built on hyper's HTTP/1 client connection.
//!
//! # Responsibilities
//! - Connect (plain TCP or rustls) and run one request per hop
//! - Report every header block line by line, interim and redirect hops included
//! - Pump upload bytes from the handler after `100 Continue` (or a timeout)
//! - Feed response body chunks to the handler
//! - Follow redirects and enforce the minimum-throughput watchdog
//!
//! # Design Decisions
//! - `perform` runs the async exchange with `Handle::block_on`, so it must be
//!   called from a blocking thread (e.g. `spawn_blocking`), never from a task
//! - One connection per hop; no pooling across exchanges

use std::sync::Arc;

use axum::body::{Body, Bytes};
use axum::http::header::{CONTENT_LENGTH, EXPECT, HOST, LOCATION, RANGE, USER_AGENT};
use axum::http::{
    HeaderMap, HeaderName, HeaderValue, Method, Request, Response, StatusCode, Uri, Version,
};
use futures_util::StreamExt;
use hyper::body::Incoming;
use hyper::client::conn::http1;
use hyper_util::rt::TokioIo;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;
use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tokio::time::{sleep_until, Instant};
use tokio_rustls::rustls::pki_types::ServerName;
use tokio_rustls::rustls::{ClientConfig, RootCertStore};
use tokio_rustls::TlsConnector;
use url::Url;

use super::{
    EngineError, ExchangeHandler, ExchangeOptions, LowSpeedWatchdog, TransferEngine,
    TransferHandle,
};

/// Bytes requested from the handler per upload read.
const UPLOAD_CHUNK: usize = 64 * 1024;

/// Upload chunks buffered between the handler and the connection.
const UPLOAD_QUEUE: usize = 4;

trait Io: AsyncRead + AsyncWrite + Send + Unpin {}
impl<T: AsyncRead + AsyncWrite + Send + Unpin> Io for T {}

/// Engine producing hyper-backed handles that run on a shared tokio runtime.
#[derive(Clone)]
pub struct HyperEngine {
    runtime: Handle,
    tls: TlsConnector,
}

impl HyperEngine {
    pub fn new(runtime: Handle) -> Self {
        let mut roots = RootCertStore::empty();
        roots.extend(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());
        let config = ClientConfig::builder()
            .with_root_certificates(roots)
            .with_no_client_auth();
        Self {
            runtime,
            tls: TlsConnector::from(Arc::new(config)),
        }
    }
}

impl TransferEngine for HyperEngine {
    fn new_handle(&self) -> Result<Box<dyn TransferHandle>, EngineError> {
        Ok(Box::new(HyperHandle {
            runtime: self.runtime.clone(),
            tls: self.tls.clone(),
            options: ExchangeOptions::default(),
        }))
    }
}

pub struct HyperHandle {
    runtime: Handle,
    tls: TlsConnector,
    options: ExchangeOptions,
}

impl TransferHandle for HyperHandle {
    fn options(&self) -> &ExchangeOptions {
        &self.options
    }

    fn options_mut(&mut self) -> &mut ExchangeOptions {
        &mut self.options
    }

    fn duplicate(&self) -> Result<Box<dyn TransferHandle>, EngineError> {
        let mut options = self.options.clone();
        options.headers = None;
        Ok(Box::new(HyperHandle {
            runtime: self.runtime.clone(),
            tls: self.tls.clone(),
            options,
        }))
    }

    fn perform(&mut self, handler: &mut dyn ExchangeHandler) -> Result<(), EngineError> {
        let runtime = self.runtime.clone();
        runtime.block_on(self.exchange(handler))
    }
}

impl HyperHandle {
    async fn exchange(&self, handler: &mut dyn ExchangeHandler) -> Result<(), EngineError> {
        let options = &self.options;
        let mut url = Url::parse(&options.url)
            .map_err(|e| EngineError::InvalidUrl(format!("{}: {}", options.url, e)))?;
        let mut watchdog = LowSpeedWatchdog::new(options.low_speed);
        let mut redirects = 0;

        loop {
            tracing::debug!(url = %url, upload = options.upload, range = ?options.range, "Starting exchange hop");
            let mut uploaded = 0u64;
            let response = self.send(&url, handler, &mut watchdog, &mut uploaded).await?;
            emit_lines(
                handler,
                &head_lines(response.version(), response.status(), response.headers()),
            )?;

            let next = if options.follow_location {
                redirect_target(&url, response.status(), response.headers())
            } else {
                None
            };
            let Some(next) = next else {
                return self.receive(response, handler, &mut watchdog).await;
            };

            if uploaded > 0 {
                return Err(EngineError::RewindFailed);
            }
            if redirects >= options.max_redirects {
                return Err(EngineError::TooManyRedirects(options.max_redirects));
            }
            redirects += 1;
            tracing::debug!(from = %url, to = %next, "Following redirect");
            url = next;
        }
    }

    async fn connect(&self, url: &Url) -> Result<Box<dyn Io>, EngineError> {
        let scheme = url.scheme();
        if scheme != "http" && scheme != "https" {
            return Err(EngineError::UnsupportedScheme(scheme.to_string()));
        }
        let host = url
            .host_str()
            .ok_or_else(|| EngineError::InvalidUrl(format!("{} has no host", url)))?;
        let port = url
            .port_or_known_default()
            .ok_or_else(|| EngineError::InvalidUrl(format!("{} has no port", url)))?;
        let address = host.trim_start_matches('[').trim_end_matches(']');

        let stream = tokio::time::timeout(
            self.options.connect_timeout,
            TcpStream::connect((address, port)),
        )
        .await
        .map_err(|_| {
            EngineError::Connect(std::io::Error::new(
                std::io::ErrorKind::TimedOut,
                format!("connection to {}:{} timed out", address, port),
            ))
        })?
        .map_err(EngineError::Connect)?;

        if scheme == "http" {
            return Ok(Box::new(stream));
        }
        let name = ServerName::try_from(address.to_string())
            .map_err(|e| EngineError::Tls(e.to_string()))?;
        let tls = self
            .tls
            .connect(name, stream)
            .await
            .map_err(|e| EngineError::Tls(e.to_string()))?;
        Ok(Box::new(tls))
    }

    fn build_request(&self, url: &Url, body: Body) -> Result<Request<Body>, EngineError> {
        let options = &self.options;
        let mut request = Request::new(body);
        *request.method_mut() = if options.upload { Method::PUT } else { Method::GET };
        *request.uri_mut() = origin_form(url)
            .parse::<Uri>()
            .map_err(|e| EngineError::InvalidUrl(e.to_string()))?;

        let headers = request.headers_mut();
        headers.insert(HOST, header_value(&host_header(url))?);
        if let Some(agent) = &options.user_agent {
            headers.insert(USER_AGENT, header_value(agent)?);
        }
        if let Some(range) = &options.range {
            headers.insert(RANGE, header_value(&format!("bytes={}", range))?);
        }
        if options.upload {
            headers.insert(EXPECT, HeaderValue::from_static("100-continue"));
            if let Some(size) = options.upload_size {
                headers.insert(CONTENT_LENGTH, HeaderValue::from(size));
            }
        }

        // Custom lines replace built-in headers of the same name; an empty value only removes.
        if let Some(list) = &options.headers {
            let mut custom = Vec::with_capacity(list.len());
            for line in list.iter() {
                custom.push(split_header_line(line)?);
            }
            for (name, _) in &custom {
                headers.remove(name);
            }
            for (name, value) in custom {
                if let Some(value) = value {
                    headers.append(name, value);
                }
            }
        }
        Ok(request)
    }

    async fn send(
        &self,
        url: &Url,
        handler: &mut dyn ExchangeHandler,
        watchdog: &mut LowSpeedWatchdog,
        uploaded: &mut u64,
    ) -> Result<Response<Incoming>, EngineError> {
        let (body, mut upload) = if self.options.upload {
            let (tx, rx) = mpsc::channel::<Bytes>(UPLOAD_QUEUE);
            (upload_body(rx), Some(tx))
        } else {
            (Body::empty(), None)
        };
        let mut request = self.build_request(url, body)?;

        let (info_tx, mut info_rx) = mpsc::unbounded_channel::<Vec<Vec<u8>>>();
        hyper::ext::on_informational(&mut request, move |res| {
            let _ = info_tx.send(head_lines(res.version(), res.status(), res.headers()));
        });

        let io = self.connect(url).await?;
        let (mut sender, connection) = http1::handshake(TokioIo::new(io)).await?;
        tokio::spawn(async move {
            if let Err(e) = connection.await {
                tracing::debug!(error = %e, "Remote connection ended with error");
            }
        });

        let response = sender.send_request(request);
        tokio::pin!(response);

        let mut awaiting_continue = upload.is_some();
        let continue_deadline = Instant::now() + self.options.expect_continue;
        let mut upload_done = false;

        loop {
            if upload_done {
                // Dropping the sender ends the request body.
                upload = None;
            }
            tokio::select! {
                result = &mut response => return result.map_err(EngineError::from),
                Some(lines) = info_rx.recv() => {
                    emit_lines(handler, &lines)?;
                    awaiting_continue = false;
                }
                _ = sleep_until(continue_deadline), if awaiting_continue => {
                    tracing::debug!("No interim response, sending body anyway");
                    awaiting_continue = false;
                }
                permit = reserve(upload.as_ref()), if !awaiting_continue => {
                    if let Some(permit) = permit {
                        let mut chunk = vec![0u8; UPLOAD_CHUNK];
                        match handler.on_read_request(&mut chunk) {
                            Ok(0) => upload_done = true,
                            Ok(n) => {
                                chunk.truncate(n);
                                *uploaded += n as u64;
                                watchdog.record(n);
                                permit.send(Bytes::from(chunk));
                            }
                            Err(e) => {
                                tracing::warn!(error = %e, "Reading upload data failed");
                                return Err(EngineError::Aborted("read"));
                            }
                        }
                    } else {
                        // The connection stopped consuming the body.
                        upload_done = true;
                    }
                }
                _ = sleep_until(watchdog.deadline()) => watchdog.check(Instant::now())?,
            }
        }
    }

    async fn receive(
        &self,
        response: Response<Incoming>,
        handler: &mut dyn ExchangeHandler,
        watchdog: &mut LowSpeedWatchdog,
    ) -> Result<(), EngineError> {
        let mut body = Body::new(response.into_body()).into_data_stream();
        loop {
            tokio::select! {
                chunk = body.next() => match chunk {
                    None => return Ok(()),
                    Some(Ok(data)) => {
                        watchdog.record(data.len());
                        let accepted = handler.on_write_chunk(&data).map_err(|e| {
                            tracing::warn!(error = %e, "Storing response body failed");
                            EngineError::Aborted("write")
                        })?;
                        if accepted != data.len() {
                            return Err(EngineError::Aborted("write"));
                        }
                    }
                    Some(Err(e)) => return Err(EngineError::Receive(e.to_string())),
                },
                _ = sleep_until(watchdog.deadline()) => watchdog.check(Instant::now())?,
            }
        }
    }
}

async fn reserve(tx: Option<&mpsc::Sender<Bytes>>) -> Option<mpsc::Permit<'_, Bytes>> {
    match tx {
        Some(tx) => tx.reserve().await.ok(),
        None => std::future::pending().await,
    }
}

fn upload_body(rx: mpsc::Receiver<Bytes>) -> Body {
    let stream = futures_util::stream::unfold(rx, |mut rx| async move {
        rx.recv()
            .await
            .map(|chunk| (Ok::<Bytes, std::io::Error>(chunk), rx))
    });
    Body::from_stream(stream)
}

/// Render a response head as the raw lines a wire parser would have seen.
fn head_lines(version: Version, status: StatusCode, headers: &HeaderMap) -> Vec<Vec<u8>> {
    let mut lines = Vec::with_capacity(headers.len() + 2);
    lines.push(
        format!(
            "{:?} {} {}\r\n",
            version,
            status.as_u16(),
            status.canonical_reason().unwrap_or("")
        )
        .into_bytes(),
    );
    for (name, value) in headers {
        let mut line = Vec::with_capacity(name.as_str().len() + value.len() + 4);
        line.extend_from_slice(name.as_str().as_bytes());
        line.extend_from_slice(b": ");
        line.extend_from_slice(value.as_bytes());
        line.extend_from_slice(b"\r\n");
        lines.push(line);
    }
    lines.push(b"\r\n".to_vec());
    lines
}

fn emit_lines(handler: &mut dyn ExchangeHandler, lines: &[Vec<u8>]) -> Result<(), EngineError> {
    for line in lines {
        if handler.on_header_line(line) != line.len() {
            return Err(EngineError::Aborted("header"));
        }
    }
    Ok(())
}

fn redirect_target(current: &Url, status: StatusCode, headers: &HeaderMap) -> Option<Url> {
    if !matches!(status.as_u16(), 301 | 302 | 303 | 307 | 308) {
        return None;
    }
    let location = headers.get(LOCATION)?.to_str().ok()?;
    current.join(location).ok()
}

fn origin_form(url: &Url) -> String {
    let mut target = url.path().to_string();
    if let Some(query) = url.query() {
        target.push('?');
        target.push_str(query);
    }
    target
}

fn host_header(url: &Url) -> String {
    let host = url.host_str().unwrap_or_default();
    match url.port() {
        Some(port) => format!("{}:{}", host, port),
        None => host.to_string(),
    }
}

fn header_value(value: &str) -> Result<HeaderValue, EngineError> {
    HeaderValue::from_str(value).map_err(|_| EngineError::InvalidHeader(value.to_string()))
}

/// Split `"Name: value"`. An empty value yields `None` (remove the header).
fn split_header_line(line: &str) -> Result<(HeaderName, Option<HeaderValue>), EngineError> {
    let (name, value) = line
        .split_once(':')
        .ok_or_else(|| EngineError::InvalidHeader(line.to_string()))?;
    let name = HeaderName::from_bytes(name.trim().as_bytes())
        .map_err(|_| EngineError::InvalidHeader(line.to_string()))?;
    let value = value.trim();
    if value.is_empty() {
        return Ok((name, None));
    }
    Ok((name, Some(header_value(value)?)))
}
