//! HTTP exchange engine subsystem.
//!
//! # Data Flow
//! ```text
//! TransferState
//!     → TransferHandle::perform (blocks the calling thread)
//!         → ExchangeHandler::on_header_line   (every header line, every hop)
//!         → ExchangeHandler::on_read_request  (upload bytes, push only)
//!         → ExchangeHandler::on_write_chunk   (response body bytes)
//!     ← Ok(()) or EngineError
//! ```
//!
//! # Design Decisions
//! - The engine owns the wire; the core only sees callbacks and options
//! - Callbacks run on the thread that called `perform`, never concurrently
//! - A callback aborts the exchange by returning 0 (headers, body) or an error (upload)
//! - Duplicated handles never inherit a header list; the owner replays its own copies

pub mod client;
pub mod watchdog;

use std::time::Duration;

use crate::storage::StorageError;

pub use client::HyperEngine;
pub use watchdog::{LowSpeedLimit, LowSpeedWatchdog};

/// Default cap on followed redirects.
pub const DEFAULT_MAX_REDIRECTS: u32 = 10;

/// Callback capability set the engine drives during `perform`.
pub trait ExchangeHandler {
    /// Consume one header line (including its line terminator).
    /// Returning anything other than the line length aborts the exchange.
    fn on_header_line(&mut self, line: &[u8]) -> usize;

    /// Fill `buf` with upload bytes. `Ok(0)` ends the upload; an error aborts it.
    fn on_read_request(&mut self, buf: &mut [u8]) -> Result<usize, StorageError>;

    /// Accept a response body chunk. Accepting fewer bytes than offered aborts the exchange.
    fn on_write_chunk(&mut self, data: &[u8]) -> Result<usize, StorageError>;
}

/// Header lines attached to an outgoing request, in order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HeaderList {
    lines: Vec<String>,
}

impl HeaderList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append(&mut self, line: &str) {
        self.lines.push(line.to_string());
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.lines.iter().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }
}

/// Client settings for one exchange.
#[derive(Debug, Clone)]
pub struct ExchangeOptions {
    pub url: String,
    /// Upload the local stream (PUT) instead of downloading (GET).
    pub upload: bool,
    /// Declared upload size, when known.
    pub upload_size: Option<u64>,
    pub user_agent: Option<String>,
    pub headers: Option<HeaderList>,
    /// Byte range `"<first>-<last>"` to request from the peer.
    pub range: Option<String>,
    pub follow_location: bool,
    pub max_redirects: u32,
    pub low_speed: LowSpeedLimit,
    pub connect_timeout: Duration,
    /// How long an upload waits for `100 Continue` before sending anyway.
    pub expect_continue: Duration,
}

impl Default for ExchangeOptions {
    fn default() -> Self {
        Self {
            url: String::new(),
            upload: false,
            upload_size: None,
            user_agent: None,
            headers: None,
            range: None,
            follow_location: false,
            max_redirects: DEFAULT_MAX_REDIRECTS,
            low_speed: LowSpeedLimit::default(),
            connect_timeout: Duration::from_secs(30),
            expect_continue: Duration::from_secs(1),
        }
    }
}

/// One exchange handle. Exactly one owner at a time; `duplicate` makes an independent copy.
pub trait TransferHandle: Send {
    fn options(&self) -> &ExchangeOptions;

    fn options_mut(&mut self) -> &mut ExchangeOptions;

    /// Clone the transport configuration. The header list is not carried over.
    fn duplicate(&self) -> Result<Box<dyn TransferHandle>, EngineError>;

    /// Run one exchange to completion, driving `handler`.
    fn perform(&mut self, handler: &mut dyn ExchangeHandler) -> Result<(), EngineError>;
}

/// Factory for fresh handles.
pub trait TransferEngine: Send + Sync {
    fn new_handle(&self) -> Result<Box<dyn TransferHandle>, EngineError>;
}

/// Errors produced by an exchange.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    #[error("Unsupported protocol: {0}")]
    UnsupportedScheme(String),

    #[error("Couldn't connect to server: {0}")]
    Connect(#[source] std::io::Error),

    #[error("SSL connect error: {0}")]
    Tls(String),

    #[error("HTTP protocol error: {0}")]
    Http(#[from] hyper::Error),

    #[error("Invalid request header: {0}")]
    InvalidHeader(String),

    #[error("Failure when receiving data from the peer: {0}")]
    Receive(String),

    #[error("Operation aborted by callback: {0}")]
    Aborted(&'static str),

    #[error("Operation too slow: less than {limit_bytes} bytes in {window:?}")]
    LowSpeed { limit_bytes: u64, window: Duration },

    #[error("Maximum ({0}) redirects followed")]
    TooManyRedirects(u32),

    #[error("Send failed since rewinding of the data stream failed")]
    RewindFailed,

    #[error("Failed to initialize transfer handle: {0}")]
    Init(String),
}

impl EngineError {
    /// Failures of the transport itself (URL, DNS, connect, TLS, HTTP framing).
    pub fn is_transport(&self) -> bool {
        matches!(
            self,
            EngineError::InvalidUrl(_)
                | EngineError::UnsupportedScheme(_)
                | EngineError::Connect(_)
                | EngineError::Tls(_)
                | EngineError::Http(_)
        )
    }
}
