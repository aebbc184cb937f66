//! Local storage subsystem.
//!
//! # Data Flow
//! ```text
//! COPY request
//!     → FileSystem::new_file (one handle per request, tagged with a monitor id)
//!     → StorageFile::open (may answer Redirect / Stall / Started instead of Ok)
//!     → read/write at absolute offsets while the exchange runs
//!     → close once the attempt is finished
//! ```
//!
//! # Design Decisions
//! - Positional I/O only: callers always pass the absolute offset
//! - `read`/`write` take `&self` so one open file can be lent to several transfer states
//! - Open outcomes are data, not errors: redirects and stalls are normal answers

pub mod local;

use std::fmt;

pub use local::LocalFileSystem;

/// Default permission bits for files created by a pull.
pub const DEFAULT_PERMISSIONS: u32 = 0o644;

/// How the local resource is opened.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpenMode {
    /// Push side: the file is only read.
    ReadOnly,
    /// Pull side: create the file, truncating it when it already exists.
    CreateTruncate,
    /// Pull side: create the file, failing when it already exists.
    CreateNew,
}

impl OpenMode {
    pub fn is_write(&self) -> bool {
        !matches!(self, OpenMode::ReadOnly)
    }
}

/// Identity of the client the transfer runs on behalf of.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Identity {
    pub name: Option<String>,
}

impl Identity {
    pub fn anonymous() -> Self {
        Self { name: None }
    }

    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
        }
    }
}

/// Classification of a storage failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    AccessDenied,
    AlreadyExists,
    NotFound,
    Other(i32),
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorCode::AccessDenied => write!(f, "access denied"),
            ErrorCode::AlreadyExists => write!(f, "already exists"),
            ErrorCode::NotFound => write!(f, "not found"),
            ErrorCode::Other(code) => write!(f, "error {}", code),
        }
    }
}

/// Failure reported by the storage collaborator: a code and optional human-readable text.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{code}: {}", .message.as_deref().unwrap_or("no details"))]
pub struct StorageError {
    pub code: ErrorCode,
    pub message: Option<String>,
}

impl StorageError {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: Some(message.into()),
        }
    }

    pub fn bare(code: ErrorCode) -> Self {
        Self { code, message: None }
    }

    /// The collaborator's text, if it supplied a non-empty one.
    pub fn text(&self) -> Option<&str> {
        self.message.as_deref().filter(|m| !m.is_empty())
    }
}

impl From<std::io::Error> for StorageError {
    fn from(e: std::io::Error) -> Self {
        let code = match e.kind() {
            std::io::ErrorKind::PermissionDenied => ErrorCode::AccessDenied,
            std::io::ErrorKind::AlreadyExists => ErrorCode::AlreadyExists,
            std::io::ErrorKind::NotFound => ErrorCode::NotFound,
            _ => ErrorCode::Other(e.raw_os_error().unwrap_or(-1)),
        };
        Self::new(code, e.to_string())
    }
}

/// Result of opening the local resource.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OpenOutcome {
    Ok,
    /// The resource lives on another server.
    Redirect { host: String, port: u16 },
    /// Try again after the given number of seconds.
    Stall(u32),
    /// A staging operation started; the value is its estimated duration in seconds.
    Started(u32),
    Error(StorageError),
}

/// Arguments of a single open call.
#[derive(Debug, Clone)]
pub struct OpenRequest<'a> {
    pub path: &'a str,
    pub mode: OpenMode,
    pub permissions: u32,
    pub identity: &'a Identity,
    /// Opaque credential token, e.g. `authz=...`.
    pub credential: Option<&'a str>,
}

/// A local file handle as seen by the transfer core.
pub trait StorageFile: Send {
    fn open(&mut self, request: &OpenRequest<'_>) -> OpenOutcome;

    /// Read up to `buf.len()` bytes at `offset`. Returns 0 at end of file.
    fn read(&self, offset: u64, buf: &mut [u8]) -> Result<usize, StorageError>;

    /// Write `data` at `offset`, returning how many bytes were accepted.
    fn write(&self, offset: u64, data: &[u8]) -> Result<usize, StorageError>;

    /// Size of the open file in bytes.
    fn stat(&self) -> Result<u64, StorageError>;

    fn close(&mut self) -> Result<(), StorageError>;

    /// Number of buffers the file can currently absorb without blocking.
    fn available_buffers(&self) -> usize;
}

/// Factory for per-request file handles.
pub trait FileSystem: Send + Sync {
    /// Create an unopened handle for `user`; `monitor_id` is unique per request.
    fn new_file(&self, user: Option<&str>, monitor_id: u64) -> Result<Box<dyn StorageFile>, StorageError>;
}
