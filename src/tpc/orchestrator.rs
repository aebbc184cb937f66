//! Per-request COPY controller.
//!
//! # Responsibilities
//! - Resolve the direction from `Source` / `Destination`
//! - Open the local resource, waiting out stalls within the retry budget
//! - Answer storage redirects with 307 without contacting the remote peer
//! - Bind a fresh engine handle to a `TransferState` and run the exchange
//! - Map every outcome to a `LocalResponse`
//!
//! # Design Decisions
//! - Runs on a blocking thread: open, sleep and perform all block
//! - Transfer settings are read once per request from the hot-reload snapshot
//! - The local file is closed after the state that borrowed it is gone

use std::sync::Arc;
use std::time::Instant;

use arc_swap::ArcSwap;

use crate::config::TransferConfig;
use crate::engine::{TransferEngine, TransferHandle};
use crate::observability::metrics;
use crate::resilience::{open_with_retry, Sleeper, ThreadSleeper};
use crate::storage::{
    ErrorCode, FileSystem, OpenMode, OpenOutcome, OpenRequest, StorageError, StorageFile,
    DEFAULT_PERMISSIONS,
};

use super::authz;
use super::request::CopyRequest;
use super::response::LocalResponse;
use super::sequence::{AtomicSequence, SequenceSource};
use super::state::{TransferError, TransferState};
use super::Direction;

const NO_DIRECTION: &str = "No Source or Destination specified";
const NO_TRANSFER_HANDLE: &str = "Failed to initialize internal transfer resources";
const NO_FILE_HANDLE: &str = "Failed to initialize internal transfer file handle";
const OPEN_FAILED: &str = "Failed to open local resource";
const REDIRECT_WITHOUT_HOST: &str = "Internal error: redirect without hostname";
const UNKNOWN_FAILURE: &str = "Unknown internal transfer failure";

/// Executes COPY requests against local storage and a remote HTTP peer.
pub struct CopyService {
    fs: Arc<dyn FileSystem>,
    engine: Arc<dyn TransferEngine>,
    sequence: Arc<dyn SequenceSource>,
    sleeper: Arc<dyn Sleeper>,
    transfer: Arc<ArcSwap<TransferConfig>>,
}

impl CopyService {
    pub fn new(
        fs: Arc<dyn FileSystem>,
        engine: Arc<dyn TransferEngine>,
        transfer: Arc<ArcSwap<TransferConfig>>,
    ) -> Self {
        Self {
            fs,
            engine,
            sequence: Arc::new(AtomicSequence::new()),
            sleeper: Arc::new(ThreadSleeper),
            transfer,
        }
    }

    pub fn with_sequence(mut self, sequence: Arc<dyn SequenceSource>) -> Self {
        self.sequence = sequence;
        self
    }

    pub fn with_sleeper(mut self, sleeper: Arc<dyn Sleeper>) -> Self {
        self.sleeper = sleeper;
        self
    }

    /// Current transfer settings snapshot.
    pub fn transfer_config(&self) -> Arc<TransferConfig> {
        self.transfer.load_full()
    }

    /// Run one COPY request to completion. Blocks the calling thread.
    pub fn process(&self, req: &CopyRequest) -> LocalResponse {
        let Some((direction, url)) = req.direction() else {
            tracing::warn!(request_id = %req.request_id, resource = %req.resource, "COPY without Source or Destination");
            return LocalResponse::new(400, NO_DIRECTION);
        };

        let span = tracing::info_span!(
            "copy",
            request_id = %req.request_id,
            %direction,
            resource = %req.resource,
            remote = %url,
        );
        let _entered = span.enter();

        let start = Instant::now();
        let config = self.transfer.load_full();
        let (response, bytes) = self.execute(direction, url, req, &config);

        if response.is_success() {
            tracing::info!(
                status = response.status,
                bytes,
                elapsed_ms = start.elapsed().as_millis() as u64,
                "Transfer complete"
            );
        } else {
            tracing::warn!(status = response.status, reason = %response.body, "Transfer failed");
        }
        metrics::record_transfer(direction, response.status, bytes, start);
        response
    }

    /// Returns the local response and the number of bytes moved through storage.
    fn execute(
        &self,
        direction: Direction,
        url: &str,
        req: &CopyRequest,
        config: &TransferConfig,
    ) -> (LocalResponse, u64) {
        let mut handle = match self.engine.new_handle() {
            Ok(handle) => handle,
            Err(e) => {
                tracing::error!(error = %e, "Engine refused a transfer handle");
                return (LocalResponse::new(500, NO_TRANSFER_HANDLE), 0);
            }
        };

        let monitor_id = self.sequence.next_id();
        let mut file = match self.fs.new_file(req.identity.name.as_deref(), monitor_id) {
            Ok(file) => file,
            Err(e) => {
                tracing::error!(error = %e, monitor_id, "Storage refused a file handle");
                return (LocalResponse::new(500, NO_FILE_HANDLE), 0);
            }
        };

        let credential = req.header("Authorization").map(authz::credential);
        let mode = match direction {
            Direction::Push => OpenMode::ReadOnly,
            Direction::Pull if req.forbids_overwrite() => OpenMode::CreateNew,
            Direction::Pull => OpenMode::CreateTruncate,
        };
        let open = OpenRequest {
            path: &req.resource,
            mode,
            permissions: DEFAULT_PERMISSIONS,
            identity: &req.identity,
            credential: credential.as_deref(),
        };

        let attempt = open_with_retry(file.as_mut(), &open, config.stall_retries, self.sleeper.as_ref());
        metrics::record_stalls(attempt.stalls);
        match attempt.outcome {
            OpenOutcome::Ok => {}
            OpenOutcome::Redirect { host, port } => {
                close(file.as_mut());
                return (redirect(config.dest_https, &host, port, &req.resource), 0);
            }
            OpenOutcome::Error(e) => {
                let response = open_failure(direction, &e);
                close(file.as_mut());
                return (response, 0);
            }
            stalled @ (OpenOutcome::Stall(_) | OpenOutcome::Started(_)) => {
                tracing::warn!(outcome = ?stalled, "Local resource still unavailable");
                close(file.as_mut());
                return (LocalResponse::new(400, OPEN_FAILED), 0);
            }
        }

        configure(handle.as_mut(), url, config);
        let (result, status, bytes) = exchange(direction, &*file, handle, &req.headers);
        close(file.as_mut());

        (map_outcome(result, status), bytes)
    }
}

fn configure(handle: &mut dyn TransferHandle, url: &str, config: &TransferConfig) {
    let options = handle.options_mut();
    options.url = url.to_string();
    options.max_redirects = config.max_redirects;
    options.low_speed = config.low_speed();
    options.connect_timeout = config.connect_timeout();
    options.expect_continue = config.expect_continue();
}

/// Run the exchange; the state and its borrow of `file` end here.
fn exchange(
    direction: Direction,
    file: &dyn StorageFile,
    handle: Box<dyn TransferHandle>,
    headers: &[(String, String)],
) -> (Result<(), TransferError>, i32, u64) {
    let mut state = TransferState::new(direction, file, handle);
    let injected = state.copy_headers(headers);
    tracing::debug!(
        injected,
        buffers = state.available_buffers(),
        "Starting remote exchange"
    );

    let result = state.perform();
    tracing::debug!(
        status = state.status_code(),
        protocol = state.response_protocol(),
        bytes = state.offset(),
        "Remote exchange finished"
    );
    (result, state.status_code(), state.offset())
}

fn map_outcome(result: Result<(), TransferError>, status: i32) -> LocalResponse {
    match result {
        Err(TransferError::Engine(e)) if e.is_transport() => {
            tracing::error!(error = %e, "Remote exchange failed");
            LocalResponse::new(500, e.to_string())
        }
        _ if status >= 400 => {
            LocalResponse::new(500, format!("Remote side failed with status code {}", status))
        }
        Err(e) => {
            tracing::error!(error = %e, status, "Transfer aborted");
            LocalResponse::new(500, UNKNOWN_FAILURE)
        }
        Ok(()) => LocalResponse::created(),
    }
}

fn redirect(dest_https: bool, host: &str, port: u16, resource: &str) -> LocalResponse {
    if host.is_empty() || port == 0 {
        tracing::error!(host, port, "Storage redirect without a usable target");
        return LocalResponse::new(500, REDIRECT_WITHOUT_HOST);
    }
    let scheme = if dest_https { "https" } else { "http" };
    let location = format!(
        "{}://{}:{}/{}",
        scheme,
        host,
        port,
        resource.trim_start_matches('/')
    );
    tracing::info!(%location, "Redirecting COPY");
    LocalResponse::redirect(location)
}

fn open_failure(direction: Direction, error: &StorageError) -> LocalResponse {
    let status = match error.code {
        ErrorCode::AccessDenied => 401,
        ErrorCode::AlreadyExists if direction == Direction::Pull => 412,
        _ => 400,
    };
    tracing::warn!(error = %error, status, "Failed to open local resource");
    LocalResponse::new(status, error.text().unwrap_or(OPEN_FAILED))
}

fn close(file: &mut dyn StorageFile) {
    if let Err(e) = file.close() {
        tracing::warn!(error = %e, "Failed to close local resource");
    }
}
