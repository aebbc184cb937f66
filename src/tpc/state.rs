//! Per-exchange transfer state.
//!
//! A `TransferState` owns exactly one engine handle and the header strings it
//! injected into that handle. The storage stream is borrowed from the caller,
//! which keeps it open for at least as long as the state lives.

use crate::engine::{EngineError, HeaderList, TransferHandle};
use crate::storage::StorageFile;

use super::bridge::StreamBridge;
use super::header::HeaderParser;
use super::Direction;

/// Header forwarded to the remote peer verbatim.
pub const COPY_HEADER: &str = "Copy-Header";

/// Prefix of headers re-emitted to the remote peer under the remaining name.
pub const TRANSFER_HEADER_PREFIX: &str = "TransferHeader";

/// User agent announced to the remote peer.
pub fn user_agent() -> String {
    format!("http-tpc/{}", env!("CARGO_PKG_VERSION"))
}

#[derive(Debug, thiserror::Error)]
pub enum TransferError {
    #[error(transparent)]
    Engine(#[from] EngineError),

    #[error("Transfer handle is no longer attached")]
    Detached,

    #[error("Invalid transfer range: offset {offset}, size {size}")]
    InvalidRange { offset: u64, size: u64 },
}

pub struct TransferState<'s> {
    handle: Option<Box<dyn TransferHandle>>,
    /// Authoritative copies of every injected header line.
    owned_headers: Vec<String>,
    bridge: StreamBridge<'s>,
}

impl<'s> TransferState<'s> {
    /// Bind `handle` to `stream` and install the transfer settings for `direction`.
    pub fn new(direction: Direction, stream: &'s dyn StorageFile, mut handle: Box<dyn TransferHandle>) -> Self {
        let options = handle.options_mut();
        options.user_agent = Some(user_agent());
        options.follow_location = true;
        options.upload = direction == Direction::Push;
        if direction == Direction::Push {
            options.upload_size = match stream.stat() {
                Ok(size) => Some(size),
                Err(e) => {
                    tracing::debug!(error = %e, "Upload size unknown");
                    None
                }
            };
        }

        Self {
            handle: Some(handle),
            owned_headers: Vec::new(),
            bridge: StreamBridge::new(direction, stream),
        }
    }

    pub fn direction(&self) -> Direction {
        self.bridge.direction()
    }

    pub fn offset(&self) -> u64 {
        self.bridge.offset()
    }

    pub fn start_offset(&self) -> u64 {
        self.bridge.start_offset()
    }

    pub fn status_code(&self) -> i32 {
        self.bridge.parser().status_code()
    }

    pub fn content_length(&self) -> i64 {
        self.bridge.parser().content_length()
    }

    pub fn response_protocol(&self) -> &str {
        self.bridge.parser().protocol()
    }

    pub fn parser(&self) -> &HeaderParser {
        self.bridge.parser()
    }

    pub fn owned_headers(&self) -> &[String] {
        &self.owned_headers
    }

    pub fn handle(&self) -> Option<&dyn TransferHandle> {
        self.handle.as_deref()
    }

    /// Pick the request headers that are replayed to the remote peer.
    ///
    /// `Copy-Header: <line>` is forwarded as `<line>`; `TransferHeader<Name>: <value>`
    /// is forwarded as `<Name>: <value>`. Returns how many lines were injected.
    pub fn copy_headers(&mut self, headers: &[(String, String)]) -> usize {
        let mut injected = 0;
        for (name, value) in headers {
            if name.eq_ignore_ascii_case(COPY_HEADER) {
                self.owned_headers.push(value.clone());
                injected += 1;
            }
            if let Some(rest) = strip_prefix_ignore_case(name, TRANSFER_HEADER_PREFIX).filter(|r| !r.is_empty()) {
                self.owned_headers.push(format!("{}: {}", rest, value));
                injected += 1;
            }
        }
        if injected > 0 {
            self.attach_headers();
        }
        injected
    }

    /// Run one exchange; the engine drives this state's parser and bridge.
    pub fn perform(&mut self) -> Result<(), TransferError> {
        let handle = self.handle.as_mut().ok_or(TransferError::Detached)?;
        handle.perform(&mut self.bridge)?;
        Ok(())
    }

    /// Prepare for another exchange on the same handle. Injected headers stay.
    pub fn reset_after_request(&mut self) {
        self.bridge.reset();
    }

    /// Restrict the next exchange to `size` bytes starting at `offset`.
    pub fn set_transfer_parameters(&mut self, offset: u64, size: u64) -> Result<(), TransferError> {
        let last = size
            .checked_sub(1)
            .and_then(|span| offset.checked_add(span))
            .ok_or(TransferError::InvalidRange { offset, size })?;
        let content_length = i64::try_from(size).map_err(|_| TransferError::InvalidRange { offset, size })?;
        let handle = self.handle.as_mut().ok_or(TransferError::Detached)?;

        handle.options_mut().range = Some(format!("{}-{}", offset, last));
        self.bridge.rebase(offset);
        self.bridge.parser_mut().set_content_length(content_length);
        Ok(())
    }

    /// Clone the handle and replay the injected headers onto the clone.
    ///
    /// The new state starts with fresh offsets and status but shares the
    /// direction and the storage stream.
    pub fn duplicate(&self) -> Result<TransferState<'s>, TransferError> {
        let handle = self.handle.as_ref().ok_or(TransferError::Detached)?;
        let copy = handle.duplicate()?;

        let mut state = TransferState::new(self.direction(), self.bridge.stream(), copy);
        if !self.owned_headers.is_empty() {
            state.owned_headers = self.owned_headers.clone();
            state.attach_headers();
        }
        Ok(state)
    }

    /// Hand the engine handle to a new owner. The header list is detached first.
    pub fn take_handle(&mut self) -> Option<Box<dyn TransferHandle>> {
        self.detach_headers();
        self.handle.take()
    }

    /// Buffers the local stream can currently absorb.
    pub fn available_buffers(&self) -> usize {
        self.bridge.stream().available_buffers()
    }

    fn attach_headers(&mut self) {
        if let Some(handle) = self.handle.as_mut() {
            let mut list = HeaderList::new();
            for line in &self.owned_headers {
                list.append(line);
            }
            handle.options_mut().headers = Some(list);
        }
    }

    fn detach_headers(&mut self) {
        if let Some(handle) = self.handle.as_mut() {
            handle.options_mut().headers = None;
        }
    }
}

impl Drop for TransferState<'_> {
    fn drop(&mut self) {
        self.detach_headers();
    }
}

fn strip_prefix_ignore_case<'a>(name: &'a str, prefix: &str) -> Option<&'a str> {
    let head = name.get(..prefix.len())?;
    if head.eq_ignore_ascii_case(prefix) {
        name.get(prefix.len()..)
    } else {
        None
    }
}
