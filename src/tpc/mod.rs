//! Third-party copy core.
//!
//! # Data Flow
//! ```text
//! COPY request
//!     → orchestrator.rs (direction from Source/Destination, open local resource)
//!         → Redirect: 307 with Location, no exchange
//!         → Stall/Started: back off, re-open
//!     → state.rs (bind a fresh engine handle, inject Copy-Header/TransferHeader lines)
//!     → perform: engine drives header.rs (status, length) and bridge.rs (gated body bytes)
//!     → response.rs (201 / 4xx / 500 back to the COPY caller)
//! ```
//!
//! # Design Decisions
//! - One request, one handle, one `TransferState`; nothing shared but the sequence source
//! - No body byte moves in either direction before a status below 400 is parsed
//! - Exactly one owner per engine handle: `take_handle` moves it, `duplicate` clones it
//! - Every failure becomes a response here; nothing escapes to the HTTP layer

pub mod authz;
pub mod bridge;
pub mod header;
pub mod orchestrator;
pub mod request;
pub mod response;
pub mod sequence;
pub mod state;

use std::fmt;

pub use bridge::StreamBridge;
pub use header::HeaderParser;
pub use orchestrator::CopyService;
pub use request::CopyRequest;
pub use response::LocalResponse;
pub use sequence::{AtomicSequence, SequenceSource};
pub use state::{TransferError, TransferState};

/// Which way bytes flow relative to local storage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    /// Local storage is the source; bytes are uploaded to the remote peer.
    Push,
    /// Local storage is the destination; bytes are downloaded from the remote peer.
    Pull,
}

impl Direction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Direction::Push => "push",
            Direction::Pull => "pull",
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
