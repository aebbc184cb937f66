//! Inbound COPY request as seen by the orchestrator.

use crate::storage::Identity;

use super::Direction;

/// Everything the orchestrator needs from one COPY request.
#[derive(Debug, Clone, Default)]
pub struct CopyRequest {
    /// Local resource path, e.g. `/store/file.dat`.
    pub resource: String,
    /// Request headers in arrival order.
    pub headers: Vec<(String, String)>,
    pub identity: Identity,
    /// Correlation id for logs.
    pub request_id: String,
}

impl CopyRequest {
    pub fn new(resource: impl Into<String>) -> Self {
        Self {
            resource: resource.into(),
            ..Default::default()
        }
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// First value of `name`, compared case-insensitively.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// `Source` makes a pull, `Destination` a push. `Source` wins when both are present.
    pub fn direction(&self) -> Option<(Direction, &str)> {
        if let Some(url) = self.header("Source") {
            return Some((Direction::Pull, url));
        }
        self.header("Destination").map(|url| (Direction::Push, url))
    }

    /// `Overwrite: F` forbids replacing an existing file.
    pub fn forbids_overwrite(&self) -> bool {
        self.header("Overwrite") == Some("F")
    }
}
