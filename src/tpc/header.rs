//! Incremental response header parser.
//!
//! # States
//! ```text
//! AwaitStatusLine → AwaitHeaders → (blank line) HeadersComplete
//! HeadersComplete → AwaitStatusLine   on the next line (another hop on the same exchange)
//! ```
//!
//! Every accepted line returns its own length; 0 tells the engine to abort.

/// Parser progress and everything learned from the current header block.
#[derive(Debug, Clone)]
pub struct HeaderParser {
    received_status_line: bool,
    received_all_headers: bool,
    protocol: String,
    status_code: i32,
    content_length: i64,
}

impl Default for HeaderParser {
    fn default() -> Self {
        Self::new()
    }
}

impl HeaderParser {
    pub fn new() -> Self {
        Self {
            received_status_line: false,
            received_all_headers: false,
            protocol: String::new(),
            status_code: -1,
            content_length: -1,
        }
    }

    /// Status of the latest status line; -1 until one has been parsed.
    pub fn status_code(&self) -> i32 {
        self.status_code
    }

    /// First token of the latest status line.
    pub fn protocol(&self) -> &str {
        &self.protocol
    }

    /// Declared body size; -1 when unknown.
    pub fn content_length(&self) -> i64 {
        self.content_length
    }

    pub fn set_content_length(&mut self, length: i64) {
        self.content_length = length;
    }

    pub fn received_status_line(&self) -> bool {
        self.received_status_line
    }

    pub fn received_all_headers(&self) -> bool {
        self.received_all_headers
    }

    /// Forget everything learned so far; used when the handle runs another exchange.
    pub fn reset(&mut self) {
        self.status_code = -1;
        self.content_length = -1;
        self.received_all_headers = false;
        self.received_status_line = false;
    }

    /// Consume one header line. Returns the bytes consumed, or 0 on a fatal error.
    pub fn on_line(&mut self, line: &[u8]) -> usize {
        if self.received_all_headers {
            // A line after a complete block starts the next hop.
            self.received_all_headers = false;
            self.received_status_line = false;
        }

        if !self.received_status_line {
            if !self.parse_status_line(line) {
                tracing::debug!(line = %String::from_utf8_lossy(line).trim_end(), "Malformed status line");
                return 0;
            }
            self.received_status_line = true;
        } else if is_block_end(line) {
            self.received_all_headers = true;
        } else {
            let Some(colon) = line.iter().position(|&b| b == b':') else {
                tracing::debug!(line = %String::from_utf8_lossy(line).trim_end(), "Malformed header line");
                return 0;
            };
            let (name, value) = (&line[..colon], &line[colon + 1..]);
            if name.eq_ignore_ascii_case(b"content-length") {
                match parse_length(value) {
                    Some(length) => self.content_length = length,
                    None => {
                        tracing::debug!(value = %String::from_utf8_lossy(value).trim(), "Unparseable Content-Length");
                        return 0;
                    }
                }
            }
        }
        line.len()
    }

    fn parse_status_line(&mut self, line: &[u8]) -> bool {
        let mut tokens = line.split(|&b| b == b' ');
        let Some(protocol) = tokens.next().filter(|t| !t.is_empty()) else {
            return false;
        };
        let Some(code) = tokens.next() else {
            return false;
        };
        let Some(code) = std::str::from_utf8(code)
            .ok()
            .and_then(|c| c.trim_end().parse::<i32>().ok())
        else {
            return false;
        };
        self.protocol = String::from_utf8_lossy(protocol).into_owned();
        self.status_code = code;
        true
    }
}

fn is_block_end(line: &[u8]) -> bool {
    line.is_empty() || line == b"\r\n" || line == b"\n"
}

fn parse_length(value: &[u8]) -> Option<i64> {
    let value = std::str::from_utf8(value).ok()?.trim();
    let length = value.parse::<u64>().ok()?;
    i64::try_from(length).ok()
}
