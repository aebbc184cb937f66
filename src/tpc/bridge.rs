//! Byte bridge between the remote body stream and the local storage stream.
//!
//! Push reads from storage for the upload; pull writes the response body into
//! storage. Neither direction touches storage while the parsed status is unknown
//! or signals failure: the callback answers 0 and the engine stops the exchange.

use crate::engine::ExchangeHandler;
use crate::storage::{StorageError, StorageFile};

use super::header::HeaderParser;
use super::Direction;

/// Callback side of one exchange: header parsing plus gated storage I/O.
pub struct StreamBridge<'s> {
    direction: Direction,
    stream: &'s dyn StorageFile,
    /// Base position of the current sub-range.
    start_offset: u64,
    /// Bytes acknowledged by storage since the last reset.
    offset: u64,
    parser: HeaderParser,
}

impl<'s> StreamBridge<'s> {
    pub fn new(direction: Direction, stream: &'s dyn StorageFile) -> Self {
        Self {
            direction,
            stream,
            start_offset: 0,
            offset: 0,
            parser: HeaderParser::new(),
        }
    }

    pub fn direction(&self) -> Direction {
        self.direction
    }

    pub fn stream(&self) -> &'s dyn StorageFile {
        self.stream
    }

    pub fn offset(&self) -> u64 {
        self.offset
    }

    pub fn start_offset(&self) -> u64 {
        self.start_offset
    }

    pub fn parser(&self) -> &HeaderParser {
        &self.parser
    }

    pub fn parser_mut(&mut self) -> &mut HeaderParser {
        &mut self.parser
    }

    /// Restart at `start_offset` with a zero running offset.
    pub fn rebase(&mut self, start_offset: u64) {
        self.start_offset = start_offset;
        self.offset = 0;
    }

    pub fn reset(&mut self) {
        self.offset = 0;
        self.parser.reset();
    }

    /// Body bytes may only move once a non-failure status is known.
    fn gate_open(&self) -> bool {
        let status = self.parser.status_code();
        (0..400).contains(&status)
    }

    /// Upload side: pull bytes out of storage.
    pub fn read(&mut self, buf: &mut [u8]) -> Result<usize, StorageError> {
        if !self.gate_open() {
            return Ok(0);
        }
        let n = self.stream.read(self.start_offset + self.offset, buf)?;
        self.offset += n as u64;
        Ok(n)
    }

    /// Download side: push bytes into storage.
    pub fn write(&mut self, data: &[u8]) -> Result<usize, StorageError> {
        if !self.gate_open() {
            return Ok(0);
        }
        let n = self.stream.write(self.start_offset + self.offset, data)?;
        self.offset += n as u64;
        Ok(n)
    }
}

impl ExchangeHandler for StreamBridge<'_> {
    fn on_header_line(&mut self, line: &[u8]) -> usize {
        self.parser.on_line(line)
    }

    fn on_read_request(&mut self, buf: &mut [u8]) -> Result<usize, StorageError> {
        match self.direction {
            Direction::Push => self.read(buf),
            Direction::Pull => Ok(0),
        }
    }

    fn on_write_chunk(&mut self, data: &[u8]) -> Result<usize, StorageError> {
        match self.direction {
            Direction::Pull => self.write(data),
            // The peer's reply to an upload is not stored.
            Direction::Push if self.gate_open() => Ok(data.len()),
            Direction::Push => Ok(0),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MemoryFile;

    fn status(bridge: &mut StreamBridge<'_>, code: u16) {
        let line = format!("HTTP/1.1 {} Whatever\r\n", code);
        assert_eq!(bridge.on_header_line(line.as_bytes()), line.len());
    }

    #[test]
    fn unknown_status_blocks_both_directions() {
        let file = MemoryFile::with_contents(b"0123456789");
        let mut push = StreamBridge::new(Direction::Push, &file);
        let mut buf = [0u8; 4];
        assert_eq!(push.on_read_request(&mut buf).unwrap(), 0);
        assert_eq!(push.offset(), 0);

        let mut pull = StreamBridge::new(Direction::Pull, &file);
        assert_eq!(pull.on_write_chunk(b"abcd").unwrap(), 0);
        assert_eq!(file.contents(), b"0123456789");
    }

    #[test]
    fn failure_status_blocks_both_directions() {
        for code in [400u16, 404, 500, 599] {
            let file = MemoryFile::with_contents(b"0123456789");
            let mut push = StreamBridge::new(Direction::Push, &file);
            status(&mut push, code);
            let mut buf = [0u8; 8];
            assert_eq!(push.read(&mut buf).unwrap(), 0);

            let mut pull = StreamBridge::new(Direction::Pull, &file);
            status(&mut pull, code);
            assert_eq!(pull.write(b"zz").unwrap(), 0);
            assert_eq!(file.writes(), 0);
        }
    }

    #[test]
    fn push_reads_advance_offset() {
        let file = MemoryFile::with_contents(b"0123456789");
        let mut push = StreamBridge::new(Direction::Push, &file);
        status(&mut push, 100);

        let mut buf = [0u8; 4];
        assert_eq!(push.on_read_request(&mut buf).unwrap(), 4);
        assert_eq!(&buf, b"0123");
        assert_eq!(push.on_read_request(&mut buf).unwrap(), 4);
        assert_eq!(&buf, b"4567");
        assert_eq!(push.on_read_request(&mut buf).unwrap(), 2);
        assert_eq!(&buf[..2], b"89");
        assert_eq!(push.on_read_request(&mut buf).unwrap(), 0);
        assert_eq!(push.offset(), 10);
    }

    #[test]
    fn pull_writes_land_after_start_offset() {
        let file = MemoryFile::with_contents(b"");
        let mut pull = StreamBridge::new(Direction::Pull, &file);
        pull.rebase(5);
        status(&mut pull, 206);

        assert_eq!(pull.on_write_chunk(b"abc").unwrap(), 3);
        assert_eq!(pull.on_write_chunk(b"de").unwrap(), 2);
        assert_eq!(pull.offset(), 5);
        assert_eq!(&file.contents()[5..], b"abcde");
    }

    #[test]
    fn storage_error_propagates_without_advancing() {
        let file = MemoryFile::with_contents(b"");
        file.fail_writes();
        let mut pull = StreamBridge::new(Direction::Pull, &file);
        status(&mut pull, 200);
        assert!(pull.on_write_chunk(b"abc").is_err());
        assert_eq!(pull.offset(), 0);
    }

    #[test]
    fn push_discards_reply_body() {
        let file = MemoryFile::with_contents(b"data");
        let mut push = StreamBridge::new(Direction::Push, &file);
        status(&mut push, 201);
        assert_eq!(push.on_write_chunk(b"Created").unwrap(), 7);
        assert_eq!(file.contents(), b"data");
    }

    #[test]
    fn pull_has_nothing_to_upload() {
        let file = MemoryFile::with_contents(b"data");
        let mut pull = StreamBridge::new(Direction::Pull, &file);
        status(&mut pull, 200);
        let mut buf = [0u8; 4];
        assert_eq!(pull.on_read_request(&mut buf).unwrap(), 0);
    }
}
