//! In-memory doubles for the storage and engine seams, shared by unit tests.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::engine::{EngineError, ExchangeHandler, ExchangeOptions, TransferEngine, TransferHandle};
use crate::resilience::Sleeper;
use crate::storage::{
    ErrorCode, FileSystem, OpenMode, OpenOutcome, OpenRequest, StorageError, StorageFile,
};

#[derive(Debug, Default)]
struct FileInner {
    data: Vec<u8>,
    writes: usize,
    fail_writes: bool,
    buffers: usize,
    outcomes: VecDeque<OpenOutcome>,
    opens: Vec<(String, OpenMode, Option<String>)>,
    closed: bool,
}

/// Storage file backed by a shared byte vector. Clones observe the same data.
#[derive(Debug, Clone, Default)]
pub struct MemoryFile {
    inner: Arc<Mutex<FileInner>>,
}

impl MemoryFile {
    pub fn with_contents(data: &[u8]) -> Self {
        let file = Self::default();
        file.inner.lock().unwrap().data = data.to_vec();
        file
    }

    pub fn contents(&self) -> Vec<u8> {
        self.inner.lock().unwrap().data.clone()
    }

    /// Number of write calls that reached the file.
    pub fn writes(&self) -> usize {
        self.inner.lock().unwrap().writes
    }

    pub fn fail_writes(&self) {
        self.inner.lock().unwrap().fail_writes = true;
    }

    pub fn set_available_buffers(&self, count: usize) {
        self.inner.lock().unwrap().buffers = count;
    }

    /// Queue the answers of successive `open` calls. `Ok` once the queue is empty.
    pub fn script_opens(&self, outcomes: impl IntoIterator<Item = OpenOutcome>) {
        self.inner.lock().unwrap().outcomes.extend(outcomes);
    }

    /// Every open call as `(path, mode, credential)`.
    pub fn opens(&self) -> Vec<(String, OpenMode, Option<String>)> {
        self.inner.lock().unwrap().opens.clone()
    }

    pub fn closed(&self) -> bool {
        self.inner.lock().unwrap().closed
    }
}

impl StorageFile for MemoryFile {
    fn open(&mut self, request: &OpenRequest<'_>) -> OpenOutcome {
        let mut inner = self.inner.lock().unwrap();
        inner.opens.push((
            request.path.to_string(),
            request.mode,
            request.credential.map(str::to_string),
        ));
        inner.outcomes.pop_front().unwrap_or(OpenOutcome::Ok)
    }

    fn read(&self, offset: u64, buf: &mut [u8]) -> Result<usize, StorageError> {
        let inner = self.inner.lock().unwrap();
        let start = (offset as usize).min(inner.data.len());
        let n = buf.len().min(inner.data.len() - start);
        buf[..n].copy_from_slice(&inner.data[start..start + n]);
        Ok(n)
    }

    fn write(&self, offset: u64, data: &[u8]) -> Result<usize, StorageError> {
        let mut inner = self.inner.lock().unwrap();
        if inner.fail_writes {
            return Err(StorageError::new(ErrorCode::Other(28), "No space left on device"));
        }
        inner.writes += 1;
        let end = offset as usize + data.len();
        if inner.data.len() < end {
            inner.data.resize(end, 0);
        }
        inner.data[offset as usize..end].copy_from_slice(data);
        Ok(data.len())
    }

    fn stat(&self) -> Result<u64, StorageError> {
        Ok(self.inner.lock().unwrap().data.len() as u64)
    }

    fn close(&mut self) -> Result<(), StorageError> {
        self.inner.lock().unwrap().closed = true;
        Ok(())
    }

    fn available_buffers(&self) -> usize {
        self.inner.lock().unwrap().buffers
    }
}

/// Filesystem handing out clones of one `MemoryFile`.
#[derive(Debug, Clone, Default)]
pub struct MemoryFileSystem {
    pub file: MemoryFile,
    refuse: bool,
    monitor_ids: Arc<Mutex<Vec<u64>>>,
}

impl MemoryFileSystem {
    pub fn new(file: MemoryFile) -> Self {
        Self {
            file,
            ..Default::default()
        }
    }

    /// A filesystem whose `new_file` always fails.
    pub fn refusing() -> Self {
        Self {
            refuse: true,
            ..Default::default()
        }
    }

    pub fn monitor_ids(&self) -> Vec<u64> {
        self.monitor_ids.lock().unwrap().clone()
    }
}

impl FileSystem for MemoryFileSystem {
    fn new_file(&self, _user: Option<&str>, monitor_id: u64) -> Result<Box<dyn StorageFile>, StorageError> {
        if self.refuse {
            return Err(StorageError::bare(ErrorCode::Other(12)));
        }
        self.monitor_ids.lock().unwrap().push(monitor_id);
        Ok(Box::new(self.file.clone()))
    }
}

type Failure = fn() -> EngineError;

#[derive(Default)]
struct Script {
    head: Vec<u8>,
    body: Vec<u8>,
    failure: Option<Failure>,
    uploaded: Vec<u8>,
    performed: Vec<ExchangeOptions>,
}

/// Handle that replays a canned response through the callbacks.
///
/// Uploads are drained before the body is delivered; an error injected with
/// `ScriptedEngine::failing_with` is returned after the head is replayed.
pub struct ScriptedHandle {
    options: ExchangeOptions,
    script: Arc<Mutex<Script>>,
}

impl ScriptedHandle {
    pub fn boxed(head: &[u8]) -> Box<dyn TransferHandle> {
        Self::with_body(head, b"")
    }

    pub fn with_body(head: &[u8], body: &[u8]) -> Box<dyn TransferHandle> {
        let script = Script {
            head: head.to_vec(),
            body: body.to_vec(),
            ..Default::default()
        };
        Box::new(Self {
            options: ExchangeOptions::default(),
            script: Arc::new(Mutex::new(script)),
        })
    }
}

impl TransferHandle for ScriptedHandle {
    fn options(&self) -> &ExchangeOptions {
        &self.options
    }

    fn options_mut(&mut self) -> &mut ExchangeOptions {
        &mut self.options
    }

    fn duplicate(&self) -> Result<Box<dyn TransferHandle>, EngineError> {
        let mut options = self.options.clone();
        options.headers = None;
        Ok(Box::new(Self {
            options,
            script: Arc::clone(&self.script),
        }))
    }

    fn perform(&mut self, handler: &mut dyn ExchangeHandler) -> Result<(), EngineError> {
        let (head, body, failure) = {
            let mut script = self.script.lock().unwrap();
            script.performed.push(self.options.clone());
            (script.head.clone(), script.body.clone(), script.failure)
        };

        for line in head.split_inclusive(|&b| b == b'\n') {
            if handler.on_header_line(line) != line.len() {
                return Err(EngineError::Aborted("header callback"));
            }
        }
        if let Some(failure) = failure {
            return Err(failure());
        }

        if self.options.upload {
            let mut buf = [0u8; 4];
            loop {
                let n = handler
                    .on_read_request(&mut buf)
                    .map_err(|_| EngineError::Aborted("read callback"))?;
                if n == 0 {
                    break;
                }
                self.script.lock().unwrap().uploaded.extend_from_slice(&buf[..n]);
            }
        }

        if !body.is_empty() {
            let n = handler
                .on_write_chunk(&body)
                .map_err(|_| EngineError::Aborted("write callback"))?;
            if n != body.len() {
                return Err(EngineError::Aborted("write callback"));
            }
        }
        Ok(())
    }
}

/// Engine handing out `ScriptedHandle`s that share one script.
#[derive(Clone, Default)]
pub struct ScriptedEngine {
    script: Arc<Mutex<Script>>,
    refuse: bool,
}

impl ScriptedEngine {
    pub fn new(head: &[u8], body: &[u8]) -> Self {
        let script = Script {
            head: head.to_vec(),
            body: body.to_vec(),
            ..Default::default()
        };
        Self {
            script: Arc::new(Mutex::new(script)),
            refuse: false,
        }
    }

    /// An engine whose handles fail with `failure` after the response head.
    pub fn failing_with(head: &[u8], failure: Failure) -> Self {
        let engine = Self::new(head, b"");
        engine.script.lock().unwrap().failure = Some(failure);
        engine
    }

    /// An engine that cannot create handles at all.
    pub fn refusing() -> Self {
        Self {
            refuse: true,
            ..Default::default()
        }
    }

    pub fn uploaded(&self) -> Vec<u8> {
        self.script.lock().unwrap().uploaded.clone()
    }

    /// Options of every performed exchange, in order.
    pub fn performed(&self) -> Vec<ExchangeOptions> {
        self.script.lock().unwrap().performed.clone()
    }
}

impl TransferEngine for ScriptedEngine {
    fn new_handle(&self) -> Result<Box<dyn TransferHandle>, EngineError> {
        if self.refuse {
            return Err(EngineError::Init("out of handles".to_string()));
        }
        Ok(Box::new(ScriptedHandle {
            options: ExchangeOptions::default(),
            script: Arc::clone(&self.script),
        }))
    }
}

/// Sleeper that records requested delays instead of sleeping.
#[derive(Debug, Clone, Default)]
pub struct RecordingSleeper {
    slept: Arc<Mutex<Vec<Duration>>>,
}

impl RecordingSleeper {
    pub fn slept(&self) -> Vec<Duration> {
        self.slept.lock().unwrap().clone()
    }
}

impl Sleeper for RecordingSleeper {
    fn sleep(&self, duration: Duration) {
        self.slept.lock().unwrap().push(duration);
    }
}
