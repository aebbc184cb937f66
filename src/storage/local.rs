//! Local filesystem storage rooted at a directory.

use std::fs::{File, OpenOptions};
use std::os::unix::fs::{FileExt, OpenOptionsExt};
use std::path::{Component, Path, PathBuf};

use super::{
    ErrorCode, FileSystem, OpenMode, OpenOutcome, OpenRequest, StorageError, StorageFile,
};

/// Files are written straight through; a single buffer is always ready.
const DIRECT_BUFFERS: usize = 1;

/// Filesystem that maps request paths below a root directory.
#[derive(Debug, Clone)]
pub struct LocalFileSystem {
    root: PathBuf,
}

impl LocalFileSystem {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

impl FileSystem for LocalFileSystem {
    fn new_file(&self, user: Option<&str>, monitor_id: u64) -> Result<Box<dyn StorageFile>, StorageError> {
        tracing::trace!(user = ?user, monitor_id, "New local file handle");
        Ok(Box::new(LocalFile {
            root: self.root.clone(),
            monitor_id,
            file: None,
        }))
    }
}

/// Handle to one file below the root.
#[derive(Debug)]
pub struct LocalFile {
    root: PathBuf,
    monitor_id: u64,
    file: Option<File>,
}

impl LocalFile {
    /// Map a request path onto the root, refusing anything that climbs out of it.
    fn resolve(&self, path: &str) -> Result<PathBuf, StorageError> {
        let mut resolved = self.root.clone();
        for component in Path::new(path).components() {
            match component {
                Component::Normal(part) => resolved.push(part),
                Component::RootDir | Component::CurDir => {}
                Component::ParentDir | Component::Prefix(_) => {
                    return Err(StorageError::new(
                        ErrorCode::AccessDenied,
                        format!("Path {} escapes the storage root", path),
                    ));
                }
            }
        }
        if resolved == self.root {
            return Err(StorageError::new(ErrorCode::Other(-1), "Path names no file"));
        }
        Ok(resolved)
    }

    fn file(&self) -> Result<&File, StorageError> {
        self.file
            .as_ref()
            .ok_or_else(|| StorageError::new(ErrorCode::Other(-1), "File is not open"))
    }
}

impl StorageFile for LocalFile {
    fn open(&mut self, request: &OpenRequest<'_>) -> OpenOutcome {
        let path = match self.resolve(request.path) {
            Ok(p) => p,
            Err(e) => return OpenOutcome::Error(e),
        };

        let mut options = OpenOptions::new();
        match request.mode {
            OpenMode::ReadOnly => {
                options.read(true);
            }
            OpenMode::CreateTruncate => {
                options.write(true).create(true).truncate(true).mode(request.permissions);
            }
            OpenMode::CreateNew => {
                options.write(true).create_new(true).mode(request.permissions);
            }
        }

        match options.open(&path) {
            Ok(file) => {
                tracing::debug!(
                    monitor_id = self.monitor_id,
                    path = %path.display(),
                    mode = ?request.mode,
                    user = ?request.identity.name,
                    "Opened local file"
                );
                self.file = Some(file);
                OpenOutcome::Ok
            }
            Err(e) => OpenOutcome::Error(e.into()),
        }
    }

    fn read(&self, offset: u64, buf: &mut [u8]) -> Result<usize, StorageError> {
        Ok(self.file()?.read_at(buf, offset)?)
    }

    fn write(&self, offset: u64, data: &[u8]) -> Result<usize, StorageError> {
        let file = self.file()?;
        file.write_all_at(data, offset)?;
        Ok(data.len())
    }

    fn stat(&self) -> Result<u64, StorageError> {
        Ok(self.file()?.metadata()?.len())
    }

    fn close(&mut self) -> Result<(), StorageError> {
        if let Some(file) = self.file.take() {
            file.sync_all()?;
            tracing::trace!(monitor_id = self.monitor_id, "Closed local file");
        }
        Ok(())
    }

    fn available_buffers(&self) -> usize {
        if self.file.is_some() {
            DIRECT_BUFFERS
        } else {
            0
        }
    }
}
