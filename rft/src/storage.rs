//! Destination for reassembled files
//!
//! The receiver hands a connection's accepted segments, in order, to a
//! [`Storage`] on FIN (and again on a later ACK). Each call replaces whatever
//! was stored for that connection before.

use bytes::Bytes;
use parking_lot::Mutex;
use rft_protocol::ConnectionId;
use std::collections::HashMap;
use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Writes a connection's file from its segments
pub trait Storage {
    fn store(&self, id: ConnectionId, segments: &[Bytes]) -> io::Result<()>;
}

impl<S: Storage + ?Sized> Storage for Arc<S> {
    fn store(&self, id: ConnectionId, segments: &[Bytes]) -> io::Result<()> {
        (**self).store(id, segments)
    }
}

impl<S: Storage + ?Sized> Storage for Box<S> {
    fn store(&self, id: ConnectionId, segments: &[Bytes]) -> io::Result<()> {
        (**self).store(id, segments)
    }
}

/// Stores each connection as `<dir>/<connection_id>.file`
#[derive(Debug, Clone)]
pub struct DirectoryStorage {
    dir: PathBuf,
}

impl DirectoryStorage {
    /// Use `dir`, creating it if needed
    pub fn create(dir: impl Into<PathBuf>) -> io::Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        Ok(DirectoryStorage { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path_for(&self, id: ConnectionId) -> PathBuf {
        self.dir.join(format!("{}.file", id))
    }
}

impl Storage for DirectoryStorage {
    fn store(&self, id: ConnectionId, segments: &[Bytes]) -> io::Result<()> {
        let path = self.path_for(id);
        let mut writer = BufWriter::new(File::create(&path)?);
        for segment in segments {
            writer.write_all(segment)?;
        }
        writer.flush()?;

        tracing::debug!("Wrote {} segments to {}", segments.len(), path.display());
        Ok(())
    }
}

#[derive(Debug, Default)]
struct StoredFile {
    contents: Bytes,
    writes: usize,
}

/// Keeps stored files in memory; clones share contents
#[derive(Debug, Clone, Default)]
pub struct MemoryStorage {
    files: Arc<Mutex<HashMap<ConnectionId, StoredFile>>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Latest contents stored for a connection
    pub fn get(&self, id: ConnectionId) -> Option<Bytes> {
        self.files.lock().get(&id).map(|f| f.contents.clone())
    }

    /// How many times a connection's file was written
    pub fn writes(&self, id: ConnectionId) -> usize {
        self.files.lock().get(&id).map_or(0, |f| f.writes)
    }

    /// Number of distinct files
    pub fn len(&self) -> usize {
        self.files.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Storage for MemoryStorage {
    fn store(&self, id: ConnectionId, segments: &[Bytes]) -> io::Result<()> {
        let contents: Vec<u8> = segments.iter().flat_map(|s| s.iter().copied()).collect();

        let mut files = self.files.lock();
        let file = files.entry(id).or_default();
        file.contents = Bytes::from(contents);
        file.writes += 1;
        Ok(())
    }
}
