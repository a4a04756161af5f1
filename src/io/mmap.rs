//! Shared memory-mapped file pool.
//!
//! Crash logs and archives are read through a handler-owned pool of memory
//! maps keyed by `(path, access)`. Opening an already-pooled file returns a
//! handle onto the same underlying map with a bumped reference count; the
//! map is unmapped when the last handle releases. Zero-length files cannot
//! be mapped portably and are represented by an empty in-memory variant so
//! callers still get a well-formed handle.

use std::collections::HashMap;
use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use encoding_rs::Encoding;
use memmap2::{Mmap, MmapMut};
use parking_lot::{Mutex, RwLock};
use tracing::debug;

use crate::concurrency::cancel::CancelToken;
use crate::core::errors::{Result, ScannerError};

#[cfg(test)]
#[path = "mmap_tests.rs"]
mod tests;

/// Access mode a map was opened with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MmapAccess {
    /// Read-only mapping.
    Read,
    /// Read-write mapping.
    ReadWrite,
}

enum MapVariant {
    /// Zero-length file; no OS mapping exists.
    Empty,
    ReadOnly(Mmap),
    ReadWrite(MmapMut),
}

impl MapVariant {
    fn bytes(&self) -> &[u8] {
        match self {
            MapVariant::Empty => &[],
            MapVariant::ReadOnly(map) => map,
            MapVariant::ReadWrite(map) => map,
        }
    }

    fn bytes_mut(&mut self) -> Option<&mut [u8]> {
        match self {
            MapVariant::ReadWrite(map) => Some(map),
            _ => None,
        }
    }
}

type PoolKey = (PathBuf, MmapAccess);

struct PoolSlot {
    map: Arc<RwLock<MapVariant>>,
    len: usize,
    refs: usize,
}

struct HandlerInner {
    pool: Mutex<HashMap<PoolKey, PoolSlot>>,
    disposed: AtomicBool,
}

impl HandlerInner {
    fn release(&self, key: &PoolKey) {
        let mut pool = self.pool.lock();
        if let Some(slot) = pool.get_mut(key) {
            slot.refs = slot.refs.saturating_sub(1);
            if slot.refs == 0 {
                pool.remove(key);
                debug!(path = %key.0.display(), "unmapped pooled file");
            }
        }
    }
}

/// Pool of shared memory maps.
#[derive(Clone)]
pub struct MmapFileHandler {
    inner: Arc<HandlerInner>,
}

impl Default for MmapFileHandler {
    fn default() -> Self {
        Self::new()
    }
}

impl MmapFileHandler {
    /// Create an empty pool.
    pub fn new() -> Self {
        Self {
            inner: Arc::new(HandlerInner {
                pool: Mutex::new(HashMap::new()),
                disposed: AtomicBool::new(false),
            }),
        }
    }

    /// Open (or join) a mapping of `path` with the given access. Equal
    /// `(path, access)` pairs share one underlying map.
    pub fn open(&self, path: impl AsRef<Path>, access: MmapAccess) -> Result<MmapHandle> {
        if self.inner.disposed.load(Ordering::Acquire) {
            return Err(ScannerError::concurrency("mmap handler is disposed"));
        }

        let path = path.as_ref();
        if path.as_os_str().is_empty() {
            return Err(ScannerError::invalid_input("empty path"));
        }
        let canonical = std::fs::canonicalize(path)
            .map_err(|_| ScannerError::not_found(path.display().to_string()))?;
        let key: PoolKey = (canonical, access);

        let mut pool = self.inner.pool.lock();
        if let Some(slot) = pool.get_mut(&key) {
            slot.refs += 1;
            return Ok(MmapHandle {
                inner: Arc::clone(&self.inner),
                key,
                map: Arc::clone(&slot.map),
                len: slot.len,
                access,
            });
        }

        let file = match access {
            MmapAccess::Read => File::open(&key.0),
            MmapAccess::ReadWrite => OpenOptions::new().read(true).write(true).open(&key.0),
        }
        .map_err(|e| ScannerError::io(format!("failed to open {}", key.0.display()), e))?;

        let len = file
            .metadata()
            .map_err(|e| ScannerError::io("failed to stat file", e))?
            .len() as usize;

        let variant = if len == 0 {
            MapVariant::Empty
        } else {
            match access {
                MmapAccess::Read => {
                    // Safety: the mapping is read-only and pooled behind an
                    // RwLock; concurrent external truncation is undefined for
                    // any mmap consumer and out of contract here.
                    let map = unsafe { Mmap::map(&file) }
                        .map_err(|e| ScannerError::io("mmap failed", e))?;
                    MapVariant::ReadOnly(map)
                }
                MmapAccess::ReadWrite => {
                    // Safety: as above, with writes serialised by the RwLock.
                    let map = unsafe { MmapMut::map_mut(&file) }
                        .map_err(|e| ScannerError::io("mmap failed", e))?;
                    MapVariant::ReadWrite(map)
                }
            }
        };

        let slot = PoolSlot {
            map: Arc::new(RwLock::new(variant)),
            len,
            refs: 1,
        };
        let handle = MmapHandle {
            inner: Arc::clone(&self.inner),
            key: key.clone(),
            map: Arc::clone(&slot.map),
            len,
            access,
        };
        pool.insert(key, slot);
        Ok(handle)
    }

    /// Number of distinct maps currently pooled.
    pub fn pooled_count(&self) -> usize {
        self.inner.pool.lock().len()
    }

    /// Reject further opens and release every pooled map. Outstanding
    /// handles keep their maps alive until dropped.
    pub fn dispose(&self) {
        self.inner.disposed.store(true, Ordering::Release);
        self.inner.pool.lock().clear();
    }
}

/// Reference-counted view onto a pooled map.
pub struct MmapHandle {
    inner: Arc<HandlerInner>,
    key: PoolKey,
    map: Arc<RwLock<MapVariant>>,
    len: usize,
    access: MmapAccess,
}

impl std::fmt::Debug for MmapHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MmapHandle")
            .field("key", &self.key)
            .field("len", &self.len)
            .field("access", &self.access)
            .finish()
    }
}

impl Drop for MmapHandle {
    fn drop(&mut self) {
        self.inner.release(&self.key);
    }
}

impl MmapHandle {
    /// Mapped file length in bytes.
    pub fn len(&self) -> usize {
        self.len
    }

    /// True for zero-length files.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Canonical path of the mapped file.
    pub fn path(&self) -> &Path {
        &self.key.0
    }

    /// Bounds-checked copy of `[offset, offset + len)`.
    pub fn read(&self, offset: usize, len: usize) -> Result<Vec<u8>> {
        let end = offset
            .checked_add(len)
            .ok_or_else(|| ScannerError::invalid_input("read range overflows"))?;
        if end > self.len {
            return Err(ScannerError::invalid_input(format!(
                "read [{offset}, {end}) out of bounds for file of {} bytes",
                self.len
            )));
        }
        let guard = self.map.read();
        Ok(guard.bytes()[offset..end].to_vec())
    }

    /// Copy the whole file.
    pub fn read_all(&self) -> Vec<u8> {
        self.map.read().bytes().to_vec()
    }

    /// Bounds-checked write; requires [`MmapAccess::ReadWrite`].
    pub fn write(&self, offset: usize, bytes: &[u8]) -> Result<()> {
        if self.access != MmapAccess::ReadWrite {
            return Err(ScannerError::invalid_input(
                "write requires a ReadWrite mapping",
            ));
        }
        let end = offset
            .checked_add(bytes.len())
            .ok_or_else(|| ScannerError::invalid_input("write range overflows"))?;
        if end > self.len {
            return Err(ScannerError::invalid_input(format!(
                "write [{offset}, {end}) out of bounds for file of {} bytes",
                self.len
            )));
        }
        let mut guard = self.map.write();
        let target = guard
            .bytes_mut()
            .ok_or_else(|| ScannerError::invalid_input("mapping is not writable"))?;
        target[offset..end].copy_from_slice(bytes);
        Ok(())
    }

    /// Partition the file into `chunk_kb`-sized chunks, run `processor` over
    /// each chunk concurrently on blocking threads, and fold the per-chunk
    /// outputs (in chunk order) through `aggregator`.
    pub async fn process_file_in_parallel<R, A, F, G>(
        &self,
        chunk_kb: usize,
        processor: F,
        aggregator: G,
        cancel: &CancelToken,
    ) -> Result<A>
    where
        R: Send + 'static,
        F: Fn(usize, &[u8]) -> Result<R> + Send + Sync + 'static,
        G: FnOnce(Vec<R>) -> Result<A>,
    {
        let chunk_len = chunk_kb.max(1) * 1024;
        let processor = Arc::new(processor);

        let mut handles = Vec::new();
        let mut offset = 0usize;
        let mut index = 0usize;
        while offset < self.len {
            cancel.check()?;
            let end = (offset + chunk_len).min(self.len);
            let map = Arc::clone(&self.map);
            let processor = Arc::clone(&processor);
            handles.push(tokio::task::spawn_blocking(move || {
                let guard = map.read();
                processor(index, &guard.bytes()[offset..end])
            }));
            offset = end;
            index += 1;
        }

        let mut results = Vec::with_capacity(handles.len());
        for handle in handles {
            let joined = tokio::select! {
                joined = handle => joined,
                () = cancel.cancelled() => return Err(ScannerError::Cancelled),
            };
            let chunk_result = joined
                .map_err(|e| ScannerError::concurrency(format!("chunk worker panicked: {e}")))?;
            results.push(chunk_result?);
        }

        aggregator(results)
    }

    /// Lazy line iterator over the mapped bytes, splitting on `\n`, `\r\n`,
    /// and bare `\r`, decoding with `encoding` (UTF-8 when `None`).
    /// Cancellation ends the sequence early.
    pub fn read_lines(
        &self,
        encoding: Option<&'static Encoding>,
        cancel: CancelToken,
    ) -> MmapLineIter {
        MmapLineIter {
            map: Arc::clone(&self.map),
            pos: 0,
            len: self.len,
            encoding: encoding.unwrap_or(encoding_rs::UTF_8),
            cancel,
        }
    }
}

/// Lazy decoded-line iterator produced by [`MmapHandle::read_lines`].
pub struct MmapLineIter {
    map: Arc<RwLock<MapVariant>>,
    pos: usize,
    len: usize,
    encoding: &'static Encoding,
    cancel: CancelToken,
}

impl Iterator for MmapLineIter {
    type Item = String;

    fn next(&mut self) -> Option<String> {
        if self.pos >= self.len || self.cancel.is_cancelled() {
            return None;
        }

        let guard = self.map.read();
        let bytes = guard.bytes();
        let start = self.pos;

        let mut end = self.len;
        let mut next_pos = self.len;
        for (i, &b) in bytes[start..].iter().enumerate() {
            if b == b'\n' {
                end = start + i;
                next_pos = end + 1;
                break;
            }
            if b == b'\r' {
                end = start + i;
                next_pos = if bytes.get(end + 1) == Some(&b'\n') {
                    end + 2
                } else {
                    end + 1
                };
                break;
            }
        }

        self.pos = next_pos;
        let (decoded, _, _) = self.encoding.decode(&bytes[start..end]);
        Some(decoded.into_owned())
    }
}
