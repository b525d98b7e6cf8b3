//! Memory-mapped append-only writer.
//!
//! The writer preallocates a fixed capacity on disk, maps it, and appends
//! records with a plain memory copy. While the file is open its physical
//! size equals the preallocated capacity; `close` shrinks it back to the
//! logical size so no slack survives the writer.

use std::fs::{File, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

use memmap2::MmapMut;
use tracing::warn;

use crate::error::MemlogError;
use crate::fs;

/// Default preallocation for writers that do not pick their own capacity.
pub const DEFAULT_CAPACITY: usize = 256 * 1024 * 1024;

/// Retry policy applied to `open`.
///
/// A transiently locked or still-rotating file can make the initial open
/// fail; the writer retries up to `attempts` times with `delay` between
/// tries and surfaces the last error if all attempts fail.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    /// Total number of open attempts (minimum 1).
    pub attempts: u32,
    /// Delay between consecutive attempts.
    pub delay: Duration,
}

impl RetryPolicy {
    /// A single attempt with no delay.
    #[must_use]
    pub fn none() -> Self {
        Self {
            attempts: 1,
            delay: Duration::ZERO,
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            attempts: 5,
            delay: Duration::from_millis(10),
        }
    }
}

/// Resources held while the writer is open.
struct Active {
    file: File,
    mmap: MmapMut,
}

/// Append-only writer backed by a preallocated memory-mapped file.
///
/// The logical length (`size()`) and the physical on-disk size differ for
/// the whole open lifetime: the file is held at `capacity` bytes so appends
/// never resize it, and `close` truncates it down to the bytes actually
/// written.
///
/// Not internally synchronized. Callers that share a writer across threads
/// must serialize access externally (see [`crate::sink`]).
pub struct MappedWriter {
    path: PathBuf,
    capacity: usize,
    offset: usize,
    retry: RetryPolicy,
    active: Option<Active>,
}

impl MappedWriter {
    /// Creates a closed writer with the default retry policy.
    #[must_use]
    pub fn new() -> Self {
        Self::with_retry(RetryPolicy::default())
    }

    /// Creates a closed writer with an explicit retry policy.
    #[must_use]
    pub fn with_retry(retry: RetryPolicy) -> Self {
        Self {
            path: PathBuf::new(),
            capacity: 0,
            offset: 0,
            retry,
            active: None,
        }
    }

    /// Opens `path` and returns a ready writer in one step.
    ///
    /// # Errors
    ///
    /// Same failure conditions as [`MappedWriter::open`].
    pub fn create(
        path: impl AsRef<Path>,
        capacity: usize,
        truncate: bool,
    ) -> Result<Self, MemlogError> {
        let mut writer = Self::new();
        writer.open(path, capacity, truncate)?;
        Ok(writer)
    }

    /// Opens (or reopens onto a new path) the backing file.
    ///
    /// Closes any previously open mapping first. With `truncate` the target
    /// file is reset to zero length; otherwise an existing file's length is
    /// adopted as the initial append offset, so a restarted process resumes
    /// where the previous one stopped. The file is then grown to `capacity`
    /// bytes and mapped.
    ///
    /// # Errors
    ///
    /// - [`MemlogError::InvalidConfig`] if `capacity` is zero.
    /// - [`MemlogError::Open`] if the file cannot be created, sized, or
    ///   mapped after the retry policy is exhausted, or if an existing
    ///   file is already larger than `capacity`. A failed open releases
    ///   every partially-acquired resource and restores the previous file
    ///   length before returning.
    pub fn open(
        &mut self,
        path: impl AsRef<Path>,
        capacity: usize,
        truncate: bool,
    ) -> Result<(), MemlogError> {
        if capacity == 0 {
            return Err(MemlogError::InvalidConfig(
                "mapped writer capacity must be positive".to_string(),
            ));
        }
        self.close()?;

        self.path = path.as_ref().to_path_buf();
        self.capacity = capacity;

        let max_attempts = self.retry.attempts.max(1);
        let mut attempt = 0;
        loop {
            attempt += 1;
            match Self::open_once(&self.path, capacity, truncate) {
                Ok((file, mmap, offset)) => {
                    self.active = Some(Active { file, mmap });
                    self.offset = offset;
                    return Ok(());
                }
                Err(source) => {
                    if attempt >= max_attempts {
                        // The writer is closed; don't let size() report the
                        // previous mapping's bytes.
                        self.offset = 0;
                        return Err(MemlogError::Open {
                            path: self.path.clone(),
                            attempts: attempt,
                            source,
                        });
                    }
                    warn!(
                        path = %self.path.display(),
                        attempt,
                        error = %source,
                        "open failed, retrying"
                    );
                    std::thread::sleep(self.retry.delay);
                }
            }
        }
    }

    /// One open attempt: create/size/map, rolling the file length back on
    /// any failure after it was changed.
    fn open_once(
        path: &Path,
        capacity: usize,
        truncate: bool,
    ) -> io::Result<(File, MmapMut, usize)> {
        let file = OpenOptions::new()
            .create(true)
            .read(true)
            .write(true)
            .truncate(truncate)
            .open(path)?;

        let prior_len = if truncate { 0 } else { file.metadata()?.len() };
        // Mapped files stay well under usize::MAX on 64-bit targets.
        #[allow(clippy::cast_possible_truncation)]
        let prior_len = prior_len as usize;
        if prior_len > capacity {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("existing file is {prior_len} bytes, larger than capacity {capacity}"),
            ));
        }

        if let Err(e) = fs::preallocate(&file, capacity as u64) {
            let _ = fs::truncate_to(&file, prior_len as u64);
            return Err(e);
        }

        // SAFETY: the file was opened read-write by this writer and sized to
        // `capacity` just above; the mapping is exclusively owned through
        // `Active` and dropped before the file length changes again.
        #[allow(unsafe_code)]
        let mmap = match unsafe { MmapMut::map_mut(&file) } {
            Ok(m) => m,
            Err(e) => {
                let _ = fs::truncate_to(&file, prior_len as u64);
                return Err(e);
            }
        };

        Ok((file, mmap, prior_len))
    }

    /// Closes and reopens the recorded path with the recorded capacity.
    ///
    /// # Errors
    ///
    /// [`MemlogError::NotOpened`] if the writer was never opened; otherwise
    /// the same failures as [`MappedWriter::open`].
    pub fn reopen(&mut self, truncate: bool) -> Result<(), MemlogError> {
        if self.path.as_os_str().is_empty() {
            return Err(MemlogError::NotOpened {
                path: self.path.clone(),
            });
        }
        let path = self.path.clone();
        let capacity = self.capacity;
        self.open(path, capacity, truncate)
    }

    /// Copies `bytes` into the mapping at the current offset.
    ///
    /// Pure memory copy; no disk I/O is forced.
    ///
    /// # Errors
    ///
    /// - [`MemlogError::NotOpened`] if the writer is closed.
    /// - [`MemlogError::CapacityExceeded`] if the record does not fit in
    ///   the remaining preallocated region. The mapping is untouched in
    ///   that case.
    pub fn append(&mut self, bytes: &[u8]) -> Result<(), MemlogError> {
        let Some(active) = self.active.as_mut() else {
            return Err(MemlogError::NotOpened {
                path: self.path.clone(),
            });
        };
        let remaining = self.capacity - self.offset;
        if bytes.len() > remaining {
            return Err(MemlogError::CapacityExceeded {
                path: self.path.clone(),
                requested: bytes.len(),
                remaining,
                capacity: self.capacity,
            });
        }
        active.mmap[self.offset..self.offset + bytes.len()].copy_from_slice(bytes);
        self.offset += bytes.len();
        Ok(())
    }

    /// Pushes dirty mapped pages toward stable storage without unmapping.
    ///
    /// Best effort: a concurrent reader of the same path sees all bytes up
    /// to `size()` after this returns, but this is not a power-loss
    /// durability guarantee. No-op on a closed writer.
    ///
    /// # Errors
    ///
    /// [`MemlogError::Io`] if the OS flush primitive fails.
    pub fn flush(&mut self) -> Result<(), MemlogError> {
        match &self.active {
            Some(active) => active.mmap.flush().map_err(|source| MemlogError::Io {
                path: self.path.clone(),
                source,
            }),
            None => Ok(()),
        }
    }

    /// Flushes, unmaps, shrinks the file to the logical size, and releases
    /// the handle. Idempotent; closing a closed writer is a no-op.
    ///
    /// # Errors
    ///
    /// [`MemlogError::Io`] if the flush or the final truncate fails. The
    /// mapping and handle are released either way.
    pub fn close(&mut self) -> Result<(), MemlogError> {
        let Some(Active { file, mmap }) = self.active.take() else {
            return Ok(());
        };
        let flush_res = mmap.flush();
        drop(mmap);
        let trunc_res = fs::truncate_to(&file, self.offset as u64);
        drop(file);

        flush_res.map_err(|source| MemlogError::Io {
            path: self.path.clone(),
            source,
        })?;
        trunc_res.map_err(|source| MemlogError::Io {
            path: self.path.clone(),
            source,
        })
    }

    /// Logical size: bytes appended since the mapping was opened (or, after
    /// a non-truncating open, since the resumed file began).
    #[must_use]
    pub fn size(&self) -> usize {
        self.offset
    }

    /// Preallocated capacity of the current (or last) mapping.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Bytes still free in the mapping.
    #[must_use]
    pub fn remaining(&self) -> usize {
        self.capacity - self.offset
    }

    /// Path recorded by the last `open`.
    #[must_use]
    pub fn filename(&self) -> &Path {
        &self.path
    }

    /// Whether a mapping is currently live.
    #[must_use]
    pub fn is_open(&self) -> bool {
        self.active.is_some()
    }
}

impl Default for MappedWriter {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for MappedWriter {
    fn drop(&mut self) {
        // Flush-on-destroy; errors have nowhere to go here.
        let _ = self.close();
    }
}

impl std::fmt::Debug for MappedWriter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MappedWriter")
            .field("path", &self.path)
            .field("capacity", &self.capacity)
            .field("offset", &self.offset)
            .field("open", &self.active.is_some())
            .finish()
    }
}
