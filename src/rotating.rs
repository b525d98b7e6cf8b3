//! Size-triggered numbered rotation.
//!
//! Keeps `max_files + 1` files per base path: the active file at
//! `base_path` and backups `base_path.1` (newest) through
//! `base_path.max_files` (oldest). Rotation shifts every generation up by
//! one and evicts the oldest.

use std::path::{Path, PathBuf};

use tracing::debug;

use crate::error::MemlogError;
use crate::fs;
use crate::writer::{MappedWriter, RetryPolicy};

/// Append writer that rotates through numbered generations when the active
/// file would exceed `max_size`.
///
/// Rotation is synchronous: it completes before the triggering append
/// returns. The active file is preallocated to `max_size`, so an append can
/// only fail with capacity-exceeded when a single record is itself larger
/// than `max_size`.
pub struct SizeRotatingWriter {
    base_path: PathBuf,
    max_size: usize,
    max_files: usize,
    current_size: usize,
    writer: MappedWriter,
}

impl SizeRotatingWriter {
    /// Opens generation 0 at `base_path`, resuming an existing partial file.
    ///
    /// # Errors
    ///
    /// [`MemlogError::InvalidConfig`] if `max_size` is zero, or any
    /// [`MemlogError::Open`] failure from the underlying writer.
    pub fn new(
        base_path: impl AsRef<Path>,
        max_size: usize,
        max_files: usize,
    ) -> Result<Self, MemlogError> {
        Self::with_retry(base_path, max_size, max_files, RetryPolicy::default())
    }

    /// Like [`SizeRotatingWriter::new`] with an explicit open retry policy.
    ///
    /// # Errors
    ///
    /// Same as [`SizeRotatingWriter::new`].
    pub fn with_retry(
        base_path: impl AsRef<Path>,
        max_size: usize,
        max_files: usize,
        retry: RetryPolicy,
    ) -> Result<Self, MemlogError> {
        let base_path = base_path.as_ref().to_path_buf();
        let mut writer = MappedWriter::with_retry(retry);
        writer.open(&base_path, max_size, false)?;
        let current_size = writer.size();

        Ok(Self {
            base_path,
            max_size,
            max_files,
            current_size,
            writer,
        })
    }

    /// Appends one record, rotating first if it would push the active file
    /// past `max_size`.
    ///
    /// # Errors
    ///
    /// [`MemlogError::CapacityExceeded`] if the record alone is larger than
    /// `max_size` — rejected before any rotation, so the generation chain
    /// is untouched. [`MemlogError::Rotation`] if shifting generations
    /// fails, or any error from the underlying writer.
    pub fn append(&mut self, record: &[u8]) -> Result<(), MemlogError> {
        if record.len() > self.max_size {
            return Err(MemlogError::CapacityExceeded {
                path: self.base_path.clone(),
                requested: record.len(),
                remaining: self.max_size - self.current_size,
                capacity: self.max_size,
            });
        }
        if self.current_size + record.len() > self.max_size {
            self.rotate()?;
        }
        self.writer.append(record)?;
        // Mirror the writer's offset exactly; a failed append above leaves
        // both untouched.
        self.current_size = self.writer.size();
        Ok(())
    }

    /// Closes the active file, shifts generations `base.k-1 -> base.k` from
    /// the oldest down, evicting `base.max_files`, then reopens a truncated
    /// generation 0.
    ///
    /// # Errors
    ///
    /// [`MemlogError::Rotation`] on any failed delete or rename; errors are
    /// fatal and propagate without being swallowed.
    pub fn rotate(&mut self) -> Result<(), MemlogError> {
        self.writer.close()?;

        for i in (1..=self.max_files).rev() {
            let src = generation_path(&self.base_path, i - 1);
            let target = generation_path(&self.base_path, i);

            if fs::exists(&target) {
                fs::remove(&target).map_err(|source| MemlogError::Rotation {
                    src: target.clone(),
                    target: target.clone(),
                    source,
                })?;
            }
            if fs::exists(&src) {
                fs::rename(&src, &target).map_err(|source| MemlogError::Rotation {
                    src: src.clone(),
                    target: target.clone(),
                    source,
                })?;
            }
        }

        debug!(
            base = %self.base_path.display(),
            generations = self.max_files,
            "rotated log file"
        );
        self.writer.reopen(true)?;
        self.current_size = 0;
        Ok(())
    }

    /// Requests the mapped pages be pushed toward stable storage.
    ///
    /// # Errors
    ///
    /// [`MemlogError::Io`] if the OS flush primitive fails.
    pub fn flush(&mut self) -> Result<(), MemlogError> {
        self.writer.flush()
    }

    /// Closes the active file, shrinking it to its logical size.
    ///
    /// # Errors
    ///
    /// [`MemlogError::Io`] if the flush or truncate fails.
    pub fn close(&mut self) -> Result<(), MemlogError> {
        self.writer.close()
    }

    /// Logical size of the active generation.
    #[must_use]
    pub fn current_size(&self) -> usize {
        self.current_size
    }

    /// Path of the active generation.
    #[must_use]
    pub fn base_path(&self) -> &Path {
        &self.base_path
    }
}

impl std::fmt::Debug for SizeRotatingWriter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SizeRotatingWriter")
            .field("base_path", &self.base_path)
            .field("max_size", &self.max_size)
            .field("max_files", &self.max_files)
            .field("current_size", &self.current_size)
            .finish_non_exhaustive()
    }
}

/// `base` for generation 0, `base.k` for backups.
fn generation_path(base: &Path, index: usize) -> PathBuf {
    if index == 0 {
        return base.to_path_buf();
    }
    let mut name = base.as_os_str().to_os_string();
    name.push(format!(".{index}"));
    PathBuf::from(name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn read(path: &Path) -> Vec<u8> {
        std::fs::read(path).unwrap()
    }

    #[test]
    fn test_generation_path_naming() {
        let base = Path::new("/var/log/app.log");
        assert_eq!(generation_path(base, 0), Path::new("/var/log/app.log"));
        assert_eq!(generation_path(base, 1), Path::new("/var/log/app.log.1"));
        assert_eq!(generation_path(base, 12), Path::new("/var/log/app.log.12"));
    }

    #[test]
    fn test_append_below_threshold_no_rotation() {
        let dir = TempDir::new().unwrap();
        let base = dir.path().join("app.log");

        let mut writer = SizeRotatingWriter::new(&base, 100, 3).unwrap();
        writer.append(b"tiny").unwrap();
        writer.close().unwrap();

        assert!(!generation_path(&base, 1).exists());
        assert_eq!(read(&base), b"tiny");
    }

    #[test]
    fn test_rotation_ordering() {
        let dir = TempDir::new().unwrap();
        let base = dir.path().join("app.log");

        // Each record fills the file, so every append after the first
        // triggers a rotation.
        let mut writer = SizeRotatingWriter::new(&base, 2, 3).unwrap();
        writer.append(b"R1").unwrap();
        writer.append(b"R2").unwrap();
        writer.append(b"R3").unwrap();
        writer.append(b"R4").unwrap();
        writer.close().unwrap();

        assert_eq!(read(&base), b"R4");
        assert_eq!(read(&generation_path(&base, 1)), b"R3");
        assert_eq!(read(&generation_path(&base, 2)), b"R2");
        assert_eq!(read(&generation_path(&base, 3)), b"R1");
    }

    #[test]
    fn test_oldest_generation_evicted() {
        let dir = TempDir::new().unwrap();
        let base = dir.path().join("app.log");

        let mut writer = SizeRotatingWriter::new(&base, 2, 2).unwrap();
        for record in [b"R1", b"R2", b"R3", b"R4", b"R5"] {
            writer.append(record).unwrap();
        }
        writer.close().unwrap();

        // R1 and R2 were evicted; only max_files + 1 files remain.
        assert_eq!(read(&base), b"R5");
        assert_eq!(read(&generation_path(&base, 1)), b"R4");
        assert_eq!(read(&generation_path(&base, 2)), b"R3");
        assert!(!generation_path(&base, 3).exists());
    }

    #[test]
    fn test_resumes_existing_active_file() {
        let dir = TempDir::new().unwrap();
        let base = dir.path().join("app.log");

        {
            let mut writer = SizeRotatingWriter::new(&base, 100, 3).unwrap();
            writer.append(b"before|").unwrap();
            writer.close().unwrap();
        }

        let mut writer = SizeRotatingWriter::new(&base, 100, 3).unwrap();
        assert_eq!(writer.current_size(), 7);
        writer.append(b"after").unwrap();
        writer.close().unwrap();

        assert_eq!(read(&base), b"before|after");
    }

    #[test]
    fn test_resumed_size_counts_toward_rotation() {
        let dir = TempDir::new().unwrap();
        let base = dir.path().join("app.log");

        {
            let mut writer = SizeRotatingWriter::new(&base, 10, 1).unwrap();
            writer.append(b"123456789").unwrap();
            writer.close().unwrap();
        }

        // 9 resumed bytes + 2 new ones exceed max_size, forcing rotation.
        let mut writer = SizeRotatingWriter::new(&base, 10, 1).unwrap();
        writer.append(b"AB").unwrap();
        writer.close().unwrap();

        assert_eq!(read(&base), b"AB");
        assert_eq!(read(&generation_path(&base, 1)), b"123456789");
    }

    #[test]
    fn test_zero_max_files_truncates_in_place() {
        let dir = TempDir::new().unwrap();
        let base = dir.path().join("app.log");

        let mut writer = SizeRotatingWriter::new(&base, 2, 0).unwrap();
        writer.append(b"R1").unwrap();
        writer.append(b"R2").unwrap();
        writer.close().unwrap();

        assert_eq!(read(&base), b"R2");
        assert!(!generation_path(&base, 1).exists());
    }

    #[test]
    fn test_oversized_record_rejected_without_rotation() {
        let dir = TempDir::new().unwrap();
        let base = dir.path().join("app.log");

        let mut writer = SizeRotatingWriter::new(&base, 4, 2).unwrap();
        writer.append(b"R1").unwrap();

        let err = writer.append(b"too large for any file").unwrap_err();
        assert!(matches!(err, MemlogError::CapacityExceeded { .. }));

        // Rejected before rotating: the generation chain and the tracked
        // size are untouched.
        assert!(!generation_path(&base, 1).exists());
        assert_eq!(writer.current_size(), 2);
        writer.close().unwrap();
        assert_eq!(read(&base), b"R1");
    }

    #[test]
    fn test_append_after_oversized_rejection() {
        let dir = TempDir::new().unwrap();
        let base = dir.path().join("app.log");

        let mut writer = SizeRotatingWriter::new(&base, 4, 2).unwrap();
        writer.append(b"R1R1").unwrap();

        let err = writer.append(b"oversized").unwrap_err();
        assert!(matches!(err, MemlogError::CapacityExceeded { .. }));

        // The next valid append rotates exactly once; no empty generation
        // is injected and no history moves toward eviction early.
        writer.append(b"R2R2").unwrap();
        writer.close().unwrap();

        assert_eq!(read(&base), b"R2R2");
        assert_eq!(read(&generation_path(&base, 1)), b"R1R1");
        assert!(!generation_path(&base, 2).exists());
    }

    #[test]
    fn test_zero_max_size_rejected() {
        let dir = TempDir::new().unwrap();
        let err = SizeRotatingWriter::new(dir.path().join("app.log"), 0, 2).unwrap_err();
        assert!(matches!(err, MemlogError::InvalidConfig(_)));
    }

    #[test]
    fn test_rotation_closes_slack_in_backups() {
        let dir = TempDir::new().unwrap();
        let base = dir.path().join("app.log");

        let mut writer = SizeRotatingWriter::new(&base, 1024, 1).unwrap();
        writer.append(&vec![b'x'; 1000]).unwrap();
        writer.append(&vec![b'y'; 100]).unwrap();
        writer.close().unwrap();

        // The rotated-out backup holds exactly its logical content, not
        // the preallocated capacity.
        assert_eq!(
            std::fs::metadata(generation_path(&base, 1)).unwrap().len(),
            1000
        );
    }
}
