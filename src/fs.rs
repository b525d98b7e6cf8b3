//! Thin wrappers over the OS primitives the writers need.
//!
//! Everything the mapped writer and the rotation protocols touch on disk
//! goes through these five operations: preallocate, truncate, size query,
//! rename, remove. Keeping them here keeps `writer` and the rotation code
//! free of platform branches.

use std::fs::File;
use std::io;
use std::path::Path;

/// Preallocates `size` bytes for an open file.
///
/// On Linux this uses `fallocate(2)` so the space is actually reserved and
/// ENOSPC surfaces here rather than on a later page fault. Elsewhere it
/// falls back to `set_len`, which may produce a sparse file.
pub fn preallocate(file: &File, size: u64) -> io::Result<()> {
    #[cfg(target_os = "linux")]
    {
        use std::os::unix::io::AsRawFd;

        #[allow(clippy::cast_possible_wrap)]
        let result = unsafe { libc::fallocate(file.as_raw_fd(), 0, 0, size as libc::off_t) };
        if result == 0 {
            return Ok(());
        }
        // Not all filesystems support fallocate (e.g. tmpfs variants);
        // fall through to set_len.
    }

    file.set_len(size)
}

/// Truncates an open file to exactly `len` bytes.
pub fn truncate_to(file: &File, len: u64) -> io::Result<()> {
    file.set_len(len)
}

/// Returns true if a file exists at `path`.
pub fn exists(path: &Path) -> bool {
    path.exists()
}

/// Renames `src` to `target`, replacing `target` if it exists.
pub fn rename(src: &Path, target: &Path) -> io::Result<()> {
    std::fs::rename(src, target)
}

/// Removes the file at `path`.
pub fn remove(path: &Path) -> io::Result<()> {
    std::fs::remove_file(path)
}
