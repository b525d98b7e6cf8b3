//! # memlog
//!
//! Low-overhead append-only log writing over a preallocated, memory-mapped
//! file, with size-based numbered rotation and daily time-of-day rotation
//! built on top.
//!
//! The core is [`MappedWriter`]: it reserves a fixed capacity on disk, maps
//! it, and turns every append into a plain memory copy. The physical file
//! stays at the preallocated capacity while the writer is open and is
//! shrunk to the bytes actually written on close, so no slack space leaks.
//!
//! Records are opaque, already-formatted byte spans; nothing here parses
//! log content.
//!
//! # Example
//!
//! ```no_run
//! use memlog::{SizeRotatingWriter, MemlogError};
//!
//! fn main() -> Result<(), MemlogError> {
//!     // app.log, app.log.1, app.log.2, app.log.3; 10 MiB per generation.
//!     let mut log = SizeRotatingWriter::new("app.log", 10 * 1024 * 1024, 3)?;
//!     log.append(b"starting up\n")?;
//!     log.flush()?;
//!     log.close()
//! }
//! ```
//!
//! For shared use, wrap a writer in a [`sink::FileSink`] with the lock
//! policy matching your threading model; the writers themselves are not
//! internally synchronized.

#![deny(missing_docs)]
#![warn(clippy::all, clippy::pedantic)]

pub mod daily;
pub mod error;
mod fs;
pub mod rotating;
pub mod sink;
pub mod writer;

pub use daily::{DailyRotatingWriter, DateFilenamePolicy, FilenamePolicy};
pub use error::MemlogError;
pub use rotating::SizeRotatingWriter;
pub use sink::{FileSink, LockPolicy, MutexLock, NoLock, RecordWriter};
pub use writer::{MappedWriter, RetryPolicy, DEFAULT_CAPACITY};
