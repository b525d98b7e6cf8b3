//! Sink surface over the writers.
//!
//! The writers themselves hold no locks; [`FileSink`] adds the serialization
//! the single-writer contract requires, parameterized over a [`LockPolicy`]
//! so single-threaded users pay nothing for it. [`MutexLock`] gives a
//! `Sync` sink for multi-threaded use; [`NoLock`] is a `RefCell`-backed
//! policy that the compiler keeps on one thread.

use std::cell::RefCell;
use std::marker::PhantomData;
use std::sync::{Mutex, PoisonError};

use crate::daily::{DailyRotatingWriter, FilenamePolicy};
use crate::error::MemlogError;
use crate::rotating::SizeRotatingWriter;
use crate::writer::MappedWriter;

/// A formatted-record consumer: the call surface the logging framework
/// drives. Each record is an opaque, already-formatted byte span.
pub trait RecordWriter {
    /// Appends one formatted record.
    ///
    /// # Errors
    ///
    /// Any [`MemlogError`] from the underlying writer or its rotation.
    fn write_record(&mut self, record: &[u8]) -> Result<(), MemlogError>;

    /// Pushes written bytes toward stable storage.
    ///
    /// # Errors
    ///
    /// [`MemlogError::Io`] if the OS flush primitive fails.
    fn flush(&mut self) -> Result<(), MemlogError>;
}

impl RecordWriter for MappedWriter {
    fn write_record(&mut self, record: &[u8]) -> Result<(), MemlogError> {
        self.append(record)
    }

    fn flush(&mut self) -> Result<(), MemlogError> {
        MappedWriter::flush(self)
    }
}

impl RecordWriter for SizeRotatingWriter {
    fn write_record(&mut self, record: &[u8]) -> Result<(), MemlogError> {
        self.append(record)
    }

    fn flush(&mut self) -> Result<(), MemlogError> {
        SizeRotatingWriter::flush(self)
    }
}

impl<P: FilenamePolicy> RecordWriter for DailyRotatingWriter<P> {
    fn write_record(&mut self, record: &[u8]) -> Result<(), MemlogError> {
        self.append(record)
    }

    fn flush(&mut self) -> Result<(), MemlogError> {
        DailyRotatingWriter::flush(self)
    }
}

/// Serialization strategy wrapped around a writer.
///
/// Chosen at construction: a real mutex for multi-threaded sinks, or a
/// no-op cell for single-threaded ones, with no runtime cost in the
/// single-threaded case.
pub trait LockPolicy<T> {
    /// Wraps a writer in this policy.
    fn new(value: T) -> Self;

    /// Runs `f` with exclusive access to the writer.
    fn with<R>(&self, f: impl FnOnce(&mut T) -> R) -> R;
}

/// Mutex-backed policy; the resulting sink is `Sync`.
pub struct MutexLock<T>(Mutex<T>);

impl<T> LockPolicy<T> for MutexLock<T> {
    fn new(value: T) -> Self {
        Self(Mutex::new(value))
    }

    fn with<R>(&self, f: impl FnOnce(&mut T) -> R) -> R {
        // A poisoned writer is still structurally sound; keep logging.
        let mut guard = self.0.lock().unwrap_or_else(PoisonError::into_inner);
        f(&mut guard)
    }
}

/// No-op policy for single-threaded use. `RefCell` makes the sink `!Sync`,
/// so skipping the lock is enforced at compile time rather than trusted.
pub struct NoLock<T>(RefCell<T>);

impl<T> LockPolicy<T> for NoLock<T> {
    fn new(value: T) -> Self {
        Self(RefCell::new(value))
    }

    fn with<R>(&self, f: impl FnOnce(&mut T) -> R) -> R {
        f(&mut self.0.borrow_mut())
    }
}

/// A sink binding one writer to one lock policy.
///
/// `on_record` and `flush` run in a single critical section per call, so a
/// rotation can never interleave with a partial append on the same writer.
pub struct FileSink<W: RecordWriter, L: LockPolicy<W>> {
    lock: L,
    force_flush: bool,
    _writer: PhantomData<fn() -> W>,
}

impl<W: RecordWriter, L: LockPolicy<W>> FileSink<W, L> {
    /// Wraps an already-opened writer.
    pub fn new(writer: W) -> Self {
        Self {
            lock: L::new(writer),
            force_flush: false,
            _writer: PhantomData,
        }
    }

    /// Flush after every record when `force_flush` is set.
    pub fn set_force_flush(&mut self, force_flush: bool) {
        self.force_flush = force_flush;
    }

    /// Appends one formatted record under the lock policy.
    ///
    /// # Errors
    ///
    /// Any [`MemlogError`] from the wrapped writer.
    pub fn on_record(&self, record: &[u8]) -> Result<(), MemlogError> {
        self.lock.with(|writer| {
            writer.write_record(record)?;
            if self.force_flush {
                writer.flush()?;
            }
            Ok(())
        })
    }

    /// Flushes the wrapped writer under the lock policy.
    ///
    /// # Errors
    ///
    /// [`MemlogError::Io`] if the OS flush primitive fails.
    pub fn flush(&self) -> Result<(), MemlogError> {
        self.lock.with(RecordWriter::flush)
    }
}

/// Multi-threaded simple sink over a single mapped file.
pub type SimpleFileSinkMt = FileSink<MappedWriter, MutexLock<MappedWriter>>;
/// Single-threaded simple sink over a single mapped file.
pub type SimpleFileSinkSt = FileSink<MappedWriter, NoLock<MappedWriter>>;
/// Multi-threaded sink with size-based numbered rotation.
pub type RotatingFileSinkMt = FileSink<SizeRotatingWriter, MutexLock<SizeRotatingWriter>>;
/// Single-threaded sink with size-based numbered rotation.
pub type RotatingFileSinkSt = FileSink<SizeRotatingWriter, NoLock<SizeRotatingWriter>>;
/// Multi-threaded sink with daily rotation.
pub type DailyFileSinkMt = FileSink<DailyRotatingWriter, MutexLock<DailyRotatingWriter>>;
/// Single-threaded sink with daily rotation.
pub type DailyFileSinkSt = FileSink<DailyRotatingWriter, NoLock<DailyRotatingWriter>>;
