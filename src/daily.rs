//! Time-of-day triggered rotation.
//!
//! One file per period. At a configured wall-clock boundary the writer
//! switches to a fresh filename produced by a [`FilenamePolicy`]; the
//! previous period's file is left behind untouched.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Days, Local, NaiveTime, TimeZone};
use tracing::debug;

use crate::error::MemlogError;
use crate::writer::{MappedWriter, RetryPolicy, DEFAULT_CAPACITY};

/// Produces the filename for a rotation period.
///
/// Called once at open and once per rotation. Successive periods must map
/// to distinct names or the new period would resume the old file.
pub trait FilenamePolicy {
    /// Filename for the period containing `now`, derived from `base`.
    fn compute_filename(&self, base: &Path, now: DateTime<Local>) -> PathBuf;
}

/// Default policy: inserts the date before the extension, so
/// `app.log` becomes `app_2026-08-30.log`.
#[derive(Debug, Clone, Copy, Default)]
pub struct DateFilenamePolicy;

impl FilenamePolicy for DateFilenamePolicy {
    fn compute_filename(&self, base: &Path, now: DateTime<Local>) -> PathBuf {
        let date = now.format("%Y-%m-%d");
        let stem = base
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        let name = match base.extension() {
            Some(ext) => format!("{stem}_{date}.{}", ext.to_string_lossy()),
            None => format!("{stem}_{date}"),
        };
        base.with_file_name(name)
    }
}

/// Append writer that rotates to a new file at `rotation_hour:rotation_minute`
/// local time every day.
pub struct DailyRotatingWriter<P: FilenamePolicy = DateFilenamePolicy> {
    base_path: PathBuf,
    rotation_time: NaiveTime,
    next_rotation: DateTime<Local>,
    capacity: usize,
    policy: P,
    writer: MappedWriter,
}

impl DailyRotatingWriter<DateFilenamePolicy> {
    /// Opens the current period's file with the default filename policy and
    /// capacity.
    ///
    /// # Errors
    ///
    /// [`MemlogError::InvalidConfig`] if the rotation time is out of range
    /// (checked before any file I/O), or any [`MemlogError::Open`] failure.
    pub fn new(
        base_path: impl AsRef<Path>,
        rotation_hour: i32,
        rotation_minute: i32,
    ) -> Result<Self, MemlogError> {
        Self::with_policy(
            base_path,
            rotation_hour,
            rotation_minute,
            DEFAULT_CAPACITY,
            DateFilenamePolicy,
            RetryPolicy::default(),
        )
    }
}

impl<P: FilenamePolicy> DailyRotatingWriter<P> {
    /// Fully parameterized constructor.
    ///
    /// # Errors
    ///
    /// Same as [`DailyRotatingWriter::new`], plus
    /// [`MemlogError::InvalidConfig`] for a zero capacity.
    pub fn with_policy(
        base_path: impl AsRef<Path>,
        rotation_hour: i32,
        rotation_minute: i32,
        capacity: usize,
        policy: P,
        retry: RetryPolicy,
    ) -> Result<Self, MemlogError> {
        let rotation_time = rotation_time(rotation_hour, rotation_minute)?;

        let base_path = base_path.as_ref().to_path_buf();
        let now = Local::now();
        let mut writer = MappedWriter::with_retry(retry);
        writer.open(policy.compute_filename(&base_path, now), capacity, false)?;

        Ok(Self {
            base_path,
            rotation_time,
            next_rotation: next_rotation_after(now, rotation_time),
            capacity,
            policy,
            writer,
        })
    }

    /// Appends one record, switching to the new period's file first if the
    /// rotation instant has passed.
    ///
    /// A filename-policy collision or reopen failure during rotation is
    /// fatal and propagates; the writer does not fall back to the previous
    /// period's file.
    ///
    /// # Errors
    ///
    /// Any error from the underlying writer.
    pub fn append(&mut self, record: &[u8]) -> Result<(), MemlogError> {
        let now = Local::now();
        if now >= self.next_rotation {
            let name = self.policy.compute_filename(&self.base_path, now);
            debug!(path = %name.display(), "rotating to new period file");
            self.writer.open(&name, self.capacity, false)?;
            self.next_rotation = next_rotation_after(now, self.rotation_time);
        }
        self.writer.append(record)
    }

    /// Requests the mapped pages be pushed toward stable storage.
    ///
    /// # Errors
    ///
    /// [`MemlogError::Io`] if the OS flush primitive fails.
    pub fn flush(&mut self) -> Result<(), MemlogError> {
        self.writer.flush()
    }

    /// Closes the current period's file, shrinking it to its logical size.
    ///
    /// # Errors
    ///
    /// [`MemlogError::Io`] if the flush or truncate fails.
    pub fn close(&mut self) -> Result<(), MemlogError> {
        self.writer.close()
    }

    /// The next wall-clock instant a rotation is due.
    #[must_use]
    pub fn next_rotation(&self) -> DateTime<Local> {
        self.next_rotation
    }

    /// Path of the current period's file.
    #[must_use]
    pub fn current_filename(&self) -> &Path {
        self.writer.filename()
    }
}

impl<P: FilenamePolicy> std::fmt::Debug for DailyRotatingWriter<P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DailyRotatingWriter")
            .field("base_path", &self.base_path)
            .field("rotation_time", &self.rotation_time)
            .field("next_rotation", &self.next_rotation)
            .finish_non_exhaustive()
    }
}

/// Validates the configured rotation time.
fn rotation_time(hour: i32, minute: i32) -> Result<NaiveTime, MemlogError> {
    let (Ok(hour), Ok(minute)) = (u32::try_from(hour), u32::try_from(minute)) else {
        return Err(MemlogError::InvalidConfig(format!(
            "rotation time {hour}:{minute} is out of range"
        )));
    };
    NaiveTime::from_hms_opt(hour, minute, 0).ok_or_else(|| {
        MemlogError::InvalidConfig(format!("rotation time {hour}:{minute} is out of range"))
    })
}

/// First instant strictly after `now` whose local time-of-day is `at`.
///
/// Today's instant if it is still ahead, otherwise the same time-of-day on
/// the following day. Around DST transitions the earliest valid
/// interpretation wins; a day whose wall-clock time does not exist is
/// skipped.
fn next_rotation_after(now: DateTime<Local>, at: NaiveTime) -> DateTime<Local> {
    for day_offset in 0..3 {
        let Some(date) = now.date_naive().checked_add_days(Days::new(day_offset)) else {
            break;
        };
        if let Some(tp) = Local
            .from_local_datetime(&date.and_time(at))
            .earliest()
            .filter(|tp| *tp > now)
        {
            return tp;
        }
    }
    // Unreachable for any real clock; keeps the invariant "strictly in the
    // future" even at the end of representable time.
    now + chrono::Duration::hours(24)
}
