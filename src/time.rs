// ── FILETIME conversion ───────────────────────────────────────────────────────
//
// A FILETIME is a 64-bit count of 100-ns intervals since 1601-01-01 UTC,
// split across two DWORDs.  The same layout doubles as an interval for
// process and thread CPU times.

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use serde::Serialize;

/// 100-ns intervals between 1601-01-01 and 1970-01-01.
const UNIX_EPOCH_TICKS: u64 = 116_444_736_000_000_000;

const TICKS_PER_SEC: u64 = 10_000_000;

/// The largest tick count `SystemTime` holds on every platform (Windows
/// stores it as signed 100-ns intervals).
const MAX_TICKS: u64 = i64::MAX as u64;

/// A Win32 `FILETIME` as a single 64-bit tick count.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct FileTime(pub u64);

impl FileTime {
    pub fn from_parts(low: u32, high: u32) -> Self {
        Self((u64::from(high) << 32) | u64::from(low))
    }

    /// `(dwLowDateTime, dwHighDateTime)`
    pub fn to_parts(self) -> (u32, u32) {
        (self.0 as u32, (self.0 >> 32) as u32)
    }

    /// Interpret the value as an absolute timestamp.  Values of 2^63 ticks
    /// and above are clamped to 2^63 - 1 (about the year 30828).
    pub fn to_system_time(self) -> SystemTime {
        let ticks = self.0.min(MAX_TICKS);
        if ticks >= UNIX_EPOCH_TICKS {
            UNIX_EPOCH + ticks_to_duration(ticks - UNIX_EPOCH_TICKS)
        } else {
            UNIX_EPOCH - ticks_to_duration(UNIX_EPOCH_TICKS - self.0)
        }
    }

    /// `None` for instants before 1601 or beyond the 64-bit tick range.
    pub fn from_system_time(t: SystemTime) -> Option<Self> {
        match t.duration_since(UNIX_EPOCH) {
            Ok(after) => duration_to_ticks(after)?.checked_add(UNIX_EPOCH_TICKS).map(Self),
            Err(before) => UNIX_EPOCH_TICKS
                .checked_sub(duration_to_ticks(before.duration())?)
                .map(Self),
        }
    }

    /// Interpret the value as an interval (CPU time, timeouts).
    pub fn as_duration(self) -> Duration {
        ticks_to_duration(self.0)
    }
}

fn ticks_to_duration(ticks: u64) -> Duration {
    Duration::new(ticks / TICKS_PER_SEC, ((ticks % TICKS_PER_SEC) * 100) as u32)
}

fn duration_to_ticks(d: Duration) -> Option<u64> {
    d.as_secs()
        .checked_mul(TICKS_PER_SEC)?
        .checked_add(u64::from(d.subsec_nanos() / 100))
}

#[cfg(windows)]
impl From<windows::Win32::Foundation::FILETIME> for FileTime {
    fn from(ft: windows::Win32::Foundation::FILETIME) -> Self {
        Self::from_parts(ft.dwLowDateTime, ft.dwHighDateTime)
    }
}

#[cfg(windows)]
impl From<FileTime> for windows::Win32::Foundation::FILETIME {
    fn from(ft: FileTime) -> Self {
        let (low, high) = ft.to_parts();
        Self {
            dwLowDateTime: low,
            dwHighDateTime: high,
        }
    }
}
