// ── Directory enumeration ─────────────────────────────────────────────────────

#![allow(unsafe_code)]

use std::path::Path;

use serde::Serialize;
use tracing::warn;
use windows::Win32::{
    Foundation::HANDLE,
    Storage::FileSystem::{FindClose, FindFirstFileW, FindNextFileW, WIN32_FIND_DATAW},
};

use super::flags::FileAttributes;
use crate::{
    error::{codes, Result, ResultExt},
    marshal::{from_wide, WString},
    time::FileTime,
};

/// One directory entry.
#[derive(Debug, Clone, Serialize)]
pub struct FindData {
    pub name: String,
    /// 8.3 name, empty when the volume has none.
    pub alternate_name: String,
    #[serde(serialize_with = "serialize_bits")]
    pub attributes: FileAttributes,
    pub size: u64,
    pub created: FileTime,
    pub accessed: FileTime,
    pub written: FileTime,
}

fn serialize_bits<S: serde::Serializer>(a: &FileAttributes, s: S) -> std::result::Result<S::Ok, S::Error> {
    s.serialize_u32(a.bits())
}

impl FindData {
    pub fn is_dir(&self) -> bool {
        self.attributes.is_dir()
    }

    fn from_raw(d: &WIN32_FIND_DATAW) -> Self {
        Self {
            name: from_wide(&d.cFileName),
            alternate_name: from_wide(&d.cAlternateFileName),
            attributes: FileAttributes::from_bits_retain(d.dwFileAttributes),
            size: (u64::from(d.nFileSizeHigh) << 32) | u64::from(d.nFileSizeLow),
            created: d.ftCreationTime.into(),
            accessed: d.ftLastAccessTime.into(),
            written: d.ftLastWriteTime.into(),
        }
    }

    fn is_dot_entry(&self) -> bool {
        self.name == "." || self.name == ".."
    }
}

/// Iterator over the matches of a `FindFirstFileW` pattern.
///
/// `FindClose` runs on drop.  An I/O error is yielded once and ends the
/// iteration.
pub struct FindFiles {
    handle: Option<HANDLE>,
    pending: Option<WIN32_FIND_DATAW>,
}

/// Start enumerating `pattern` (e.g. `C:\dir\*.txt`).
///
/// A pattern that matches nothing yields an empty iterator rather than
/// `ERROR_FILE_NOT_FOUND`.
pub fn find(pattern: impl AsRef<Path>) -> Result<FindFiles> {
    let wpattern = WString::from_path(pattern.as_ref())?;
    let mut data = WIN32_FIND_DATAW::default();
    // SAFETY: wpattern is NUL-terminated; `data` is a valid out-pointer.
    match unsafe { FindFirstFileW(wpattern.as_pcwstr(), &mut data) }.context("FindFirstFileW") {
        Ok(h) => Ok(FindFiles {
            handle: Some(h),
            pending: Some(data),
        }),
        Err(e) if e.is_win32(codes::ERROR_FILE_NOT_FOUND) => Ok(FindFiles {
            handle: None,
            pending: None,
        }),
        Err(e) => Err(e),
    }
}

impl FindFiles {
    fn advance(&mut self) -> Option<Result<WIN32_FIND_DATAW>> {
        if let Some(d) = self.pending.take() {
            return Some(Ok(d));
        }
        let h = self.handle?;
        let mut data = WIN32_FIND_DATAW::default();
        // SAFETY: `h` is an open find handle; `data` is a valid out-pointer.
        match unsafe { FindNextFileW(h, &mut data) }.context("FindNextFileW") {
            Ok(()) => Some(Ok(data)),
            Err(e) => {
                self.close();
                if e.is_win32(codes::ERROR_NO_MORE_FILES) {
                    None
                } else {
                    Some(Err(e))
                }
            }
        }
    }

    fn close(&mut self) {
        if let Some(h) = self.handle.take() {
            // SAFETY: `h` came from FindFirstFileW and is closed exactly once
            // because `take` clears the slot.
            if let Err(e) = unsafe { FindClose(h) } {
                warn!(error = %e, "FindClose failed");
            }
        }
    }
}

impl Iterator for FindFiles {
    type Item = Result<FindData>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            match self.advance()? {
                Ok(raw) => {
                    let entry = FindData::from_raw(&raw);
                    if !entry.is_dot_entry() {
                        return Some(Ok(entry));
                    }
                }
                Err(e) => return Some(Err(e)),
            }
        }
    }
}

impl Drop for FindFiles {
    fn drop(&mut self) {
        self.close();
    }
}

/// Collect every entry of `dir` (pattern `dir\*`).
pub fn read_dir(dir: impl AsRef<Path>) -> Result<Vec<FindData>> {
    find(dir.as_ref().join("*"))?.collect()
}
