// ── Files ─────────────────────────────────────────────────────────────────────
//
// `HFILE` owns a handle from `CreateFileW` and performs synchronous I/O on
// it.  `OpenOptions` is the only way to create one; the free functions cover
// the path-level operations that need no open handle.

#![allow(unsafe_code)]

use std::{
    io,
    path::{Path, PathBuf},
};

use tracing::trace;
use windows::Win32::{
    Foundation::{BOOL, FILETIME, HANDLE},
    Storage::FileSystem::{
        CopyFileW, CreateDirectoryW, CreateFileW, DeleteFileW, FlushFileBuffers,
        GetFileAttributesW, GetFileSizeEx, GetFileTime, GetTempFileNameW, GetTempPathW,
        LockFile, MoveFileExW, ReadFile, RemoveDirectoryW, SetEndOfFile, SetFilePointerEx,
        SetFileTime, UnlockFile, WriteFile, FILE_BEGIN, FILE_CREATION_DISPOSITION, FILE_CURRENT,
        FILE_END, FILE_FLAGS_AND_ATTRIBUTES, FILE_SHARE_MODE, MOVEFILE_COPY_ALLOWED,
        MOVEFILE_REPLACE_EXISTING, MOVE_FILE_FLAGS,
    },
};

use super::flags::{Disposition, FileAccess, FileAttributes, FileFlags, ShareMode};
use crate::{
    error::{Error, Result, ResultExt},
    handle::{KernelHandle, OwnedHandle},
    marshal::{WString, WideBuf},
    time::FileTime,
};

// ── OpenOptions ───────────────────────────────────────────────────────────────

/// Builder for `CreateFileW`.
///
/// Defaults: read access, shared for read and write, `OpenExisting`,
/// `FileAttributes::NORMAL`, no flags.
#[derive(Debug, Clone)]
pub struct OpenOptions {
    read: bool,
    write: bool,
    append: bool,
    share: ShareMode,
    disposition: Disposition,
    attributes: FileAttributes,
    flags: FileFlags,
}

impl Default for OpenOptions {
    fn default() -> Self {
        Self {
            read: true,
            write: false,
            append: false,
            share: ShareMode::READ | ShareMode::WRITE,
            disposition: Disposition::OpenExisting,
            attributes: FileAttributes::NORMAL,
            flags: FileFlags::empty(),
        }
    }
}

impl OpenOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn read(&mut self, read: bool) -> &mut Self {
        self.read = read;
        self
    }

    pub fn write(&mut self, write: bool) -> &mut Self {
        self.write = write;
        self
    }

    /// Implies `write`; the cursor starts at the end of the file.
    pub fn append(&mut self, append: bool) -> &mut Self {
        self.append = append;
        self
    }

    pub fn share(&mut self, share: ShareMode) -> &mut Self {
        self.share = share;
        self
    }

    pub fn disposition(&mut self, disposition: Disposition) -> &mut Self {
        self.disposition = disposition;
        self
    }

    pub fn attributes(&mut self, attributes: FileAttributes) -> &mut Self {
        self.attributes = attributes;
        self
    }

    pub fn flags(&mut self, flags: FileFlags) -> &mut Self {
        self.flags = flags;
        self
    }

    fn access(&self) -> FileAccess {
        let mut access = FileAccess::empty();
        if self.read {
            access |= FileAccess::GENERIC_READ;
        }
        if self.write || self.append {
            access |= FileAccess::GENERIC_WRITE;
        }
        access
    }

    pub fn open(&self, path: impl AsRef<Path>) -> Result<HFILE> {
        let path = path.as_ref();
        let wpath = WString::from_path(path)?;
        let access = self.access();
        // SAFETY: wpath is NUL-terminated and outlives the call; no security
        // attributes and no template handle are passed.
        let h = unsafe {
            CreateFileW(
                wpath.as_pcwstr(),
                access.bits(),
                FILE_SHARE_MODE(self.share.bits()),
                None,
                FILE_CREATION_DISPOSITION(self.disposition as u32),
                FILE_FLAGS_AND_ATTRIBUTES(self.attributes.bits() | self.flags.bits()),
                HANDLE::default(),
            )
        }
        .context("CreateFileW")?;
        let file = HFILE(OwnedHandle::from_raw(h, "CreateFileW")?);
        trace!(path = %path.display(), ?access, disposition = ?self.disposition, "opened file");
        if self.append {
            file.seek(io::SeekFrom::End(0))?;
        }
        Ok(file)
    }
}

// ── HFILE ─────────────────────────────────────────────────────────────────────

/// Creation, last-access and last-write times.  `None` fields are left
/// untouched by [`HFILE::set_times`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FileTimes {
    pub created: Option<FileTime>,
    pub accessed: Option<FileTime>,
    pub written: Option<FileTime>,
}

/// An open file handle.
#[derive(Debug)]
pub struct HFILE(OwnedHandle);

impl KernelHandle for HFILE {
    fn raw(&self) -> HANDLE {
        self.0.raw()
    }
}

impl HFILE {
    /// Open an existing file for reading.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        OpenOptions::new().open(path)
    }

    /// Create or truncate a file for writing.
    pub fn create(path: impl AsRef<Path>) -> Result<Self> {
        OpenOptions::new()
            .read(false)
            .write(true)
            .disposition(Disposition::CreateAlways)
            .open(path)
    }

    pub fn try_clone(&self) -> Result<Self> {
        self.0.try_clone().map(Self)
    }

    pub fn read(&self, buf: &mut [u8]) -> Result<usize> {
        let mut n = 0u32;
        let len = buf.len().min(u32::MAX as usize);
        // SAFETY: the slice bounds the write; `n` is a valid out-pointer and
        // no OVERLAPPED is used.
        unsafe { ReadFile(self.raw(), Some(&mut buf[..len]), Some(&mut n as *mut u32), None) }
            .context("ReadFile")?;
        Ok(n as usize)
    }

    pub fn write(&self, buf: &[u8]) -> Result<usize> {
        let mut n = 0u32;
        let len = buf.len().min(u32::MAX as usize);
        // SAFETY: as for ReadFile; the slice is only read.
        unsafe { WriteFile(self.raw(), Some(&buf[..len]), Some(&mut n as *mut u32), None) }
            .context("WriteFile")?;
        Ok(n as usize)
    }

    /// Move the cursor (`SetFilePointerEx`); returns the new position.
    pub fn seek(&self, pos: io::SeekFrom) -> Result<u64> {
        let (distance, method) = match pos {
            io::SeekFrom::Start(n) => {
                let n = i64::try_from(n).map_err(|_| Error::Unsupported("seek offset above i64::MAX"))?;
                (n, FILE_BEGIN)
            }
            io::SeekFrom::Current(n) => (n, FILE_CURRENT),
            io::SeekFrom::End(n) => (n, FILE_END),
        };
        let mut new_pos = 0i64;
        // SAFETY: `new_pos` is a valid out-pointer.
        unsafe { SetFilePointerEx(self.raw(), distance, Some(&mut new_pos as *mut i64), method) }
            .context("SetFilePointerEx")?;
        Ok(new_pos as u64)
    }

    pub fn size(&self) -> Result<u64> {
        let mut size = 0i64;
        // SAFETY: `size` is a valid out-pointer.
        unsafe { GetFileSizeEx(self.raw(), &mut size) }.context("GetFileSizeEx")?;
        Ok(size as u64)
    }

    /// Truncate or extend to `len` bytes.  The cursor is restored afterwards
    /// (clamped to the new length).
    pub fn set_len(&self, len: u64) -> Result<()> {
        let pos = self.seek(io::SeekFrom::Current(0))?;
        self.seek(io::SeekFrom::Start(len))?;
        // SAFETY: the handle is open for writing or the call fails cleanly.
        unsafe { SetEndOfFile(self.raw()) }.context("SetEndOfFile")?;
        self.seek(io::SeekFrom::Start(pos.min(len)))?;
        Ok(())
    }

    pub fn flush(&self) -> Result<()> {
        // SAFETY: plain handle argument.
        unsafe { FlushFileBuffers(self.raw()) }.context("FlushFileBuffers")
    }

    /// Byte-range lock (`LockFile`); fails immediately if any part of the
    /// range is already locked.
    pub fn lock(&self, offset: u64, len: u64) -> Result<()> {
        let (off_lo, off_hi) = split(offset);
        let (len_lo, len_hi) = split(len);
        // SAFETY: plain integer arguments.
        unsafe { LockFile(self.raw(), off_lo, off_hi, len_lo, len_hi) }.context("LockFile")
    }

    pub fn unlock(&self, offset: u64, len: u64) -> Result<()> {
        let (off_lo, off_hi) = split(offset);
        let (len_lo, len_hi) = split(len);
        // SAFETY: plain integer arguments.
        unsafe { UnlockFile(self.raw(), off_lo, off_hi, len_lo, len_hi) }.context("UnlockFile")
    }

    pub fn times(&self) -> Result<FileTimes> {
        let (mut c, mut a, mut w) = (FILETIME::default(), FILETIME::default(), FILETIME::default());
        // SAFETY: three valid out-pointers.
        unsafe {
            GetFileTime(
                self.raw(),
                Some(&mut c as *mut FILETIME),
                Some(&mut a as *mut FILETIME),
                Some(&mut w as *mut FILETIME),
            )
        }
            .context("GetFileTime")?;
        Ok(FileTimes {
            created: Some(c.into()),
            accessed: Some(a.into()),
            written: Some(w.into()),
        })
    }

    pub fn set_times(&self, times: &FileTimes) -> Result<()> {
        let c = times.created.map(FILETIME::from);
        let a = times.accessed.map(FILETIME::from);
        let w = times.written.map(FILETIME::from);
        // SAFETY: each pointer is NULL (leave unchanged) or points at a local
        // that outlives the call.
        unsafe {
            SetFileTime(
                self.raw(),
                c.as_ref().map(|t| t as *const FILETIME),
                a.as_ref().map(|t| t as *const FILETIME),
                w.as_ref().map(|t| t as *const FILETIME),
            )
        }
        .context("SetFileTime")
    }
}

fn split(v: u64) -> (u32, u32) {
    (v as u32, (v >> 32) as u32)
}

impl io::Read for HFILE {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        HFILE::read(self, buf).map_err(io::Error::from)
    }
}

impl io::Write for HFILE {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        HFILE::write(self, buf).map_err(io::Error::from)
    }

    fn flush(&mut self) -> io::Result<()> {
        HFILE::flush(self).map_err(io::Error::from)
    }
}

impl io::Seek for HFILE {
    fn seek(&mut self, pos: io::SeekFrom) -> io::Result<u64> {
        HFILE::seek(self, pos).map_err(io::Error::from)
    }
}

// ── Path operations ───────────────────────────────────────────────────────────

/// `GetFileAttributesW`
pub fn attributes(path: impl AsRef<Path>) -> Result<FileAttributes> {
    let wpath = WString::from_path(path.as_ref())?;
    // SAFETY: wpath is NUL-terminated.
    let bits = unsafe { GetFileAttributesW(wpath.as_pcwstr()) };
    if bits == FileAttributes::INVALID {
        Err(Error::last("GetFileAttributesW"))
    } else {
        Ok(FileAttributes::from_bits_retain(bits))
    }
}

pub fn exists(path: impl AsRef<Path>) -> bool {
    attributes(path).is_ok()
}

pub fn delete(path: impl AsRef<Path>) -> Result<()> {
    let wpath = WString::from_path(path.as_ref())?;
    // SAFETY: wpath is NUL-terminated.
    unsafe { DeleteFileW(wpath.as_pcwstr()) }.context("DeleteFileW")
}

/// `CopyFileW`; with `fail_if_exists` an existing target is an error
/// (`ERROR_FILE_EXISTS`).
pub fn copy(from: impl AsRef<Path>, to: impl AsRef<Path>, fail_if_exists: bool) -> Result<()> {
    let wfrom = WString::from_path(from.as_ref())?;
    let wto = WString::from_path(to.as_ref())?;
    // SAFETY: both strings are NUL-terminated and outlive the call.
    unsafe { CopyFileW(wfrom.as_pcwstr(), wto.as_pcwstr(), BOOL::from(fail_if_exists)) }
        .context("CopyFileW")
}

/// `MoveFileExW`.  With `replace`, an existing target is overwritten and the
/// move may cross volumes.
pub fn rename(from: impl AsRef<Path>, to: impl AsRef<Path>, replace: bool) -> Result<()> {
    let wfrom = WString::from_path(from.as_ref())?;
    let wto = WString::from_path(to.as_ref())?;
    let flags = if replace {
        MOVEFILE_REPLACE_EXISTING | MOVEFILE_COPY_ALLOWED
    } else {
        MOVE_FILE_FLAGS(0)
    };
    // SAFETY: both strings are NUL-terminated and outlive the call.
    unsafe { MoveFileExW(wfrom.as_pcwstr(), wto.as_pcwstr(), flags) }.context("MoveFileExW")
}

pub fn create_dir(path: impl AsRef<Path>) -> Result<()> {
    let wpath = WString::from_path(path.as_ref())?;
    // SAFETY: wpath is NUL-terminated; default security.
    unsafe { CreateDirectoryW(wpath.as_pcwstr(), None) }.context("CreateDirectoryW")
}

/// Remove an empty directory.
pub fn remove_dir(path: impl AsRef<Path>) -> Result<()> {
    let wpath = WString::from_path(path.as_ref())?;
    // SAFETY: wpath is NUL-terminated.
    unsafe { RemoveDirectoryW(wpath.as_pcwstr()) }.context("RemoveDirectoryW")
}

/// `GetTempPathW`; the result ends with a backslash.
pub fn temp_dir() -> Result<PathBuf> {
    WideBuf::fill(261, |buf| {
        // SAFETY: the slice carries the buffer length.
        let n = unsafe { GetTempPathW(Some(buf)) };
        if n == 0 {
            Err(Error::last("GetTempPathW"))
        } else {
            Ok(n)
        }
    })
    .map(PathBuf::from)
}

/// `GetTempFileNameW`: creates an empty, uniquely named file in `dir` and
/// returns its path.  Only the first three characters of `prefix` are used.
pub fn temp_file_name(dir: impl AsRef<Path>, prefix: &str) -> Result<PathBuf> {
    let wdir = WString::from_path(dir.as_ref())?;
    let wprefix = WString::new(prefix)?;
    let mut buf = [0u16; 260];
    // SAFETY: both inputs are NUL-terminated; `buf` is MAX_PATH units as the
    // API requires.
    let n = unsafe { GetTempFileNameW(wdir.as_pcwstr(), wprefix.as_pcwstr(), 0, &mut buf) };
    if n == 0 {
        return Err(Error::last("GetTempFileNameW"));
    }
    Ok(PathBuf::from(crate::marshal::from_wide(&buf)))
}

// ── Tests ─────────────────────────────────────────────────────────────────────
