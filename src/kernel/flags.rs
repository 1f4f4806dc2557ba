// ── kernel32 constants ────────────────────────────────────────────────────────
//
// Flag sets and enumerations with their Win32 numeric values.  Pure Rust;
// the FFI modules convert them into the `windows` crate newtypes at the call
// site (`FILE_SHARE_MODE(bits)`, …).

use bitflags::bitflags;
use serde::Serialize;

bitflags! {
    /// `dwDesiredAccess` for `CreateFileW`.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct FileAccess: u32 {
        const APPEND_DATA     = 0x0000_0004;
        const DELETE          = 0x0001_0000;
        const SYNCHRONIZE     = 0x0010_0000;
        const GENERIC_ALL     = 0x1000_0000;
        const GENERIC_EXECUTE = 0x2000_0000;
        const GENERIC_WRITE   = 0x4000_0000;
        const GENERIC_READ    = 0x8000_0000;
    }

    /// `FILE_SHARE_*`
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct ShareMode: u32 {
        const READ   = 0x1;
        const WRITE  = 0x2;
        const DELETE = 0x4;
    }

    /// `FILE_ATTRIBUTE_*`
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct FileAttributes: u32 {
        const READONLY            = 0x0000_0001;
        const HIDDEN              = 0x0000_0002;
        const SYSTEM              = 0x0000_0004;
        const DIRECTORY           = 0x0000_0010;
        const ARCHIVE             = 0x0000_0020;
        const DEVICE              = 0x0000_0040;
        const NORMAL              = 0x0000_0080;
        const TEMPORARY           = 0x0000_0100;
        const SPARSE_FILE         = 0x0000_0200;
        const REPARSE_POINT       = 0x0000_0400;
        const COMPRESSED          = 0x0000_0800;
        const OFFLINE             = 0x0000_1000;
        const NOT_CONTENT_INDEXED = 0x0000_2000;
        const ENCRYPTED           = 0x0000_4000;
    }

    /// `FILE_FLAG_*` (overlapped I/O is deliberately absent).
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct FileFlags: u32 {
        const OPEN_REPARSE_POINT = 0x0020_0000;
        const POSIX_SEMANTICS    = 0x0100_0000;
        const BACKUP_SEMANTICS   = 0x0200_0000;
        const DELETE_ON_CLOSE    = 0x0400_0000;
        const SEQUENTIAL_SCAN    = 0x0800_0000;
        const RANDOM_ACCESS      = 0x1000_0000;
        const NO_BUFFERING       = 0x2000_0000;
        const WRITE_THROUGH      = 0x8000_0000;
    }

    /// `PROCESS_*` access rights.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct ProcessAccess: u32 {
        const TERMINATE                 = 0x0000_0001;
        const CREATE_THREAD             = 0x0000_0002;
        const VM_OPERATION              = 0x0000_0008;
        const VM_READ                   = 0x0000_0010;
        const VM_WRITE                  = 0x0000_0020;
        const DUP_HANDLE                = 0x0000_0040;
        const CREATE_PROCESS            = 0x0000_0080;
        const SET_QUOTA                 = 0x0000_0100;
        const SET_INFORMATION           = 0x0000_0200;
        const QUERY_INFORMATION         = 0x0000_0400;
        const SUSPEND_RESUME            = 0x0000_0800;
        const QUERY_LIMITED_INFORMATION = 0x0000_1000;
        const SYNCHRONIZE               = 0x0010_0000;
        const ALL_ACCESS                = 0x001F_FFFF;
    }

    /// `THREAD_*` access rights.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct ThreadAccess: u32 {
        const TERMINATE                 = 0x0000_0001;
        const SUSPEND_RESUME            = 0x0000_0002;
        const GET_CONTEXT               = 0x0000_0008;
        const SET_CONTEXT               = 0x0000_0010;
        const SET_INFORMATION           = 0x0000_0020;
        const QUERY_INFORMATION         = 0x0000_0040;
        const SET_THREAD_TOKEN          = 0x0000_0080;
        const IMPERSONATE               = 0x0000_0100;
        const DIRECT_IMPERSONATION      = 0x0000_0200;
        const QUERY_LIMITED_INFORMATION = 0x0000_0800;
        const SYNCHRONIZE               = 0x0010_0000;
        const ALL_ACCESS                = 0x001F_FFFF;
    }

    /// `dwCreationFlags` for `CreateProcessW`.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct CreationFlags: u32 {
        const DEBUG_PROCESS              = 0x0000_0001;
        const CREATE_SUSPENDED           = 0x0000_0004;
        const DETACHED_PROCESS           = 0x0000_0008;
        const CREATE_NEW_CONSOLE         = 0x0000_0010;
        const CREATE_NEW_PROCESS_GROUP   = 0x0000_0200;
        const CREATE_UNICODE_ENVIRONMENT = 0x0000_0400;
        const CREATE_NO_WINDOW           = 0x0800_0000;
    }

    /// `TH32CS_*`
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct SnapshotFlags: u32 {
        const HEAPLIST = 0x0000_0001;
        const PROCESS  = 0x0000_0002;
        const THREAD   = 0x0000_0004;
        const MODULE   = 0x0000_0008;
        const MODULE32 = 0x0000_0010;
        const INHERIT  = 0x8000_0000;
    }

    /// `FILE_MAP_*`
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct MapAccess: u32 {
        const COPY    = 0x0000_0001;
        const WRITE   = 0x0000_0002;
        const READ    = 0x0000_0004;
        const EXECUTE = 0x0000_0020;
        const ALL     = 0x000F_001F;
    }

    /// `LOAD_LIBRARY_*` / `DONT_RESOLVE_DLL_REFERENCES`
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct LoadFlags: u32 {
        const DONT_RESOLVE_DLL_REFERENCES = 0x0000_0001;
        const AS_DATAFILE                 = 0x0000_0002;
        const WITH_ALTERED_SEARCH_PATH    = 0x0000_0008;
        const AS_IMAGE_RESOURCE           = 0x0000_0020;
        const AS_DATAFILE_EXCLUSIVE       = 0x0000_0040;
        const SEARCH_DLL_LOAD_DIR         = 0x0000_0100;
        const SEARCH_APPLICATION_DIR      = 0x0000_0200;
        const SEARCH_SYSTEM32             = 0x0000_0800;
        const SEARCH_DEFAULT_DIRS         = 0x0000_1000;
    }
}

impl FileAttributes {
    /// `INVALID_FILE_ATTRIBUTES`, returned by `GetFileAttributesW` on failure.
    pub const INVALID: u32 = u32::MAX;

    pub fn is_dir(self) -> bool {
        self.contains(Self::DIRECTORY)
    }
}

/// `dwCreationDisposition` for `CreateFileW`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum Disposition {
    /// Fail if the file exists.
    CreateNew = 1,
    /// Create, truncating an existing file.
    CreateAlways = 2,
    /// Fail if the file does not exist.
    OpenExisting = 3,
    /// Open, creating the file if needed.
    OpenAlways = 4,
    /// Open and truncate; fail if the file does not exist.
    TruncateExisting = 5,
}

/// `flProtect` for `CreateFileMappingW`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum PageProtect {
    ReadOnly = 0x02,
    ReadWrite = 0x04,
    WriteCopy = 0x08,
    ExecuteRead = 0x20,
    ExecuteReadWrite = 0x40,
}

/// `*_PRIORITY_CLASS`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[repr(u32)]
pub enum PriorityClass {
    Idle = 0x0040,
    BelowNormal = 0x4000,
    Normal = 0x0020,
    AboveNormal = 0x8000,
    High = 0x0080,
    Realtime = 0x0100,
}

impl PriorityClass {
    pub fn from_raw(v: u32) -> Option<Self> {
        Some(match v {
            0x0040 => Self::Idle,
            0x4000 => Self::BelowNormal,
            0x0020 => Self::Normal,
            0x8000 => Self::AboveNormal,
            0x0080 => Self::High,
            0x0100 => Self::Realtime,
            _ => return None,
        })
    }
}

/// `THREAD_PRIORITY_*`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[repr(i32)]
pub enum ThreadPriority {
    Idle = -15,
    Lowest = -2,
    BelowNormal = -1,
    Normal = 0,
    AboveNormal = 1,
    Highest = 2,
    TimeCritical = 15,
}

impl ThreadPriority {
    /// `GetThreadPriority` failure value.
    pub const ERROR_RETURN: i32 = 0x7FFF_FFFF;

    pub fn from_raw(v: i32) -> Option<Self> {
        Some(match v {
            -15 => Self::Idle,
            -2 => Self::Lowest,
            -1 => Self::BelowNormal,
            0 => Self::Normal,
            1 => Self::AboveNormal,
            2 => Self::Highest,
            15 => Self::TimeCritical,
            _ => return None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn disposition_values_match_winbase() {
        assert_eq!(Disposition::CreateNew as u32, 1);
        assert_eq!(Disposition::TruncateExisting as u32, 5);
    }

    #[test]
    fn priority_class_round_trips_known_values() {
        for p in [
            PriorityClass::Idle,
            PriorityClass::BelowNormal,
            PriorityClass::Normal,
            PriorityClass::AboveNormal,
            PriorityClass::High,
            PriorityClass::Realtime,
        ] {
            assert_eq!(PriorityClass::from_raw(p as u32), Some(p));
        }
        assert_eq!(PriorityClass::from_raw(0), None);
    }

    #[test]
    fn thread_priority_rejects_error_return() {
        assert_eq!(ThreadPriority::from_raw(ThreadPriority::ERROR_RETURN), None);
        assert_eq!(ThreadPriority::from_raw(-15), Some(ThreadPriority::Idle));
    }

    #[test]
    fn directory_attribute_is_detected() {
        let attrs = FileAttributes::from_bits_retain(0x10 | 0x20);
        assert!(attrs.is_dir());
        assert!(attrs.contains(FileAttributes::ARCHIVE));
    }
}
