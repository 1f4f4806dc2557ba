// ── Central error type ────────────────────────────────────────────────────────
//
// All fallible operations in winhandle return `error::Result<T>`.  A failed
// syscall is reported with the name of the export that failed and the raw
// code it left behind (`GetLastError`, an `HRESULT`, or a DDEML error).

use thiserror::Error;

/// `FACILITY_WIN32` HRESULTs carry a Win32 error code in their low word.
const FACILITY_WIN32_PREFIX: u32 = 0x8007_0000;

/// Every error that winhandle can produce.
#[derive(Debug, Error)]
pub enum Error {
    /// A Win32 API call returned a failure code.
    #[error("{function} failed (error {code:#010x}){}", message_suffix(.code))]
    Win32 {
        /// The name of the failing function, for display purposes.
        function: &'static str,
        /// The raw Win32 error code (`GetLastError()` value).
        code: u32,
    },

    /// A call reported through the `windows` crate (COM, shell, or a
    /// `BOOL` export) returned a failing `HRESULT`.
    #[error("{function} failed (HRESULT {code:#010x}){}", hresult_suffix(.code))]
    HResult { function: &'static str, code: i32 },

    /// A DDEML call failed; `code` is a `DMLERR_*` value.
    #[error("{function} failed (DDE error {code:#06x}: {})", dde_name(.code))]
    Dde { function: &'static str, code: u32 },

    /// A Rust string contains U+0000 and cannot cross as a C string.
    #[error("string contains an interior NUL at UTF-16 offset {position}")]
    InteriorNul { position: usize },

    /// A request the binding refuses to forward to the OS.
    #[error("unsupported: {0}")]
    Unsupported(&'static str),

    /// A standard I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Capture the current thread's last-error code and wrap it.
    ///
    /// Call immediately after the failing Win32 function: the value is
    /// thread-local state that any later API call may overwrite.
    pub fn last(function: &'static str) -> Self {
        let code = std::io::Error::last_os_error()
            .raw_os_error()
            .unwrap_or_default() as u32;
        Self::Win32 { function, code }
    }

    /// Build an error from an `HRESULT`.  The value is kept as is;
    /// [`Error::win32_code`] recovers the `ERROR_*` code of a Win32-facility
    /// HRESULT.
    pub fn from_hresult(function: &'static str, hr: i32) -> Self {
        Self::HResult { function, code: hr }
    }

    /// The raw numeric code carried by this error, if any.
    pub fn code(&self) -> Option<u32> {
        match self {
            Self::Win32 { code, .. } | Self::Dde { code, .. } => Some(*code),
            Self::HResult { code, .. } => Some(*code as u32),
            Self::Io(e) => e.raw_os_error().map(|c| c as u32),
            Self::InteriorNul { .. } | Self::Unsupported(_) => None,
        }
    }

    /// The error as an `HRESULT` (`HRESULT_FROM_WIN32` for Win32 codes).
    pub fn hresult(&self) -> Option<i32> {
        match self {
            Self::Win32 { code, .. } => Some(hresult_from_win32(*code)),
            Self::HResult { code, .. } => Some(*code),
            _ => None,
        }
    }

    /// The Win32 error code, either reported directly or wrapped in a
    /// `FACILITY_WIN32` HRESULT.
    pub fn win32_code(&self) -> Option<u32> {
        match self {
            Self::Win32 { code, .. } => Some(*code),
            Self::HResult { code, .. } if *code as u32 & 0xFFFF_0000 == FACILITY_WIN32_PREFIX => {
                Some(*code as u32 & 0xFFFF)
            }
            Self::Io(e) => e.raw_os_error().map(|c| c as u32),
            _ => None,
        }
    }

    /// `true` when this error carries the Win32 code `code`, directly or
    /// as `HRESULT_FROM_WIN32(code)`.
    pub fn is_win32(&self, code: u32) -> bool {
        self.win32_code() == Some(code)
    }
}

impl From<Error> for std::io::Error {
    fn from(e: Error) -> Self {
        match e {
            Error::Io(inner) => inner,
            other => match other.win32_code() {
                Some(code) => std::io::Error::from_raw_os_error(code as i32),
                None => std::io::Error::other(other),
            },
        }
    }
}

/// `HRESULT_FROM_WIN32`: zero stays zero, everything else lands in
/// `FACILITY_WIN32` with the severity bit set.
pub fn hresult_from_win32(code: u32) -> i32 {
    if code == 0 || code & 0x8000_0000 != 0 {
        code as i32
    } else {
        ((code & 0xFFFF) | FACILITY_WIN32_PREFIX) as i32
    }
}

#[cfg(windows)]
impl From<windows::core::Error> for Error {
    fn from(e: windows::core::Error) -> Self {
        Self::from_hresult("windows", e.code().0)
    }
}

/// Tag a `windows::core::Result` with the export that produced it.
#[cfg(windows)]
pub trait ResultExt<T> {
    fn context(self, function: &'static str) -> Result<T>;
}

#[cfg(windows)]
impl<T> ResultExt<T> for windows::core::Result<T> {
    fn context(self, function: &'static str) -> Result<T> {
        self.map_err(|e| Error::from_hresult(function, e.code().0))
    }
}

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;

/// Win32 error codes the wrappers test for.
pub mod codes {
    pub const ERROR_FILE_NOT_FOUND: u32 = 2;
    pub const ERROR_PATH_NOT_FOUND: u32 = 3;
    pub const ERROR_ACCESS_DENIED: u32 = 5;
    pub const ERROR_INVALID_HANDLE: u32 = 6;
    pub const ERROR_NOT_ENOUGH_MEMORY: u32 = 8;
    pub const ERROR_BAD_FORMAT: u32 = 11;
    pub const ERROR_NO_MORE_FILES: u32 = 18;
    pub const ERROR_FILE_EXISTS: u32 = 80;
    pub const ERROR_INVALID_PARAMETER: u32 = 87;
    pub const ERROR_INSUFFICIENT_BUFFER: u32 = 122;
    pub const ERROR_MOD_NOT_FOUND: u32 = 126;
    pub const ERROR_ALREADY_EXISTS: u32 = 183;
    pub const ERROR_ENVVAR_NOT_FOUND: u32 = 203;
    pub const ERROR_NO_ASSOCIATION: u32 = 1155;
    pub const ERROR_DDE_FAIL: u32 = 1156;
    pub const ERROR_DLL_NOT_FOUND: u32 = 1157;
    pub const ERROR_RESOURCE_TYPE_NOT_FOUND: u32 = 1813;
    /// `GetExitCodeProcess` / `GetExitCodeThread` value for a live object.
    pub const STILL_ACTIVE: u32 = 259;
}

// ── Display helpers ───────────────────────────────────────────────────────────

fn message_suffix(code: &u32) -> String {
    match system_message(*code) {
        Some(text) => format!(": {text}"),
        None => String::new(),
    }
}

fn hresult_suffix(code: &i32) -> String {
    message_suffix(&(*code as u32))
}

fn dde_name(code: &u32) -> &'static str {
    dde_error_name(*code)
}

#[cfg(windows)]
fn system_message(code: u32) -> Option<String> {
    crate::kernel::system::error_message(code)
}

#[cfg(not(windows))]
fn system_message(_code: u32) -> Option<String> {
    None
}

/// Symbolic name of a `DMLERR_*` code.
pub(crate) fn dde_error_name(code: u32) -> &'static str {
    match code {
        0x0000 => "DMLERR_NO_ERROR",
        0x4000 => "DMLERR_ADVACKTIMEOUT",
        0x4001 => "DMLERR_BUSY",
        0x4002 => "DMLERR_DATAACKTIMEOUT",
        0x4003 => "DMLERR_DLL_NOT_INITIALIZED",
        0x4004 => "DMLERR_DLL_USAGE",
        0x4005 => "DMLERR_EXECACKTIMEOUT",
        0x4006 => "DMLERR_INVALIDPARAMETER",
        0x4007 => "DMLERR_LOW_MEMORY",
        0x4008 => "DMLERR_MEMORY_ERROR",
        0x4009 => "DMLERR_NOTPROCESSED",
        0x400a => "DMLERR_NO_CONV_ESTABLISHED",
        0x400b => "DMLERR_POKEACKTIMEOUT",
        0x400c => "DMLERR_POSTMSG_FAILED",
        0x400d => "DMLERR_REENTRANCY",
        0x400e => "DMLERR_SERVER_DIED",
        0x400f => "DMLERR_SYS_ERROR",
        0x4010 => "DMLERR_UNADVACKTIMEOUT",
        0x4011 => "DMLERR_UNFOUND_QUEUE_ID",
        _ => "unknown",
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
