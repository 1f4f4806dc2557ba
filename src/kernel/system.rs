// ── Environment & system information ──────────────────────────────────────────

#![allow(unsafe_code)]

use std::time::Duration;

use serde::Serialize;
use windows::{
    core::{PCWSTR, PWSTR},
    Win32::{
        Foundation::{SetLastError, WIN32_ERROR},
        System::{
            Diagnostics::Debug::{
                FormatMessageW, FORMAT_MESSAGE_FROM_SYSTEM, FORMAT_MESSAGE_IGNORE_INSERTS,
            },
            Environment::{
                ExpandEnvironmentStringsW, FreeEnvironmentStringsW, GetEnvironmentStringsW,
                GetEnvironmentVariableW, SetEnvironmentVariableW,
            },
            SystemInformation::{
                ComputerNameNetBIOS, GetComputerNameExW, GetNativeSystemInfo, GetTickCount64,
                GlobalMemoryStatusEx, MEMORYSTATUSEX, SYSTEM_INFO,
            },
        },
    },
};

use crate::{
    error::{codes, Error, Result, ResultExt},
    marshal::{multi_sz, WString, WideBuf},
};

/// `ERROR_MORE_DATA`
const ERROR_MORE_DATA: u32 = 234;

// ── Error text ────────────────────────────────────────────────────────────────

/// The system's message text for a Win32 error code, trimmed of the trailing
/// line break.  `None` when the system has no message for `code`.
pub fn error_message(code: u32) -> Option<String> {
    let mut buf = [0u16; 512];
    // SAFETY: buf is writable for its full length, which is passed as nSize.
    // FROM_SYSTEM | IGNORE_INSERTS reads no source and no arguments.
    let n = unsafe {
        FormatMessageW(
            FORMAT_MESSAGE_FROM_SYSTEM | FORMAT_MESSAGE_IGNORE_INSERTS,
            None,
            code,
            0,
            PWSTR(buf.as_mut_ptr()),
            buf.len() as u32,
            None,
        )
    };
    if n == 0 {
        return None;
    }
    let text = String::from_utf16_lossy(&buf[..n as usize]);
    let text = text.trim_end();
    (!text.is_empty()).then(|| text.to_owned())
}

// ── Environment ───────────────────────────────────────────────────────────────

/// `GetEnvironmentVariableW`.  `Ok(None)` when the variable is not defined.
pub fn env_var(name: &str) -> Result<Option<String>> {
    let wname = WString::new(name)?;
    let mut missing = false;
    let value = WideBuf::fill(256, |buf| {
        // SAFETY: SetLastError only writes thread-local state.  The name is
        // NUL-terminated and the buffer length is carried by the slice.
        let n = unsafe {
            SetLastError(WIN32_ERROR(0));
            GetEnvironmentVariableW(wname.as_pcwstr(), Some(buf))
        };
        if n == 0 {
            let err = Error::last("GetEnvironmentVariableW");
            if err.is_win32(codes::ERROR_ENVVAR_NOT_FOUND) {
                missing = true;
            } else if err.code() != Some(0) {
                return Err(err);
            }
        }
        Ok(n)
    })?;
    Ok((!missing).then_some(value))
}

/// `SetEnvironmentVariableW`; `None` deletes the variable.
pub fn set_env_var(name: &str, value: Option<&str>) -> Result<()> {
    let wname = WString::new(name)?;
    let wvalue = value.map(WString::new).transpose()?;
    // SAFETY: both strings are NUL-terminated and outlive the call; a NULL
    // value pointer requests deletion.
    unsafe { SetEnvironmentVariableW(wname.as_pcwstr(), WString::opt_pcwstr(wvalue.as_ref())) }
        .context("SetEnvironmentVariableW")
}

/// Snapshot of the process environment (`GetEnvironmentStringsW`), in block
/// order.  Hidden per-drive entries such as `=C:` keep their leading `=`.
pub fn env_vars() -> Result<Vec<(String, String)>> {
    // SAFETY: no parameters; NULL signals failure.
    let block = unsafe { GetEnvironmentStringsW() };
    if block.is_null() {
        return Err(Error::last("GetEnvironmentStringsW"));
    }
    let mut len = 0;
    // SAFETY: the block is a sequence of NUL-terminated strings ending with
    // an empty one, so every unit up to the double NUL is readable.
    unsafe {
        while !(*block.0.add(len) == 0 && (len == 0 || *block.0.add(len - 1) == 0)) {
            len += 1;
        }
    }
    // SAFETY: `len + 1` units were read above.
    let units = unsafe { std::slice::from_raw_parts(block.0, len + 1) };
    let entries = multi_sz::decode(units);
    // SAFETY: the block came from GetEnvironmentStringsW and is freed once.
    if let Err(e) = unsafe { FreeEnvironmentStringsW(PCWSTR(block.0)) } {
        tracing::warn!(error = %e, "FreeEnvironmentStringsW failed");
    }
    Ok(entries.iter().filter_map(|e| split_entry(e)).collect())
}

fn split_entry(entry: &str) -> Option<(String, String)> {
    // The first character may itself be '=' (per-drive entries).
    let eq = entry.char_indices().skip(1).find(|&(_, c)| c == '=')?.0;
    Some((entry[..eq].to_owned(), entry[eq + 1..].to_owned()))
}

/// Expand `%VAR%` references (`ExpandEnvironmentStringsW`).
pub fn expand_env(template: &str) -> Result<String> {
    let wsrc = WString::new(template)?;
    WideBuf::fill(template.len() + 64, |buf| {
        // SAFETY: wsrc is NUL-terminated; the destination length is the slice
        // length.  The return value counts the terminator.
        let n = unsafe { ExpandEnvironmentStringsW(wsrc.as_pcwstr(), Some(buf)) };
        if n == 0 {
            Err(Error::last("ExpandEnvironmentStringsW"))
        } else {
            Ok(n)
        }
    })
}

// ── Machine identity ──────────────────────────────────────────────────────────

/// The NetBIOS computer name.
pub fn computer_name() -> Result<String> {
    WideBuf::fill(32, |buf| {
        let mut size = buf.len() as u32;
        // SAFETY: `size` holds the buffer capacity in units; on
        // ERROR_MORE_DATA the OS stores the required size there instead.
        let r = unsafe { GetComputerNameExW(ComputerNameNetBIOS, PWSTR(buf.as_mut_ptr()), &mut size) };
        match r.context("GetComputerNameExW") {
            Ok(()) => Ok(size),
            Err(err) => {
                if err.is_win32(ERROR_MORE_DATA) {
                    Ok(size.max(buf.len() as u32))
                } else {
                    Err(err)
                }
            }
        }
    })
}

/// Time since boot (`GetTickCount64`).
pub fn tick_count() -> Duration {
    // SAFETY: no parameters; cannot fail.
    Duration::from_millis(unsafe { GetTickCount64() })
}

// ── Hardware ──────────────────────────────────────────────────────────────────

/// `PROCESSOR_ARCHITECTURE_*`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Architecture {
    X86,
    Arm,
    Ia64,
    X64,
    Arm64,
    Unknown,
}

impl Architecture {
    pub fn from_raw(v: u16) -> Self {
        match v {
            0 => Self::X86,
            5 => Self::Arm,
            6 => Self::Ia64,
            9 => Self::X64,
            12 => Self::Arm64,
            _ => Self::Unknown,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SystemInfo {
    pub arch: Architecture,
    pub page_size: u32,
    pub processors: u32,
    pub allocation_granularity: u32,
}

/// `GetNativeSystemInfo`
pub fn system_info() -> SystemInfo {
    let mut si = SYSTEM_INFO::default();
    // SAFETY: `si` is a valid out-pointer; the call cannot fail.
    unsafe { GetNativeSystemInfo(&mut si) };
    // SAFETY: both union views are plain integers; the architecture view is
    // the documented one.
    let arch = unsafe { si.Anonymous.Anonymous.wProcessorArchitecture.0 };
    SystemInfo {
        arch: Architecture::from_raw(arch),
        page_size: si.dwPageSize,
        processors: si.dwNumberOfProcessors,
        allocation_granularity: si.dwAllocationGranularity,
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct MemoryStatus {
    /// Percentage of physical memory in use.
    pub load: u32,
    pub total_physical: u64,
    pub available_physical: u64,
    pub total_page_file: u64,
    pub available_page_file: u64,
    pub total_virtual: u64,
    pub available_virtual: u64,
}

/// `GlobalMemoryStatusEx`
pub fn memory_status() -> Result<MemoryStatus> {
    let mut ms = MEMORYSTATUSEX {
        dwLength: std::mem::size_of::<MEMORYSTATUSEX>() as u32,
        ..Default::default()
    };
    // SAFETY: dwLength is set as the API requires; `ms` is a valid out-pointer.
    unsafe { GlobalMemoryStatusEx(&mut ms) }.context("GlobalMemoryStatusEx")?;
    Ok(MemoryStatus {
        load: ms.dwMemoryLoad,
        total_physical: ms.ullTotalPhys,
        available_physical: ms.ullAvailPhys,
        total_page_file: ms.ullTotalPageFile,
        available_page_file: ms.ullAvailPageFile,
        total_virtual: ms.ullTotalVirtual,
        available_virtual: ms.ullAvailVirtual,
    })
}

// ── Tests ─────────────────────────────────────────────────────────────────────
