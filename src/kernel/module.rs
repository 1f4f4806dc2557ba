// ── Loaded modules ────────────────────────────────────────────────────────────
//
// `Library` owns one `LoadLibraryW` reference and drops it with
// `FreeLibrary`.  `HINSTANCE` is a borrowed module handle: the executable
// itself, a DLL found with `GetModuleHandleW`, or a view through a `Library`.
// It is only valid while something else keeps the module loaded.

#![allow(unsafe_code)]

use std::{
    ffi::{c_void, CString},
    path::PathBuf,
    ptr::NonNull,
};

use tracing::{trace, warn};
use windows::{
    core::PCSTR,
    Win32::{
        Foundation::{FreeLibrary, HANDLE, HMODULE},
        System::LibraryLoader::{
            GetModuleFileNameW, GetModuleHandleW, GetProcAddress, LoadLibraryExW, LoadLibraryW,
            LOAD_LIBRARY_FLAGS,
        },
    },
};

use super::flags::LoadFlags;
use crate::{
    error::{codes, Error, Result, ResultExt},
    marshal::{WString, WideBuf},
};

// ── HINSTANCE ─────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HINSTANCE(pub(crate) HMODULE);

impl HINSTANCE {
    /// The executable's own module (`GetModuleHandleW(NULL)`).
    pub fn current_exe() -> Result<Self> {
        // SAFETY: a NULL name always refers to the calling executable.
        let h = unsafe { GetModuleHandleW(None) }.context("GetModuleHandleW")?;
        Ok(Self(h))
    }

    /// An already-loaded module by name; does not add a reference.
    pub fn get(name: &str) -> Result<Self> {
        let wname = WString::new(name)?;
        // SAFETY: wname is NUL-terminated.
        let h = unsafe { GetModuleHandleW(wname.as_pcwstr()) }.context("GetModuleHandleW")?;
        Ok(Self(h))
    }

    pub fn raw(self) -> HMODULE {
        self.0
    }

    /// Full path of the module file (`GetModuleFileNameW`, which truncates
    /// rather than reporting the needed size).
    pub fn file_name(self) -> Result<PathBuf> {
        WideBuf::fill(260, |buf| {
            // SAFETY: the slice carries the buffer length.
            let n = unsafe { GetModuleFileNameW(self.0, buf) };
            if n == 0 {
                Err(Error::last("GetModuleFileNameW"))
            } else {
                Ok(n)
            }
        })
        .map(PathBuf::from)
    }

    /// `GetProcAddress`.  The caller transmutes the pointer to the export's
    /// real signature.
    pub fn proc_address(self, name: &str) -> Result<NonNull<c_void>> {
        let cname = CString::new(name).map_err(|e| Error::InteriorNul {
            position: e.nul_position(),
        })?;
        // SAFETY: cname is NUL-terminated and outlives the call.
        let f = unsafe { GetProcAddress(self.0, PCSTR(cname.as_ptr().cast())) };
        f.and_then(|f| NonNull::new(f as *mut c_void))
            .ok_or_else(|| Error::last("GetProcAddress"))
    }
}

// ── Library ───────────────────────────────────────────────────────────────────

/// RAII reference to a DLL loaded with `LoadLibraryW` or `LoadLibraryExW`.
#[derive(Debug)]
pub struct Library(HMODULE);

// SAFETY: module handles are process-wide and FreeLibrary may run on any
// thread.
unsafe impl Send for Library {}
// SAFETY: as above; no interior state.
unsafe impl Sync for Library {}

impl Library {
    /// `LoadLibraryW` with the default search order.
    pub fn load(name: &str) -> Result<Self> {
        let wname = WString::new(name)?;
        // SAFETY: wname is NUL-terminated.  Loading runs the DLL's entry
        // point, which is the caller's choice of code to trust.
        let h = unsafe { LoadLibraryW(wname.as_pcwstr()) }.context("LoadLibraryW")?;
        trace!(name, "loaded library");
        Ok(Self(h))
    }

    pub fn load_ex(name: &str, flags: LoadFlags) -> Result<Self> {
        let wname = WString::new(name)?;
        // SAFETY: as for load; the reserved file handle must be NULL.
        let h = unsafe { LoadLibraryExW(wname.as_pcwstr(), HANDLE::default(), LOAD_LIBRARY_FLAGS(flags.bits())) }
            .context("LoadLibraryExW")?;
        trace!(name, ?flags, "loaded library");
        Ok(Self(h))
    }

    /// Borrowed module handle, valid while `self` lives.
    pub fn module(&self) -> HINSTANCE {
        HINSTANCE(self.0)
    }

    pub fn proc_address(&self, name: &str) -> Result<NonNull<c_void>> {
        self.module().proc_address(name)
    }
}

impl Drop for Library {
    fn drop(&mut self) {
        // SAFETY: self.0 came from a successful LoadLibrary(Ex)W and is
        // released exactly once.
        if let Err(e) = unsafe { FreeLibrary(self.0) } {
            warn!(error = %e, "FreeLibrary failed");
        }
    }
}

/// `true` when the error means the DLL or one of its dependencies is absent.
pub fn is_not_found(e: &Error) -> bool {
    [codes::ERROR_FILE_NOT_FOUND, codes::ERROR_MOD_NOT_FOUND, codes::ERROR_DLL_NOT_FOUND]
        .iter()
        .any(|&c| e.is_win32(c))
}
