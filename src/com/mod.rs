// ── COM runtime ───────────────────────────────────────────────────────────────
//
// `ComInit` scopes one `CoInitializeEx` to the thread that called it;
// `CoTaskMem` owns task-allocator memory handed out by COM and shell APIs.
// The interfaces themselves come from the `windows` crate and are released
// by its own `Drop`.

#![allow(unsafe_code)]

pub mod shell_link;
pub mod taskbar;

use std::{ffi::c_void, marker::PhantomData};

use tracing::trace;
use windows::{
    core::{Interface, GUID},
    Win32::System::Com::{
        CoCreateInstance, CoInitializeEx, CoTaskMemFree, CoUninitialize, CLSCTX_INPROC_SERVER,
        COINIT, COINIT_APARTMENTTHREADED, COINIT_DISABLE_OLE1DDE, COINIT_MULTITHREADED,
    },
};

use crate::error::{Error, Result, ResultExt};

pub use shell_link::{ShellLink, ShortcutInfo};
pub use taskbar::{ProgressState, Taskbar};

/// `RPC_E_CHANGED_MODE`: the thread already joined the other apartment
/// type.
pub const RPC_E_CHANGED_MODE: i32 = 0x8001_0106_u32 as i32;

// ── ComInit ───────────────────────────────────────────────────────────────────

/// Keeps COM initialized on this thread until dropped.
///
/// Initializing a thread that is already in the same apartment type
/// succeeds (`S_FALSE`) and still needs its own `CoUninitialize`, which
/// drop performs.
#[derive(Debug)]
pub struct ComInit {
    _not_send: PhantomData<*const ()>,
}

impl ComInit {
    /// Single-threaded apartment, as the shell interfaces expect.
    pub fn apartment() -> Result<Self> {
        Self::init(COINIT_APARTMENTTHREADED | COINIT_DISABLE_OLE1DDE)
    }

    pub fn multithreaded() -> Result<Self> {
        Self::init(COINIT_MULTITHREADED)
    }

    fn init(mode: COINIT) -> Result<Self> {
        // SAFETY: the reserved pointer must be NULL.
        let hr = unsafe { CoInitializeEx(None, mode) };
        if hr.is_err() {
            return Err(Error::from_hresult("CoInitializeEx", hr.0));
        }
        trace!(mode = mode.0, already = hr.0 == 1, "COM initialized");
        Ok(Self {
            _not_send: PhantomData,
        })
    }
}

impl Drop for ComInit {
    fn drop(&mut self) {
        // SAFETY: balances the successful CoInitializeEx on this thread.
        unsafe { CoUninitialize() }
    }
}

/// `CoCreateInstance` of an in-process server.
pub fn create_instance<T: Interface>(clsid: &GUID) -> Result<T> {
    // SAFETY: `clsid` is a valid GUID; no aggregation.
    unsafe { CoCreateInstance(clsid, None, CLSCTX_INPROC_SERVER) }.context("CoCreateInstance")
}

// ── CoTaskMem ─────────────────────────────────────────────────────────────────

/// Memory from the COM task allocator, freed with `CoTaskMemFree`.
#[derive(Debug)]
pub struct CoTaskMem<T> {
    ptr: *mut T,
}

impl<T> CoTaskMem<T> {
    /// Take ownership of `ptr`.  NULL is allowed and frees nothing.
    ///
    /// # Safety
    /// `ptr` must be NULL or come from `CoTaskMemAlloc` and not be freed
    /// elsewhere.
    pub unsafe fn from_raw(ptr: *mut T) -> Self {
        Self { ptr }
    }

    pub fn as_ptr(&self) -> *mut T {
        self.ptr
    }

    pub fn is_null(&self) -> bool {
        self.ptr.is_null()
    }
}

impl<T> Drop for CoTaskMem<T> {
    fn drop(&mut self) {
        if self.ptr.is_null() {
            return;
        }
        // SAFETY: owned task-allocator memory, freed once.
        unsafe { CoTaskMemFree(Some(self.ptr as *const c_void)) }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nested_init_in_the_same_mode_succeeds() {
        std::thread::spawn(|| {
            let outer = ComInit::apartment().unwrap();
            let inner = ComInit::apartment().unwrap();
            drop(inner);
            drop(outer);
        })
        .join()
        .unwrap();
    }

    #[test]
    fn changing_mode_is_reported() {
        std::thread::spawn(|| {
            let _sta = ComInit::apartment().unwrap();
            let err = ComInit::multithreaded().unwrap_err();
            assert_eq!(err.hresult(), Some(RPC_E_CHANGED_MODE));
        })
        .join()
        .unwrap();
    }

    #[test]
    fn task_memory_is_freed_on_drop() {
        use windows::Win32::System::Com::CoTaskMemAlloc;
        // SAFETY: a fresh allocation owned by the wrapper.
        let mem = unsafe { CoTaskMem::from_raw(CoTaskMemAlloc(64) as *mut u8) };
        assert!(!mem.is_null());
        // SAFETY: NULL frees nothing.
        let empty = unsafe { CoTaskMem::<u8>::from_raw(std::ptr::null_mut()) };
        assert!(empty.is_null());
    }

    #[test]
    fn unknown_class_is_an_hresult_error() {
        use windows::core::IUnknown;
        let _com = ComInit::apartment().unwrap();
        let clsid = GUID::from_u128(0x0BADC0DE_0000_4000_8000_000000000001);
        let err = create_instance::<IUnknown>(&clsid).unwrap_err();
        // REGDB_E_CLASSNOTREG
        assert_eq!(err.hresult(), Some(0x8004_0154_u32 as i32));
    }
}
