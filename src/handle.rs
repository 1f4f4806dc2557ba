// ── Kernel handle ownership ───────────────────────────────────────────────────
//
// `OwnedHandle` is the RAII owner every kernel-object wrapper (file, process,
// thread, event, mapping, snapshot) is built on: it releases with
// `CloseHandle` exactly once.  Pseudo-handles (`GetCurrentProcess`,
// `GetCurrentThread`) are never wrapped in it.
//
// The timeout/outcome types are pure so they can be tested anywhere.

#![cfg_attr(windows, allow(unsafe_code))]

use std::time::Duration;

use crate::error::{Error, Result};

/// `INFINITE`
const INFINITE: u32 = u32::MAX;

const WAIT_OBJECT_0: u32 = 0x0000_0000;
const WAIT_ABANDONED: u32 = 0x0000_0080;
const WAIT_TIMEOUT: u32 = 0x0000_0102;
const WAIT_FAILED: u32 = u32::MAX;

// ── Waiting ───────────────────────────────────────────────────────────────────

/// How long a wait may block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Timeout {
    #[default]
    Infinite,
    Millis(u32),
}

impl Timeout {
    /// The `dwMilliseconds` argument.  A finite timeout never collides with
    /// `INFINITE`.
    pub fn as_millis(self) -> u32 {
        match self {
            Self::Infinite => INFINITE,
            Self::Millis(ms) => ms.min(INFINITE - 1),
        }
    }
}

impl From<Duration> for Timeout {
    fn from(d: Duration) -> Self {
        let ms = d.as_millis().min(u128::from(INFINITE - 1)) as u32;
        Self::Millis(ms)
    }
}

/// Result of `WaitForSingleObject` on a signalable handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitOutcome {
    Signaled,
    /// A mutex owner exited without releasing it.
    Abandoned,
    TimedOut,
}

impl WaitOutcome {
    /// Interpret a `WAIT_EVENT` value relative to the first handle.
    /// `WAIT_FAILED` must be translated by the caller while the last error
    /// is still fresh.
    pub(crate) fn from_raw(v: u32, count: u32) -> Option<(usize, Self)> {
        if v == WAIT_TIMEOUT {
            Some((0, Self::TimedOut))
        } else if (WAIT_OBJECT_0..WAIT_OBJECT_0 + count).contains(&v) {
            Some(((v - WAIT_OBJECT_0) as usize, Self::Signaled))
        } else if (WAIT_ABANDONED..WAIT_ABANDONED + count).contains(&v) {
            Some(((v - WAIT_ABANDONED) as usize, Self::Abandoned))
        } else {
            None
        }
    }
}

#[cfg_attr(not(windows), allow(dead_code))]
fn wait_result(function: &'static str, v: u32, count: u32) -> Result<(usize, WaitOutcome)> {
    if v == WAIT_FAILED {
        return Err(Error::last(function));
    }
    WaitOutcome::from_raw(v, count).ok_or(Error::Win32 { function, code: v })
}

// ── OwnedHandle ───────────────────────────────────────────────────────────────

#[cfg(windows)]
pub use owned::*;

#[cfg(windows)]
mod owned {
    use tracing::warn;
    use windows::Win32::{
        Foundation::{CloseHandle, DuplicateHandle, BOOL, DUPLICATE_SAME_ACCESS, HANDLE},
        System::Threading::{GetCurrentProcess, WaitForMultipleObjects, WaitForSingleObject},
    };

    use super::{wait_result, Timeout, WaitOutcome};
    use crate::error::{Error, Result, ResultExt};

    /// Anything backed by a kernel object handle.
    pub trait KernelHandle {
        fn raw(&self) -> HANDLE;

        /// Block until the object is signaled or `timeout` elapses.
        fn wait(&self, timeout: Timeout) -> Result<WaitOutcome> {
            wait(self.raw(), timeout)
        }
    }

    /// A kernel handle closed with `CloseHandle` on drop.
    #[derive(Debug)]
    pub struct OwnedHandle(HANDLE);

    // SAFETY: kernel handles are process-wide values; any thread may use or
    // close them.
    unsafe impl Send for OwnedHandle {}
    // SAFETY: as above; the wrapper exposes no interior mutability.
    unsafe impl Sync for OwnedHandle {}

    impl OwnedHandle {
        /// Take ownership of `h`, which `function` just returned.
        ///
        /// NULL and `INVALID_HANDLE_VALUE` are failures; the last error is
        /// captured immediately.
        pub fn from_raw(h: HANDLE, function: &'static str) -> Result<Self> {
            if h.is_invalid() {
                Err(Error::last(function))
            } else {
                Ok(Self(h))
            }
        }

        pub fn raw(&self) -> HANDLE {
            self.0
        }

        /// Give up ownership; the caller becomes responsible for closing.
        pub fn into_raw(self) -> HANDLE {
            let h = self.0;
            std::mem::forget(self);
            h
        }

        /// A second handle to the same object (`DuplicateHandle`).
        pub fn try_clone(&self) -> Result<Self> {
            let mut dup = HANDLE::default();
            // SAFETY: self.0 is an open handle owned by this process; `dup`
            // is a valid out-pointer for the duration of the call.
            unsafe {
                let me = GetCurrentProcess();
                DuplicateHandle(
                    me,
                    self.0,
                    me,
                    &mut dup,
                    0,
                    BOOL::from(false),
                    DUPLICATE_SAME_ACCESS,
                )
            }
            .context("DuplicateHandle")?;
            Ok(Self(dup))
        }
    }

    impl KernelHandle for OwnedHandle {
        fn raw(&self) -> HANDLE {
            self.0
        }
    }

    impl Drop for OwnedHandle {
        fn drop(&mut self) {
            // SAFETY: self.0 was validated in from_raw and is closed only here.
            if let Err(e) = unsafe { CloseHandle(self.0) } {
                warn!(handle = ?self.0, error = %e, "CloseHandle failed");
            }
        }
    }

    /// Either an owned handle or a pseudo-handle (`GetCurrentProcess`,
    /// `GetCurrentThread`) that must never be closed.
    #[derive(Debug)]
    pub(crate) enum MaybeOwned {
        Pseudo(HANDLE),
        Owned(OwnedHandle),
    }

    impl MaybeOwned {
        pub(crate) fn raw(&self) -> HANDLE {
            match self {
                Self::Pseudo(h) => *h,
                Self::Owned(h) => h.raw(),
            }
        }
    }

    /// `WaitForSingleObject`
    pub fn wait(h: HANDLE, timeout: Timeout) -> Result<WaitOutcome> {
        // SAFETY: waiting on a stale handle fails with ERROR_INVALID_HANDLE;
        // it cannot corrupt memory.
        let v = unsafe { WaitForSingleObject(h, timeout.as_millis()) };
        wait_result("WaitForSingleObject", v.0, 1).map(|(_, outcome)| outcome)
    }

    /// `WaitForMultipleObjects` with `bWaitAll = FALSE`: index of the first
    /// handle that fired.  A timeout reports index 0.
    pub fn wait_any(handles: &[HANDLE], timeout: Timeout) -> Result<(usize, WaitOutcome)> {
        // SAFETY: the slice outlives the call; MAXIMUM_WAIT_OBJECTS is enforced
        // by the OS (ERROR_INVALID_PARAMETER).
        let v = unsafe {
            WaitForMultipleObjects(handles, BOOL::from(false), timeout.as_millis())
        };
        wait_result("WaitForMultipleObjects", v.0, handles.len() as u32)
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
