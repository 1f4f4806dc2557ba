// ── Enumeration trampolines ───────────────────────────────────────────────────
//
// `EnumWindows`, `EnumChildWindows` and `EnumDisplayMonitors` call back into
// Rust through an `extern "system"` function that receives one pointer-sized
// LPARAM.  `EnumState` is what that LPARAM points at: the caller's closure
// plus the bookkeeping needed to stop early and to carry a panic back across
// the FFI boundary instead of unwinding through foreign frames.

#![allow(unsafe_code)]

use std::{
    any::Any,
    panic::{catch_unwind, resume_unwind, AssertUnwindSafe},
};

use windows::Win32::Foundation::{BOOL, LPARAM};

use crate::error::{Error, Result};

pub(crate) struct EnumState<'a, T> {
    f: &'a mut dyn FnMut(T) -> bool,
    stopped: bool,
    panic: Option<Box<dyn Any + Send + 'static>>,
}

impl<'a, T> EnumState<'a, T> {
    pub(crate) fn new(f: &'a mut dyn FnMut(T) -> bool) -> Self {
        Self {
            f,
            stopped: false,
            panic: None,
        }
    }

    /// The LPARAM to hand to the enumerator.  `self` must stay in place until
    /// the enumerator returns.
    pub(crate) fn lparam(&mut self) -> LPARAM {
        LPARAM(self as *mut Self as isize)
    }

    /// Invoke the closure from inside the trampoline.
    ///
    /// # Safety
    /// `lparam` must come from [`EnumState::lparam`] on a live state whose
    /// `T` matches.
    pub(crate) unsafe fn dispatch(lparam: LPARAM, item: T) -> BOOL {
        // SAFETY: guaranteed by the caller; the enumerator runs synchronously
        // on this thread so no other reference to the state is live.
        let state = unsafe { &mut *(lparam.0 as *mut Self) };
        if state.stopped {
            return BOOL::from(false);
        }
        match catch_unwind(AssertUnwindSafe(|| (state.f)(item))) {
            Ok(true) => BOOL::from(true),
            Ok(false) => {
                state.stopped = true;
                BOOL::from(false)
            }
            Err(payload) => {
                state.stopped = true;
                state.panic = Some(payload);
                BOOL::from(false)
            }
        }
    }

    /// Resume a captured panic, then turn the enumerator's result into ours.
    /// A failure reported because the closure stopped early is not an error.
    pub(crate) fn finish(self, failure: Option<Error>) -> Result<()> {
        if let Some(payload) = self.panic {
            resume_unwind(payload);
        }
        match failure {
            Some(e) if !self.stopped => Err(e),
            _ => Ok(()),
        }
    }
}
