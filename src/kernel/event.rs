// ── Event objects ─────────────────────────────────────────────────────────────

#![allow(unsafe_code)]

use tracing::trace;
use windows::Win32::{
    Foundation::{BOOL, HANDLE},
    System::Threading::{
        CreateEventW, OpenEventW, ResetEvent, SetEvent, EVENT_MODIFY_STATE,
        SYNCHRONIZATION_SYNCHRONIZE,
    },
};

use crate::{
    error::{codes, Error, Result, ResultExt},
    handle::{KernelHandle, OwnedHandle, Timeout, WaitOutcome},
    marshal::WString,
};

#[derive(Debug)]
pub struct HEVENT {
    handle: OwnedHandle,
    existed: bool,
}

impl KernelHandle for HEVENT {
    fn raw(&self) -> HANDLE {
        self.handle.raw()
    }
}

impl HEVENT {
    /// `CreateEventW`.  With a `name` that is already in use the existing
    /// event is opened and `manual_reset`/`initial` are ignored; see
    /// [`HEVENT::existed`].
    pub fn create(manual_reset: bool, initial: bool, name: Option<&str>) -> Result<Self> {
        let wname = name.map(WString::new).transpose()?;
        // SAFETY: the name is NUL-terminated or NULL; default security.
        let h = unsafe {
            CreateEventW(
                None,
                BOOL::from(manual_reset),
                BOOL::from(initial),
                WString::opt_pcwstr(wname.as_ref()),
            )
        }
        .context("CreateEventW")?;
        // The last error is ERROR_ALREADY_EXISTS on success when a named
        // event was opened rather than created.
        let existed = name.is_some() && Error::last("CreateEventW").is_win32(codes::ERROR_ALREADY_EXISTS);
        trace!(manual_reset, initial, name, existed, "created event");
        Ok(Self {
            handle: OwnedHandle::from_raw(h, "CreateEventW")?,
            existed,
        })
    }

    /// Open a named event for waiting and signaling.
    pub fn open(name: &str) -> Result<Self> {
        let wname = WString::new(name)?;
        // SAFETY: wname is NUL-terminated.
        let h = unsafe {
            OpenEventW(
                EVENT_MODIFY_STATE | SYNCHRONIZATION_SYNCHRONIZE,
                BOOL::from(false),
                wname.as_pcwstr(),
            )
        }
        .context("OpenEventW")?;
        Ok(Self {
            handle: OwnedHandle::from_raw(h, "OpenEventW")?,
            existed: true,
        })
    }

    /// `true` when `create` opened an event that already existed.
    pub fn existed(&self) -> bool {
        self.existed
    }

    pub fn set(&self) -> Result<()> {
        // SAFETY: plain handle argument.
        unsafe { SetEvent(self.raw()) }.context("SetEvent")
    }

    pub fn reset(&self) -> Result<()> {
        // SAFETY: plain handle argument.
        unsafe { ResetEvent(self.raw()) }.context("ResetEvent")
    }

    pub fn wait(&self, timeout: Timeout) -> Result<WaitOutcome> {
        KernelHandle::wait(self, timeout)
    }
}

#[cfg(test)]
mod tests {
    use std::{sync::Arc, time::Duration};

    use super::*;
    use crate::handle::wait_any;

    #[test]
    fn auto_reset_event_releases_one_wait() {
        let ev = HEVENT::create(false, true, None).unwrap();
        assert_eq!(ev.wait(Timeout::Millis(0)).unwrap(), WaitOutcome::Signaled);
        assert_eq!(ev.wait(Timeout::Millis(0)).unwrap(), WaitOutcome::TimedOut);
    }

    #[test]
    fn manual_reset_event_stays_signaled() {
        let ev = HEVENT::create(true, false, None).unwrap();
        assert_eq!(ev.wait(Timeout::Millis(0)).unwrap(), WaitOutcome::TimedOut);
        ev.set().unwrap();
        assert_eq!(ev.wait(Timeout::Millis(0)).unwrap(), WaitOutcome::Signaled);
        assert_eq!(ev.wait(Timeout::Millis(0)).unwrap(), WaitOutcome::Signaled);
        ev.reset().unwrap();
        assert_eq!(ev.wait(Timeout::Millis(0)).unwrap(), WaitOutcome::TimedOut);
    }

    #[test]
    fn set_from_another_thread_wakes_the_waiter() {
        let ev = Arc::new(HEVENT::create(false, false, None).unwrap());
        let setter = Arc::clone(&ev);
        let t = std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(20));
            setter.set().unwrap();
        });
        assert_eq!(ev.wait(Timeout::Millis(5_000)).unwrap(), WaitOutcome::Signaled);
        t.join().unwrap();
    }

    #[test]
    fn named_event_is_shared() {
        let name = format!("Local\\winhandle-event-{}", std::process::id());
        let a = HEVENT::create(true, false, Some(&name)).unwrap();
        assert!(!a.existed());
        let b = HEVENT::create(true, false, Some(&name)).unwrap();
        assert!(b.existed());
        let c = HEVENT::open(&name).unwrap();
        c.set().unwrap();
        assert_eq!(a.wait(Timeout::Millis(0)).unwrap(), WaitOutcome::Signaled);
        assert_eq!(b.wait(Timeout::Millis(0)).unwrap(), WaitOutcome::Signaled);
    }

    #[test]
    fn open_missing_event_fails() {
        let err = HEVENT::open("Local\\winhandle-no-such-event").unwrap_err();
        assert!(err.is_win32(codes::ERROR_FILE_NOT_FOUND), "{err}");
    }

    #[test]
    fn wait_any_reports_the_signaled_index() {
        let a = HEVENT::create(true, false, None).unwrap();
        let b = HEVENT::create(true, false, None).unwrap();
        b.set().unwrap();
        let (i, outcome) = wait_any(&[a.raw(), b.raw()], Timeout::Millis(0)).unwrap();
        assert_eq!((i, outcome), (1, WaitOutcome::Signaled));
    }
}
