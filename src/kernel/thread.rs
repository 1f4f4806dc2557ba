// ── Threads ───────────────────────────────────────────────────────────────────

#![allow(unsafe_code)]

use std::time::Duration;

use windows::Win32::{
    Foundation::{BOOL, HANDLE},
    System::Threading::{
        GetCurrentThread, GetCurrentThreadId, GetExitCodeThread, GetThreadId,
        GetThreadPriority, OpenThread, ResumeThread, SetThreadPriority, Sleep, SuspendThread,
        THREAD_ACCESS_RIGHTS, THREAD_PRIORITY,
    },
};

use super::flags::{ThreadAccess, ThreadPriority};
use crate::{
    error::{codes, Error, Result, ResultExt},
    handle::{KernelHandle, MaybeOwned, OwnedHandle, Timeout, WaitOutcome},
};

/// `SuspendThread` / `ResumeThread` failure value.
const SUSPEND_FAILED: u32 = u32::MAX;

#[derive(Debug)]
pub struct HTHREAD(MaybeOwned);

impl KernelHandle for HTHREAD {
    fn raw(&self) -> HANDLE {
        self.0.raw()
    }
}

impl HTHREAD {
    /// The calling thread's pseudo-handle; never closed.
    pub fn current() -> Self {
        // SAFETY: no parameters; always returns the pseudo-handle.
        Self(MaybeOwned::Pseudo(unsafe { GetCurrentThread() }))
    }

    pub fn open(tid: u32, access: ThreadAccess) -> Result<Self> {
        // SAFETY: plain value arguments.
        let h = unsafe { OpenThread(THREAD_ACCESS_RIGHTS(access.bits()), BOOL::from(false), tid) }
            .context("OpenThread")?;
        Ok(Self::from_owned(OwnedHandle::from_raw(h, "OpenThread")?))
    }

    pub(crate) fn from_owned(h: OwnedHandle) -> Self {
        Self(MaybeOwned::Owned(h))
    }

    pub fn id(&self) -> Result<u32> {
        // SAFETY: plain handle argument; 0 signals failure.
        match unsafe { GetThreadId(self.raw()) } {
            0 => Err(Error::last("GetThreadId")),
            tid => Ok(tid),
        }
    }

    /// Increment the suspend count; returns the previous count.
    pub fn suspend(&self) -> Result<u32> {
        // SAFETY: plain handle argument.
        match unsafe { SuspendThread(self.raw()) } {
            SUSPEND_FAILED => Err(Error::last("SuspendThread")),
            prev => Ok(prev),
        }
    }

    /// Decrement the suspend count; the thread runs again once it reaches
    /// zero.  Returns the previous count.
    pub fn resume(&self) -> Result<u32> {
        // SAFETY: plain handle argument.
        match unsafe { ResumeThread(self.raw()) } {
            SUSPEND_FAILED => Err(Error::last("ResumeThread")),
            prev => Ok(prev),
        }
    }

    /// `None` while the thread is still running.
    pub fn exit_code(&self) -> Result<Option<u32>> {
        let mut code = 0u32;
        // SAFETY: `code` is a valid out-pointer.
        unsafe { GetExitCodeThread(self.raw(), &mut code) }.context("GetExitCodeThread")?;
        if code == codes::STILL_ACTIVE && self.wait(Timeout::Millis(0))? == WaitOutcome::TimedOut {
            return Ok(None);
        }
        Ok(Some(code))
    }

    pub fn priority(&self) -> Result<ThreadPriority> {
        // SAFETY: plain handle argument.
        let raw = unsafe { GetThreadPriority(self.raw()) };
        if raw == ThreadPriority::ERROR_RETURN {
            return Err(Error::last("GetThreadPriority"));
        }
        ThreadPriority::from_raw(raw).ok_or(Error::Win32 {
            function: "GetThreadPriority",
            code: codes::ERROR_INVALID_PARAMETER,
        })
    }

    pub fn set_priority(&self, priority: ThreadPriority) -> Result<()> {
        // SAFETY: plain value arguments.
        unsafe { SetThreadPriority(self.raw(), THREAD_PRIORITY(priority as i32)) }
            .context("SetThreadPriority")
    }
}

pub fn current_id() -> u32 {
    // SAFETY: no parameters; cannot fail.
    unsafe { GetCurrentThreadId() }
}

/// `Sleep`, saturating just below `INFINITE`.
pub fn sleep(d: Duration) {
    let ms = Timeout::from(d).as_millis();
    // SAFETY: plain value argument.
    unsafe { Sleep(ms) }
}

#[cfg(test)]
mod tests {
    use std::sync::mpsc;

    use super::*;

    #[test]
    fn current_thread_id_matches() {
        assert_eq!(HTHREAD::current().id().unwrap(), current_id());
        assert_eq!(HTHREAD::current().exit_code().unwrap(), None);
    }

    #[test]
    fn exit_code_of_a_finished_thread() {
        let (tx, rx) = mpsc::channel();
        let worker = std::thread::spawn(move || tx.send(current_id()).unwrap());
        let tid = rx.recv().unwrap();
        let h = HTHREAD::open(tid, ThreadAccess::QUERY_LIMITED_INFORMATION | ThreadAccess::SYNCHRONIZE)
            .unwrap();
        worker.join().unwrap();
        assert_eq!(h.wait(Timeout::Infinite).unwrap(), WaitOutcome::Signaled);
        assert_eq!(h.exit_code().unwrap(), Some(0));
    }

    #[test]
    fn suspend_counts_nest() {
        let (tx, rx) = mpsc::channel();
        let (stop_tx, stop_rx) = mpsc::channel::<()>();
        let worker = std::thread::spawn(move || {
            tx.send(current_id()).unwrap();
            let _ = stop_rx.recv();
        });
        let tid = rx.recv().unwrap();
        let h = HTHREAD::open(tid, ThreadAccess::SUSPEND_RESUME).unwrap();
        assert_eq!(h.suspend().unwrap(), 0);
        assert_eq!(h.suspend().unwrap(), 1);
        assert_eq!(h.resume().unwrap(), 2);
        assert_eq!(h.resume().unwrap(), 1);
        stop_tx.send(()).unwrap();
        worker.join().unwrap();
    }

    #[test]
    fn priority_round_trip() {
        let me = HTHREAD::current();
        let original = me.priority().unwrap();
        me.set_priority(ThreadPriority::BelowNormal).unwrap();
        assert_eq!(me.priority().unwrap(), ThreadPriority::BelowNormal);
        me.set_priority(original).unwrap();
    }

    #[test]
    fn sleep_blocks_for_roughly_the_duration() {
        let start = std::time::Instant::now();
        sleep(Duration::from_millis(20));
        assert!(start.elapsed() >= Duration::from_millis(15));
    }
}
