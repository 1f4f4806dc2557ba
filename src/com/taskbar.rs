// ── Taskbar progress (ITaskbarList3) ──────────────────────────────────────────

#![allow(unsafe_code)]

use windows::Win32::UI::Shell::{ITaskbarList3, TaskbarList, TBPFLAG};

use super::create_instance;
use crate::{
    error::{Result, ResultExt},
    user::window::HWND,
};

/// `TBPF_*`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(i32)]
pub enum ProgressState {
    NoProgress = 0,
    Indeterminate = 1,
    Normal = 2,
    Error = 4,
    Paused = 8,
}

/// The taskbar button of a top-level window.  Requires COM on the calling
/// thread.
#[derive(Debug)]
pub struct Taskbar(ITaskbarList3);

impl Taskbar {
    pub fn new() -> Result<Self> {
        let list: ITaskbarList3 = create_instance(&TaskbarList)?;
        // SAFETY: HrInit must precede every other call on the object.
        unsafe { list.HrInit() }.context("ITaskbarList3::HrInit")?;
        Ok(Self(list))
    }

    /// Show `done` out of `total` on the window's button.
    pub fn set_progress(&self, hwnd: HWND, done: u64, total: u64) -> Result<()> {
        // SAFETY: any window handle is accepted; values are clamped by the
        // shell.
        unsafe { self.0.SetProgressValue(hwnd.raw(), done.min(total), total) }
            .context("ITaskbarList3::SetProgressValue")
    }

    pub fn set_state(&self, hwnd: HWND, state: ProgressState) -> Result<()> {
        // SAFETY: plain value arguments.
        unsafe { self.0.SetProgressState(hwnd.raw(), TBPFLAG(state as i32)) }
            .context("ITaskbarList3::SetProgressState")
    }
}
