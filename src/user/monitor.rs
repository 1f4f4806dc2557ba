// ── Display monitors ──────────────────────────────────────────────────────────

#![allow(unsafe_code)]

use serde::Serialize;
use windows::Win32::{
    Foundation::{BOOL, LPARAM, POINT, RECT},
    Graphics::Gdi::{
        self as gdi, EnumDisplayMonitors, GetMonitorInfoW, MonitorFromPoint, MonitorFromWindow,
        HDC, MONITORINFO, MONITORINFOEXW, MONITOR_FROM_FLAGS,
    },
};

use super::{callback::EnumState, flags::MonitorDefault, window::HWND, Rect};
use crate::{
    error::{Error, Result},
    marshal::from_wide,
};

/// `MONITORINFOF_PRIMARY`
const MONITORINFOF_PRIMARY: u32 = 0x1;

/// A display monitor.  Monitors are owned by the system.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HMONITOR(gdi::HMONITOR);

// SAFETY: a monitor handle is a system-wide identifier.
unsafe impl Send for HMONITOR {}
// SAFETY: as above.
unsafe impl Sync for HMONITOR {}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MonitorInfo {
    /// GDI device name, e.g. `\\.\DISPLAY1`.
    pub device: String,
    pub rect: Rect,
    /// The monitor minus the taskbar and docked toolbars.
    pub work_area: Rect,
    pub primary: bool,
}

impl HMONITOR {
    pub fn raw(self) -> gdi::HMONITOR {
        self.0
    }

    /// The monitor holding the screen origin.
    pub fn primary() -> Self {
        let flags = MONITOR_FROM_FLAGS(MonitorDefault::Primary as u32);
        // SAFETY: plain value arguments; this default never yields NULL.
        Self(unsafe { MonitorFromPoint(POINT::default(), flags) })
    }

    /// The monitor containing a screen point; `None` only with
    /// `MonitorDefault::Null` when the point is off every monitor.
    pub fn from_point(x: i32, y: i32, default: MonitorDefault) -> Option<Self> {
        // SAFETY: plain value arguments.
        let h = unsafe { MonitorFromPoint(POINT { x, y }, MONITOR_FROM_FLAGS(default as u32)) };
        (!h.is_invalid()).then_some(Self(h))
    }

    /// The monitor with the largest overlap with `hwnd`.
    pub fn from_window(hwnd: HWND, default: MonitorDefault) -> Option<Self> {
        // SAFETY: any window handle is accepted.
        let h = unsafe { MonitorFromWindow(hwnd.raw(), MONITOR_FROM_FLAGS(default as u32)) };
        (!h.is_invalid()).then_some(Self(h))
    }

    pub fn info(self) -> Result<MonitorInfo> {
        let mut mi = MONITORINFOEXW::default();
        mi.monitorInfo.cbSize = std::mem::size_of::<MONITORINFOEXW>() as u32;
        // SAFETY: cbSize announces the extended layout, which begins with a
        // MONITORINFO.
        let ok = unsafe { GetMonitorInfoW(self.0, &mut mi as *mut MONITORINFOEXW as *mut MONITORINFO) };
        if !ok.as_bool() {
            return Err(Error::last("GetMonitorInfoW"));
        }
        let base = &mi.monitorInfo;
        Ok(MonitorInfo {
            device: from_wide(&mi.szDevice),
            rect: base.rcMonitor.into(),
            work_area: base.rcWork.into(),
            primary: base.dwFlags & MONITORINFOF_PRIMARY != 0,
        })
    }
}

unsafe extern "system" fn enum_proc(h: gdi::HMONITOR, _hdc: HDC, rect: *mut RECT, lparam: LPARAM) -> BOOL {
    // SAFETY: the system passes a valid monitor rectangle for the call.
    let r = unsafe { rect.as_ref() }.copied().unwrap_or_default();
    // SAFETY: lparam was produced by EnumState::<(HMONITOR, Rect)>::lparam
    // in enum_display_monitors.
    unsafe { EnumState::<(HMONITOR, Rect)>::dispatch(lparam, (HMONITOR(h), r.into())) }
}

/// Visit each display monitor with its bounds; the closure returns `false`
/// to stop.  A panic inside the closure is resumed after enumeration ends.
pub fn enum_display_monitors<F>(mut f: F) -> Result<()>
where
    F: FnMut(HMONITOR, Rect) -> bool,
{
    let mut adapt = |(h, r): (HMONITOR, Rect)| f(h, r);
    let mut state = EnumState::new(&mut adapt);
    let lparam = state.lparam();
    // SAFETY: `state` outlives the synchronous enumeration; no DC and no
    // clip rectangle means the whole virtual screen.
    let ok = unsafe { EnumDisplayMonitors(HDC::default(), None, Some(enum_proc), lparam) };
    let failure = (!ok.as_bool()).then(|| Error::last("EnumDisplayMonitors"));
    state.finish(failure)
}

/// Every display monitor.
pub fn monitors() -> Result<Vec<HMONITOR>> {
    let mut out = Vec::new();
    enum_display_monitors(|h, _| {
        out.push(h);
        true
    })?;
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exactly_one_primary_monitor() {
        let infos: Vec<_> = monitors()
            .unwrap()
            .into_iter()
            .map(|m| m.info().unwrap())
            .collect();
        assert!(!infos.is_empty());
        assert_eq!(infos.iter().filter(|i| i.primary).count(), 1);
        assert!(infos.iter().all(|i| i.device.starts_with("\\\\.\\")));
    }

    #[test]
    fn primary_contains_the_origin() {
        let info = HMONITOR::primary().info().unwrap();
        assert!(info.primary);
        assert!(info.rect.contains(0, 0));
        assert!(info.work_area.width() <= info.rect.width());
    }

    #[test]
    fn enumeration_rects_match_info() {
        enum_display_monitors(|h, r| {
            assert_eq!(h.info().unwrap().rect, r);
            true
        })
        .unwrap();
    }

    #[test]
    fn far_point_with_null_default_is_none() {
        assert!(HMONITOR::from_point(i32::MIN / 2, i32::MIN / 2, MonitorDefault::Null).is_none());
        assert!(HMONITOR::from_point(i32::MIN / 2, i32::MIN / 2, MonitorDefault::Nearest).is_some());
    }

    #[test]
    #[should_panic(expected = "monitor callback")]
    fn panic_is_resumed_after_enumeration() {
        let _ = enum_display_monitors(|_, _| panic!("monitor callback"));
    }
}
