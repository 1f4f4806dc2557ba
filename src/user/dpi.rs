#![cfg_attr(windows, allow(unsafe_code))]

/// The DPI at which one logical pixel is one device pixel.
pub const BASE_DPI: u32 = 96;

/// Scale a pixel value defined at 96 DPI to `dpi`, rounding toward zero and
/// saturating at the `i32` range.
pub fn scale(px: i32, dpi: u32) -> i32 {
    let v = i64::from(px) * i64::from(dpi) / i64::from(BASE_DPI);
    v.clamp(i64::from(i32::MIN), i64::from(i32::MAX)) as i32
}

#[cfg(windows)]
pub use live::*;

#[cfg(windows)]
mod live {
    use windows::Win32::UI::HiDpi::{
        GetDpiForSystem, GetDpiForWindow, SetProcessDpiAwarenessContext,
        DPI_AWARENESS_CONTEXT_PER_MONITOR_AWARE_V2,
    };

    use super::BASE_DPI;
    use crate::{
        error::{Result, ResultExt},
        user::window::HWND,
    };

    /// Opt into Per-Monitor v2 DPI awareness.
    /// MUST be called before any window is created; fails with
    /// `ERROR_ACCESS_DENIED` once the awareness has been set.
    pub fn set_process_per_monitor_v2() -> Result<()> {
        // SAFETY: process-wide setting with a constant argument.
        unsafe { SetProcessDpiAwarenessContext(DPI_AWARENESS_CONTEXT_PER_MONITOR_AWARE_V2) }
            .context("SetProcessDpiAwarenessContext")
    }

    /// Return the DPI for `hwnd`. Falls back to BASE_DPI (96) on failure.
    pub fn for_window(hwnd: HWND) -> u32 {
        // SAFETY: an invalid window yields 0, handled below.
        let v = unsafe { GetDpiForWindow(hwnd.raw()) };
        if v == 0 {
            BASE_DPI
        } else {
            v
        }
    }

    /// The system DPI, used before any window exists.
    pub fn for_system() -> u32 {
        // SAFETY: GetDpiForSystem takes no parameters and always succeeds on Win10+.
        match unsafe { GetDpiForSystem() } {
            0 => BASE_DPI,
            v => v,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scale_is_identity_at_base_dpi() {
        assert_eq!(scale(100, BASE_DPI), 100);
    }

    #[test]
    fn scale_at_common_factors() {
        assert_eq!(scale(100, 120), 125);
        assert_eq!(scale(100, 144), 150);
        assert_eq!(scale(-10, 192), -20);
        assert_eq!(scale(i32::MAX / 2, 96), i32::MAX / 2);
    }

    #[test]
    fn scale_saturates_instead_of_wrapping() {
        assert_eq!(scale(i32::MAX, 192), i32::MAX);
        assert_eq!(scale(i32::MIN, 192), i32::MIN);
        assert_eq!(scale(1, u32::MAX), (u32::MAX / 96) as i32);
        assert_eq!(scale(100, u32::MAX), i32::MAX);
    }

    #[cfg(windows)]
    #[test]
    fn system_dpi_is_at_least_base() {
        assert!(for_system() >= BASE_DPI / 2);
    }
}
