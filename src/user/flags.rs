// ── user32 constants ──────────────────────────────────────────────────────────

use bitflags::bitflags;

/// `SW_*` show commands (`ShowWindow`, `STARTUPINFOW::wShowWindow`,
/// `ShellExecuteW`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[repr(i32)]
pub enum ShowWindow {
    Hide = 0,
    #[default]
    Normal = 1,
    ShowMinimized = 2,
    ShowMaximized = 3,
    ShowNoActivate = 4,
    Show = 5,
    Minimize = 6,
    ShowMinNoActive = 7,
    ShowNa = 8,
    Restore = 9,
    ShowDefault = 10,
}

/// Stock icons loadable with `LoadIconW(NULL, IDI_*)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u16)]
pub enum StockIcon {
    Application = 32512,
    Error = 32513,
    Question = 32514,
    Warning = 32515,
    Information = 32516,
    WinLogo = 32517,
    Shield = 32518,
}

/// Stock cursors loadable with `LoadCursorW(NULL, IDC_*)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u16)]
pub enum StockCursor {
    Arrow = 32512,
    IBeam = 32513,
    Wait = 32514,
    Cross = 32515,
    UpArrow = 32516,
    SizeNwse = 32642,
    SizeNesw = 32643,
    SizeWe = 32644,
    SizeNs = 32645,
    SizeAll = 32646,
    No = 32648,
    Hand = 32649,
    AppStarting = 32650,
    Help = 32651,
}

/// `MONITOR_DEFAULTTO*`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum MonitorDefault {
    Null = 0,
    Primary = 1,
    Nearest = 2,
}

bitflags! {
    /// `MB_*` style bits for `MessageBoxW`.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct MessageBoxStyle: u32 {
        const OK_CANCEL         = 0x0000_0001;
        const ABORT_RETRY_IGNORE = 0x0000_0002;
        const YES_NO_CANCEL     = 0x0000_0003;
        const YES_NO            = 0x0000_0004;
        const RETRY_CANCEL      = 0x0000_0005;
        const ICON_ERROR        = 0x0000_0010;
        const ICON_QUESTION     = 0x0000_0020;
        const ICON_WARNING      = 0x0000_0030;
        const ICON_INFORMATION  = 0x0000_0040;
        const DEFBUTTON2        = 0x0000_0100;
        const DEFBUTTON3        = 0x0000_0200;
        const SYSTEM_MODAL      = 0x0000_1000;
        const TASK_MODAL        = 0x0000_2000;
        const SET_FOREGROUND    = 0x0001_0000;
        const TOPMOST           = 0x0004_0000;
    }
}

/// The button that dismissed a message box (`ID*`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DialogResult {
    Ok,
    Cancel,
    Abort,
    Retry,
    Ignore,
    Yes,
    No,
    TryAgain,
    Continue,
    Other(i32),
}

impl DialogResult {
    pub fn from_raw(v: i32) -> Self {
        match v {
            1 => Self::Ok,
            2 => Self::Cancel,
            3 => Self::Abort,
            4 => Self::Retry,
            5 => Self::Ignore,
            6 => Self::Yes,
            7 => Self::No,
            10 => Self::TryAgain,
            11 => Self::Continue,
            other => Self::Other(other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dialog_result_maps_id_values() {
        assert_eq!(DialogResult::from_raw(1), DialogResult::Ok);
        assert_eq!(DialogResult::from_raw(6), DialogResult::Yes);
        assert_eq!(DialogResult::from_raw(42), DialogResult::Other(42));
    }

    #[test]
    fn icon_styles_do_not_overlap_buttons() {
        let style = MessageBoxStyle::YES_NO | MessageBoxStyle::ICON_WARNING;
        assert_eq!(style.bits(), 0x34);
    }

    #[test]
    fn show_window_defaults_to_normal() {
        assert_eq!(ShowWindow::default() as i32, 1);
    }
}
