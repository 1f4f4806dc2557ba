// ── Notification-area icons ───────────────────────────────────────────────────
//
// A `NotifyIcon` is identified by its owner window and id.  Each call
// rebuilds a `NOTIFYICONDATAW` from the current settings; strings longer than
// the struct's fixed fields are truncated by `copy_to_fixed`.

#![allow(unsafe_code)]

use tracing::{debug, warn};
use windows::Win32::UI::Shell::{
    Shell_NotifyIconW, NIF_ICON, NIF_INFO, NIF_MESSAGE, NIF_TIP, NIIF_INFO, NIM_ADD, NIM_DELETE,
    NIM_MODIFY, NOTIFYICONDATAW, NOTIFY_ICON_MESSAGE,
};

use crate::{
    error::{Error, Result},
    marshal::copy_to_fixed,
    user::{icon::HICON, window::HWND},
};

/// A tray icon.  Removed from the notification area on drop if it was
/// added.
///
/// Defaults: no tooltip, no icon, no callback message.
#[derive(Debug)]
pub struct NotifyIcon {
    hwnd: HWND,
    id: u32,
    tip: String,
    icon: Option<HICON>,
    callback_message: Option<u32>,
    added: bool,
}

impl NotifyIcon {
    pub fn new(hwnd: HWND, id: u32) -> Self {
        Self {
            hwnd,
            id,
            tip: String::new(),
            icon: None,
            callback_message: None,
            added: false,
        }
    }

    /// Tooltip text; at most 127 UTF-16 units are shown.
    pub fn tip(&mut self, tip: &str) -> &mut Self {
        self.tip = tip.to_owned();
        self
    }

    /// The icon is kept alive for as long as it is displayed.
    pub fn icon(&mut self, icon: HICON) -> &mut Self {
        self.icon = Some(icon);
        self
    }

    /// Message posted to the owner window on mouse events over the icon.
    pub fn callback_message(&mut self, msg: u32) -> &mut Self {
        self.callback_message = Some(msg);
        self
    }

    pub fn is_added(&self) -> bool {
        self.added
    }

    fn data(&self) -> NOTIFYICONDATAW {
        let mut nid = NOTIFYICONDATAW {
            cbSize: std::mem::size_of::<NOTIFYICONDATAW>() as u32,
            hWnd: self.hwnd.raw(),
            uID: self.id,
            ..Default::default()
        };
        if !self.tip.is_empty() {
            nid.uFlags |= NIF_TIP;
            copy_to_fixed(&self.tip, &mut nid.szTip);
        }
        if let Some(icon) = &self.icon {
            nid.uFlags |= NIF_ICON;
            nid.hIcon = icon.raw();
        }
        if let Some(msg) = self.callback_message {
            nid.uFlags |= NIF_MESSAGE;
            nid.uCallbackMessage = msg;
        }
        nid
    }

    fn notify(&self, message: NOTIFY_ICON_MESSAGE, nid: &NOTIFYICONDATAW) -> Result<()> {
        // SAFETY: `nid` is fully initialised with its size.
        if unsafe { Shell_NotifyIconW(message, nid) }.as_bool() {
            Ok(())
        } else {
            Err(Error::last("Shell_NotifyIconW"))
        }
    }

    /// `NIM_ADD`.
    pub fn add(&mut self) -> Result<()> {
        self.notify(NIM_ADD, &self.data())?;
        self.added = true;
        debug!(id = self.id, "added notify icon");
        Ok(())
    }

    /// `NIM_MODIFY` with the current settings.
    pub fn modify(&self) -> Result<()> {
        self.notify(NIM_MODIFY, &self.data())
    }

    /// Show an informational balloon over the icon.
    pub fn balloon(&self, title: &str, text: &str) -> Result<()> {
        let mut nid = self.data();
        nid.uFlags |= NIF_INFO;
        nid.dwInfoFlags = NIIF_INFO;
        copy_to_fixed(title, &mut nid.szInfoTitle);
        copy_to_fixed(text, &mut nid.szInfo);
        self.notify(NIM_MODIFY, &nid)
    }
}

impl Drop for NotifyIcon {
    fn drop(&mut self) {
        if !self.added {
            return;
        }
        let nid = NOTIFYICONDATAW {
            cbSize: std::mem::size_of::<NOTIFYICONDATAW>() as u32,
            hWnd: self.hwnd.raw(),
            uID: self.id,
            ..Default::default()
        };
        if let Err(e) = self.notify(NIM_DELETE, &nid) {
            warn!(id = self.id, error = %e, "removing notify icon failed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        marshal::from_wide,
        user::{flags::StockIcon, window::test_support::TestWindow},
    };

    fn tray_present() -> bool {
        matches!(HWND::find(Some("Shell_TrayWnd"), None), Ok(Some(_)))
    }

    fn bare() -> NotifyIcon {
        NotifyIcon::new(HWND::from_raw(Default::default()), 7)
    }

    #[test]
    fn defaults_set_no_flags() {
        let nid = bare().data();
        assert_eq!(nid.uID, 7);
        assert_eq!(nid.uFlags.0, 0);
    }

    #[test]
    fn settings_raise_their_flags() {
        let mut icon = bare();
        icon.tip("hello")
            .callback_message(0x8001)
            .icon(HICON::system(StockIcon::Information).unwrap());
        let nid = icon.data();
        assert_eq!(nid.uFlags, NIF_TIP | NIF_MESSAGE | NIF_ICON);
        assert_eq!(from_wide(&nid.szTip), "hello");
        assert_eq!(nid.uCallbackMessage, 0x8001);
    }

    #[test]
    fn long_tips_are_truncated_and_terminated() {
        let mut icon = bare();
        icon.tip(&"x".repeat(500));
        let nid = icon.data();
        assert_eq!(from_wide(&nid.szTip).len(), nid.szTip.len() - 1);
        assert_eq!(nid.szTip[nid.szTip.len() - 1], 0);
    }

    #[test]
    fn never_added_icon_drops_quietly() {
        let icon = bare();
        assert!(!icon.is_added());
    }

    #[test]
    fn icon_is_added_modified_and_removed() {
        if !tray_present() {
            return;
        }
        let owner = TestWindow::top_level("winhandle tray owner");
        let mut icon = NotifyIcon::new(owner.0, 41);
        icon.tip("winhandle")
            .callback_message(0x8000 + 41)
            .icon(HICON::system(StockIcon::Application).unwrap());
        icon.add().unwrap();
        assert!(icon.is_added());

        icon.tip("winhandle, updated");
        icon.modify().unwrap();
        icon.balloon("winhandle", "balloon text").unwrap();
        drop(icon);

        // Gone from the tray: modifying the same id fails.
        let stale = NotifyIcon::new(owner.0, 41);
        assert!(stale.modify().is_err());
    }

    #[test]
    fn modifying_an_icon_never_added_fails() {
        if !tray_present() {
            return;
        }
        let owner = TestWindow::top_level("winhandle tray missing");
        let mut icon = NotifyIcon::new(owner.0, 42);
        icon.tip("never shown");
        assert!(icon.modify().is_err());
        assert!(!icon.is_added());
    }
}
