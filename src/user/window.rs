// ── Windows & the message loop ────────────────────────────────────────────────
//
// Responsibilities in this file (unsafe confined here):
//   • `HWND` queries on windows owned by anyone (never destroyed here).
//   • Closure-based `EnumWindows` / `EnumChildWindows`.
//   • `MessageBoxW`, the `GetMessageW` loop and `PostQuitMessage`.

#![allow(unsafe_code)]

use windows::Win32::{
    Foundation::{self as foundation, BOOL, LPARAM, LRESULT, RECT, WPARAM},
    UI::WindowsAndMessaging::{
        DispatchMessageW, EnumChildWindows, EnumWindows, FindWindowW, GetClassNameW,
        GetForegroundWindow, GetMessageW, GetWindowRect, GetWindowTextLengthW, GetWindowTextW,
        GetWindowThreadProcessId, IsWindow, IsWindowVisible, MessageBoxW, PostMessageW,
        PostQuitMessage, SendMessageW, SetWindowTextW, TranslateMessage, MESSAGEBOX_STYLE, MSG,
    },
};

use super::{
    callback::EnumState,
    flags::{DialogResult, MessageBoxStyle},
    Rect,
};
use crate::{
    error::{Error, Result, ResultExt},
    marshal::WString,
};

/// A window handle.  Not owned: the window belongs to whoever created it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HWND(foundation::HWND);

// SAFETY: a window handle is a system-wide identifier; every API used here
// accepts handles from any thread.
unsafe impl Send for HWND {}
// SAFETY: as above.
unsafe impl Sync for HWND {}

impl HWND {
    pub fn from_raw(h: foundation::HWND) -> Self {
        Self(h)
    }

    pub fn raw(self) -> foundation::HWND {
        self.0
    }

    pub fn is_null(self) -> bool {
        self.0.is_invalid()
    }

    /// `FindWindowW`; either criterion may be omitted.  `Ok(None)` when no
    /// top-level window matches.
    pub fn find(class: Option<&str>, title: Option<&str>) -> Result<Option<Self>> {
        let wclass = class.map(WString::new).transpose()?;
        let wtitle = title.map(WString::new).transpose()?;
        // SAFETY: both strings are NUL-terminated or NULL.
        let r = unsafe {
            FindWindowW(WString::opt_pcwstr(wclass.as_ref()), WString::opt_pcwstr(wtitle.as_ref()))
        };
        match r.context("FindWindowW") {
            Ok(h) => Ok(Some(Self(h))),
            // No match leaves the last error at zero.
            Err(e) if matches!(e.win32_code(), Some(0) | Some(2)) => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// The window that currently has the user's focus, if any.
    pub fn foreground() -> Option<Self> {
        // SAFETY: no parameters.
        let h = unsafe { GetForegroundWindow() };
        (!h.is_invalid()).then_some(Self(h))
    }

    pub fn is_window(self) -> bool {
        // SAFETY: any value is accepted.
        unsafe { IsWindow(self.0) }.as_bool()
    }

    pub fn text(self) -> Result<String> {
        // SAFETY: plain handle argument.
        let len = unsafe { GetWindowTextLengthW(self.0) }.max(0) as usize;
        let mut buf = vec![0u16; len + 1];
        // SAFETY: the slice carries the buffer length; the text is truncated
        // if it grew since the length query.
        let n = unsafe { GetWindowTextW(self.0, &mut buf) };
        if n == 0 && len != 0 {
            return Err(Error::last("GetWindowTextW"));
        }
        Ok(String::from_utf16_lossy(&buf[..n.max(0) as usize]))
    }

    pub fn set_text(self, text: &str) -> Result<()> {
        let wtext = WString::new(text)?;
        // SAFETY: wtext is NUL-terminated.
        unsafe { SetWindowTextW(self.0, wtext.as_pcwstr()) }.context("SetWindowTextW")
    }

    pub fn class_name(self) -> Result<String> {
        // Class names are limited to 256 characters.
        let mut buf = [0u16; 257];
        // SAFETY: the slice carries the buffer length.
        let n = unsafe { GetClassNameW(self.0, &mut buf) };
        if n == 0 {
            return Err(Error::last("GetClassNameW"));
        }
        Ok(String::from_utf16_lossy(&buf[..n as usize]))
    }

    /// `(thread id, process id)` of the window's creator.
    pub fn thread_process_id(self) -> Result<(u32, u32)> {
        let mut pid = 0u32;
        // SAFETY: `pid` is a valid out-pointer; 0 signals an invalid window.
        let tid = unsafe { GetWindowThreadProcessId(self.0, Some(&mut pid as *mut u32)) };
        if tid == 0 {
            return Err(Error::last("GetWindowThreadProcessId"));
        }
        Ok((tid, pid))
    }

    pub fn is_visible(self) -> bool {
        // SAFETY: plain handle argument.
        unsafe { IsWindowVisible(self.0) }.as_bool()
    }

    /// Window bounds in screen coordinates.
    pub fn rect(self) -> Result<Rect> {
        let mut r = RECT::default();
        // SAFETY: `r` is a valid out-pointer.
        unsafe { GetWindowRect(self.0, &mut r) }.context("GetWindowRect")?;
        Ok(r.into())
    }

    /// `PostMessageW`: queue and return immediately.
    pub fn post(self, msg: u32, wparam: usize, lparam: isize) -> Result<()> {
        // SAFETY: the message is delivered asynchronously; pointer-carrying
        // messages are the caller's responsibility.
        unsafe { PostMessageW(self.0, msg, WPARAM(wparam), LPARAM(lparam)) }.context("PostMessageW")
    }

    /// `SendMessageW`: deliver synchronously and return the window
    /// procedure's result.
    ///
    /// # Safety
    /// Messages whose parameters are pointers must carry pointers valid for
    /// the receiver, as the message's contract defines.
    pub unsafe fn send(self, msg: u32, wparam: usize, lparam: isize) -> isize {
        // SAFETY: forwarded to the caller.
        let LRESULT(r) = unsafe { SendMessageW(self.0, msg, WPARAM(wparam), LPARAM(lparam)) };
        r
    }

    /// Visit each child window; the closure returns `false` to stop.
    pub fn enum_children<F: FnMut(HWND) -> bool>(self, mut f: F) -> Result<()> {
        let mut state = EnumState::new(&mut f);
        let lparam = state.lparam();
        // SAFETY: `state` outlives the synchronous enumeration and the
        // trampoline's T matches.  EnumChildWindows has no meaningful return
        // value.
        unsafe {
            let _ = EnumChildWindows(self.0, Some(enum_proc), lparam);
        }
        state.finish(None)
    }
}

unsafe extern "system" fn enum_proc(hwnd: foundation::HWND, lparam: LPARAM) -> BOOL {
    // SAFETY: lparam was produced by EnumState::<HWND>::lparam in this file.
    unsafe { EnumState::<HWND>::dispatch(lparam, HWND(hwnd)) }
}

/// Visit each top-level window; the closure returns `false` to stop.
///
/// A panic inside the closure stops enumeration and is resumed here once
/// `EnumWindows` has returned.
pub fn enum_windows<F: FnMut(HWND) -> bool>(mut f: F) -> Result<()> {
    let mut state = EnumState::new(&mut f);
    let lparam = state.lparam();
    // SAFETY: as for enum_children.
    let r = unsafe { EnumWindows(Some(enum_proc), lparam) };
    let failure = r.context("EnumWindows").err();
    state.finish(failure)
}

/// Every top-level window.
pub fn windows() -> Result<Vec<HWND>> {
    let mut out = Vec::new();
    enum_windows(|h| {
        out.push(h);
        true
    })?;
    Ok(out)
}

// ── Dialog & message loop ─────────────────────────────────────────────────────

/// Show a modal message box and report which button closed it.
pub fn message_box(
    owner: Option<HWND>,
    text: &str,
    caption: &str,
    style: MessageBoxStyle,
) -> Result<DialogResult> {
    let wtext = WString::new(text)?;
    let wcaption = WString::new(caption)?;
    // SAFETY: both strings are NUL-terminated and live for the duration of
    // the modal call.  A NULL owner means the box has no owner window.
    let r = unsafe {
        MessageBoxW(
            owner.map(HWND::raw).unwrap_or_default(),
            wtext.as_pcwstr(),
            wcaption.as_pcwstr(),
            MESSAGEBOX_STYLE(style.bits()),
        )
    };
    if r.0 == 0 {
        return Err(Error::last("MessageBoxW"));
    }
    Ok(DialogResult::from_raw(r.0))
}

/// Run the calling thread's message loop until `WM_QUIT`; returns the quit
/// code passed to [`post_quit`].
pub fn pump_messages() -> Result<i32> {
    let mut msg = MSG::default();

    loop {
        // SAFETY: &mut msg is a valid MSG pointer; a NULL window retrieves
        // messages for all windows on this thread; 0,0 filter accepts all.
        let ret = unsafe { GetMessageW(&mut msg, foundation::HWND::default(), 0, 0) };

        match ret.0 {
            // GetMessageW returns -1 on error.
            -1 => return Err(Error::last("GetMessageW")),
            // Returns 0 when WM_QUIT is retrieved: exit the loop cleanly.
            0 => break,
            _ => unsafe {
                // SAFETY: msg was populated by a successful GetMessageW call.
                // TranslateMessage's result and DispatchMessageW's LRESULT
                // are intentionally unused.
                let _ = TranslateMessage(&msg);
                let _ = DispatchMessageW(&msg);
            },
        }
    }

    Ok(msg.wParam.0 as i32)
}

/// Post `WM_QUIT` to the calling thread's queue.
pub fn post_quit(code: i32) {
    // SAFETY: PostQuitMessage only touches the calling thread's queue.
    unsafe { PostQuitMessage(code) }
}

#[cfg(test)]
pub(crate) mod test_support {
    use std::time::{Duration, Instant};

    use windows::{
        core::w,
        Win32::UI::WindowsAndMessaging::{
            CreateWindowExW, DestroyWindow, HMENU, WINDOW_EX_STYLE, WINDOW_STYLE, WM_CLOSE,
            WS_CHILD, WS_OVERLAPPEDWINDOW,
        },
    };

    use super::HWND;
    use crate::marshal::WString;

    /// A hidden `STATIC` window, destroyed on drop.  Must be dropped on the
    /// thread that created it.
    pub(crate) struct TestWindow(pub(crate) HWND);

    impl TestWindow {
        pub(crate) fn top_level(title: &str) -> Self {
            Self::create(None, title, WS_OVERLAPPEDWINDOW)
        }

        pub(crate) fn child_of(parent: HWND, title: &str) -> Self {
            Self::create(Some(parent), title, WS_CHILD)
        }

        fn create(parent: Option<HWND>, title: &str, style: WINDOW_STYLE) -> Self {
            let wtitle = WString::new(title).unwrap();
            // SAFETY: STATIC is a system class; the title outlives the call.
            let h = unsafe {
                CreateWindowExW(
                    WINDOW_EX_STYLE(0),
                    w!("STATIC"),
                    wtitle.as_pcwstr(),
                    style,
                    0,
                    0,
                    120,
                    80,
                    parent.map(HWND::raw).unwrap_or_default(),
                    HMENU::default(),
                    None,
                    None,
                )
            }
            .unwrap();
            Self(HWND::from_raw(h))
        }
    }

    impl Drop for TestWindow {
        fn drop(&mut self) {
            // SAFETY: the window was created on this thread and is destroyed once.
            let _ = unsafe { DestroyWindow(self.0.raw()) };
        }
    }

    /// Close the first dialog titled `caption` once it appears, from another
    /// thread.  Joins to `true` if a dialog was found within ten seconds.
    pub(crate) fn close_dialog_when_shown(caption: &str) -> std::thread::JoinHandle<bool> {
        let caption = caption.to_owned();
        std::thread::spawn(move || {
            let deadline = Instant::now() + Duration::from_secs(10);
            while Instant::now() < deadline {
                if let Ok(Some(dialog)) = HWND::find(Some("#32770"), Some(&caption)) {
                    return dialog.post(WM_CLOSE, 0, 0).is_ok();
                }
                std::thread::sleep(Duration::from_millis(50));
            }
            false
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_support::{close_dialog_when_shown, TestWindow};

    #[test]
    fn enumeration_sees_top_level_windows() {
        // Every interactive session has at least the shell's tray window.
        let all = windows().unwrap();
        assert!(!all.is_empty());
        assert!(all.iter().all(|h| h.is_window()));
    }

    #[test]
    fn returning_false_stops_after_one() {
        let mut seen = 0;
        enum_windows(|_| {
            seen += 1;
            false
        })
        .unwrap();
        assert_eq!(seen, 1);
    }

    #[test]
    #[should_panic(expected = "boom in callback")]
    fn panics_cross_the_boundary_intact() {
        let _ = enum_windows(|_| panic!("boom in callback"));
    }

    #[test]
    fn window_queries_are_consistent() {
        let Some(h) = windows().unwrap().into_iter().find(|h| h.is_visible()) else {
            return;
        };
        let (tid, pid) = h.thread_process_id().unwrap();
        assert!(tid != 0 && pid != 0);
        assert!(!h.class_name().unwrap().is_empty());
        let r = h.rect().unwrap();
        assert!(r.width() >= 0 && r.height() >= 0);
        let _ = h.text().unwrap();
    }

    #[test]
    fn find_without_match_is_none() {
        let found = HWND::find(Some("WinhandleNoSuchClass"), None).unwrap();
        assert!(found.is_none());
    }

    #[test]
    fn children_of_a_fresh_window_are_enumerated() {
        let parent = TestWindow::top_level("winhandle enum parent");
        let a = TestWindow::child_of(parent.0, "first");
        let b = TestWindow::child_of(parent.0, "second");

        let mut seen = Vec::new();
        parent
            .0
            .enum_children(|h| {
                seen.push(h);
                true
            })
            .unwrap();
        assert_eq!(seen.len(), 2);
        assert!(seen.contains(&a.0) && seen.contains(&b.0));
        assert_eq!(a.0.text().unwrap(), "first");
        assert_eq!(a.0.class_name().unwrap().to_ascii_lowercase(), "static");

        let mut visited = 0;
        parent
            .0
            .enum_children(|_| {
                visited += 1;
                false
            })
            .unwrap();
        assert_eq!(visited, 1);
    }

    #[test]
    fn window_without_children_visits_nothing() {
        let lonely = TestWindow::top_level("winhandle lonely");
        let mut visited = 0;
        lonely
            .0
            .enum_children(|_| {
                visited += 1;
                true
            })
            .unwrap();
        assert_eq!(visited, 0);
    }

    #[test]
    fn text_can_be_replaced() {
        let w = TestWindow::top_level("before");
        w.0.set_text("after \u{00E9}").unwrap();
        assert_eq!(w.0.text().unwrap(), "after \u{00E9}");
        assert!(!w.0.is_visible());
        assert_eq!(w.0.thread_process_id().unwrap().1, std::process::id());
    }

    #[test]
    fn closed_message_box_reports_cancel() {
        let caption = format!("winhandle message box {}", std::process::id());
        let closer = close_dialog_when_shown(&caption);
        let result = message_box(None, "closing by itself", &caption, MessageBoxStyle::OK_CANCEL).unwrap();
        assert!(closer.join().unwrap());
        assert_eq!(result, DialogResult::Cancel);
    }

    #[test]
    fn quit_code_ends_the_loop() {
        post_quit(17);
        assert_eq!(pump_messages().unwrap(), 17);
    }

    #[test]
    fn posting_to_a_destroyed_window_fails() {
        let bogus = HWND::from_raw(foundation::HWND(0x7FFF_FFF0_usize as *mut _));
        assert!(!bogus.is_window());
        assert!(bogus.post(0x0400, 0, 0).is_err());
    }
}
