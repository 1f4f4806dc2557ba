// ── user32 ────────────────────────────────────────────────────────────────────
//
// USER objects (icons, cursors, monitors, windows), the common dialogs and
// DDEML.  `flags`, `rect` and the DPI arithmetic are pure; the rest exists
// only on Windows.

pub mod dpi;
pub mod flags;
pub mod rect;

#[cfg(windows)]
mod callback;
#[cfg(windows)]
pub mod dde;
#[cfg(windows)]
pub mod dialogs;
#[cfg(windows)]
pub mod icon;
#[cfg(windows)]
pub mod monitor;
#[cfg(windows)]
pub mod window;

pub use rect::Rect;
