// ── Icons & cursors ───────────────────────────────────────────────────────────
//
// Stock icons and cursors are shared USER objects: the system owns them and
// they must never be destroyed.  Icons from `ExtractIconExW`, `CopyIcon` or
// `SHGetFileInfoW` are owned and go back through `DestroyIcon` on drop.

#![allow(unsafe_code)]

use std::{ffi::c_void, path::Path};

use tracing::warn;
use windows::{
    core::PCWSTR,
    Win32::{
        Graphics::Gdi::{DeleteObject, GetObjectW, BITMAP, HBITMAP, HGDIOBJ},
        UI::{
            Shell::ExtractIconExW,
            WindowsAndMessaging::{
                self as wam, CopyIcon, DestroyIcon, GetIconInfo, LoadCursorW, LoadIconW, ICONINFO,
            },
        },
    },
};

use super::flags::{StockCursor, StockIcon};
use crate::{
    error::{Error, Result, ResultExt},
    marshal::WString,
};

/// `MAKEINTRESOURCEW`: a numeric id smuggled through a string pointer.
fn int_resource(id: u16) -> PCWSTR {
    PCWSTR(id as usize as *const u16)
}

// ── HICON ─────────────────────────────────────────────────────────────────────

#[derive(Debug)]
pub struct HICON {
    raw: wam::HICON,
    owned: bool,
}

// SAFETY: icons are USER objects usable and destroyable from any thread.
unsafe impl Send for HICON {}

impl HICON {
    /// A stock icon (`IDI_*`).  Shared: never destroyed.
    pub fn system(icon: StockIcon) -> Result<Self> {
        // SAFETY: a NULL module with an integer resource id selects the
        // predefined icons.
        let raw = unsafe { LoadIconW(None, int_resource(icon as u16)) }.context("LoadIconW")?;
        Ok(Self { raw, owned: false })
    }

    /// Take ownership of an icon returned by an API that hands out copies.
    pub(crate) fn from_owned(raw: wam::HICON) -> Self {
        Self { raw, owned: true }
    }

    /// Number of icons stored in an executable, DLL or `.ico` file.
    pub fn count_in(path: impl AsRef<Path>) -> Result<u32> {
        let wpath = WString::from_path(path.as_ref())?;
        // SAFETY: an index of -1 with no output arrays only counts.
        let n = unsafe { ExtractIconExW(wpath.as_pcwstr(), -1, None, None, 0) };
        if n == u32::MAX {
            return Err(Error::last("ExtractIconExW"));
        }
        Ok(n)
    }

    /// The large and small variants of the icon at `index`.  Either is
    /// `None` when the file does not provide it.
    pub fn extract(path: impl AsRef<Path>, index: i32) -> Result<(Option<Self>, Option<Self>)> {
        let wpath = WString::from_path(path.as_ref())?;
        let mut large = wam::HICON::default();
        let mut small = wam::HICON::default();
        // SAFETY: each output pointer refers to one HICON, matching nIcons=1.
        let n = unsafe {
            ExtractIconExW(
                wpath.as_pcwstr(),
                index,
                Some(&mut large as *mut wam::HICON),
                Some(&mut small as *mut wam::HICON),
                1,
            )
        };
        if n == u32::MAX {
            return Err(Error::last("ExtractIconExW"));
        }
        let wrap = |h: wam::HICON| (!h.is_invalid()).then(|| Self::from_owned(h));
        Ok((wrap(large), wrap(small)))
    }

    pub fn raw(&self) -> wam::HICON {
        self.raw
    }

    pub fn is_owned(&self) -> bool {
        self.owned
    }

    /// An owned duplicate (`CopyIcon`).
    pub fn copy(&self) -> Result<Self> {
        // SAFETY: self.raw is a live icon.
        let raw = unsafe { CopyIcon(self.raw) }.context("CopyIcon")?;
        Ok(Self::from_owned(raw))
    }

    /// Width and height in pixels.
    pub fn size(&self) -> Result<(i32, i32)> {
        let mut info = ICONINFO::default();
        // SAFETY: `info` is a valid out-pointer.  The bitmaps it receives are
        // ours and are deleted below.
        unsafe { GetIconInfo(self.raw, &mut info) }.context("GetIconInfo")?;
        let color = info.hbmColor;
        let mask = info.hbmMask;

        // A monochrome icon has no colour bitmap; its mask stacks the AND and
        // XOR halves, so it is twice the icon's height.
        let measured = if color.is_invalid() {
            bitmap_size(mask).map(|(w, h)| (w, h / 2))
        } else {
            bitmap_size(color)
        };
        delete_bitmap(color);
        delete_bitmap(mask);
        measured
    }
}

impl Drop for HICON {
    fn drop(&mut self) {
        if !self.owned {
            return;
        }
        // SAFETY: owned icons came from an API that transfers ownership and
        // are destroyed exactly once.
        if let Err(e) = unsafe { DestroyIcon(self.raw) } {
            warn!(error = %e, "DestroyIcon failed");
        }
    }
}

fn bitmap_size(hbm: HBITMAP) -> Result<(i32, i32)> {
    let mut bm = BITMAP::default();
    // SAFETY: `bm` is a BITMAP-sized out buffer for a bitmap handle.
    let n = unsafe {
        GetObjectW(
            HGDIOBJ(hbm.0),
            std::mem::size_of::<BITMAP>() as i32,
            Some(&mut bm as *mut BITMAP as *mut c_void),
        )
    };
    if n == 0 {
        return Err(Error::last("GetObjectW"));
    }
    Ok((bm.bmWidth, bm.bmHeight))
}

fn delete_bitmap(hbm: HBITMAP) {
    if hbm.is_invalid() {
        return;
    }
    // SAFETY: bitmaps from GetIconInfo belong to the caller.
    if !unsafe { DeleteObject(HGDIOBJ(hbm.0)) }.as_bool() {
        warn!("DeleteObject failed for an icon bitmap");
    }
}

// ── HCURSOR ───────────────────────────────────────────────────────────────────

/// A stock cursor.  Shared, so there is nothing to release.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HCURSOR(wam::HCURSOR);

// SAFETY: as for HICON; stock cursors are never destroyed.
unsafe impl Send for HCURSOR {}
// SAFETY: immutable shared handle.
unsafe impl Sync for HCURSOR {}

impl HCURSOR {
    pub fn system(cursor: StockCursor) -> Result<Self> {
        // SAFETY: as for HICON::system.
        let raw = unsafe { LoadCursorW(None, int_resource(cursor as u16)) }.context("LoadCursorW")?;
        Ok(Self(raw))
    }

    pub fn raw(self) -> wam::HCURSOR {
        self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kernel::system;

    fn shell32() -> std::path::PathBuf {
        system::expand_env("%SystemRoot%\\System32\\shell32.dll").unwrap().into()
    }

    #[test]
    fn stock_icons_are_shared() {
        let icon = HICON::system(StockIcon::Application).unwrap();
        assert!(!icon.is_owned());
        let (w, h) = icon.size().unwrap();
        assert!(w > 0 && h > 0);
    }

    #[test]
    fn copies_are_owned() {
        let icon = HICON::system(StockIcon::Warning).unwrap();
        let copy = icon.copy().unwrap();
        assert!(copy.is_owned());
        assert_ne!(copy.raw(), icon.raw());
        assert_eq!(copy.size().unwrap(), icon.size().unwrap());
    }

    #[test]
    fn shell32_holds_many_icons() {
        assert!(HICON::count_in(shell32()).unwrap() > 10);
    }

    #[test]
    fn extract_returns_large_and_small() {
        let (large, small) = HICON::extract(shell32(), 0).unwrap();
        let (lw, _) = large.expect("large icon").size().unwrap();
        let (sw, _) = small.expect("small icon").size().unwrap();
        assert!(lw > sw);
    }

    #[test]
    fn stock_cursor_loads() {
        let arrow = HCURSOR::system(StockCursor::Arrow).unwrap();
        assert!(!arrow.raw().is_invalid());
    }
}
