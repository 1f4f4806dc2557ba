// ── Common file dialogs ───────────────────────────────────────────────────────
//
// `FileDialog` wraps `GetOpenFileNameW` / `GetSaveFileNameW`.  Both return
// `Ok(None)` when the user cancels; any other failure comes back as an
// error carrying the `CDERR_*` code from `CommDlgExtendedError`.

#![allow(unsafe_code)]

use std::path::PathBuf;

use windows::{
    core::{PCWSTR, PWSTR},
    Win32::UI::Controls::Dialogs::{
        CommDlgExtendedError, GetOpenFileNameW, GetSaveFileNameW, OFN_FILEMUSTEXIST,
        OFN_HIDEREADONLY, OFN_OVERWRITEPROMPT, OFN_PATHMUSTEXIST, OPENFILENAMEW,
        OPEN_FILENAME_FLAGS,
    },
};

use super::window::HWND;
use crate::{
    error::{Error, Result},
    marshal::{from_wide, multi_sz, WString, MAX_WIDE_BUF},
};

/// Filter used when none is configured.
const ALL_FILES: (&str, &str) = ("All Files (*.*)", "*.*");

/// Builder for the Open and Save As dialogs.
///
/// Defaults: no owner window, the system title, an "All Files" filter and
/// an empty file name.
#[derive(Debug, Clone, Default)]
pub struct FileDialog {
    filters: Vec<(String, String)>,
    default_name: String,
    title: Option<String>,
    owner: Option<HWND>,
}

impl FileDialog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a filter entry such as `("Text Files", "*.txt;*.log")`.
    pub fn filter(mut self, name: &str, pattern: &str) -> Self {
        self.filters.push((name.to_owned(), pattern.to_owned()));
        self
    }

    /// Pre-fill the file name field.
    pub fn default_name(mut self, name: &str) -> Self {
        self.default_name = name.to_owned();
        self
    }

    pub fn title(mut self, title: &str) -> Self {
        self.title = Some(title.to_owned());
        self
    }

    pub fn owner(mut self, owner: HWND) -> Self {
        self.owner = Some(owner);
        self
    }

    /// The filter list in its double-NUL layout.
    fn filter_units(&self) -> Result<Vec<u16>> {
        if self.filters.is_empty() {
            return multi_sz::encode([ALL_FILES.0, ALL_FILES.1]);
        }
        multi_sz::encode(
            self.filters
                .iter()
                .flat_map(|(name, pattern)| [name.as_str(), pattern.as_str()]),
        )
    }

    /// The file-name buffer: the default name followed by zeros.
    fn name_buffer(&self) -> Result<Vec<u16>> {
        let name = WString::new(&self.default_name)?;
        let mut buf = vec![0u16; MAX_WIDE_BUF];
        let n = name.len().min(MAX_WIDE_BUF - 1);
        buf[..n].copy_from_slice(&name.as_slice()[..n]);
        Ok(buf)
    }

    /// Show the Open dialog.  The chosen file must exist.
    pub fn open(&self) -> Result<Option<PathBuf>> {
        self.show(
            "GetOpenFileNameW",
            OFN_FILEMUSTEXIST | OFN_PATHMUSTEXIST | OFN_HIDEREADONLY,
            |ofn| {
                // SAFETY: every pointer in `ofn` refers to a buffer owned by
                // `show` that outlives this modal call.
                unsafe { GetOpenFileNameW(ofn) }.as_bool()
            },
        )
    }

    /// Show the Save As dialog; overwriting asks for confirmation.
    pub fn save(&self) -> Result<Option<PathBuf>> {
        self.show(
            "GetSaveFileNameW",
            OFN_OVERWRITEPROMPT | OFN_PATHMUSTEXIST,
            |ofn| {
                // SAFETY: as for open.
                unsafe { GetSaveFileNameW(ofn) }.as_bool()
            },
        )
    }

    fn show<F>(&self, function: &'static str, flags: OPEN_FILENAME_FLAGS, call: F) -> Result<Option<PathBuf>>
    where
        F: FnOnce(&mut OPENFILENAMEW) -> bool,
    {
        let filter = self.filter_units()?;
        let title = self.title.as_deref().map(WString::new).transpose()?;
        let mut buf = self.name_buffer()?;

        let mut ofn = OPENFILENAMEW {
            lStructSize: std::mem::size_of::<OPENFILENAMEW>() as u32,
            hwndOwner: self.owner.map(HWND::raw).unwrap_or_default(),
            lpstrFilter: PCWSTR(filter.as_ptr()),
            nFilterIndex: 1,
            lpstrFile: PWSTR(buf.as_mut_ptr()),
            nMaxFile: buf.len() as u32,
            lpstrTitle: WString::opt_pcwstr(title.as_ref()),
            Flags: flags,
            ..Default::default()
        };

        if call(&mut ofn) {
            return Ok(Some(PathBuf::from(from_wide(&buf))));
        }
        // SAFETY: no parameters; reads this thread's dialog error state.
        let code = unsafe { CommDlgExtendedError() }.0;
        if code == 0 {
            Ok(None)
        } else {
            Err(Error::Win32 { function, code })
        }
    }
}
