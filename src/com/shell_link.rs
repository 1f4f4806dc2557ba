// ── Shell shortcuts (.lnk) ────────────────────────────────────────────────────

#![allow(unsafe_code)]

use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::debug;
use windows::{
    core::Interface,
    Win32::{
        Foundation::BOOL,
        Storage::FileSystem::WIN32_FIND_DATAW,
        System::Com::{IPersistFile, STGM_READ},
        UI::Shell::{IShellLinkW, ShellLink as CLSID_SHELL_LINK},
    },
};

use super::create_instance;
use crate::{
    error::{Result, ResultExt},
    marshal::{from_wide, WString},
};

/// Buffer size for shortcut getters; paths in a .lnk are limited to
/// `INFOTIPSIZE`.
const FIELD_LEN: usize = 1024;

/// Builder for a shortcut file.  Requires COM on the calling thread (see
/// [`super::ComInit`]).
///
/// Every field defaults to unset, which leaves it empty in the shortcut.
#[derive(Debug, Clone, Default)]
pub struct ShellLink {
    target: Option<PathBuf>,
    arguments: Option<String>,
    working_dir: Option<PathBuf>,
    description: Option<String>,
    icon: Option<(PathBuf, i32)>,
}

/// What a shortcut points at.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ShortcutInfo {
    pub target: PathBuf,
    pub arguments: String,
    pub working_dir: PathBuf,
    pub description: String,
    pub icon_path: PathBuf,
    pub icon_index: i32,
}

impl ShellLink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn target(mut self, path: impl Into<PathBuf>) -> Self {
        self.target = Some(path.into());
        self
    }

    pub fn arguments(mut self, args: &str) -> Self {
        self.arguments = Some(args.to_owned());
        self
    }

    pub fn working_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_dir = Some(dir.into());
        self
    }

    pub fn description(mut self, text: &str) -> Self {
        self.description = Some(text.to_owned());
        self
    }

    pub fn icon(mut self, path: impl Into<PathBuf>, index: i32) -> Self {
        self.icon = Some((path.into(), index));
        self
    }

    /// Write the shortcut to `lnk_path`, replacing any existing file.
    pub fn save(&self, lnk_path: impl AsRef<Path>) -> Result<()> {
        let lnk_path = lnk_path.as_ref();
        let link: IShellLinkW = create_instance(&CLSID_SHELL_LINK)?;

        if let Some(target) = &self.target {
            let w = WString::from_path(target)?;
            // SAFETY: each string is NUL-terminated and outlives its call;
            // the link copies it.
            unsafe { link.SetPath(w.as_pcwstr()) }.context("IShellLinkW::SetPath")?;
        }
        if let Some(args) = &self.arguments {
            let w = WString::new(args)?;
            // SAFETY: as above.
            unsafe { link.SetArguments(w.as_pcwstr()) }.context("IShellLinkW::SetArguments")?;
        }
        if let Some(dir) = &self.working_dir {
            let w = WString::from_path(dir)?;
            // SAFETY: as above.
            unsafe { link.SetWorkingDirectory(w.as_pcwstr()) }
                .context("IShellLinkW::SetWorkingDirectory")?;
        }
        if let Some(text) = &self.description {
            let w = WString::new(text)?;
            // SAFETY: as above.
            unsafe { link.SetDescription(w.as_pcwstr()) }.context("IShellLinkW::SetDescription")?;
        }
        if let Some((path, index)) = &self.icon {
            let w = WString::from_path(path)?;
            // SAFETY: as above.
            unsafe { link.SetIconLocation(w.as_pcwstr(), *index) }
                .context("IShellLinkW::SetIconLocation")?;
        }

        let file: IPersistFile = link.cast().context("QueryInterface(IPersistFile)")?;
        let wlnk = WString::from_path(lnk_path)?;
        // SAFETY: wlnk is NUL-terminated; TRUE makes it the current file.
        unsafe { file.Save(wlnk.as_pcwstr(), BOOL::from(true)) }.context("IPersistFile::Save")?;
        debug!(path = %lnk_path.display(), "saved shortcut");
        Ok(())
    }

    /// Read an existing shortcut.  The target is returned as stored, without
    /// resolving a moved file.
    pub fn load(lnk_path: impl AsRef<Path>) -> Result<ShortcutInfo> {
        let link: IShellLinkW = create_instance(&CLSID_SHELL_LINK)?;
        let file: IPersistFile = link.cast().context("QueryInterface(IPersistFile)")?;
        let wlnk = WString::from_path(lnk_path.as_ref())?;
        // SAFETY: wlnk is NUL-terminated.
        unsafe { file.Load(wlnk.as_pcwstr(), STGM_READ) }.context("IPersistFile::Load")?;

        let mut buf = vec![0u16; FIELD_LEN];
        let mut fd = WIN32_FIND_DATAW::default();
        // SAFETY: each slice carries its length and `fd` is a
        // valid out-pointer.
        unsafe { link.GetPath(&mut buf, &mut fd, 0) }.context("IShellLinkW::GetPath")?;
        let target = PathBuf::from(from_wide(&buf));

        buf.fill(0);
        // SAFETY: as above.
        unsafe { link.GetArguments(&mut buf) }.context("IShellLinkW::GetArguments")?;
        let arguments = from_wide(&buf);

        buf.fill(0);
        // SAFETY: as above.
        unsafe { link.GetWorkingDirectory(&mut buf) }.context("IShellLinkW::GetWorkingDirectory")?;
        let working_dir = PathBuf::from(from_wide(&buf));

        buf.fill(0);
        // SAFETY: as above.
        unsafe { link.GetDescription(&mut buf) }.context("IShellLinkW::GetDescription")?;
        let description = from_wide(&buf);

        buf.fill(0);
        let mut icon_index = 0i32;
        // SAFETY: as above.
        unsafe { link.GetIconLocation(&mut buf, &mut icon_index) }
            .context("IShellLinkW::GetIconLocation")?;
        let icon_path = PathBuf::from(from_wide(&buf));

        Ok(ShortcutInfo {
            target,
            arguments,
            working_dir,
            description,
            icon_path,
            icon_index,
        })
    }
}
