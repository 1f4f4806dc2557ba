#![allow(unsafe_code)]

use std::{
    ffi::c_void,
    path::{Path, PathBuf},
};

use tracing::debug;
use windows::{
    core::GUID,
    Win32::{
        Foundation::{HANDLE, HLOCAL, HWND, LocalFree},
        Storage::FileSystem::FILE_ATTRIBUTE_NORMAL,
        UI::{
            Shell::{
                CommandLineToArgvW, SHGetFileInfoW, SHGetKnownFolderPath, ShellExecuteW,
                KNOWN_FOLDER_FLAG, SHFILEINFOW, SHGFI_FLAGS,
            },
            WindowsAndMessaging::SHOW_WINDOW_CMD,
        },
    },
};

use super::{shell_execute_error, FileInfoFlags, KnownFolder};
use crate::{
    com::CoTaskMem,
    error::{Error, Result, ResultExt},
    marshal::{from_wide, from_wide_ptr, WString},
    user::{flags::ShowWindow, icon::HICON},
};

/// `ShellExecuteW`.  `verb` is `None` for the default verb (usually
/// "open").
pub fn execute(
    verb: Option<&str>,
    file: &str,
    params: Option<&str>,
    dir: Option<&Path>,
    show: ShowWindow,
) -> Result<()> {
    let wverb = verb.map(WString::new).transpose()?;
    let wfile = WString::new(file)?;
    let wparams = params.map(WString::new).transpose()?;
    let wdir = dir.map(WString::from_path).transpose()?;
    // SAFETY: every string is NUL-terminated or NULL and outlives the call.
    let r = unsafe {
        ShellExecuteW(
            HWND::default(),
            WString::opt_pcwstr(wverb.as_ref()),
            wfile.as_pcwstr(),
            WString::opt_pcwstr(wparams.as_ref()),
            WString::opt_pcwstr(wdir.as_ref()),
            SHOW_WINDOW_CMD(show as i32),
        )
    };
    // The result is an HINSTANCE only for 16-bit compatibility; values above
    // 32 mean success.
    let value = r.0 as usize;
    if value > 32 {
        debug!(file, ?verb, "shell execute");
        Ok(())
    } else {
        Err(Error::Win32 {
            function: "ShellExecuteW",
            code: shell_execute_error(value),
        })
    }
}

/// Open a file, folder or URL with its associated application.
pub fn open(target: &str) -> Result<()> {
    execute(None, target, None, None, ShowWindow::Normal)
}

pub fn known_folder(folder: KnownFolder) -> Result<PathBuf> {
    let id = GUID::from_u128(folder.guid());
    // SAFETY: `id` is a valid GUID; default flags for the current user.
    let p = unsafe { SHGetKnownFolderPath(&id, KNOWN_FOLDER_FLAG(0), HANDLE::default()) }
        .context("SHGetKnownFolderPath")?;
    // SAFETY: the shell allocates the path with CoTaskMemAlloc.
    let _owner = unsafe { CoTaskMem::from_raw(p.0) };
    // SAFETY: the buffer is a NUL-terminated string, alive until `_owner`
    // drops at the end of this scope.
    Ok(PathBuf::from(unsafe { from_wide_ptr(p.0) }))
}

/// What Explorer shows for a file.
#[derive(Debug)]
pub struct FileInfo {
    pub display_name: String,
    pub type_name: String,
    /// Present when `FileInfoFlags::ICON` was requested.
    pub icon: Option<HICON>,
}

/// `SHGetFileInfoW`.  Display and type names are filled when the matching
/// flags are set and are empty otherwise.
pub fn file_info(path: impl AsRef<Path>, flags: FileInfoFlags) -> Result<FileInfo> {
    let wpath = WString::from_path(path.as_ref())?;
    let mut sfi = SHFILEINFOW::default();
    // SAFETY: `sfi` is a valid out-pointer of the announced size.
    let r = unsafe {
        SHGetFileInfoW(
            wpath.as_pcwstr(),
            FILE_ATTRIBUTE_NORMAL,
            Some(&mut sfi as *mut SHFILEINFOW),
            std::mem::size_of::<SHFILEINFOW>() as u32,
            SHGFI_FLAGS(flags.bits()),
        )
    };
    if r == 0 {
        return Err(Error::last("SHGetFileInfoW"));
    }
    let icon = (!sfi.hIcon.is_invalid()).then(|| HICON::from_owned(sfi.hIcon));
    Ok(FileInfo {
        display_name: from_wide(&sfi.szDisplayName),
        type_name: from_wide(&sfi.szTypeName),
        icon,
    })
}

/// Split a command line the way the C runtime builds `argv`
/// (`CommandLineToArgvW`).  An empty line yields no arguments.
pub fn split_command_line(line: &str) -> Result<Vec<String>> {
    // An empty string would make the system return the executable's path.
    if line.trim().is_empty() {
        return Ok(Vec::new());
    }
    let wline = WString::new(line)?;
    let mut argc = 0i32;
    // SAFETY: wline is NUL-terminated; `argc` is a valid out-pointer.
    let argv = unsafe { CommandLineToArgvW(wline.as_pcwstr(), &mut argc) };
    if argv.is_null() {
        return Err(Error::last("CommandLineToArgvW"));
    }
    // SAFETY: the system returned `argc` string pointers, each
    // NUL-terminated, in one LocalAlloc block.
    let ptrs = unsafe { std::slice::from_raw_parts(argv, argc.max(0) as usize) };
    let mut args = Vec::with_capacity(ptrs.len());
    for p in ptrs {
        // SAFETY: as above.
        args.push(unsafe { from_wide_ptr(p.0) });
    }
    // SAFETY: the block is released once, after every string was copied.
    unsafe {
        let _ = LocalFree(HLOCAL(argv as *mut c_void));
    }
    Ok(args)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn split_follows_crt_quoting() {
        let args = split_command_line(r#"prog.exe "a b" c\"d "e\\" f"#).unwrap();
        assert_eq!(args, ["prog.exe", "a b", "c\"d", "e\\", "f"]);
    }

    #[test]
    fn split_empty_line_is_empty() {
        assert!(split_command_line("").unwrap().is_empty());
        assert!(split_command_line("   ").unwrap().is_empty());
    }

    #[test]
    fn split_agrees_with_cmdline_join() {
        let line = crate::marshal::cmdline::join("C:\\tools\\x.exe", ["plain", "with space", "trail\\", "q\"uote"]);
        let args = split_command_line(&line).unwrap();
        assert_eq!(args, ["C:\\tools\\x.exe", "plain", "with space", "trail\\", "q\"uote"]);
    }

    #[test]
    fn windows_folder_contains_system32() {
        let windows = known_folder(KnownFolder::Windows).unwrap();
        let system = known_folder(KnownFolder::System).unwrap();
        assert_eq!(system.parent(), Some(windows.as_path()));
    }

    #[test]
    fn every_known_folder_resolves_or_fails_cleanly() {
        for folder in KnownFolder::ALL {
            if let Ok(path) = known_folder(folder) {
                assert!(path.is_absolute(), "{folder:?}: {}", path.display());
            }
        }
    }

    #[test]
    fn file_info_by_extension_needs_no_file() {
        let info = file_info(
            "nothing-here.txt",
            FileInfoFlags::TYPE_NAME | FileInfoFlags::ICON | FileInfoFlags::SMALL_ICON | FileInfoFlags::USE_FILE_ATTRIBUTES,
        )
        .unwrap();
        assert!(!info.type_name.is_empty());
        let icon = info.icon.expect("icon requested");
        assert!(icon.is_owned());
    }
}
