// ── shell32 ───────────────────────────────────────────────────────────────────
//
// `ShellExecuteW`, known folders, `SHGetFileInfoW`, `CommandLineToArgvW` and
// tray icons.  The folder ids, info flags and the `ShellExecuteW` error
// mapping are pure; the calls themselves exist only on Windows.

use bitflags::bitflags;
use serde::Serialize;

use crate::error::codes;

#[cfg(windows)]
mod execute;
#[cfg(windows)]
mod notify;

#[cfg(windows)]
pub use execute::{execute, file_info, known_folder, open, split_command_line, FileInfo};
#[cfg(windows)]
pub use notify::NotifyIcon;

// ── Known folders ─────────────────────────────────────────────────────────────

/// `FOLDERID_*` values for `SHGetKnownFolderPath`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum KnownFolder {
    Desktop,
    Documents,
    Downloads,
    LocalAppData,
    RoamingAppData,
    ProgramFiles,
    System,
    Windows,
    Startup,
    Profile,
}

impl KnownFolder {
    pub const ALL: [KnownFolder; 10] = [
        Self::Desktop,
        Self::Documents,
        Self::Downloads,
        Self::LocalAppData,
        Self::RoamingAppData,
        Self::ProgramFiles,
        Self::System,
        Self::Windows,
        Self::Startup,
        Self::Profile,
    ];

    /// The folder's GUID as one big-endian integer
    /// (`GUID::from_u128` layout).
    pub fn guid(self) -> u128 {
        match self {
            Self::Desktop => 0xB4BFCC3A_DB2C_424C_B029_7FE99A87C641,
            Self::Documents => 0xFDD39AD0_238F_46AF_ADB4_6C85480369C7,
            Self::Downloads => 0x374DE290_123F_4565_9164_39C4925E467B,
            Self::LocalAppData => 0xF1B32785_6FBA_4FCF_9D55_7B8E7F157091,
            Self::RoamingAppData => 0x3EB685DB_65F9_4CF6_A03A_E3EF65729F3D,
            Self::ProgramFiles => 0x905E63B6_C1BF_494E_B29C_65B732D3D21A,
            Self::System => 0x1AC14E77_02E7_4E5D_B744_2EB1AE5198B7,
            Self::Windows => 0xF38BF404_1D43_42F2_9305_67DE0B28FC23,
            Self::Startup => 0xB97D20BB_F46A_4C97_BA10_5E3608430854,
            Self::Profile => 0x5E6C858F_0E22_4760_9AFE_EA3317B67173,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Desktop => "desktop",
            Self::Documents => "documents",
            Self::Downloads => "downloads",
            Self::LocalAppData => "local_app_data",
            Self::RoamingAppData => "roaming_app_data",
            Self::ProgramFiles => "program_files",
            Self::System => "system",
            Self::Windows => "windows",
            Self::Startup => "startup",
            Self::Profile => "profile",
        }
    }
}

bitflags! {
    /// `SHGFI_*` for `SHGetFileInfoW`.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct FileInfoFlags: u32 {
        const LARGE_ICON         = 0x0000_0000;
        const SMALL_ICON         = 0x0000_0001;
        const OPEN_ICON          = 0x0000_0002;
        /// Treat the path as a name only; the file need not exist.
        const USE_FILE_ATTRIBUTES = 0x0000_0010;
        const ICON               = 0x0000_0100;
        const DISPLAY_NAME       = 0x0000_0200;
        const TYPE_NAME          = 0x0000_0400;
    }
}

// ── ShellExecuteW results ─────────────────────────────────────────────────────

const SE_ERR_FNF: usize = 2;
const SE_ERR_PNF: usize = 3;
const SE_ERR_ACCESSDENIED: usize = 5;
const SE_ERR_OOM: usize = 8;

/// Translate a failing `ShellExecuteW` return value (32 or less) into a
/// Win32 error code.
///
/// The `SE_ERR_*` codes that alias Win32 codes map onto them; 0 (out of
/// resources) becomes `ERROR_NOT_ENOUGH_MEMORY`; the rest are kept.
pub fn shell_execute_error(value: usize) -> u32 {
    match value {
        0 | SE_ERR_OOM => codes::ERROR_NOT_ENOUGH_MEMORY,
        SE_ERR_FNF => codes::ERROR_FILE_NOT_FOUND,
        SE_ERR_PNF => codes::ERROR_PATH_NOT_FOUND,
        SE_ERR_ACCESSDENIED => codes::ERROR_ACCESS_DENIED,
        other => other as u32,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shell_execute_codes_map_to_win32() {
        assert_eq!(shell_execute_error(2), codes::ERROR_FILE_NOT_FOUND);
        assert_eq!(shell_execute_error(3), codes::ERROR_PATH_NOT_FOUND);
        assert_eq!(shell_execute_error(5), codes::ERROR_ACCESS_DENIED);
        assert_eq!(shell_execute_error(8), codes::ERROR_NOT_ENOUGH_MEMORY);
        assert_eq!(shell_execute_error(0), codes::ERROR_NOT_ENOUGH_MEMORY);
        // SE_ERR_NOASSOC has no Win32 twin and is passed through.
        assert_eq!(shell_execute_error(31), 31);
    }

    #[test]
    fn folder_names_are_unique() {
        let mut names: Vec<_> = KnownFolder::ALL.iter().map(|f| f.name()).collect();
        names.sort_unstable();
        names.dedup();
        assert_eq!(names.len(), KnownFolder::ALL.len());
    }

    #[test]
    fn documents_guid_matches_folderid() {
        // {FDD39AD0-238F-46AF-ADB4-6C85480369C7}
        let g = KnownFolder::Documents.guid();
        assert_eq!((g >> 96) as u32, 0xFDD39AD0);
        assert_eq!(g as u16, 0x69C7);
    }

    #[test]
    fn icon_size_flags_are_exclusive_bits() {
        let flags = FileInfoFlags::ICON | FileInfoFlags::SMALL_ICON;
        assert_eq!(flags.bits(), 0x101);
        assert!(FileInfoFlags::LARGE_ICON.is_empty());
    }
}
