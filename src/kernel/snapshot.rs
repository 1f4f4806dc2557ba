// ── Toolhelp32 snapshots ──────────────────────────────────────────────────────
//
// A snapshot is a kernel handle; each walk (`processes`, `threads`,
// `modules`) restarts with the matching `*First` call, so walks can be
// repeated and interleaved.

#![allow(unsafe_code)]

use std::marker::PhantomData;

use serde::Serialize;
use tracing::trace;
use windows::Win32::{
    Foundation::HANDLE,
    System::Diagnostics::ToolHelp::{
        CreateToolhelp32Snapshot, Module32FirstW, Module32NextW, Process32FirstW,
        Process32NextW, Thread32First, Thread32Next, CREATE_TOOLHELP_SNAPSHOT_FLAGS,
        MODULEENTRY32W, PROCESSENTRY32W, THREADENTRY32,
    },
};

use super::flags::SnapshotFlags;
use crate::{
    error::{codes, Result, ResultExt},
    handle::{KernelHandle, OwnedHandle},
    marshal::from_wide,
};

#[derive(Debug, Clone, Serialize)]
pub struct ProcessEntry {
    pub pid: u32,
    pub parent_pid: u32,
    pub threads: u32,
    pub base_priority: i32,
    pub exe_file: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ThreadEntry {
    pub tid: u32,
    pub owner_pid: u32,
    pub base_priority: i32,
}

#[derive(Debug, Clone, Serialize)]
pub struct ModuleEntry {
    pub pid: u32,
    pub base_address: usize,
    pub size: u32,
    pub name: String,
    pub path: String,
}

// ── Entry kinds ───────────────────────────────────────────────────────────────

/// One Toolhelp32 record type and its First/Next pair.  Implemented by
/// the three entry structs above.
pub trait Entry: Sized {
    type Raw;

    /// A zeroed record with `dwSize` set.
    fn blank() -> Self::Raw;

    /// # Safety
    /// `h` must be an open snapshot handle.
    unsafe fn first(h: HANDLE, raw: &mut Self::Raw) -> windows::core::Result<()>;

    /// # Safety
    /// As for `first`.
    unsafe fn next(h: HANDLE, raw: &mut Self::Raw) -> windows::core::Result<()>;

    fn convert(raw: &Self::Raw) -> Self;

    const FIRST: &'static str;
    const NEXT: &'static str;
}

impl Entry for ProcessEntry {
    type Raw = PROCESSENTRY32W;
    const FIRST: &'static str = "Process32FirstW";
    const NEXT: &'static str = "Process32NextW";

    fn blank() -> Self::Raw {
        PROCESSENTRY32W {
            dwSize: std::mem::size_of::<PROCESSENTRY32W>() as u32,
            ..Default::default()
        }
    }

    unsafe fn first(h: HANDLE, raw: &mut Self::Raw) -> windows::core::Result<()> {
        // SAFETY: forwarded from the caller; `raw` has dwSize set.
        unsafe { Process32FirstW(h, raw) }
    }

    unsafe fn next(h: HANDLE, raw: &mut Self::Raw) -> windows::core::Result<()> {
        // SAFETY: as above.
        unsafe { Process32NextW(h, raw) }
    }

    fn convert(raw: &Self::Raw) -> Self {
        Self {
            pid: raw.th32ProcessID,
            parent_pid: raw.th32ParentProcessID,
            threads: raw.cntThreads,
            base_priority: raw.pcPriClassBase,
            exe_file: from_wide(&raw.szExeFile),
        }
    }
}

impl Entry for ThreadEntry {
    type Raw = THREADENTRY32;
    const FIRST: &'static str = "Thread32First";
    const NEXT: &'static str = "Thread32Next";

    fn blank() -> Self::Raw {
        THREADENTRY32 {
            dwSize: std::mem::size_of::<THREADENTRY32>() as u32,
            ..Default::default()
        }
    }

    unsafe fn first(h: HANDLE, raw: &mut Self::Raw) -> windows::core::Result<()> {
        // SAFETY: forwarded from the caller; `raw` has dwSize set.
        unsafe { Thread32First(h, raw) }
    }

    unsafe fn next(h: HANDLE, raw: &mut Self::Raw) -> windows::core::Result<()> {
        // SAFETY: as above.
        unsafe { Thread32Next(h, raw) }
    }

    fn convert(raw: &Self::Raw) -> Self {
        Self {
            tid: raw.th32ThreadID,
            owner_pid: raw.th32OwnerProcessID,
            base_priority: raw.tpBasePri,
        }
    }
}

impl Entry for ModuleEntry {
    type Raw = MODULEENTRY32W;
    const FIRST: &'static str = "Module32FirstW";
    const NEXT: &'static str = "Module32NextW";

    fn blank() -> Self::Raw {
        MODULEENTRY32W {
            dwSize: std::mem::size_of::<MODULEENTRY32W>() as u32,
            ..Default::default()
        }
    }

    unsafe fn first(h: HANDLE, raw: &mut Self::Raw) -> windows::core::Result<()> {
        // SAFETY: forwarded from the caller; `raw` has dwSize set.
        unsafe { Module32FirstW(h, raw) }
    }

    unsafe fn next(h: HANDLE, raw: &mut Self::Raw) -> windows::core::Result<()> {
        // SAFETY: as above.
        unsafe { Module32NextW(h, raw) }
    }

    fn convert(raw: &Self::Raw) -> Self {
        Self {
            pid: raw.th32ProcessID,
            base_address: raw.modBaseAddr as usize,
            size: raw.modBaseSize,
            name: from_wide(&raw.szModule),
            path: from_wide(&raw.szExePath),
        }
    }
}

// ── Snapshot ──────────────────────────────────────────────────────────────────

#[derive(Debug)]
pub struct Snapshot {
    handle: OwnedHandle,
    pid: u32,
}

impl KernelHandle for Snapshot {
    fn raw(&self) -> HANDLE {
        self.handle.raw()
    }
}

impl Snapshot {
    /// `CreateToolhelp32Snapshot`.  `pid = 0` means the current process for
    /// module snapshots; process and thread snapshots are system-wide.
    pub fn new(flags: SnapshotFlags, pid: u32) -> Result<Self> {
        // SAFETY: plain value arguments.
        let h = unsafe { CreateToolhelp32Snapshot(CREATE_TOOLHELP_SNAPSHOT_FLAGS(flags.bits()), pid) }
            .context("CreateToolhelp32Snapshot")?;
        trace!(?flags, pid, "created toolhelp snapshot");
        Ok(Self {
            handle: OwnedHandle::from_raw(h, "CreateToolhelp32Snapshot")?,
            pid,
        })
    }

    /// Every running process, captured now.
    pub fn processes_now() -> Result<Vec<ProcessEntry>> {
        Self::new(SnapshotFlags::PROCESS, 0)?.processes().collect()
    }

    pub fn processes(&self) -> Entries<'_, ProcessEntry> {
        Entries::new(self)
    }

    /// Threads in the snapshot; limited to `pid`'s threads when the snapshot
    /// was taken for a specific process.
    pub fn threads(&self) -> impl Iterator<Item = Result<ThreadEntry>> + '_ {
        let pid = self.pid;
        Entries::<ThreadEntry>::new(self)
            .filter(move |t| pid == 0 || t.as_ref().map_or(true, |t| t.owner_pid == pid))
    }

    pub fn modules(&self) -> Entries<'_, ModuleEntry> {
        Entries::new(self)
    }
}

/// Walk over one record type of a snapshot.  `ERROR_NO_MORE_FILES` ends the
/// walk; any other failure is yielded once.
pub struct Entries<'a, T: Entry> {
    snapshot: &'a Snapshot,
    started: bool,
    done: bool,
    _kind: PhantomData<T>,
}

impl<'a, T: Entry> Entries<'a, T> {
    fn new(snapshot: &'a Snapshot) -> Self {
        Self {
            snapshot,
            started: false,
            done: false,
            _kind: PhantomData,
        }
    }
}

impl<T: Entry> Iterator for Entries<'_, T> {
    type Item = Result<T>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        let h = self.snapshot.raw();
        let mut raw = T::blank();
        let (r, function) = if self.started {
            // SAFETY: the snapshot handle is open for the borrow's lifetime.
            (unsafe { T::next(h, &mut raw) }, T::NEXT)
        } else {
            self.started = true;
            // SAFETY: as above.
            (unsafe { T::first(h, &mut raw) }, T::FIRST)
        };
        match r.context(function) {
            Ok(()) => Some(Ok(T::convert(&raw))),
            Err(e) => {
                self.done = true;
                if e.is_win32(codes::ERROR_NO_MORE_FILES) {
                    None
                } else {
                    Some(Err(e))
                }
            }
        }
    }
}
