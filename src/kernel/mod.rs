// ── kernel32 ──────────────────────────────────────────────────────────────────
//
// Kernel objects (files, mappings, processes, threads, events, modules) and
// the system queries that go with them.  `flags` is pure; everything else
// calls into kernel32 and only exists on Windows.

pub mod flags;

#[cfg(windows)]
pub mod event;
#[cfg(windows)]
pub mod file;
#[cfg(windows)]
pub mod find;
#[cfg(windows)]
pub mod mapping;
#[cfg(windows)]
pub mod module;
#[cfg(windows)]
pub mod process;
#[cfg(windows)]
pub mod snapshot;
#[cfg(windows)]
pub mod system;
#[cfg(windows)]
pub mod thread;
