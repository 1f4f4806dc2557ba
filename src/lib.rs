// ── Safety policy ────────────────────────────────────────────────────────────
// Unsafe code is forbidden everywhere except the FFI modules, which opt in
// with `#![allow(unsafe_code)]`:
//   • `handle`, `kernel::*`   – kernel32 handles and syscalls
//   • `user::*`, `shell::*`   – user32 / shell32
//   • `com::*`                – ole32 and COM interfaces
// Each unsafe block in those modules MUST carry a `// SAFETY:` comment.
#![deny(unsafe_code)]
// Handle types keep their Win32 names (HFILE, HPROCESS, HICON, …).
#![allow(clippy::upper_case_acronyms)]

//! Thin, owned wrappers over the Win32 API.
//!
//! Every handle type maps to one native handle and releases it with the
//! matching function on drop.  Every method is one syscall: marshal the
//! arguments, call the export, and translate the failure into [`Error`].
//!
//! The marshaling helpers ([`marshal`]), flag types, FILETIME conversion
//! ([`time`]) and the error type compile on every platform; the FFI modules
//! exist only on Windows.

pub mod error;
pub mod handle;
pub mod kernel;
pub mod marshal;
pub mod shell;
pub mod time;
pub mod user;

#[cfg(windows)]
pub mod com;

pub use error::{Error, Result};
pub use handle::{Timeout, WaitOutcome};
