// ── String & buffer marshaling ────────────────────────────────────────────────
//
// Everything that crosses into Win32 as text goes through this module:
//   • `WString` owns a NUL-terminated UTF-16 buffer whose pointer stays valid
//     for as long as the value lives.
//   • `WideBuf` implements the "fill the buffer or tell me the size you need"
//     protocol that most `*W` getters follow.
//   • `multi_sz`, `cmdline` and `env_block` build the composite layouts
//     (double-NUL lists, quoted command lines, environment blocks).
//
// No `unsafe` here beyond `from_wide_ptr`, whose caller supplies the pointer.

pub mod cmdline;
pub mod env_block;
pub mod multi_sz;

use std::{ffi::OsStr, fmt, path::Path};

use crate::error::{codes::ERROR_INSUFFICIENT_BUFFER, Error, Result};

/// Longest buffer `WideBuf` will grow to: the `\\?\` extended path maximum.
pub const MAX_WIDE_BUF: usize = 32_768;

// ── WString ───────────────────────────────────────────────────────────────────

/// An owned, NUL-terminated UTF-16 string.
///
/// The terminator is always present and never part of `as_slice()`.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct WString {
    buf: Vec<u16>,
}

impl WString {
    /// Encode `s` as UTF-16.  Fails if `s` contains U+0000.
    pub fn new(s: &str) -> Result<Self> {
        Self::from_units(s.encode_utf16().collect())
    }

    /// Encode an OS string without a lossy round-trip on Windows.
    pub fn from_os_str(s: &OsStr) -> Result<Self> {
        #[cfg(windows)]
        {
            use std::os::windows::ffi::OsStrExt;
            Self::from_units(s.encode_wide().collect())
        }
        #[cfg(not(windows))]
        {
            Self::new(&s.to_string_lossy())
        }
    }

    pub fn from_path(p: &Path) -> Result<Self> {
        Self::from_os_str(p.as_os_str())
    }

    fn from_units(mut buf: Vec<u16>) -> Result<Self> {
        if let Some(position) = buf.iter().position(|&c| c == 0) {
            return Err(Error::InteriorNul { position });
        }
        buf.push(0);
        Ok(Self { buf })
    }

    /// Pointer to the first unit.  Valid while `self` is alive and unmoved
    /// from (moving the `WString` itself is fine; the heap buffer stays put).
    pub fn as_ptr(&self) -> *const u16 {
        self.buf.as_ptr()
    }

    /// Mutable pointer, for APIs such as `CreateProcessW` that may write into
    /// the string in place.
    pub fn as_mut_ptr(&mut self) -> *mut u16 {
        self.buf.as_mut_ptr()
    }

    /// NULL for `None`, the string's pointer otherwise.
    pub fn opt_ptr(s: Option<&WString>) -> *const u16 {
        s.map_or(std::ptr::null(), WString::as_ptr)
    }

    /// Units without the terminator.
    pub fn as_slice(&self) -> &[u16] {
        &self.buf[..self.buf.len() - 1]
    }

    pub fn as_slice_with_nul(&self) -> &[u16] {
        &self.buf
    }

    /// Length in UTF-16 units, terminator excluded.
    pub fn len(&self) -> usize {
        self.buf.len() - 1
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn to_string_lossy(&self) -> String {
        String::from_utf16_lossy(self.as_slice())
    }

    #[cfg(windows)]
    pub fn as_pcwstr(&self) -> windows::core::PCWSTR {
        windows::core::PCWSTR(self.as_ptr())
    }

    #[cfg(windows)]
    pub fn as_pwstr(&mut self) -> windows::core::PWSTR {
        windows::core::PWSTR(self.as_mut_ptr())
    }

    #[cfg(windows)]
    pub fn opt_pcwstr(s: Option<&WString>) -> windows::core::PCWSTR {
        windows::core::PCWSTR(Self::opt_ptr(s))
    }
}

impl fmt::Debug for WString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self.to_string_lossy())
    }
}

impl fmt::Display for WString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_string_lossy())
    }
}

// ── Decoding ──────────────────────────────────────────────────────────────────

/// Decode a UTF-16 buffer up to its first NUL (or the whole slice).
pub fn from_wide(buf: &[u16]) -> String {
    let len = buf.iter().position(|&c| c == 0).unwrap_or(buf.len());
    String::from_utf16_lossy(&buf[..len])
}

/// Decode a NUL-terminated string owned by the OS.
///
/// # Safety
/// `p` must be NULL or point to a readable, NUL-terminated UTF-16 string.
#[allow(unsafe_code)]
pub unsafe fn from_wide_ptr(p: *const u16) -> String {
    if p.is_null() {
        return String::new();
    }
    let mut len = 0;
    // SAFETY: the caller guarantees a terminator exists, so every offset up
    // to and including it is readable.
    while unsafe { *p.add(len) } != 0 {
        len += 1;
    }
    // SAFETY: `len` units starting at `p` were just read one by one.
    let units = unsafe { std::slice::from_raw_parts(p, len) };
    String::from_utf16_lossy(units)
}

/// Copy `s` into a fixed-size Win32 field (`szTip`, `szDevice`, …),
/// truncating at a UTF-16 boundary and always leaving a terminator.
pub fn copy_to_fixed(s: &str, dst: &mut [u16]) {
    if dst.is_empty() {
        return;
    }
    let cap = dst.len() - 1;
    let mut n = 0;
    for unit in s.encode_utf16().take_while(|&c| c != 0) {
        if n == cap {
            break;
        }
        dst[n] = unit;
        n += 1;
    }
    // Never split a surrogate pair.
    if n > 0 && (0xD800..0xDC00).contains(&dst[n - 1]) {
        n -= 1;
    }
    for slot in &mut dst[n..] {
        *slot = 0;
    }
}

// ── WideBuf ───────────────────────────────────────────────────────────────────

/// Grow-and-retry driver for `*W` getters.
pub struct WideBuf;

impl WideBuf {
    /// Call `f` with a buffer of `initial` units and decode the result.
    ///
    /// `f` returns the Win32-style count: a value smaller than the buffer is
    /// the number of units written; a value at least as large means the
    /// buffer was too small, and it is either the required size or (for
    /// truncating APIs) the buffer length.  The buffer grows until the call
    /// fits or `MAX_WIDE_BUF` is exceeded.
    pub fn fill<F>(initial: usize, mut f: F) -> Result<String>
    where
        F: FnMut(&mut [u16]) -> Result<u32>,
    {
        let mut len = initial.clamp(1, MAX_WIDE_BUF);
        loop {
            let mut buf = vec![0u16; len];
            let n = f(&mut buf)? as usize;
            if n < len {
                return Ok(from_wide(&buf[..n]));
            }
            if len == MAX_WIDE_BUF {
                return Err(Error::Win32 {
                    function: "WideBuf::fill",
                    code: ERROR_INSUFFICIENT_BUFFER,
                });
            }
            let grown = if n > len { n + 1 } else { len * 2 };
            len = grown.min(MAX_WIDE_BUF);
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wstring_is_nul_terminated() {
        let w = WString::new("abc").unwrap();
        assert_eq!(w.as_slice_with_nul(), &[b'a' as u16, b'b' as u16, b'c' as u16, 0]);
        assert_eq!(w.len(), 3);
        assert_eq!(w.to_string_lossy(), "abc");
    }

    #[test]
    fn interior_nul_is_rejected_with_position() {
        let err = WString::new("ab\0cd").unwrap_err();
        assert!(matches!(err, Error::InteriorNul { position: 2 }));
    }

    #[test]
    fn empty_wstring_still_has_terminator() {
        let w = WString::new("").unwrap();
        assert!(w.is_empty());
        assert_eq!(w.as_slice_with_nul(), &[0]);
    }

    #[test]
    fn non_bmp_counts_surrogates() {
        let w = WString::new("a\u{1F600}").unwrap();
        assert_eq!(w.len(), 3);
        assert_eq!(w.to_string_lossy(), "a\u{1F600}");
    }

    #[test]
    fn opt_ptr_is_null_for_none() {
        assert!(WString::opt_ptr(None).is_null());
        let w = WString::new("x").unwrap();
        assert_eq!(WString::opt_ptr(Some(&w)), w.as_ptr());
    }

    #[test]
    fn from_wide_stops_at_first_nul() {
        let buf = [b'h' as u16, b'i' as u16, 0, b'x' as u16];
        assert_eq!(from_wide(&buf), "hi");
        assert_eq!(from_wide(&buf[..2]), "hi");
    }

    #[test]
    fn from_wide_ptr_reads_foreign_string() {
        let w = WString::new("path").unwrap();
        // SAFETY: `w` is NUL-terminated and alive.
        #[allow(unsafe_code)]
        let s = unsafe { from_wide_ptr(w.as_ptr()) };
        assert_eq!(s, "path");
        #[allow(unsafe_code)]
        let empty = unsafe { from_wide_ptr(std::ptr::null()) };
        assert_eq!(empty, "");
    }

    #[test]
    fn copy_to_fixed_truncates_and_terminates() {
        let mut dst = [0xFFFFu16; 4];
        copy_to_fixed("abcdef", &mut dst);
        assert_eq!(dst, [b'a' as u16, b'b' as u16, b'c' as u16, 0]);
    }

    #[test]
    fn copy_to_fixed_keeps_surrogate_pairs_whole() {
        let mut dst = [0xFFFFu16; 3];
        // "a" + U+1F600 needs 3 units plus a terminator; the pair is dropped.
        copy_to_fixed("a\u{1F600}", &mut dst);
        assert_eq!(dst, [b'a' as u16, 0, 0]);
    }

    #[test]
    fn wide_buf_returns_on_first_fit() {
        let s = WideBuf::fill(16, |buf| {
            copy_to_fixed("value", buf);
            Ok(5)
        })
        .unwrap();
        assert_eq!(s, "value");
    }

    #[test]
    fn wide_buf_grows_to_reported_size() {
        let mut calls = Vec::new();
        let s = WideBuf::fill(4, |buf| {
            calls.push(buf.len());
            if buf.len() < 11 {
                Ok(11) // required size, terminator included
            } else {
                copy_to_fixed("0123456789", buf);
                Ok(10)
            }
        })
        .unwrap();
        assert_eq!(s, "0123456789");
        assert_eq!(calls, vec![4, 12]);
    }

    #[test]
    fn wide_buf_doubles_for_truncating_apis() {
        let mut calls = Vec::new();
        let s = WideBuf::fill(4, |buf| {
            calls.push(buf.len());
            let text = "C:\\Windows\\x";
            copy_to_fixed(text, buf);
            let written = text.len().min(buf.len() - 1);
            // Truncation is signalled by returning the buffer length.
            Ok(if written < text.len() { buf.len() as u32 } else { written as u32 })
        })
        .unwrap();
        assert_eq!(s, "C:\\Windows\\x");
        assert_eq!(calls, vec![4, 8, 16]);
    }

    #[test]
    fn wide_buf_gives_up_at_the_cap() {
        let err = WideBuf::fill(MAX_WIDE_BUF, |buf| Ok(buf.len() as u32)).unwrap_err();
        assert!(err.is_win32(ERROR_INSUFFICIENT_BUFFER));
    }

    #[test]
    fn wide_buf_propagates_errors() {
        let err = WideBuf::fill(8, |_| Err(Error::Win32 { function: "GetX", code: 5 }))
            .unwrap_err();
        assert!(err.is_win32(5));
    }
}
