// ── File mappings & views ─────────────────────────────────────────────────────

#![allow(unsafe_code)]

use std::ffi::c_void;

use tracing::{trace, warn};
use windows::Win32::{
    Foundation::{BOOL, HANDLE, INVALID_HANDLE_VALUE},
    System::Memory::{
        CreateFileMappingW, FlushViewOfFile, MapViewOfFile, OpenFileMappingW, UnmapViewOfFile,
        FILE_MAP, MEMORY_MAPPED_VIEW_ADDRESS, PAGE_PROTECTION_FLAGS,
    },
};

use super::{
    file::HFILE,
    flags::{MapAccess, PageProtect},
};
use crate::{
    error::{Error, Result, ResultExt},
    handle::{KernelHandle, OwnedHandle},
    marshal::WString,
};

/// A file-mapping object.
#[derive(Debug)]
pub struct HFILEMAP {
    handle: OwnedHandle,
    /// Mapping size when known (created here rather than opened by name).
    size: Option<u64>,
}

impl KernelHandle for HFILEMAP {
    fn raw(&self) -> HANDLE {
        self.handle.raw()
    }
}

impl HFILEMAP {
    /// `CreateFileMappingW`.
    ///
    /// `file = None` backs the mapping with the paging file, in which case
    /// `max_size` must be non-zero.  For a file, `max_size = 0` maps the
    /// whole file at its current size.
    pub fn create(
        file: Option<&HFILE>,
        protect: PageProtect,
        max_size: u64,
        name: Option<&str>,
    ) -> Result<Self> {
        let wname = name.map(WString::new).transpose()?;
        let hfile = file.map_or(INVALID_HANDLE_VALUE, |f| f.raw());
        // SAFETY: hfile is an open file or INVALID_HANDLE_VALUE (paging file);
        // the name is NUL-terminated or NULL.
        let h = unsafe {
            CreateFileMappingW(
                hfile,
                None,
                PAGE_PROTECTION_FLAGS(protect as u32),
                (max_size >> 32) as u32,
                max_size as u32,
                WString::opt_pcwstr(wname.as_ref()),
            )
        }
        .context("CreateFileMappingW")?;
        let handle = OwnedHandle::from_raw(h, "CreateFileMappingW")?;
        let size = match (file, max_size) {
            (Some(f), 0) => f.size()?,
            _ => max_size,
        };
        trace!(size, ?protect, name, "created file mapping");
        Ok(Self {
            handle,
            size: Some(size),
        })
    }

    /// `OpenFileMappingW` on a named mapping.  Views of an opened mapping
    /// need an explicit length.
    pub fn open(name: &str, access: MapAccess) -> Result<Self> {
        let wname = WString::new(name)?;
        // SAFETY: wname is NUL-terminated.
        let h = unsafe { OpenFileMappingW(access.bits(), BOOL::from(false), wname.as_pcwstr()) }
            .context("OpenFileMappingW")?;
        Ok(Self {
            handle: OwnedHandle::from_raw(h, "OpenFileMappingW")?,
            size: None,
        })
    }

    /// `MapViewOfFile`.  `len = 0` maps from `offset` to the end of the
    /// mapping.  `offset` must be a multiple of the allocation granularity.
    pub fn map_view(&self, access: MapAccess, offset: u64, len: usize) -> Result<MappedView> {
        let len = match (len, self.size) {
            (0, Some(size)) => usize::try_from(size.saturating_sub(offset))
                .map_err(|_| Error::Unsupported("view larger than the address space"))?,
            (0, None) => return Err(Error::Unsupported("opened mapping needs an explicit view length")),
            (n, _) => n,
        };
        // SAFETY: the mapping handle is open; the OS validates offset and
        // length against the mapping and returns NULL on failure.
        let addr = unsafe {
            MapViewOfFile(
                self.raw(),
                FILE_MAP(access.bits()),
                (offset >> 32) as u32,
                offset as u32,
                len,
            )
        };
        if addr.Value.is_null() {
            return Err(Error::last("MapViewOfFile"));
        }
        Ok(MappedView {
            addr,
            len,
            writable: access.intersects(MapAccess::WRITE | MapAccess::COPY),
        })
    }
}

/// A mapped view, unmapped on drop.
#[derive(Debug)]
pub struct MappedView {
    addr: MEMORY_MAPPED_VIEW_ADDRESS,
    len: usize,
    writable: bool,
}

// SAFETY: the view is plain process memory; access goes through `&`/`&mut`
// borrows of the owner.
unsafe impl Send for MappedView {}

impl MappedView {
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn as_ptr(&self) -> *const u8 {
        self.addr.Value as *const u8
    }

    pub fn as_slice(&self) -> &[u8] {
        // SAFETY: the OS mapped at least `len` readable bytes at `addr`,
        // valid until UnmapViewOfFile in drop.
        unsafe { std::slice::from_raw_parts(self.as_ptr(), self.len) }
    }

    /// Mutable access; `Unsupported` for a read-only view.
    pub fn as_mut_slice(&mut self) -> Result<&mut [u8]> {
        if !self.writable {
            return Err(Error::Unsupported("view was mapped without write access"));
        }
        // SAFETY: as for as_slice, and the view was mapped writable; the
        // `&mut self` borrow makes this the only live slice.
        Ok(unsafe { std::slice::from_raw_parts_mut(self.addr.Value as *mut u8, self.len) })
    }

    /// `FlushViewOfFile` for the whole view.
    pub fn flush(&self) -> Result<()> {
        // SAFETY: addr/len describe this mapped view.
        unsafe { FlushViewOfFile(self.addr.Value as *const c_void, self.len) }
            .context("FlushViewOfFile")
    }
}

impl Drop for MappedView {
    fn drop(&mut self) {
        // SAFETY: addr came from MapViewOfFile and is unmapped only here.
        if let Err(e) = unsafe { UnmapViewOfFile(self.addr) } {
            warn!(error = %e, "UnmapViewOfFile failed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kernel::{
        file::OpenOptions,
        flags::Disposition,
    };

    #[test]
    fn pagefile_mapping_is_zeroed_and_writable() {
        let map = HFILEMAP::create(None, PageProtect::ReadWrite, 4096, None).unwrap();
        let mut view = map.map_view(MapAccess::WRITE | MapAccess::READ, 0, 0).unwrap();
        assert_eq!(view.len(), 4096);
        assert!(view.as_slice().iter().all(|&b| b == 0));
        view.as_mut_slice().unwrap()[..5].copy_from_slice(b"hello");
        assert_eq!(&view.as_slice()[..5], b"hello");
    }

    #[test]
    fn file_mapping_sees_file_contents() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("mapped.bin");
        std::fs::write(&path, b"0123456789").unwrap();

        let file = OpenOptions::new()
            .write(true)
            .disposition(Disposition::OpenExisting)
            .open(&path)
            .unwrap();
        let map = HFILEMAP::create(Some(&file), PageProtect::ReadWrite, 0, None).unwrap();
        let mut view = map.map_view(MapAccess::WRITE, 0, 0).unwrap();
        assert_eq!(view.as_slice(), b"0123456789");
        view.as_mut_slice().unwrap()[0] = b'X';
        view.flush().unwrap();
        drop(view);
        drop(map);
        drop(file);
        assert_eq!(std::fs::read(&path).unwrap(), b"X123456789");
    }

    #[test]
    fn read_only_view_refuses_mutation() {
        let map = HFILEMAP::create(None, PageProtect::ReadWrite, 4096, None).unwrap();
        let mut view = map.map_view(MapAccess::READ, 0, 16).unwrap();
        assert_eq!(view.len(), 16);
        assert!(matches!(view.as_mut_slice(), Err(Error::Unsupported(_))));
    }

    #[test]
    fn named_mapping_can_be_opened() {
        let name = format!("Local\\winhandle-test-{}", std::process::id());
        let map = HFILEMAP::create(None, PageProtect::ReadWrite, 4096, Some(&name)).unwrap();
        map.map_view(MapAccess::WRITE, 0, 0).unwrap().as_mut_slice().unwrap()[0] = 42;

        let other = HFILEMAP::open(&name, MapAccess::READ).unwrap();
        assert!(other.map_view(MapAccess::READ, 0, 0).is_err());
        let view = other.map_view(MapAccess::READ, 0, 1).unwrap();
        assert_eq!(view.as_slice(), [42]);
    }
}
