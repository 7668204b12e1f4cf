// SPDX-License-Identifier: MIT

// Safety: file-backed originals are mapped read-only with `mmap(2)`. The
// mapping is created and released here and only ever exposed as a borrowed
// `&[u8]` tied to the owner's lifetime. Each unsafe block is minimal.
#![allow(unsafe_code)]

//! Original content of a document — the bytes a piece table starts from.
//!
//! The original is immutable for the whole life of the document. It is either
//! an owned byte vector (documents built from strings) or a read-only memory
//! mapping of a file, so opening a large file costs one syscall rather than a
//! full read.

use std::fmt;
use std::fs::File;
use std::io;
use std::path::Path;

/// Immutable backing bytes for the original content of a document.
pub enum OriginalSource {
    /// Bytes owned in memory.
    Owned(Vec<u8>),
    /// A read-only mapping of a file.
    Mapped(MappedFile),
}

impl OriginalSource {
    /// Open `path` as an original source.
    ///
    /// On Unix the file is memory-mapped; elsewhere it is read into memory.
    ///
    /// # Errors
    ///
    /// Returns the underlying I/O error when the file cannot be opened,
    /// inspected, or mapped.
    pub fn open(path: &Path) -> io::Result<Self> {
        #[cfg(unix)]
        {
            MappedFile::open(path).map(Self::Mapped)
        }
        #[cfg(not(unix))]
        {
            std::fs::read(path).map(Self::Owned)
        }
    }

    /// The original bytes.
    #[inline]
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        match self {
            Self::Owned(bytes) => bytes,
            Self::Mapped(map) => map.as_bytes(),
        }
    }

    /// Byte length of the original content.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.as_bytes().len()
    }

    /// True when the original content is empty.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for OriginalSource {
    fn default() -> Self {
        Self::Owned(Vec::new())
    }
}

impl fmt::Debug for OriginalSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Owned(bytes) => write!(f, "Owned({} bytes)", bytes.len()),
            Self::Mapped(map) => write!(f, "Mapped({} bytes)", map.len),
        }
    }
}

// ---------------------------------------------------------------------------
// MappedFile
// ---------------------------------------------------------------------------

/// A read-only, private memory mapping of a whole file.
///
/// Empty files are represented without a mapping (`mmap` rejects zero
/// lengths). The file descriptor is closed right after mapping; the mapping
/// stays valid until drop.
pub struct MappedFile {
    #[cfg(unix)]
    ptr: *mut libc::c_void,
    #[cfg(not(unix))]
    bytes: Vec<u8>,
    len: usize,
}

impl MappedFile {
    /// Map `path` into memory.
    ///
    /// # Errors
    ///
    /// Fails when the file cannot be opened, its size does not fit in
    /// `usize`, or `mmap` itself fails.
    #[cfg(unix)]
    pub fn open(path: &Path) -> io::Result<Self> {
        use std::os::fd::AsRawFd;

        let file = File::open(path)?;
        let len = usize::try_from(file.metadata()?.len())
            .map_err(|_| io::Error::new(io::ErrorKind::InvalidData, "file too large to map"))?;
        if len == 0 {
            return Ok(Self {
                ptr: std::ptr::null_mut(),
                len: 0,
            });
        }

        let ptr = unsafe {
            libc::mmap(
                std::ptr::null_mut(),
                len,
                libc::PROT_READ,
                libc::MAP_PRIVATE,
                file.as_raw_fd(),
                0,
            )
        };
        if ptr == libc::MAP_FAILED {
            return Err(io::Error::last_os_error());
        }
        Ok(Self { ptr, len })
    }

    /// Read `path` into memory (platforms without `mmap`).
    ///
    /// # Errors
    ///
    /// Fails when the file cannot be read.
    #[cfg(not(unix))]
    pub fn open(path: &Path) -> io::Result<Self> {
        use std::io::Read;

        let mut bytes = Vec::new();
        File::open(path)?.read_to_end(&mut bytes)?;
        let len = bytes.len();
        Ok(Self { bytes, len })
    }

    /// The mapped bytes.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        #[cfg(unix)]
        {
            if self.len == 0 {
                return &[];
            }
            // The mapping is PROT_READ, `len` bytes long, and lives until drop.
            unsafe { std::slice::from_raw_parts(self.ptr.cast::<u8>(), self.len) }
        }
        #[cfg(not(unix))]
        {
            &self.bytes
        }
    }
}

#[cfg(unix)]
impl Drop for MappedFile {
    fn drop(&mut self) {
        if self.len > 0 {
            unsafe {
                libc::munmap(self.ptr, self.len);
            }
        }
    }
}

impl fmt::Debug for MappedFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MappedFile").field("len", &self.len).finish()
    }
}
