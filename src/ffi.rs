//! Owned buffers crossing the FFI boundary
//!
//! A `ForeignBuffer` carries its own deallocator and is move-only, so the
//! block is released exactly once by whichever side owns it last. On the
//! wire it travels as a pointer to a boxed `RawForeignBuffer`.

use std::ffi::c_void;
use std::fmt;
use std::ptr;

/// Deallocator for the data block
pub type DeallocFn = unsafe extern "C" fn(*mut c_void);

/// C layout of a handed-off buffer
#[repr(C)]
#[derive(Debug)]
pub struct RawForeignBuffer {
    pub data: *mut u8,
    pub len: usize,
    pub dealloc: Option<DeallocFn>,
}

/// Owned, NUL-terminated byte block with an attached deallocator
pub struct ForeignBuffer {
    raw: RawForeignBuffer,
}

// SAFETY: the block is uniquely owned; nothing else aliases `data`
unsafe impl Send for ForeignBuffer {}

unsafe extern "C" fn c_free(data: *mut c_void) {
    libc::free(data);
}

impl ForeignBuffer {
    /// Copy `bytes` into a malloc'd block with a trailing NUL
    ///
    /// Returns `None` if allocation fails.
    pub fn from_bytes(bytes: &[u8]) -> Option<Self> {
        let len = bytes.len();
        // SAFETY: malloc of len + 1 bytes; checked for NULL before use
        let data = unsafe { libc::malloc(len + 1) } as *mut u8;
        if data.is_null() {
            return None;
        }
        // SAFETY: `data` has room for len + 1 bytes and does not overlap `bytes`
        unsafe {
            ptr::copy_nonoverlapping(bytes.as_ptr(), data, len);
            *data.add(len) = 0;
        }
        Some(Self {
            raw: RawForeignBuffer {
                data,
                len,
                dealloc: Some(c_free),
            },
        })
    }

    pub fn from_text(text: &str) -> Option<Self> {
        Self::from_bytes(text.as_bytes())
    }

    pub fn len(&self) -> usize {
        self.raw.len
    }

    pub fn is_empty(&self) -> bool {
        self.raw.len == 0
    }

    /// Payload without the trailing NUL
    pub fn as_bytes(&self) -> &[u8] {
        if self.raw.data.is_null() {
            return &[];
        }
        // SAFETY: `data` points to at least `len` initialized bytes we own
        unsafe { std::slice::from_raw_parts(self.raw.data, self.raw.len) }
    }

    pub fn as_str(&self) -> Result<&str, std::str::Utf8Error> {
        std::str::from_utf8(self.as_bytes())
    }

    /// Leak into a handle suitable for an event param
    ///
    /// The receiver must turn it back with `from_raw` (or call
    /// `foreign_buffer_free`) exactly once.
    pub fn into_raw(self) -> *mut RawForeignBuffer {
        let this = std::mem::ManuallyDrop::new(self);
        let raw = RawForeignBuffer {
            data: this.raw.data,
            len: this.raw.len,
            dealloc: this.raw.dealloc,
        };
        Box::into_raw(Box::new(raw))
    }

    /// Take ownership back from a handle
    ///
    /// # Safety
    /// `handle` must come from `into_raw` and must not be used again.
    pub unsafe fn from_raw(handle: *mut RawForeignBuffer) -> Option<Self> {
        if handle.is_null() {
            return None;
        }
        let raw = *Box::from_raw(handle);
        Some(Self { raw })
    }
}

impl Drop for ForeignBuffer {
    fn drop(&mut self) {
        if let Some(dealloc) = self.raw.dealloc.take() {
            if !self.raw.data.is_null() {
                // SAFETY: `dealloc` matches the allocator of `data`, and take()
                // guarantees it runs once
                unsafe { dealloc(self.raw.data as *mut c_void) };
            }
        }
        self.raw.data = ptr::null_mut();
    }
}

impl fmt::Debug for ForeignBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ForeignBuffer")
            .field("len", &self.raw.len)
            .finish()
    }
}

/// Release a handle received over the channel
///
/// # Safety
/// `handle` must be NULL or come from `ForeignBuffer::into_raw`, and must not
/// be used afterwards.
#[no_mangle]
pub unsafe extern "C" fn foreign_buffer_free(handle: *mut RawForeignBuffer) {
    drop(ForeignBuffer::from_raw(handle));
}
