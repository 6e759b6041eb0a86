//! Frame buffer acquisition
//!
//! The render loop asks a `BufferProvider` for a destination each frame.
//! The handle it returns travels in the frame-ready event.
//! - `BufferPool`: fixed Rust-owned slots, handle = slot index
//! - `CallbackProvider`: foreign `get_buffer(user_data)` callback, handle = pointer

use log::debug;
use std::ffi::c_void;
use std::sync::{Arc, Mutex, MutexGuard};

use crate::constants::frame_len;

const TAG: &str = "lockbridge::buffer";

/// Source of destination buffers for rendered frames
pub trait BufferProvider: Send {
    /// Acquire a buffer and let `fill` write one frame into it
    ///
    /// Returns the handle to publish, or `None` if no buffer was available
    /// or `fill` reported failure (the frame is dropped).
    fn fill_next(&mut self, fill: &mut dyn FnMut(&mut [u8]) -> bool) -> Option<u64>;

    /// Take back a filled buffer whose frame-ready event never went out
    fn release(&mut self, handle: u64);
}

struct Slot {
    pixels: Vec<u8>,
    in_use: bool,
}

/// Fixed set of frame-sized slots shared between the render thread and
/// the frame consumer
///
/// Clones share the same slots.
#[derive(Clone)]
pub struct BufferPool {
    slots: Arc<Mutex<Vec<Slot>>>,
    frame_len: usize,
}

impl BufferPool {
    pub fn new(width: u32, height: u32, slots: usize) -> Self {
        let frame_len = frame_len(width, height);
        let slots = (0..slots)
            .map(|_| Slot {
                pixels: vec![0; frame_len],
                in_use: false,
            })
            .collect();
        Self {
            slots: Arc::new(Mutex::new(slots)),
            frame_len,
        }
    }

    pub fn frame_len(&self) -> usize {
        self.frame_len
    }

    fn lock(&self) -> MutexGuard<'_, Vec<Slot>> {
        match self.slots.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    /// Number of slots holding an unreleased frame
    pub fn in_use(&self) -> usize {
        self.lock().iter().filter(|s| s.in_use).count()
    }

    /// Read a published frame
    ///
    /// Returns `None` for an unknown or released handle.
    pub fn with_frame<R>(&self, handle: u64, read: impl FnOnce(&[u8]) -> R) -> Option<R> {
        let slots = self.lock();
        let slot = slots.get(usize::try_from(handle).ok()?)?;
        slot.in_use.then(|| read(&slot.pixels))
    }

    /// Hand a slot back for reuse
    pub fn release(&self, handle: u64) {
        let mut slots = self.lock();
        if let Some(slot) = usize::try_from(handle)
            .ok()
            .and_then(|index| slots.get_mut(index))
        {
            slot.in_use = false;
        }
    }
}

impl BufferProvider for BufferPool {
    fn fill_next(&mut self, fill: &mut dyn FnMut(&mut [u8]) -> bool) -> Option<u64> {
        let mut slots = self.lock();
        let Some((index, slot)) = slots.iter_mut().enumerate().find(|(_, s)| !s.in_use) else {
            debug!(target: TAG, "All {} slots busy, dropping frame", slots.len());
            return None;
        };
        if !fill(&mut slot.pixels) {
            return None;
        }
        slot.in_use = true;
        Some(index as u64)
    }

    fn release(&mut self, handle: u64) {
        BufferPool::release(self, handle);
    }
}

/// Foreign buffer-acquisition callback
///
/// Returns a buffer of at least `width * height * 4` bytes, or NULL.
pub type GetBufferFn = unsafe extern "C" fn(user_data: *mut c_void) -> *mut c_void;

/// Provider backed by a foreign callback and its opaque context
pub struct CallbackProvider {
    get_buffer: GetBufferFn,
    user_data: *mut c_void,
    frame_len: usize,
}

// SAFETY: the embedder guarantees the callback and its context may be used
// from the render thread
unsafe impl Send for CallbackProvider {}

impl CallbackProvider {
    /// # Safety
    /// `get_buffer` must return NULL or a writable block of `frame_len`
    /// bytes that stays valid until the consumer handles the frame-ready
    /// event, and `user_data` must be usable from the render thread.
    pub unsafe fn new(get_buffer: GetBufferFn, user_data: *mut c_void, frame_len: usize) -> Self {
        Self {
            get_buffer,
            user_data,
            frame_len,
        }
    }
}

impl BufferProvider for CallbackProvider {
    fn fill_next(&mut self, fill: &mut dyn FnMut(&mut [u8]) -> bool) -> Option<u64> {
        // SAFETY: contract of `CallbackProvider::new`
        let data = unsafe { (self.get_buffer)(self.user_data) } as *mut u8;
        if data.is_null() {
            debug!(target: TAG, "Buffer callback returned NULL, dropping frame");
            return None;
        }
        // SAFETY: non-NULL results are `frame_len` writable bytes
        let dst = unsafe { std::slice::from_raw_parts_mut(data, self.frame_len) };
        fill(dst).then_some(data as u64)
    }

    // The embedder owns the memory; nothing is held on this side
    fn release(&mut self, _handle: u64) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pool_hands_out_free_slots() {
        let mut pool = BufferPool::new(2, 2, 2);
        assert_eq!(pool.frame_len(), 16);

        let a = pool.fill_next(&mut |dst| {
            dst.fill(0xAA);
            true
        });
        let b = pool.fill_next(&mut |dst| {
            dst.fill(0xBB);
            true
        });
        assert_eq!((a, b), (Some(0), Some(1)));
        assert_eq!(pool.in_use(), 2);

        // Both busy: frame dropped without calling fill
        let mut called = false;
        assert_eq!(
            pool.fill_next(&mut |_| {
                called = true;
                true
            }),
            None
        );
        assert!(!called);

        assert_eq!(pool.with_frame(1, |p| p[0]), Some(0xBB));
        pool.release(0);
        assert_eq!(pool.with_frame(0, |p| p[0]), None);
        assert_eq!(pool.fill_next(&mut |_| true), Some(0));
    }

    #[test]
    fn test_provider_release_frees_slot() {
        let mut pool = BufferPool::new(1, 1, 1);
        let mut provider: Box<dyn BufferProvider> = Box::new(pool.clone());
        let handle = provider.fill_next(&mut |_| true).unwrap();
        assert_eq!(pool.in_use(), 1);
        provider.release(handle);
        assert_eq!(pool.in_use(), 0);
        assert_eq!(pool.fill_next(&mut |_| true), Some(0));
    }

    #[test]
    fn test_failed_fill_keeps_slot_free() {
        let mut pool = BufferPool::new(1, 1, 1);
        assert_eq!(pool.fill_next(&mut |_| false), None);
        assert_eq!(pool.in_use(), 0);
        assert_eq!(pool.with_frame(7, |_| ()), None);
    }

    unsafe extern "C" fn null_buffer(_: *mut c_void) -> *mut c_void {
        std::ptr::null_mut()
    }

    unsafe extern "C" fn user_buffer(user_data: *mut c_void) -> *mut c_void {
        let storage = &mut *(user_data as *mut Vec<u8>);
        storage.as_mut_ptr() as *mut c_void
    }

    #[test]
    fn test_callback_provider() {
        let mut none = unsafe { CallbackProvider::new(null_buffer, std::ptr::null_mut(), 4) };
        assert_eq!(none.fill_next(&mut |_| true), None);

        let mut storage = vec![0u8; 4];
        let expected = storage.as_mut_ptr() as u64;
        let mut provider = unsafe {
            CallbackProvider::new(user_buffer, &mut storage as *mut Vec<u8> as *mut c_void, 4)
        };
        let handle = provider.fill_next(&mut |dst| {
            dst.copy_from_slice(&[1, 2, 3, 4]);
            true
        });
        assert_eq!(handle, Some(expected));
        drop(provider);
        assert_eq!(storage, vec![1, 2, 3, 4]);
    }
}
