//! Global constants for lockbridge
//!
//! Consolidates timing, wire and pixel constants
//! to eliminate magic numbers throughout the codebase.

// ============================================================================
// Timing Constants
// ============================================================================

/// Upper bound of one render-loop wait slice in milliseconds
pub const DEFAULT_POLL_SLICE_MS: u64 = 16;

/// Key repeat delay used until the compositor sends repeat info (ms)
pub const DEFAULT_REPEAT_DELAY_MS: i32 = 400;

/// Key repeat interval used until the compositor sends repeat info (ms)
pub const DEFAULT_REPEAT_RATE_MS: i32 = 30;

// ============================================================================
// Input Constants
// ============================================================================

/// evdev keycode -> xkb keycode offset
pub const XKB_KEYCODE_OFFSET: u32 = 8;

/// Longest UTF-8 text attached to a single key event (bytes)
pub const MAX_KEY_TEXT_BYTES: usize = 63;

// ============================================================================
// Rendering Constants
// ============================================================================

/// Frame buffers are BGRA, 8 bits per channel
pub const BYTES_PER_PIXEL: usize = 4;

/// Default output width when no configuration is present
pub const DEFAULT_WIDTH: u32 = 1280;

/// Default output height when no configuration is present
pub const DEFAULT_HEIGHT: u32 = 720;

/// Number of frame buffers in the default pool (double buffering)
pub const DEFAULT_POOL_SLOTS: usize = 2;

/// Byte length of a `width` x `height` BGRA frame
#[inline]
pub const fn frame_len(width: u32, height: u32) -> usize {
    width as usize * height as usize * BYTES_PER_PIXEL
}
