//! evdev code constants
//!
//! Linux input event codes from <linux/input-event-codes.h> that the bridge
//! translates or that tests synthesize.

#![allow(dead_code)]

// ============================================================================
// Keys
// ============================================================================

/// Escape key
pub const KEY_ESC: u32 = 1;

/// Tab key
pub const KEY_TAB: u32 = 15;

/// Enter key
pub const KEY_ENTER: u32 = 28;

/// Left Control key
pub const KEY_LEFTCTRL: u32 = 29;

/// A key
pub const KEY_A: u32 = 30;

/// Left Shift key
pub const KEY_LEFTSHIFT: u32 = 42;

/// Left Alt key
pub const KEY_LEFTALT: u32 = 56;

/// Caps Lock key
pub const KEY_CAPSLOCK: u32 = 58;

/// F1 key
pub const KEY_F1: u32 = 59;

/// Left Meta (Super) key
pub const KEY_LEFTMETA: u32 = 125;

// ============================================================================
// Pointer Buttons (BTN_* from linux/input-event-codes.h)
// ============================================================================

/// Left mouse button
pub const BTN_LEFT: u32 = 0x110;

/// Right mouse button
pub const BTN_RIGHT: u32 = 0x111;

/// Middle mouse button
pub const BTN_MIDDLE: u32 = 0x112;

/// Side button (usually "back")
pub const BTN_SIDE: u32 = 0x113;

/// Extra button (usually "forward")
pub const BTN_EXTRA: u32 = 0x114;

/// Forward button
pub const BTN_FORWARD: u32 = 0x115;

/// Back button
pub const BTN_BACK: u32 = 0x116;

/// Task button (vendor specific)
pub const BTN_TASK: u32 = 0x117;
