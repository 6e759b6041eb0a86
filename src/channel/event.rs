//! Wire record
//!
//! One event is exactly three native-endian `u64`s: kind tag, param 1, param 2.
//! There is no framing or versioning beyond the fixed size.

use super::ChannelError;

/// Size of one encoded record in bytes
pub const EVENT_SIZE: usize = 3 * std::mem::size_of::<u64>();

/// Event kind tag
///
/// Input-origin kinds travel producer -> render thread, render-origin kinds
/// travel the other way.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u64)]
pub enum EventKind {
    Wayland = 1,
    /// Frame ready, param 1 = buffer handle
    Renderer = 2,

    /// param 1 = shared memory fd, param 2 = byte length
    KeyboardKeymap = 3,
    /// param 1 = evdev keycode, param 2 = `KeyState`
    KeyboardKey = 4,
    /// param 1 = depressed<<32 | latched, param 2 = locked<<32 | group
    KeyboardModifiers = 5,
    /// param 1 = rate (ms), param 2 = delay (ms)
    KeyboardRepeatInfo = 6,

    /// params = x, y as IEEE-754 bits
    PointerMotion = 7,
    /// param 1 = button code, param 2 = `ButtonState`
    PointerButton = 8,

    /// param 1 = `ForeignBuffer` handle holding a UTF-8 message
    AuthSubmit = 9,
    AuthPending = 10,
    AuthFail = 11,
    AuthSuccess = 12,
}

impl EventKind {
    /// Frame-ready alias for the render-origin kind
    pub const FRAME_READY: EventKind = EventKind::Renderer;
}

impl TryFrom<u64> for EventKind {
    type Error = ChannelError;

    fn try_from(tag: u64) -> Result<Self, Self::Error> {
        match tag {
            1 => Ok(EventKind::Wayland),
            2 => Ok(EventKind::Renderer),

            3 => Ok(EventKind::KeyboardKeymap),
            4 => Ok(EventKind::KeyboardKey),
            5 => Ok(EventKind::KeyboardModifiers),
            6 => Ok(EventKind::KeyboardRepeatInfo),

            7 => Ok(EventKind::PointerMotion),
            8 => Ok(EventKind::PointerButton),

            9 => Ok(EventKind::AuthSubmit),
            10 => Ok(EventKind::AuthPending),
            11 => Ok(EventKind::AuthFail),
            12 => Ok(EventKind::AuthSuccess),
            other => Err(ChannelError::UnknownKind(other)),
        }
    }
}

/// Decoded wire record
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Event {
    pub kind: EventKind,
    pub param1: u64,
    pub param2: u64,
}

impl Event {
    pub fn new(kind: EventKind, param1: u64, param2: u64) -> Self {
        Self {
            kind,
            param1,
            param2,
        }
    }

    /// Encode into the fixed wire layout
    pub fn encode(&self) -> [u8; EVENT_SIZE] {
        let mut bytes = [0u8; EVENT_SIZE];
        bytes[0..8].copy_from_slice(&(self.kind as u64).to_ne_bytes());
        bytes[8..16].copy_from_slice(&self.param1.to_ne_bytes());
        bytes[16..24].copy_from_slice(&self.param2.to_ne_bytes());
        bytes
    }

    /// Decode one record
    ///
    /// Anything other than exactly `EVENT_SIZE` bytes is a desynchronized
    /// channel, never the start of a record to be continued later.
    pub fn decode(bytes: &[u8]) -> Result<Self, ChannelError> {
        if bytes.len() != EVENT_SIZE {
            return Err(ChannelError::PartialRecord { got: bytes.len() });
        }
        let word = |i: usize| {
            let mut w = [0u8; 8];
            w.copy_from_slice(&bytes[i * 8..i * 8 + 8]);
            u64::from_ne_bytes(w)
        };
        Ok(Self {
            kind: EventKind::try_from(word(0))?,
            param1: word(1),
            param2: word(2),
        })
    }

    /// Keyboard modifiers event from the four xkb masks
    pub fn modifiers(depressed: u32, latched: u32, locked: u32, group: u32) -> Self {
        let (p1, p2) = pack_modifiers(depressed, latched, locked, group);
        Self::new(EventKind::KeyboardModifiers, p1, p2)
    }

    /// Pointer motion event in surface coordinates
    pub fn motion(x: f64, y: f64) -> Self {
        Self::new(EventKind::PointerMotion, x.to_bits(), y.to_bits())
    }
}

/// Pack modifier masks into two params
pub fn pack_modifiers(depressed: u32, latched: u32, locked: u32, group: u32) -> (u64, u64) {
    (
        (depressed as u64) << 32 | latched as u64,
        (locked as u64) << 32 | group as u64,
    )
}

/// Unpack `(depressed, latched, locked, group)` from two params
pub fn unpack_modifiers(param1: u64, param2: u64) -> (u32, u32, u32, u32) {
    (
        (param1 >> 32) as u32,
        (param1 & 0xFFFF_FFFF) as u32,
        (param2 >> 32) as u32,
        (param2 & 0xFFFF_FFFF) as u32,
    )
}

/// Unpack pointer coordinates
pub fn unpack_position(param1: u64, param2: u64) -> (f64, f64) {
    (f64::from_bits(param1), f64::from_bits(param2))
}
