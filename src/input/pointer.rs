//! Pointer state
//!
//! Tracks the last surface position and the set of held buttons.

use bitflags::bitflags;

use super::keycodes::{
    BTN_BACK, BTN_EXTRA, BTN_FORWARD, BTN_LEFT, BTN_MIDDLE, BTN_RIGHT, BTN_SIDE, BTN_TASK,
};
use super::keysyms::Modifiers;

bitflags! {
    /// Held buttons
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct ButtonMask: u32 {
        const LEFT = 0x01;
        const RIGHT = 0x02;
        const MIDDLE = 0x04;
        const BACK = 0x08;
        const FORWARD = 0x10;
        const EXTRA = 0x40;
    }
}

/// Portable button
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Button {
    None,
    Left,
    Right,
    Middle,
    Back,
    Forward,
    Extra,
}

impl Button {
    /// Bit of this button in a `ButtonMask` (empty for `None`)
    pub fn mask(self) -> ButtonMask {
        match self {
            Button::None => ButtonMask::empty(),
            Button::Left => ButtonMask::LEFT,
            Button::Right => ButtonMask::RIGHT,
            Button::Middle => ButtonMask::MIDDLE,
            Button::Back => ButtonMask::BACK,
            Button::Forward => ButtonMask::FORWARD,
            Button::Extra => ButtonMask::EXTRA,
        }
    }
}

/// Translate an evdev button code
pub fn button_code(hardware_code: u32) -> Button {
    match hardware_code {
        BTN_LEFT => Button::Left,
        BTN_RIGHT => Button::Right,
        BTN_MIDDLE => Button::Middle,
        BTN_SIDE | BTN_BACK => Button::Back,
        BTN_EXTRA | BTN_FORWARD => Button::Forward,
        BTN_TASK => Button::Extra,
        _ => Button::None,
    }
}

/// Button state tag carried in param 2 of a button event
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum ButtonState {
    Released = 0,
    Pressed = 1,
}

impl From<u64> for ButtonState {
    /// Anything but 1 is a release, as wl_pointer defines only two states
    fn from(tag: u64) -> Self {
        if tag == 1 {
            ButtonState::Pressed
        } else {
            ButtonState::Released
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PointerEventKind {
    Move,
    Press,
    Release,
}

/// Synthesized pointer event handed to the scene
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PointerEvent {
    pub kind: PointerEventKind,
    pub x: f64,
    pub y: f64,
    /// Button that changed (`None` for moves)
    pub button: Button,
    /// Buttons held after this event
    pub buttons: ButtonMask,
    pub modifiers: Modifiers,
}

impl PointerEvent {
    pub fn with_modifiers(mut self, modifiers: Modifiers) -> Self {
        self.modifiers = modifiers;
        self
    }
}

/// Pointer model
#[derive(Debug, Default)]
pub struct PointerState {
    x: f64,
    y: f64,
    buttons: ButtonMask,
}

impl PointerState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn position(&self) -> (f64, f64) {
        (self.x, self.y)
    }

    pub fn buttons(&self) -> ButtonMask {
        self.buttons
    }

    /// Record a new absolute position; the button mask is untouched
    pub fn apply_motion(&mut self, x: f64, y: f64) -> PointerEvent {
        self.x = x;
        self.y = y;
        PointerEvent {
            kind: PointerEventKind::Move,
            x,
            y,
            button: Button::None,
            buttons: self.buttons,
            modifiers: Modifiers::empty(),
        }
    }

    /// Press or release a button at the last known position
    pub fn apply_button(&mut self, hardware_code: u32, state: ButtonState) -> PointerEvent {
        let button = button_code(hardware_code);
        let kind = match state {
            ButtonState::Pressed => {
                self.buttons.insert(button.mask());
                PointerEventKind::Press
            }
            ButtonState::Released => {
                self.buttons.remove(button.mask());
                PointerEventKind::Release
            }
        };
        PointerEvent {
            kind,
            x: self.x,
            y: self.y,
            button,
            buttons: self.buttons,
            modifiers: Modifiers::empty(),
        }
    }
}
