//! Input handling
//!
//! Turn channel records into scene-level key and pointer events.
//! - xkbcommon keymap/modifier state and keysym translation
//! - Pointer position and held-button tracking
//! - Key repeat timed by the render loop

pub mod dispatch;
pub mod keyboard;
pub mod keycodes;
pub mod keysyms;
pub mod pointer;
pub mod repeat;

pub use dispatch::{AuthState, Dispatcher, SceneEvent};
pub use keyboard::{KeyEvent, KeyEventKind, KeyState, KeyboardState, KeymapError};
pub use keysyms::{keysym_to_key, Key, Modifiers};
pub use pointer::{
    button_code, Button, ButtonMask, ButtonState, PointerEvent, PointerEventKind, PointerState,
};
pub use repeat::{RepeatEngine, RepeatInfo, RepeatPhase};
