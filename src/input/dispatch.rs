//! Event dispatch
//!
//! Routes decoded channel records to the keyboard and pointer models, arms
//! key repeat, and queues the resulting scene events for the render loop.

use log::{debug, trace, warn};
use std::cell::RefCell;
use std::collections::VecDeque;
use std::os::fd::{FromRawFd, OwnedFd, RawFd};
use std::rc::Rc;
use std::time::Instant;

use super::keyboard::{KeyEvent, KeyEventKind, KeyState, KeyboardState};
use super::pointer::{ButtonState, PointerEvent, PointerState};
use super::repeat::{RepeatEngine, RepeatInfo};
use crate::channel::{unpack_modifiers, unpack_position, Event, EventKind};

const TAG: &str = "lockbridge::dispatch";

/// Authentication progress reported by the producer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthState {
    Pending,
    Failed,
    Success,
}

/// Event delivered to the scene
#[derive(Debug, Clone, PartialEq)]
pub enum SceneEvent {
    Key(KeyEvent),
    Pointer(PointerEvent),
    Auth(AuthState),
}

type Outbox = Rc<RefCell<VecDeque<SceneEvent>>>;

/// Owns the input models for one render thread
pub struct Dispatcher {
    keyboard: KeyboardState,
    pointer: PointerState,
    repeat: RepeatEngine<KeyEvent>,
    /// Hardware code of the key being auto-repeated
    repeating_code: Option<u32>,
    outbox: Outbox,
}

impl Dispatcher {
    pub fn new() -> Self {
        let outbox: Outbox = Rc::new(RefCell::new(VecDeque::new()));
        let mut repeat = RepeatEngine::new();
        let sink = outbox.clone();
        repeat.set_callback(move |event: &KeyEvent| {
            sink.borrow_mut().push_back(SceneEvent::Key(event.clone()));
        });

        Self {
            keyboard: KeyboardState::new(),
            pointer: PointerState::new(),
            repeat,
            repeating_code: None,
            outbox,
        }
    }

    /// Start with local repeat timing until the producer sends its own
    pub fn with_repeat(mut self, info: RepeatInfo) -> Self {
        self.repeat.set_repeat_info(info.rate_ms, info.delay_ms);
        self
    }

    pub fn keyboard(&self) -> &KeyboardState {
        &self.keyboard
    }

    pub fn pointer(&self) -> &PointerState {
        &self.pointer
    }

    pub fn repeat(&self) -> &RepeatEngine<KeyEvent> {
        &self.repeat
    }

    /// Apply one inbound record
    pub fn dispatch(&mut self, event: &Event, now: Instant) {
        trace!(
            target: TAG,
            "Event type: {:?}; param 1: {}; param 2: {}",
            event.kind,
            event.param1,
            event.param2
        );

        match event.kind {
            EventKind::KeyboardKeymap => self.handle_keymap(event.param1, event.param2),
            EventKind::KeyboardModifiers => {
                let (depressed, latched, locked, group) =
                    unpack_modifiers(event.param1, event.param2);
                self.keyboard
                    .apply_modifiers(depressed, latched, locked, group);
            }
            EventKind::KeyboardKey => self.handle_key(event.param1, event.param2, now),
            EventKind::KeyboardRepeatInfo => {
                self.repeat
                    .set_repeat_info(event.param1 as i32, event.param2 as i32);
                self.repeating_code = None;
            }
            EventKind::PointerMotion => {
                let (x, y) = unpack_position(event.param1, event.param2);
                let moved = self
                    .pointer
                    .apply_motion(x, y)
                    .with_modifiers(self.keyboard.modifiers());
                self.push(SceneEvent::Pointer(moved));
            }
            EventKind::PointerButton => {
                let Ok(code) = u32::try_from(event.param1) else {
                    warn!(target: TAG, "Button code out of range: {}", event.param1);
                    return;
                };
                let changed = self
                    .pointer
                    .apply_button(code, ButtonState::from(event.param2))
                    .with_modifiers(self.keyboard.modifiers());
                self.push(SceneEvent::Pointer(changed));
            }
            EventKind::AuthPending => self.push(SceneEvent::Auth(AuthState::Pending)),
            EventKind::AuthFail => self.push(SceneEvent::Auth(AuthState::Failed)),
            EventKind::AuthSuccess => self.push(SceneEvent::Auth(AuthState::Success)),
            EventKind::Wayland | EventKind::Renderer | EventKind::AuthSubmit => {
                debug!(target: TAG, "Ignoring outbound-only event {:?}", event.kind);
            }
        }
    }

    /// Fire any due repeat
    pub fn tick(&mut self, now: Instant) {
        self.repeat.tick(now);
    }

    /// Next instant the loop must wake for repeat, if armed
    pub fn next_deadline(&self) -> Option<Instant> {
        self.repeat.next_deadline()
    }

    /// Take every queued scene event in arrival order
    pub fn drain(&mut self) -> Vec<SceneEvent> {
        self.outbox.borrow_mut().drain(..).collect()
    }

    fn push(&self, event: SceneEvent) {
        self.outbox.borrow_mut().push_back(event);
    }

    fn handle_keymap(&mut self, raw_fd: u64, size: u64) {
        let Ok(raw_fd) = RawFd::try_from(raw_fd) else {
            warn!(target: TAG, "Keymap fd out of range: {}", raw_fd);
            return;
        };
        if raw_fd < 0 {
            warn!(target: TAG, "Invalid keymap fd: {}", raw_fd);
            return;
        }
        // SAFETY: the producer hands the keymap fd over with the event and
        // never touches it again; we are its only owner from here on
        let fd = unsafe { OwnedFd::from_raw_fd(raw_fd) };

        let Ok(size) = usize::try_from(size) else {
            warn!(target: TAG, "Keymap size out of range: {}", size);
            return;
        };
        match self.keyboard.load_keymap_fd(fd, size) {
            Ok(()) => {
                self.repeat.reset();
                self.repeating_code = None;
            }
            Err(e) => warn!(target: TAG, "Keymap update failed: {}", e),
        }
    }

    fn handle_key(&mut self, code: u64, tag: u64, now: Instant) {
        let Ok(code) = u32::try_from(code) else {
            warn!(target: TAG, "Key code out of range: {}", code);
            return;
        };
        let key_state = match KeyState::try_from(tag) {
            Ok(state) => state,
            Err(other) => {
                warn!(target: TAG, "Unknown key state {}", other);
                return;
            }
        };
        let Some(event) = self.keyboard.apply_key(code, key_state) else {
            return;
        };

        match (event.kind, key_state) {
            (KeyEventKind::Press, KeyState::Pressed) => {
                if self.keyboard.key_repeats(code) {
                    let mut repeated = event.clone();
                    repeated.auto_repeat = true;
                    self.repeat.set(repeated, now);
                    self.repeating_code = Some(code);
                }
            }
            (KeyEventKind::Release, _) if self.repeating_code == Some(code) => {
                self.repeat.reset();
                self.repeating_code = None;
            }
            _ => {}
        }

        self.push(SceneEvent::Key(event));
    }
}

impl Default for Dispatcher {
    fn default() -> Self {
        Self::new()
    }
}
