//! Keyboard state
//!
//! Compiles the compositor's keymap with xkbcommon, tracks modifier/group
//! state and turns hardware key codes into portable key events.

use log::{debug, info, warn};
use memmap2::MmapOptions;
use smol_str::SmolStr;
use std::fs::File;
use std::os::fd::OwnedFd;
use thiserror::Error;
use xkbcommon::xkb;

use super::keysyms::{keysym_to_key, Key, Modifiers};
use crate::constants::{MAX_KEY_TEXT_BYTES, XKB_KEYCODE_OFFSET};

const TAG: &str = "lockbridge::keyboard";

/// Keymap loading failures
///
/// The previously loaded keymap stays active after any of these.
#[derive(Error, Debug)]
pub enum KeymapError {
    #[error("failed to map keymap: {0}")]
    Map(#[from] std::io::Error),

    #[error("keymap is empty")]
    Empty,

    #[error("keymap is not valid UTF-8")]
    InvalidUtf8,

    #[error("failed to compile keymap")]
    CompileFailed,
}

/// Key state tag carried in param 2 of a key event
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum KeyState {
    Released = 0,
    Pressed = 1,
    /// Compositor-generated repeat
    Repeated = 2,
}

impl TryFrom<u64> for KeyState {
    type Error = u64;

    fn try_from(tag: u64) -> Result<Self, Self::Error> {
        match tag {
            0 => Ok(KeyState::Released),
            1 => Ok(KeyState::Pressed),
            2 => Ok(KeyState::Repeated),
            other => Err(other),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyEventKind {
    Press,
    Release,
}

/// Synthesized key event handed to the scene
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyEvent {
    pub kind: KeyEventKind,
    pub key: Key,
    pub modifiers: Modifiers,
    /// UTF-8 text produced by the key, empty if none
    pub text: SmolStr,
    /// evdev keycode
    pub hardware_code: u32,
    pub auto_repeat: bool,
}

/// Compiled keymap and its live state
///
/// Field order matters: the state is dropped before the keymap it refers to.
struct Keymap {
    state: xkb::State,
    keymap: xkb::Keymap,
}

/// xkb keyboard model
pub struct KeyboardState {
    context: xkb::Context,
    current: Option<Keymap>,
}

impl KeyboardState {
    pub fn new() -> Self {
        Self {
            context: xkb::Context::new(xkb::CONTEXT_NO_FLAGS),
            current: None,
        }
    }

    /// True once a keymap has been compiled
    pub fn has_keymap(&self) -> bool {
        self.current.is_some()
    }

    /// Compile a text (v1) keymap and make it current
    ///
    /// The old keymap and state are released only after the new ones exist.
    pub fn load_keymap(&mut self, raw: &[u8]) -> Result<(), KeymapError> {
        // Compositors send the keymap NUL-terminated
        let text = match raw.iter().position(|&b| b == 0) {
            Some(end) => &raw[..end],
            None => raw,
        };
        if text.is_empty() {
            warn!(target: TAG, "Refusing empty keymap");
            return Err(KeymapError::Empty);
        }
        let text = std::str::from_utf8(text).map_err(|_| KeymapError::InvalidUtf8)?;

        let keymap = xkb::Keymap::new_from_string(
            &self.context,
            text.to_owned(),
            xkb::KEYMAP_FORMAT_TEXT_V1,
            xkb::KEYMAP_COMPILE_NO_FLAGS,
        )
        .ok_or_else(|| {
            warn!(target: TAG, "Failed to compile XKB keymap, keeping previous one");
            KeymapError::CompileFailed
        })?;
        let state = xkb::State::new(&keymap);

        self.current = Some(Keymap { state, keymap });
        info!(target: TAG, "Loaded new XKB keymap");
        Ok(())
    }

    /// Map `size` bytes of the shared keymap fd and load them
    ///
    /// Takes ownership of `fd`; it is closed on return either way.
    pub fn load_keymap_fd(&mut self, fd: OwnedFd, size: usize) -> Result<(), KeymapError> {
        if size == 0 {
            return Err(KeymapError::Empty);
        }
        let file = File::from(fd);
        // SAFETY: the mapping is private and read-only, and dropped before return
        let map = unsafe { MmapOptions::new().len(size).map(&file) }.map_err(|e| {
            warn!(target: TAG, "Failed to mmap keymap: {}", e);
            KeymapError::Map(e)
        })?;
        self.load_keymap(&map)
    }

    /// Replace modifier and group state
    ///
    /// Returns false (and changes nothing) when no keymap is loaded.
    pub fn apply_modifiers(&mut self, depressed: u32, latched: u32, locked: u32, group: u32) -> bool {
        match self.current.as_mut() {
            Some(current) => {
                current
                    .state
                    .update_mask(depressed, latched, locked, 0, 0, group);
                debug!(target: TAG, "Updated modifiers");
                true
            }
            None => {
                debug!(target: TAG, "Modifiers before keymap, ignored");
                false
            }
        }
    }

    /// Apply a key transition and synthesize the resulting event
    ///
    /// Returns `None` when no keymap is loaded.
    pub fn apply_key(&mut self, hardware_code: u32, key_state: KeyState) -> Option<KeyEvent> {
        let Some(current) = self.current.as_mut() else {
            debug!(target: TAG, "No XKB state available, key {} dropped", hardware_code);
            return None;
        };
        let Some(keycode) = xkb_keycode(hardware_code) else {
            warn!(target: TAG, "Key code out of range: {}", hardware_code);
            return None;
        };

        match key_state {
            KeyState::Pressed => {
                current.state.update_key(keycode, xkb::KeyDirection::Down);
            }
            KeyState::Released => {
                current.state.update_key(keycode, xkb::KeyDirection::Up);
            }
            // Already held down on the compositor side
            KeyState::Repeated => {}
        }

        let keysym = current.state.key_get_one_sym(keycode);
        let key = keysym_to_key(keysym.raw());
        let utf8 = current.state.key_get_utf8(keycode);
        let text = truncate_utf8(&utf8, MAX_KEY_TEXT_BYTES);

        Some(KeyEvent {
            kind: match key_state {
                KeyState::Released => KeyEventKind::Release,
                KeyState::Pressed | KeyState::Repeated => KeyEventKind::Press,
            },
            key,
            modifiers: self.modifiers(),
            text: SmolStr::new(text),
            hardware_code,
            auto_repeat: key_state == KeyState::Repeated,
        })
    }

    /// Currently effective portable modifiers
    pub fn modifiers(&self) -> Modifiers {
        let Some(current) = self.current.as_ref() else {
            return Modifiers::empty();
        };
        let active = |name: &str| {
            current
                .state
                .mod_name_is_active(name, xkb::STATE_MODS_EFFECTIVE)
        };

        let mut modifiers = Modifiers::empty();
        if active(xkb::MOD_NAME_SHIFT) {
            modifiers |= Modifiers::SHIFT;
        }
        if active(xkb::MOD_NAME_CTRL) {
            modifiers |= Modifiers::CONTROL;
        }
        if active(xkb::MOD_NAME_ALT) {
            modifiers |= Modifiers::ALT;
        }
        if active(xkb::MOD_NAME_LOGO) {
            modifiers |= Modifiers::META;
        }
        modifiers
    }

    /// Whether the keymap marks this key as auto-repeating
    pub fn key_repeats(&self, hardware_code: u32) -> bool {
        let Some(keycode) = xkb_keycode(hardware_code) else {
            return false;
        };
        self.current
            .as_ref()
            .is_some_and(|current| current.keymap.key_repeats(keycode))
    }
}

impl Default for KeyboardState {
    fn default() -> Self {
        Self::new()
    }
}

/// Evdev code to XKB keycode, `None` if it does not fit
fn xkb_keycode(hardware_code: u32) -> Option<xkb::Keycode> {
    hardware_code
        .checked_add(XKB_KEYCODE_OFFSET)
        .map(xkb::Keycode::new)
}

/// Cut `text` to at most `max` bytes on a char boundary
fn truncate_utf8(text: &str, max: usize) -> &str {
    if text.len() <= max {
        return text;
    }
    let mut end = max;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    &text[..end]
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::input::keycodes::{KEY_A, KEY_ESC, KEY_LEFTSHIFT};
    use std::os::fd::{AsRawFd, RawFd};

    /// Self-contained keymap: Escape, a/A and Left Shift
    pub(crate) const TEST_KEYMAP: &str = r#"xkb_keymap {
    xkb_keycodes "test" {
        minimum = 8;
        maximum = 255;
        <ESC>  = 9;
        <AC01> = 38;
        <LFSH> = 50;
    };
    xkb_types "test" {
        virtual_modifiers NumLock;
        type "ONE_LEVEL" {
            modifiers = none;
            level_name[Level1] = "Any";
        };
        type "ALPHABETIC" {
            modifiers = Shift+Lock;
            map[Shift] = Level2;
            map[Lock] = Level2;
            level_name[Level1] = "Base";
            level_name[Level2] = "Caps";
        };
    };
    xkb_compatibility "test" {
        interpret Shift_L {
            action = SetMods(modifiers=Shift);
        };
    };
    xkb_symbols "test" {
        key <ESC>  { type = "ONE_LEVEL", [ Escape ] };
        key <AC01> { type = "ALPHABETIC", [ a, A ] };
        key <LFSH> { type = "ONE_LEVEL", [ Shift_L ] };
        modifier_map Shift { <LFSH> };
    };
};
"#;

    fn loaded() -> KeyboardState {
        let mut kb = KeyboardState::new();
        kb.load_keymap(TEST_KEYMAP.as_bytes()).unwrap();
        kb
    }

    #[test]
    fn test_no_keymap() {
        let mut kb = KeyboardState::new();
        assert!(!kb.has_keymap());
        assert!(kb.apply_key(KEY_A, KeyState::Pressed).is_none());
        assert!(!kb.apply_modifiers(1, 0, 0, 0));
        assert_eq!(kb.modifiers(), Modifiers::empty());
    }

    #[test]
    fn test_press_a() {
        let mut kb = loaded();
        let event = kb.apply_key(KEY_A, KeyState::Pressed).unwrap();
        assert_eq!(event.kind, KeyEventKind::Press);
        assert_eq!(event.key, Key(u32::from(b'A')));
        assert_eq!(event.text, "a");
        assert_eq!(event.modifiers, Modifiers::empty());
        assert!(!event.auto_repeat);

        let event = kb.apply_key(KEY_A, KeyState::Released).unwrap();
        assert_eq!(event.kind, KeyEventKind::Release);
        assert_eq!(event.hardware_code, KEY_A);
    }

    #[test]
    fn test_shift_via_modifier_event() {
        let mut kb = loaded();
        // Shift is the first real modifier (bit 0)
        assert!(kb.apply_modifiers(0x1, 0, 0, 0));
        assert_eq!(kb.modifiers(), Modifiers::SHIFT);
        let event = kb.apply_key(KEY_A, KeyState::Pressed).unwrap();
        assert_eq!(event.key, Key(u32::from(b'A')));
        assert_eq!(event.text, "A");
        assert!(event.modifiers.contains(Modifiers::SHIFT));

        kb.apply_modifiers(0, 0, 0, 0);
        assert_eq!(kb.modifiers(), Modifiers::empty());
    }

    #[test]
    fn test_named_key_and_shift_key() {
        let mut kb = loaded();
        let esc = kb.apply_key(KEY_ESC, KeyState::Pressed).unwrap();
        assert_eq!(esc.key, Key::ESCAPE);

        let shift = kb.apply_key(KEY_LEFTSHIFT, KeyState::Pressed).unwrap();
        assert_eq!(shift.key, Key::SHIFT);
        assert!(shift.text.is_empty());
    }

    #[test]
    fn test_repeated_tag() {
        let mut kb = loaded();
        let event = kb.apply_key(KEY_A, KeyState::Repeated).unwrap();
        assert_eq!(event.kind, KeyEventKind::Press);
        assert!(event.auto_repeat);
        assert_eq!(KeyState::try_from(2), Ok(KeyState::Repeated));
        assert_eq!(KeyState::try_from(3), Err(3));
    }

    #[test]
    fn test_failed_reload_keeps_previous() {
        let mut kb = loaded();
        assert!(matches!(
            kb.load_keymap(b"xkb_keymap { this is not a keymap"),
            Err(KeymapError::CompileFailed)
        ));
        assert!(matches!(kb.load_keymap(b"\0"), Err(KeymapError::Empty)));
        assert!(matches!(
            kb.load_keymap(&[0xff, 0xfe]),
            Err(KeymapError::InvalidUtf8)
        ));
        let event = kb.apply_key(KEY_A, KeyState::Pressed).unwrap();
        assert_eq!(event.text, "a");
    }

    #[test]
    fn test_nul_terminated_keymap() {
        let mut kb = KeyboardState::new();
        let mut raw = TEST_KEYMAP.as_bytes().to_vec();
        raw.push(0);
        raw.extend_from_slice(b"garbage after terminator");
        kb.load_keymap(&raw).unwrap();
        assert!(kb.has_keymap());
    }

    #[test]
    fn test_out_of_range_key_code() {
        let mut kb = loaded();
        assert!(kb.apply_key(u32::MAX, KeyState::Pressed).is_none());
        assert!(kb.apply_key(u32::MAX - XKB_KEYCODE_OFFSET + 1, KeyState::Released).is_none());
        assert!(!kb.key_repeats(u32::MAX));
        // Still usable afterwards
        assert_eq!(kb.apply_key(KEY_A, KeyState::Pressed).unwrap().text, "a");
    }

    /// Unlinked file holding `contents`, plus its inode
    fn unlinked_file(name: &str, contents: &[u8]) -> (OwnedFd, u64) {
        use std::io::Write;
        let path = std::env::temp_dir().join(format!(
            "lockbridge-kb-{}-{}",
            name,
            std::process::id()
        ));
        let mut file = File::create(&path).unwrap();
        file.write_all(contents).unwrap();
        drop(file);
        let file = File::open(&path).unwrap();
        std::fs::remove_file(&path).unwrap();
        let ino = nix::sys::stat::fstat(file.as_raw_fd()).unwrap().st_ino as u64;
        (OwnedFd::from(file), ino)
    }

    /// The fd number no longer refers to the file (it may have been reused)
    fn fd_released(raw: RawFd, ino: u64) -> bool {
        match nix::sys::stat::fstat(raw) {
            Ok(stat) => stat.st_ino as u64 != ino,
            Err(e) => e == nix::errno::Errno::EBADF,
        }
    }

    #[test]
    fn test_keymap_fd_closed_on_success() {
        let mut kb = KeyboardState::new();
        let (fd, ino) = unlinked_file("ok", TEST_KEYMAP.as_bytes());
        let raw = fd.as_raw_fd();
        kb.load_keymap_fd(fd, TEST_KEYMAP.len()).unwrap();
        assert!(kb.has_keymap());
        assert!(fd_released(raw, ino));
    }

    #[test]
    fn test_keymap_fd_closed_on_failure() {
        let mut kb = KeyboardState::new();
        let garbage = b"xkb_keymap { broken";
        let (fd, ino) = unlinked_file("bad", garbage);
        let raw = fd.as_raw_fd();
        assert!(matches!(
            kb.load_keymap_fd(fd, garbage.len()),
            Err(KeymapError::CompileFailed)
        ));
        assert!(fd_released(raw, ino));

        let (fd, ino) = unlinked_file("empty", b"");
        let raw = fd.as_raw_fd();
        assert!(matches!(kb.load_keymap_fd(fd, 0), Err(KeymapError::Empty)));
        assert!(fd_released(raw, ino));
        assert!(!kb.has_keymap());
    }

    #[test]
    fn test_key_repeats() {
        let kb = loaded();
        assert!(kb.key_repeats(KEY_A));
        assert!(!KeyboardState::new().key_repeats(KEY_A));
    }

    #[test]
    fn test_truncate_utf8() {
        assert_eq!(truncate_utf8("abc", 63), "abc");
        assert_eq!(truncate_utf8("abcdef", 3), "abc");
        // 'é' is two bytes; never split it
        assert_eq!(truncate_utf8("aé", 2), "a");
    }
}
