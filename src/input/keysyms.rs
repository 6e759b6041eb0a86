//! Keysym -> portable key translation
//!
//! Portable key codes follow the Qt numbering the scene side expects:
//! printable keys are their (uppercase) Unicode code point, named keys live
//! in the 0x0100_0000 block.

use bitflags::bitflags;
use xkbcommon::xkb::keysyms;

/// Portable key code
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Key(pub u32);

impl Key {
    pub const ESCAPE: Key = Key(0x0100_0000);
    pub const TAB: Key = Key(0x0100_0001);
    pub const BACKTAB: Key = Key(0x0100_0002);
    pub const BACKSPACE: Key = Key(0x0100_0003);
    pub const RETURN: Key = Key(0x0100_0004);
    pub const ENTER: Key = Key(0x0100_0005);
    pub const INSERT: Key = Key(0x0100_0006);
    pub const DELETE: Key = Key(0x0100_0007);
    pub const PAUSE: Key = Key(0x0100_0008);
    pub const PRINT: Key = Key(0x0100_0009);
    pub const SYSREQ: Key = Key(0x0100_000a);
    pub const HOME: Key = Key(0x0100_0010);
    pub const END: Key = Key(0x0100_0011);
    pub const LEFT: Key = Key(0x0100_0012);
    pub const UP: Key = Key(0x0100_0013);
    pub const RIGHT: Key = Key(0x0100_0014);
    pub const DOWN: Key = Key(0x0100_0015);
    pub const PAGE_UP: Key = Key(0x0100_0016);
    pub const PAGE_DOWN: Key = Key(0x0100_0017);
    pub const SHIFT: Key = Key(0x0100_0020);
    pub const CONTROL: Key = Key(0x0100_0021);
    pub const META: Key = Key(0x0100_0022);
    pub const ALT: Key = Key(0x0100_0023);
    pub const CAPS_LOCK: Key = Key(0x0100_0024);
    pub const NUM_LOCK: Key = Key(0x0100_0025);
    pub const SCROLL_LOCK: Key = Key(0x0100_0026);
    pub const F1: Key = Key(0x0100_0030);
    pub const F35: Key = Key(0x0100_0052);
    pub const SUPER_L: Key = Key(0x0100_0053);
    pub const SUPER_R: Key = Key(0x0100_0054);
    pub const MENU: Key = Key(0x0100_0055);
    pub const HYPER_L: Key = Key(0x0100_0056);
    pub const HYPER_R: Key = Key(0x0100_0057);
    pub const HELP: Key = Key(0x0100_0058);
    pub const UNKNOWN: Key = Key(0x01ff_ffff);

    /// Function key `n` (1-35)
    pub const fn function(n: u32) -> Option<Key> {
        if n >= 1 && n <= 35 {
            Some(Key(Self::F1.0 + n - 1))
        } else {
            None
        }
    }
}

bitflags! {
    /// Portable modifier set
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct Modifiers: u32 {
        const SHIFT = 0x0200_0000;
        const CONTROL = 0x0400_0000;
        const ALT = 0x0800_0000;
        const META = 0x1000_0000;
    }
}

/// First keysym of the directly-encoded Unicode block
const UNICODE_KEYSYM_FIRST: u32 = 0x0100_0100;
/// Last keysym of the directly-encoded Unicode block
const UNICODE_KEYSYM_LAST: u32 = 0x0110_FFFF;
/// Offset between a Unicode keysym and its code point
const UNICODE_KEYSYM_OFFSET: u32 = 0x0100_0000;
/// Offset from XKB_KEY_F1.. to the portable F1.. range
const FUNCTION_KEY_OFFSET: u32 = 0x00FF_0072;

/// Translate a keysym into a portable key code
pub fn keysym_to_key(keysym: u32) -> Key {
    // Latin-1: keysym == code point, letters reported uppercase
    if (0x20..0x100).contains(&keysym) {
        if (u32::from(b'a')..=u32::from(b'z')).contains(&keysym) {
            return Key(keysym - u32::from(b'a') + u32::from(b'A'));
        }
        return Key(keysym);
    }

    if (UNICODE_KEYSYM_FIRST..=UNICODE_KEYSYM_LAST).contains(&keysym) {
        let code_point = keysym - UNICODE_KEYSYM_OFFSET;
        // Surrogates are not characters
        if (0xD800..=0xDFFF).contains(&code_point) {
            return Key::UNKNOWN;
        }
        return Key(code_point);
    }

    if (keysyms::KEY_F1..=keysyms::KEY_F35).contains(&keysym) {
        return Key(keysym + FUNCTION_KEY_OFFSET);
    }

    match keysym {
        keysyms::KEY_Escape => Key::ESCAPE,
        keysyms::KEY_Tab => Key::TAB,
        keysyms::KEY_ISO_Left_Tab => Key::BACKTAB,
        keysyms::KEY_BackSpace => Key::BACKSPACE,
        keysyms::KEY_Return => Key::RETURN,
        keysyms::KEY_KP_Enter => Key::ENTER,
        keysyms::KEY_Insert => Key::INSERT,
        keysyms::KEY_Delete => Key::DELETE,
        keysyms::KEY_Pause => Key::PAUSE,
        keysyms::KEY_Print => Key::PRINT,
        keysyms::KEY_Sys_Req => Key::SYSREQ,
        keysyms::KEY_Home => Key::HOME,
        keysyms::KEY_End => Key::END,
        keysyms::KEY_Left => Key::LEFT,
        keysyms::KEY_Up => Key::UP,
        keysyms::KEY_Right => Key::RIGHT,
        keysyms::KEY_Down => Key::DOWN,
        keysyms::KEY_Page_Up => Key::PAGE_UP,
        keysyms::KEY_Page_Down => Key::PAGE_DOWN,
        keysyms::KEY_Shift_L | keysyms::KEY_Shift_R => Key::SHIFT,
        keysyms::KEY_Control_L | keysyms::KEY_Control_R => Key::CONTROL,
        keysyms::KEY_Meta_L | keysyms::KEY_Meta_R => Key::META,
        keysyms::KEY_Alt_L | keysyms::KEY_Alt_R => Key::ALT,
        keysyms::KEY_Caps_Lock => Key::CAPS_LOCK,
        keysyms::KEY_Num_Lock => Key::NUM_LOCK,
        keysyms::KEY_Scroll_Lock => Key::SCROLL_LOCK,
        keysyms::KEY_Super_L => Key::SUPER_L,
        keysyms::KEY_Super_R => Key::SUPER_R,
        keysyms::KEY_Menu => Key::MENU,
        keysyms::KEY_Hyper_L => Key::HYPER_L,
        keysyms::KEY_Hyper_R => Key::HYPER_R,
        keysyms::KEY_Help => Key::HELP,
        _ => Key::UNKNOWN,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_named_keys() {
        assert_eq!(keysym_to_key(keysyms::KEY_Escape), Key::ESCAPE);
        assert_eq!(keysym_to_key(keysyms::KEY_Return), Key::RETURN);
        assert_eq!(keysym_to_key(keysyms::KEY_KP_Enter), Key::ENTER);
        assert_eq!(keysym_to_key(keysyms::KEY_Home), Key::HOME);
        assert_eq!(keysym_to_key(keysyms::KEY_Left), Key::LEFT);
        assert_eq!(keysym_to_key(keysyms::KEY_Caps_Lock), Key::CAPS_LOCK);
        assert_eq!(keysym_to_key(keysyms::KEY_ISO_Left_Tab), Key::BACKTAB);
        assert_eq!(keysym_to_key(keysyms::KEY_Help), Key::HELP);
        assert_eq!(Key::ESCAPE.0, 0x0100_0000);
        assert_eq!(Key::HELP.0, 0x0100_0058);
    }

    #[test]
    fn test_left_and_right_variants_unify() {
        assert_eq!(keysym_to_key(keysyms::KEY_Shift_L), Key::SHIFT);
        assert_eq!(keysym_to_key(keysyms::KEY_Shift_R), Key::SHIFT);
        assert_eq!(keysym_to_key(keysyms::KEY_Control_R), Key::CONTROL);
        assert_eq!(keysym_to_key(keysyms::KEY_Alt_R), Key::ALT);
        assert_eq!(keysym_to_key(keysyms::KEY_Meta_L), Key::META);
        // Super and Hyper keep their sides
        assert_eq!(keysym_to_key(keysyms::KEY_Super_L), Key::SUPER_L);
        assert_eq!(keysym_to_key(keysyms::KEY_Super_R), Key::SUPER_R);
    }

    #[test]
    fn test_ascii() {
        for c in b'a'..=b'z' {
            let upper = c.to_ascii_uppercase();
            assert_eq!(keysym_to_key(u32::from(c)), Key(u32::from(upper)));
        }
        assert_eq!(keysym_to_key(u32::from(b'A')), Key(0x41));
        assert_eq!(keysym_to_key(u32::from(b' ')), Key(0x20));
        assert_eq!(keysym_to_key(u32::from(b'1')), Key(0x31));
        // Latin-1 passes through unchanged
        assert_eq!(keysym_to_key(0xe9), Key(0xe9));
    }

    #[test]
    fn test_function_keys() {
        assert_eq!(keysym_to_key(keysyms::KEY_F1), Key::F1);
        assert_eq!(keysym_to_key(keysyms::KEY_F12), Key::function(12).unwrap());
        assert_eq!(keysym_to_key(keysyms::KEY_F35), Key::F35);
        assert_eq!(Key::function(0), None);
        assert_eq!(Key::function(36), None);
    }

    #[test]
    fn test_unicode_block() {
        // U+20AC EURO SIGN
        assert_eq!(keysym_to_key(0x0100_20AC), Key(0x20AC));
        assert_eq!(keysym_to_key(0x0110_FFFF), Key(0x10_FFFF));
        assert_eq!(keysym_to_key(0x0100_D800), Key::UNKNOWN);
        assert_eq!(keysym_to_key(0x0100_DFFF), Key::UNKNOWN);
    }

    #[test]
    fn test_unknown() {
        assert_eq!(keysym_to_key(0), Key::UNKNOWN);
        assert_eq!(keysym_to_key(0x1f), Key::UNKNOWN);
        assert_eq!(keysym_to_key(0x0111_0000), Key::UNKNOWN);
        assert_eq!(keysym_to_key(keysyms::KEY_XF86AudioMute), Key::UNKNOWN);
    }
}
