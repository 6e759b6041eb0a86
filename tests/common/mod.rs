//! Shared fixtures for integration tests

#![allow(dead_code)]

use std::io::Write;
use std::os::fd::{IntoRawFd, OwnedFd};
use std::sync::atomic::{AtomicUsize, Ordering};

/// Self-contained keymap: Escape, a/A, Return and Left Shift
pub const KEYMAP: &str = r#"xkb_keymap {
    xkb_keycodes "test" {
        minimum = 8;
        maximum = 255;
        <ESC>  = 9;
        <RTRN> = 36;
        <AC01> = 38;
        <LFSH> = 50;
    };
    xkb_types "test" {
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
        key <RTRN> { type = "ONE_LEVEL", [ Return ] };
        key <AC01> { type = "ALPHABETIC", [ a, A ] };
        key <LFSH> { type = "ONE_LEVEL", [ Shift_L ] };
        modifier_map Shift { <LFSH> };
    };
};
"#;

static NEXT_FILE: AtomicUsize = AtomicUsize::new(0);

/// Write `KEYMAP` (NUL-terminated) to an unlinked file
///
/// Returns the raw fd, ready to travel in a keymap event, and the size.
pub fn keymap_fd() -> (i32, usize) {
    let n = NEXT_FILE.fetch_add(1, Ordering::Relaxed);
    let path = std::env::temp_dir().join(format!(
        "lockbridge-test-keymap-{}-{}",
        std::process::id(),
        n
    ));
    let mut file = std::fs::File::create(&path).unwrap();
    file.write_all(KEYMAP.as_bytes()).unwrap();
    file.write_all(b"\0").unwrap();
    drop(file);
    let file = std::fs::File::open(&path).unwrap();
    std::fs::remove_file(&path).unwrap();
    (OwnedFd::from(file).into_raw_fd(), KEYMAP.len() + 1)
}
