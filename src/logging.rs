//! Leveled log sink
//!
//! Every message carries an explicit source tag which becomes the `log` target,
//! so `RUST_LOG=lockbridge::channel=trace` filters per component.
//! Foreign scene code logs through the exported `*_log` C functions.

use std::ffi::{c_char, CStr};

/// Log severity accepted by the sink
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

impl From<LogLevel> for log::Level {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Trace => log::Level::Trace,
            LogLevel::Debug => log::Level::Debug,
            LogLevel::Info => log::Level::Info,
            LogLevel::Warn => log::Level::Warn,
            LogLevel::Error => log::Level::Error,
        }
    }
}

/// Write `message` at `level`, attributed to `tag`
pub fn log(level: LogLevel, tag: &str, message: &str) {
    let level: log::Level = level.into();
    log::log!(target: tag, level, "{}", message);
}

/// Borrow a C string, substituting a marker for NULL or invalid UTF-8
///
/// # Safety
/// `ptr` must be NULL or point to a NUL-terminated string that outlives `'a`.
unsafe fn cstr_or_marker<'a>(ptr: *const c_char) -> &'a str {
    if ptr.is_null() {
        return "<null>";
    }
    CStr::from_ptr(ptr).to_str().unwrap_or("<invalid utf8>")
}

/// # Safety
/// `tag` and `msg` must each be NULL or a NUL-terminated string.
unsafe fn log_from_c(level: LogLevel, tag: *const c_char, msg: *const c_char) {
    log(level, cstr_or_marker(tag), cstr_or_marker(msg));
}

/// Log from foreign code at trace level
///
/// # Safety
/// `tag` and `msg` must each be NULL or point to a NUL-terminated string
/// that stays valid for the duration of the call. The same holds for the
/// other `*_log` exports.
#[no_mangle]
pub unsafe extern "C" fn trace_log(tag: *const c_char, msg: *const c_char) {
    log_from_c(LogLevel::Trace, tag, msg);
}

/// # Safety
/// See `trace_log`.
#[no_mangle]
pub unsafe extern "C" fn debug_log(tag: *const c_char, msg: *const c_char) {
    log_from_c(LogLevel::Debug, tag, msg);
}

/// # Safety
/// See `trace_log`.
#[no_mangle]
pub unsafe extern "C" fn info_log(tag: *const c_char, msg: *const c_char) {
    log_from_c(LogLevel::Info, tag, msg);
}

/// # Safety
/// See `trace_log`.
#[no_mangle]
pub unsafe extern "C" fn warn_log(tag: *const c_char, msg: *const c_char) {
    log_from_c(LogLevel::Warn, tag, msg);
}

/// # Safety
/// See `trace_log`.
#[no_mangle]
pub unsafe extern "C" fn error_log(tag: *const c_char, msg: *const c_char) {
    log_from_c(LogLevel::Error, tag, msg);
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::ffi::CString;

    #[test]
    fn test_level_mapping() {
        assert_eq!(log::Level::from(LogLevel::Trace), log::Level::Trace);
        assert_eq!(log::Level::from(LogLevel::Warn), log::Level::Warn);
        assert_eq!(log::Level::from(LogLevel::Error), log::Level::Error);
    }

    #[test]
    fn test_c_strings() {
        let tag = CString::new("scene").unwrap();
        let bad = [0xffu8, 0xfe, 0x00];
        unsafe {
            assert_eq!(cstr_or_marker(tag.as_ptr()), "scene");
            assert_eq!(cstr_or_marker(std::ptr::null()), "<null>");
            assert_eq!(cstr_or_marker(bad.as_ptr() as *const c_char), "<invalid utf8>");
        }
        // Must not panic without a logger installed
        unsafe { error_log(tag.as_ptr(), std::ptr::null()) };
    }
}
