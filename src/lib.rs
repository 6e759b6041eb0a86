//! lockbridge - input/render bridge for a screen-lock renderer
//!
//! Fixed-size event records arrive over a pipe, drive xkb keyboard and
//! pointer state plus key repeat, and an offscreen render thread turns
//! scene changes into frames handed out through a buffer provider.

pub mod channel;
pub mod config;
pub mod constants;
pub mod ffi;
pub mod input;
pub mod logging;
pub mod render;
pub mod state;
