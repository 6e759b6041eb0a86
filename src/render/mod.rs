//! Offscreen rendering
//!
//! Render thread lifecycle and frame production.
//! - `render_loop`: thread ownership, init handshake, cooperative loop
//! - `target`/`scene`: what gets drawn and how the scene talks back
//! - `context`/`fbo`/`readback`: headless EGL, offscreen FBO, pixel copy
//! - `buffer`: where finished frames go

pub mod buffer;
pub mod context;
pub mod fbo;
pub mod handshake;
pub mod readback;
pub mod render_loop;
pub mod scene;
pub mod target;

pub use buffer::{BufferPool, BufferProvider, CallbackProvider, GetBufferFn};
pub use handshake::InitSignal;
pub use readback::{read_frame, PixelSource, ReadbackError};
pub use render_loop::{LoopOptions, RenderLoop, RenderState};
pub use scene::{PromptScene, Scene, SceneInterface};
pub use target::{GlTarget, RenderTarget};
