//! Render targets
//!
//! The render loop only sees `RenderTarget`; `GlTarget` is the GPU-backed
//! one (EGL context + FBO + scene). Targets are built on the render thread
//! and never leave it.

use anyhow::Result;
use glow::HasContext;
use log::warn;

use super::context::EglContext;
use super::fbo::Fbo;
use super::readback::{read_frame, ReadbackError};
use super::scene::{Scene, SceneInterface};
use crate::input::SceneEvent;

const TAG: &str = "lockbridge::target";

/// Everything the render loop needs from the GPU side
pub trait RenderTarget {
    /// Load the scene asset
    fn load(&mut self) -> Result<()>;

    /// Forward input; true if a new frame is needed
    fn handle_event(&mut self, event: &SceneEvent) -> bool;

    /// Produce one frame into the offscreen target
    fn render(&mut self) -> Result<()>;

    /// Copy the last frame into `dst`
    fn read_pixels(&mut self, dst: &mut [u8]) -> Result<(), ReadbackError>;
}

/// GPU-backed target
pub struct GlTarget<S: Scene> {
    scene: S,
    iface: SceneInterface,
    fbo: Fbo,
    gl: glow::Context,
    // Dropped last
    egl: EglContext,
}

impl<S: Scene> GlTarget<S> {
    /// Set up context, GL and FBO on the calling thread
    pub fn new(iface: SceneInterface, scene: S) -> Result<Self> {
        let egl = EglContext::new_headless()?;
        let gl = egl.load_gl();
        let fbo = Fbo::new(&gl, iface.width(), iface.height())?;
        Ok(Self {
            scene,
            iface,
            fbo,
            gl,
            egl,
        })
    }
}

impl<S: Scene> RenderTarget for GlTarget<S> {
    fn load(&mut self) -> Result<()> {
        self.egl.make_current()?;
        self.scene.load(&self.gl, &self.iface)
    }

    fn handle_event(&mut self, event: &SceneEvent) -> bool {
        self.scene.handle_event(event, &self.iface)
    }

    fn render(&mut self) -> Result<()> {
        self.egl.make_current()?;
        self.fbo.bind(&self.gl);
        let (width, height) = self.fbo.size();
        self.scene.render(&self.gl, width, height);
        unsafe { self.gl.finish() };
        self.fbo.unbind(&self.gl);
        Ok(())
    }

    fn read_pixels(&mut self, dst: &mut [u8]) -> Result<(), ReadbackError> {
        read_frame(&mut self.fbo.reader(&self.gl), dst)
    }
}

impl<S: Scene> Drop for GlTarget<S> {
    fn drop(&mut self) {
        if let Err(e) = self.egl.make_current() {
            warn!(target: TAG, "Leaking FBO, context lost: {:#}", e);
            return;
        }
        self.fbo.destroy(&self.gl);
    }
}
