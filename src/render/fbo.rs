//! Framebuffer Object (FBO) for offscreen scene rendering
//!
//! Color + depth/stencil renderbuffers; frames are read back from here
//! instead of being presented.

use anyhow::{anyhow, Result};
use glow::HasContext;
use log::info;

use super::readback::PixelSource;

const TAG: &str = "lockbridge::gpu";

/// Offscreen render target
pub struct Fbo {
    framebuffer: glow::Framebuffer,
    color: glow::Renderbuffer,
    depth_stencil: glow::Renderbuffer,
    width: u32,
    height: u32,
}

impl Fbo {
    /// Create FBO with specified size
    pub fn new(gl: &glow::Context, width: u32, height: u32) -> Result<Self> {
        unsafe {
            let color = gl
                .create_renderbuffer()
                .map_err(|e| anyhow!("Failed to create FBO color buffer: {}", e))?;
            gl.bind_renderbuffer(glow::RENDERBUFFER, Some(color));
            gl.renderbuffer_storage(glow::RENDERBUFFER, glow::RGBA8, width as i32, height as i32);

            let depth_stencil = gl
                .create_renderbuffer()
                .map_err(|e| anyhow!("Failed to create FBO depth buffer: {}", e))?;
            gl.bind_renderbuffer(glow::RENDERBUFFER, Some(depth_stencil));
            gl.renderbuffer_storage(
                glow::RENDERBUFFER,
                glow::DEPTH24_STENCIL8,
                width as i32,
                height as i32,
            );
            gl.bind_renderbuffer(glow::RENDERBUFFER, None);

            let framebuffer = gl
                .create_framebuffer()
                .map_err(|e| anyhow!("Failed to create FBO: {}", e))?;
            gl.bind_framebuffer(glow::FRAMEBUFFER, Some(framebuffer));
            gl.framebuffer_renderbuffer(
                glow::FRAMEBUFFER,
                glow::COLOR_ATTACHMENT0,
                glow::RENDERBUFFER,
                Some(color),
            );
            gl.framebuffer_renderbuffer(
                glow::FRAMEBUFFER,
                glow::DEPTH_STENCIL_ATTACHMENT,
                glow::RENDERBUFFER,
                Some(depth_stencil),
            );

            // Check framebuffer status
            let status = gl.check_framebuffer_status(glow::FRAMEBUFFER);
            gl.bind_framebuffer(glow::FRAMEBUFFER, None);
            if status != glow::FRAMEBUFFER_COMPLETE {
                gl.delete_framebuffer(framebuffer);
                gl.delete_renderbuffer(color);
                gl.delete_renderbuffer(depth_stencil);
                return Err(anyhow!("FBO incomplete: status={}", status));
            }

            info!(target: TAG, "FBO created: {}x{}", width, height);

            Ok(Self {
                framebuffer,
                color,
                depth_stencil,
                width,
                height,
            })
        }
    }

    /// Bind FBO for rendering
    pub fn bind(&self, gl: &glow::Context) {
        unsafe {
            gl.bind_framebuffer(glow::FRAMEBUFFER, Some(self.framebuffer));
            gl.viewport(0, 0, self.width as i32, self.height as i32);
        }
    }

    /// Unbind FBO (return to default framebuffer)
    pub fn unbind(&self, gl: &glow::Context) {
        unsafe {
            gl.bind_framebuffer(glow::FRAMEBUFFER, None);
        }
    }

    pub fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    /// Row-wise reader over this FBO
    pub fn reader<'a>(&'a self, gl: &'a glow::Context) -> FboReader<'a> {
        FboReader { gl, fbo: self }
    }

    /// Release resources
    pub fn destroy(&self, gl: &glow::Context) {
        unsafe {
            gl.delete_framebuffer(self.framebuffer);
            gl.delete_renderbuffer(self.color);
            gl.delete_renderbuffer(self.depth_stencil);
        }
    }
}

/// `PixelSource` over an FBO
pub struct FboReader<'a> {
    gl: &'a glow::Context,
    fbo: &'a Fbo,
}

impl PixelSource for FboReader<'_> {
    fn size(&self) -> (u32, u32) {
        self.fbo.size()
    }

    fn bind_for_read(&mut self) -> Result<(), u32> {
        unsafe {
            self.gl
                .bind_framebuffer(glow::FRAMEBUFFER, Some(self.fbo.framebuffer));
            let status = self.gl.check_framebuffer_status(glow::FRAMEBUFFER);
            if status != glow::FRAMEBUFFER_COMPLETE {
                self.gl.bind_framebuffer(glow::FRAMEBUFFER, None);
                return Err(status);
            }
            // Rows are tightly packed
            self.gl.pixel_store_i32(glow::PACK_ALIGNMENT, 1);
        }
        Ok(())
    }

    fn read_row(&mut self, gl_row: u32, dst: &mut [u8]) {
        unsafe {
            self.gl.read_pixels(
                0,
                gl_row as i32,
                self.fbo.width as i32,
                1,
                glow::BGRA,
                glow::UNSIGNED_BYTE,
                glow::PixelPackData::Slice(dst),
            );
        }
    }

    fn take_error(&mut self) -> u32 {
        unsafe { self.gl.get_error() }
    }

    fn unbind(&mut self) {
        self.fbo.unbind(self.gl);
    }
}
