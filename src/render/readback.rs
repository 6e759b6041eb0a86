//! Pixel readback
//!
//! Copies a framebuffer into a CPU buffer, BGRA, 4 bytes per pixel. Row `y`
//! of the destination is read from GL row `height - 1 - y`, so the buffer
//! ends up top row first.

use thiserror::Error;

use crate::constants::{frame_len, BYTES_PER_PIXEL};

/// Readback failures; the frame is dropped
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadbackError {
    #[error("framebuffer incomplete: status=0x{0:x}")]
    Incomplete(u32),

    #[error("glReadPixels failed with error: 0x{0:x}")]
    Gl(u32),

    #[error("destination holds {got} bytes, frame needs {need}")]
    BufferTooSmall { need: usize, got: usize },
}

/// Framebuffer that can be read one row at a time
pub trait PixelSource {
    fn size(&self) -> (u32, u32);

    /// Bind for reading; `Err(status)` if the framebuffer is incomplete
    fn bind_for_read(&mut self) -> Result<(), u32>;

    /// Read GL row `gl_row` (0 = bottom) as BGRA into `dst`
    fn read_row(&mut self, gl_row: u32, dst: &mut [u8]);

    /// Pending GL error, 0 if none
    fn take_error(&mut self) -> u32;

    fn unbind(&mut self);
}

/// Read a full frame from `source` into `dst`
pub fn read_frame(source: &mut dyn PixelSource, dst: &mut [u8]) -> Result<(), ReadbackError> {
    let (width, height) = source.size();
    let need = frame_len(width, height);
    if dst.len() < need {
        return Err(ReadbackError::BufferTooSmall {
            need,
            got: dst.len(),
        });
    }
    if need == 0 {
        return Ok(());
    }

    source.bind_for_read().map_err(ReadbackError::Incomplete)?;
    let row_size = width as usize * BYTES_PER_PIXEL;
    for (y, row) in dst[..need].chunks_exact_mut(row_size).enumerate() {
        source.read_row(height - 1 - y as u32, row);
    }
    let error = source.take_error();
    source.unbind();

    if error != 0 {
        return Err(ReadbackError::Gl(error));
    }
    Ok(())
}
