//! Shared application state
//!
//! Handed to the render loop once; nothing in it changes afterwards.

use std::os::fd::OwnedFd;
use std::path::PathBuf;

use crate::channel::Pipe;

#[derive(Debug)]
pub struct ApplicationState {
    /// Scene asset loaded after start
    pub asset_path: PathBuf,
    /// Render side of the input channel (non-blocking)
    pub input_fd: OwnedFd,
    /// Render -> producer channel (frame ready, auth submit)
    pub output_fd: OwnedFd,
    pub width: u32,
    pub height: u32,
}

impl ApplicationState {
    pub fn new(
        asset_path: impl Into<PathBuf>,
        input_fd: OwnedFd,
        output_fd: OwnedFd,
        width: u32,
        height: u32,
    ) -> Self {
        Self {
            asset_path: asset_path.into(),
            input_fd,
            output_fd,
            width,
            height,
        }
    }
}

/// Producer-side ends of the two channels
#[derive(Debug)]
pub struct ProducerEnds {
    /// Write input events here
    pub input: OwnedFd,
    /// Read frame-ready and auth events here (non-blocking)
    pub output: OwnedFd,
}

/// Open both channels and split them between the render side and the producer
pub fn connect(
    asset_path: impl Into<PathBuf>,
    width: u32,
    height: u32,
) -> anyhow::Result<(ApplicationState, ProducerEnds)> {
    let (input_read, input_write) = Pipe::new()?.split();
    let (output_read, output_write) = Pipe::new()?.split();
    Ok((
        ApplicationState::new(asset_path, input_read, output_write, width, height),
        ProducerEnds {
            input: input_write,
            output: output_read,
        },
    ))
}
