//! Event channel
//!
//! Fixed-size records exchanged between the input producer and the render
//! thread over a pair of pipe file descriptors.
//! - `event`: record layout, kinds and param packing
//! - `pipe`: non-blocking whole-record reads and writes

pub mod event;
pub mod pipe;

pub use event::{pack_modifiers, unpack_modifiers, unpack_position, Event, EventKind, EVENT_SIZE};
pub use pipe::{read_event, send, set_nonblocking, write_event, Pipe};

use thiserror::Error;

/// Channel failures
///
/// Every variant means the channel can no longer be trusted; "would block"
/// is not an error and is reported as `Ok(None)` by `read_event`.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelError {
    /// A read returned a byte count other than one record
    #[error("partial read: expected {} bytes, got {got}", EVENT_SIZE)]
    PartialRecord { got: usize },

    /// A write was cut short
    #[error("partial write: expected {} bytes, wrote {written}", EVENT_SIZE)]
    PartialWrite { written: usize },

    /// The kind tag is not one this build knows
    #[error("unknown event kind tag {0}")]
    UnknownKind(u64),

    /// The peer closed its end
    #[error("channel closed by peer")]
    Closed,

    #[error("channel I/O error: {0}")]
    Io(nix::errno::Errno),
}
