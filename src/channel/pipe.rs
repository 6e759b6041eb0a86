//! Pipe transport
//!
//! Reads and writes whole records on a byte-stream fd.
//! The read side is switched to non-blocking so the render loop can drain it
//! after a readiness notification.

use anyhow::{anyhow, Result};
use log::{debug, error, trace};
use nix::errno::Errno;
use nix::fcntl::{fcntl, FcntlArg, OFlag};
use std::os::fd::{AsFd, AsRawFd, OwnedFd};

use super::event::{Event, EventKind, EVENT_SIZE};
use super::ChannelError;

const TAG: &str = "lockbridge::channel";

/// Pair of pipe file descriptors
///
/// File descriptors are closed when the halves are dropped.
pub struct Pipe {
    pub read: OwnedFd,
    pub write: OwnedFd,
}

impl Pipe {
    /// Open a pipe whose read end is non-blocking
    pub fn new() -> Result<Self> {
        let (reader, writer) = std::io::pipe().map_err(|e| anyhow!("pipe failed: {}", e))?;
        let read = OwnedFd::from(reader);
        let write = OwnedFd::from(writer);
        set_nonblocking(&read)?;
        Ok(Self { read, write })
    }

    /// Split into (read, write) halves
    pub fn split(self) -> (OwnedFd, OwnedFd) {
        (self.read, self.write)
    }
}

/// Set O_NONBLOCK on `fd`
pub fn set_nonblocking(fd: &impl AsFd) -> Result<()> {
    let raw = fd.as_fd().as_raw_fd();
    let flags = fcntl(raw, FcntlArg::F_GETFL).map_err(|e| anyhow!("F_GETFL failed: {}", e))?;
    let mut flags = OFlag::from_bits_truncate(flags);
    flags.insert(OFlag::O_NONBLOCK);
    fcntl(raw, FcntlArg::F_SETFL(flags)).map_err(|e| anyhow!("F_SETFL failed: {}", e))?;
    Ok(())
}

/// Read exactly one record
///
/// Returns `Ok(None)` when a non-blocking fd has nothing to read; that is
/// not an error and is not logged as one. A short read is a protocol error.
pub fn read_event(fd: &impl AsFd) -> Result<Option<Event>, ChannelError> {
    let mut bytes = [0u8; EVENT_SIZE];
    let raw = fd.as_fd().as_raw_fd();
    let n = loop {
        match nix::unistd::read(raw, &mut bytes) {
            Ok(n) => break n,
            Err(Errno::EINTR) => continue,
            Err(Errno::EAGAIN) => return Ok(None),
            Err(e) => {
                error!(target: TAG, "Failed to read event: {}", e);
                return Err(ChannelError::Io(e));
            }
        }
    };
    if n == 0 {
        return Err(ChannelError::Closed);
    }

    let event = Event::decode(&bytes[..n]).map_err(|e| {
        error!(target: TAG, "{}", e);
        e
    })?;
    trace!(
        target: TAG,
        "Event: {:?}; param 1: {:#x}; param 2: {:#x}",
        event.kind,
        event.param1,
        event.param2
    );
    Ok(Some(event))
}

/// Write one record, all or nothing
pub fn write_event(fd: &impl AsFd, event: &Event) -> Result<(), ChannelError> {
    let bytes = event.encode();
    let raw = fd.as_fd().as_raw_fd();
    let written = loop {
        match nix::unistd::write(raw, &bytes) {
            Ok(n) => break n,
            Err(Errno::EINTR) => continue,
            Err(e) => return Err(ChannelError::Io(e)),
        }
    };
    if written != EVENT_SIZE {
        return Err(ChannelError::PartialWrite { written });
    }
    debug!(target: TAG, "Sent {:?} event", event.kind);
    Ok(())
}

/// Construct and write an event in one call
pub fn send(fd: &impl AsFd, kind: EventKind, param1: u64, param2: u64) -> Result<(), ChannelError> {
    write_event(fd, &Event::new(kind, param1, param2))
}
