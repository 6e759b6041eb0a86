//! Render loop
//!
//! Owns the render thread. `start()` spawns it and blocks until the thread
//! has built its render target; after that the thread runs a single
//! cooperative loop:
//! 1. wait for input (bounded by the poll slice and the next repeat deadline)
//! 2. drain and dispatch every pending record
//! 3. fire due key repeats, forward scene events
//! 4. if the scene changed: render, acquire a buffer, read back, publish
//!
//! Shutdown is cooperative: `cleanup()` raises the stop flag and joins;
//! an in-flight frame always completes.

use anyhow::{anyhow, Context, Result};
use log::{debug, error, info, warn};
use nix::errno::Errno;
use nix::poll::{poll, PollFd, PollFlags};
use std::ffi::c_void;
use std::os::fd::OwnedFd;
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use super::buffer::{BufferProvider, CallbackProvider, GetBufferFn};
use super::handshake::InitSignal;
use super::scene::SceneInterface;
use super::target::RenderTarget;
use crate::channel::{read_event, ChannelError};
use crate::constants::{frame_len, DEFAULT_POLL_SLICE_MS};
use crate::input::{Dispatcher, RepeatInfo};
use crate::state::ApplicationState;

const TAG: &str = "lockbridge::render";

/// Lifecycle of a `RenderLoop`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum RenderState {
    Uninitialized = 0,
    Initializing = 1,
    Ready = 2,
    Running = 3,
    Stopping = 4,
    Stopped = 5,
}

impl RenderState {
    fn from_u8(value: u8) -> Self {
        match value {
            0 => RenderState::Uninitialized,
            1 => RenderState::Initializing,
            2 => RenderState::Ready,
            3 => RenderState::Running,
            4 => RenderState::Stopping,
            _ => RenderState::Stopped,
        }
    }
}

/// Tunables for the render thread
#[derive(Debug, Clone, Copy)]
pub struct LoopOptions {
    /// Upper bound on one wait
    pub poll_slice: Duration,
    /// Local repeat timing until the producer sends its own
    pub repeat: Option<RepeatInfo>,
}

impl Default for LoopOptions {
    fn default() -> Self {
        Self {
            poll_slice: Duration::from_millis(DEFAULT_POLL_SLICE_MS),
            repeat: None,
        }
    }
}

/// State shared between the handle and the render thread
struct Shared {
    state: AtomicU8,
    should_stop: AtomicBool,
    load_requested: AtomicBool,
    render_requested: AtomicBool,
    provider: Mutex<Option<Box<dyn BufferProvider>>>,
    init: InitSignal,
}

impl Shared {
    fn state(&self) -> RenderState {
        RenderState::from_u8(self.state.load(Ordering::Acquire))
    }

    fn set_state(&self, state: RenderState) {
        self.state.store(state as u8, Ordering::Release);
    }

    fn provider(&self) -> MutexGuard<'_, Option<Box<dyn BufferProvider>>> {
        match self.provider.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

/// Handle owning the render thread
pub struct RenderLoop {
    app: Option<ApplicationState>,
    width: u32,
    height: u32,
    options: LoopOptions,
    shared: Arc<Shared>,
    thread: Option<JoinHandle<()>>,
}

impl RenderLoop {
    /// Create the handle; no thread or GPU work happens yet
    pub fn initialize(app: ApplicationState, options: LoopOptions) -> Self {
        info!(
            target: TAG,
            "Render loop initialized: {}x{}, asset {:?}",
            app.width,
            app.height,
            app.asset_path
        );
        Self {
            width: app.width,
            height: app.height,
            app: Some(app),
            options,
            shared: Arc::new(Shared {
                state: AtomicU8::new(RenderState::Uninitialized as u8),
                should_stop: AtomicBool::new(false),
                load_requested: AtomicBool::new(false),
                render_requested: AtomicBool::new(false),
                provider: Mutex::new(None),
                init: InitSignal::new(),
            }),
            thread: None,
        }
    }

    pub fn state(&self) -> RenderState {
        self.shared.state()
    }

    /// Bytes every destination buffer must hold
    pub fn frame_len(&self) -> usize {
        frame_len(self.width, self.height)
    }

    /// Install the buffer source used for every following frame
    pub fn set_provider(&self, provider: Box<dyn BufferProvider>) {
        *self.shared.provider() = Some(provider);
        debug!(target: TAG, "Buffer provider installed");
    }

    /// Install a foreign buffer-acquisition callback
    ///
    /// # Safety
    /// See `CallbackProvider::new`: every non-NULL buffer returned must hold
    /// `frame_len()` writable bytes.
    pub unsafe fn set_callbacks(&self, get_buffer: GetBufferFn, user_data: *mut c_void) {
        self.set_provider(Box::new(CallbackProvider::new(
            get_buffer,
            user_data,
            self.frame_len(),
        )));
    }

    /// Ask for a frame even though no input changed the scene
    pub fn request_render(&self) {
        self.shared.render_requested.store(true, Ordering::Release);
    }

    /// Spawn the render thread and wait for its setup to finish
    ///
    /// `factory` runs on the render thread and builds the render target.
    /// On success the scene asset load is requested asynchronously.
    pub fn start<F, T>(&mut self, factory: F) -> Result<()>
    where
        F: FnOnce(SceneInterface) -> Result<T> + Send + 'static,
        T: RenderTarget + 'static,
    {
        let Some(app) = self.app.take() else {
            return Err(anyhow!("Render loop already started"));
        };
        self.shared.set_state(RenderState::Initializing);

        let shared = self.shared.clone();
        let options = self.options;
        let thread = std::thread::Builder::new()
            .name("lockbridge-render".to_string())
            .spawn(move || run(app, options, shared, factory))
            .context("Failed to spawn render thread");
        let thread = match thread {
            Ok(thread) => thread,
            Err(e) => {
                self.shared.set_state(RenderState::Stopped);
                return Err(e);
            }
        };

        match self.shared.init.wait() {
            Ok(()) => {
                self.thread = Some(thread);
                self.shared.set_state(RenderState::Running);
                self.shared.load_requested.store(true, Ordering::Release);
                info!(target: TAG, "Render thread running");
                Ok(())
            }
            Err(reason) => {
                if thread.join().is_err() {
                    error!(target: TAG, "Render thread panicked during setup");
                }
                self.shared.set_state(RenderState::Stopped);
                Err(anyhow!("Render thread failed to initialize: {}", reason))
            }
        }
    }

    /// Stop the loop, join the thread and release everything
    pub fn cleanup(mut self) {
        self.shutdown();
    }

    fn shutdown(&mut self) {
        if let Some(thread) = self.thread.take() {
            self.shared.set_state(RenderState::Stopping);
            self.shared.should_stop.store(true, Ordering::Release);
            if thread.join().is_err() {
                error!(target: TAG, "Render thread panicked");
            }
            info!(target: TAG, "Render thread stopped");
        }
        self.shared.provider().take();
        self.app = None;
        self.shared.set_state(RenderState::Stopped);
    }
}

impl Drop for RenderLoop {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Publishes a failure if the thread exits before reporting setup
struct InitGuard(Arc<Shared>);

impl Drop for InitGuard {
    fn drop(&mut self) {
        self.0
            .init
            .publish(Err("render thread exited during setup".to_string()));
    }
}

fn run<F, T>(app: ApplicationState, options: LoopOptions, shared: Arc<Shared>, factory: F)
where
    F: FnOnce(SceneInterface) -> Result<T>,
    T: RenderTarget,
{
    let _guard = InitGuard(shared.clone());
    let ApplicationState {
        asset_path,
        input_fd,
        output_fd,
        width,
        height,
    } = app;
    let iface = SceneInterface::new(width, height, asset_path, Arc::new(output_fd));

    let mut target = match factory(iface.clone()) {
        Ok(target) => target,
        Err(e) => {
            error!(target: TAG, "Render setup failed: {:#}", e);
            shared.set_state(RenderState::Stopped);
            shared.init.publish(Err(format!("{:#}", e)));
            return;
        }
    };
    shared.set_state(RenderState::Ready);
    shared.init.publish(Ok(()));

    let mut dispatcher = Dispatcher::new();
    if let Some(info) = options.repeat {
        dispatcher = dispatcher.with_repeat(info);
    }
    let mut input = Some(input_fd);
    let mut loaded = false;
    let mut dirty = false;

    while !shared.should_stop.load(Ordering::Acquire) {
        if !loaded && shared.load_requested.swap(false, Ordering::AcqRel) {
            loaded = true;
            dirty = true;
            if let Err(e) = target.load() {
                error!(target: TAG, "Failed to load scene asset: {:#}", e);
            }
        }

        let timeout = wait_timeout(options.poll_slice, dispatcher.next_deadline(), Instant::now());
        match input.as_ref() {
            Some(fd) => match wait_readable(fd, timeout) {
                Ok(true) => {
                    if !drain_input(fd, &mut dispatcher) {
                        input = None;
                    }
                }
                Ok(false) => {}
                Err(e) => {
                    error!(target: TAG, "poll failed: {}", e);
                    input = None;
                }
            },
            None => std::thread::sleep(timeout),
        }

        dispatcher.tick(Instant::now());
        for event in dispatcher.drain() {
            dirty |= target.handle_event(&event);
        }
        dirty |= shared.render_requested.swap(false, Ordering::AcqRel);

        if dirty && loaded {
            dirty = false;
            render_frame(&mut target, &shared, &iface);
        }
    }
    debug!(target: TAG, "Render loop exiting");
}

/// How long the loop may wait before it has work to do
fn wait_timeout(slice: Duration, deadline: Option<Instant>, now: Instant) -> Duration {
    match deadline {
        Some(deadline) => slice.min(deadline.saturating_duration_since(now)),
        None => slice,
    }
}

/// Wait until `fd` is readable (or hung up) or `timeout` passes
fn wait_readable(fd: &OwnedFd, timeout: Duration) -> nix::Result<bool> {
    let mut fds = [PollFd::new(fd, PollFlags::POLLIN)];
    // Round up so a sub-millisecond deadline does not spin
    let ms = timeout.as_micros().div_ceil(1000).min(i32::MAX as u128) as i32;
    match poll(&mut fds, ms) {
        Ok(0) => Ok(false),
        Ok(_) => Ok(fds[0].revents().is_some_and(|r| {
            r.intersects(PollFlags::POLLIN | PollFlags::POLLHUP | PollFlags::POLLERR)
        })),
        Err(Errno::EINTR) => Ok(false),
        Err(e) => Err(e),
    }
}

/// Dispatch every pending record
///
/// Returns false once the channel is closed or can no longer be trusted.
fn drain_input(fd: &OwnedFd, dispatcher: &mut Dispatcher) -> bool {
    loop {
        match read_event(fd) {
            Ok(Some(event)) => dispatcher.dispatch(&event, Instant::now()),
            Ok(None) => return true,
            Err(ChannelError::UnknownKind(kind)) => {
                warn!(target: TAG, "Skipping event with unknown kind {}", kind);
            }
            Err(ChannelError::Closed) => {
                info!(target: TAG, "Input channel closed");
                return false;
            }
            Err(e) => {
                error!(target: TAG, "Input channel unusable: {}", e);
                return false;
            }
        }
    }
}

/// Render, read back into a provided buffer and publish it
fn render_frame(target: &mut impl RenderTarget, shared: &Shared, iface: &SceneInterface) {
    if let Err(e) = target.render() {
        warn!(target: TAG, "Render failed: {:#}", e);
        return;
    }

    let handle = {
        let mut provider = shared.provider();
        let Some(provider) = provider.as_mut() else {
            debug!(target: TAG, "No buffer provider, frame not published");
            return;
        };
        provider.fill_next(&mut |dst| match target.read_pixels(dst) {
            Ok(()) => true,
            Err(e) => {
                warn!(target: TAG, "Readback failed, dropping frame: {}", e);
                false
            }
        })
    };

    if let Some(handle) = handle {
        if let Err(e) = iface.frame_ready(handle) {
            error!(target: TAG, "Failed to send frame-ready event: {}", e);
            if let Some(provider) = shared.provider().as_mut() {
                provider.release(handle);
            }
        }
    }
}
