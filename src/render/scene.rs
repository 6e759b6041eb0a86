//! Scene contract
//!
//! What the render loop drives: a scene loads its asset once, reacts to
//! input, and draws into the currently bound framebuffer. Scenes talk back
//! through `SceneInterface`.

use anyhow::{anyhow, Context, Result};
use glow::HasContext;
use log::info;
use serde::Deserialize;
use std::os::fd::OwnedFd;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::channel::{send, ChannelError, EventKind};
use crate::config::parse_color;
use crate::ffi::ForeignBuffer;
use crate::input::{AuthState, Key, KeyEventKind, SceneEvent};
use crate::logging::{log, LogLevel};

const TAG: &str = "lockbridge::scene";

/// Handle a scene uses to reach the bridge
#[derive(Clone, Debug)]
pub struct SceneInterface {
    width: u32,
    height: u32,
    asset_path: Arc<PathBuf>,
    output: Arc<OwnedFd>,
}

impl SceneInterface {
    pub fn new(width: u32, height: u32, asset_path: PathBuf, output: Arc<OwnedFd>) -> Self {
        Self {
            width,
            height,
            asset_path: Arc::new(asset_path),
            output,
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn asset_path(&self) -> &Path {
        &self.asset_path
    }

    /// Submit a secret for authentication
    ///
    /// The message travels as a `ForeignBuffer` handle owned by the reader.
    pub fn send_auth_submit(&self, message: &str) -> Result<()> {
        let buffer =
            ForeignBuffer::from_text(message).ok_or_else(|| anyhow!("auth buffer allocation failed"))?;
        let handle = buffer.into_raw();
        if let Err(e) = send(&*self.output, EventKind::AuthSubmit, handle as u64, 0) {
            // Never delivered, so still ours
            // SAFETY: `handle` came from into_raw above and was not consumed
            drop(unsafe { ForeignBuffer::from_raw(handle) });
            return Err(e.into());
        }
        Ok(())
    }

    /// Publish a filled frame buffer
    pub(crate) fn frame_ready(&self, handle: u64) -> Result<(), ChannelError> {
        send(&*self.output, EventKind::FRAME_READY, handle, 0)
    }

    pub fn debug(&self, message: &str) {
        log(LogLevel::Debug, TAG, message);
    }

    pub fn info(&self, message: &str) {
        log(LogLevel::Info, TAG, message);
    }

    pub fn warn(&self, message: &str) {
        log(LogLevel::Warn, TAG, message);
    }

    pub fn error(&self, message: &str) {
        log(LogLevel::Error, TAG, message);
    }
}

/// Content rendered by the loop
pub trait Scene {
    /// Load the scene asset; called once, after `start()` returns
    fn load(&mut self, gl: &glow::Context, iface: &SceneInterface) -> Result<()>;

    /// React to input; true if the scene changed and needs a new frame
    fn handle_event(&mut self, event: &SceneEvent, iface: &SceneInterface) -> bool;

    /// Draw one frame into the bound framebuffer
    fn render(&mut self, gl: &glow::Context, width: u32, height: u32);
}

/// Optional TOML asset for `PromptScene`
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct PromptTheme {
    background: Option<String>,
    accent: Option<String>,
}

/// Built-in lock prompt: background, one block per typed character and an
/// auth status bar. Return submits, Backspace deletes, Escape clears.
pub struct PromptScene {
    background: [f32; 4],
    accent: [f32; 4],
    input: String,
    auth: Option<AuthState>,
}

impl PromptScene {
    pub fn new(background: [f32; 4]) -> Self {
        Self {
            background,
            accent: [0.8, 0.8, 0.9, 1.0],
            input: String::new(),
            auth: None,
        }
    }

    /// Characters typed so far
    pub fn input_len(&self) -> usize {
        self.input.chars().count()
    }

    pub fn auth_state(&self) -> Option<AuthState> {
        self.auth
    }

    fn status_color(&self) -> [f32; 4] {
        match self.auth {
            None => self.accent,
            Some(AuthState::Pending) => [0.9, 0.7, 0.2, 1.0],
            Some(AuthState::Failed) => [0.9, 0.2, 0.2, 1.0],
            Some(AuthState::Success) => [0.2, 0.8, 0.3, 1.0],
        }
    }
}

impl Scene for PromptScene {
    fn load(&mut self, _gl: &glow::Context, iface: &SceneInterface) -> Result<()> {
        let path = iface.asset_path();
        if path.as_os_str().is_empty() {
            info!(target: TAG, "No scene asset, using built-in prompt");
            return Ok(());
        }
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read scene asset: {}", path.display()))?;
        let theme: PromptTheme = toml::from_str(&content)
            .with_context(|| format!("Failed to parse scene asset: {}", path.display()))?;
        if let Some(background) = theme.background {
            self.background = parse_color(&background);
        }
        if let Some(accent) = theme.accent {
            self.accent = parse_color(&accent);
        }
        info!(target: TAG, "Loaded scene asset: {}", path.display());
        Ok(())
    }

    fn handle_event(&mut self, event: &SceneEvent, iface: &SceneInterface) -> bool {
        match event {
            SceneEvent::Key(key) if key.kind == KeyEventKind::Press => match key.key {
                Key::RETURN | Key::ENTER => {
                    if self.input.is_empty() {
                        return false;
                    }
                    if let Err(e) = iface.send_auth_submit(&self.input) {
                        iface.error(&format!("Failed to submit: {:#}", e));
                    }
                    self.input.clear();
                    true
                }
                Key::BACKSPACE => self.input.pop().is_some(),
                Key::ESCAPE => {
                    let changed = !self.input.is_empty();
                    self.input.clear();
                    changed
                }
                _ => {
                    let printable: String = key.text.chars().filter(|c| !c.is_control()).collect();
                    if printable.is_empty() {
                        return false;
                    }
                    if self.auth == Some(AuthState::Failed) {
                        self.auth = None;
                    }
                    self.input.push_str(&printable);
                    true
                }
            },
            SceneEvent::Key(_) | SceneEvent::Pointer(_) => false,
            SceneEvent::Auth(state) => {
                self.auth = Some(*state);
                true
            }
        }
    }

    fn render(&mut self, gl: &glow::Context, width: u32, height: u32) {
        let [r, g, b, a] = self.background;
        unsafe {
            gl.disable(glow::SCISSOR_TEST);
            gl.clear_color(r, g, b, a);
            gl.clear(glow::COLOR_BUFFER_BIT | glow::DEPTH_BUFFER_BIT | glow::STENCIL_BUFFER_BIT);
            gl.enable(glow::SCISSOR_TEST);

            // Status bar across the middle
            let bar_height = (height / 40).max(2) as i32;
            let [r, g, b, a] = self.status_color();
            gl.scissor(0, (height / 2) as i32 - bar_height * 4, width as i32, bar_height);
            gl.clear_color(r, g, b, a);
            gl.clear(glow::COLOR_BUFFER_BIT);

            // One block per typed character, centered above the bar
            let block = (height / 30).max(4) as i32;
            let gap = block / 2;
            let count = self.input_len().min(32) as i32;
            let total = count * block + (count - 1).max(0) * gap;
            let mut x = (width as i32 - total) / 2;
            let [r, g, b, a] = self.accent;
            gl.clear_color(r, g, b, a);
            for _ in 0..count {
                gl.scissor(x, (height / 2) as i32, block, block);
                gl.clear(glow::COLOR_BUFFER_BIT);
                x += block + gap;
            }

            gl.disable(glow::SCISSOR_TEST);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::{read_event, Pipe};
    use crate::input::{KeyEvent, Modifiers};
    use smol_str::SmolStr;

    fn press(key: Key, text: &str) -> SceneEvent {
        SceneEvent::Key(KeyEvent {
            kind: KeyEventKind::Press,
            key,
            modifiers: Modifiers::empty(),
            text: SmolStr::new(text),
            hardware_code: 0,
            auto_repeat: false,
        })
    }

    fn interface() -> (SceneInterface, OwnedFd) {
        let (read, write) = Pipe::new().unwrap().split();
        (
            SceneInterface::new(64, 48, PathBuf::new(), Arc::new(write)),
            read,
        )
    }

    #[test]
    fn test_auth_submit_carries_foreign_buffer() {
        let (iface, read) = interface();
        iface.send_auth_submit("hunter2").unwrap();

        let event = read_event(&read).unwrap().unwrap();
        assert_eq!(event.kind, EventKind::AuthSubmit);
        let buffer =
            unsafe { ForeignBuffer::from_raw(event.param1 as *mut crate::ffi::RawForeignBuffer) }
                .unwrap();
        assert_eq!(buffer.as_str(), Ok("hunter2"));
    }

    #[test]
    fn test_prompt_typing_and_submit() {
        let (iface, read) = interface();
        let mut scene = PromptScene::new([0.0, 0.0, 0.0, 1.0]);

        assert!(scene.handle_event(&press(Key(u32::from(b'A')), "a"), &iface));
        assert!(scene.handle_event(&press(Key(u32::from(b'B')), "b"), &iface));
        assert!(scene.handle_event(&press(Key::BACKSPACE, "\u{8}"), &iface));
        assert!(scene.handle_event(&press(Key(u32::from(b'C')), "c"), &iface));
        assert_eq!(scene.input_len(), 2);
        // Modifier keys produce no text
        assert!(!scene.handle_event(&press(Key::SHIFT, ""), &iface));

        assert!(scene.handle_event(&press(Key::RETURN, "\r"), &iface));
        assert_eq!(scene.input_len(), 0);
        let event = read_event(&read).unwrap().unwrap();
        let buffer =
            unsafe { ForeignBuffer::from_raw(event.param1 as *mut crate::ffi::RawForeignBuffer) }
                .unwrap();
        assert_eq!(buffer.as_str(), Ok("ac"));

        // Nothing to submit
        assert!(!scene.handle_event(&press(Key::RETURN, "\r"), &iface));
        assert_eq!(read_event(&read).unwrap(), None);
    }

    #[test]
    fn test_prompt_tracks_auth_state() {
        let (iface, _read) = interface();
        let mut scene = PromptScene::new([0.0; 4]);
        assert!(scene.handle_event(&SceneEvent::Auth(AuthState::Failed), &iface));
        assert_eq!(scene.auth_state(), Some(AuthState::Failed));
        // Typing again clears a failure
        scene.handle_event(&press(Key(u32::from(b'X')), "x"), &iface);
        assert_eq!(scene.auth_state(), None);
    }
}
