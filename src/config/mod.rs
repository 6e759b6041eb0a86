//! Configuration file management
//!
//! Loads TOML configuration files and provides bridge settings.
//! Default config path: ~/.config/lockbridge/config.toml

use anyhow::{Context, Result};
use log::{info, warn};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::constants::{
    DEFAULT_HEIGHT, DEFAULT_POLL_SLICE_MS, DEFAULT_REPEAT_DELAY_MS, DEFAULT_REPEAT_RATE_MS,
    DEFAULT_WIDTH,
};
use crate::input::RepeatInfo;

/// Bridge settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Render loop settings
    pub render: RenderConfig,
    /// Keyboard settings
    pub keyboard: KeyboardConfig,
    /// Log settings
    pub log: LogConfig,
}

/// Render loop settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderConfig {
    /// Output width in pixels
    pub width: u32,
    /// Output height in pixels
    pub height: u32,
    /// Scene asset to load once the loop is up (empty = built-in scene)
    pub asset_path: String,
    /// Upper bound on one loop wait (ms)
    pub poll_slice_ms: u64,
    /// Background color ("#rrggbb")
    pub clear_color: String,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            width: DEFAULT_WIDTH,
            height: DEFAULT_HEIGHT,
            asset_path: String::new(),
            poll_slice_ms: DEFAULT_POLL_SLICE_MS,
            clear_color: "#1e1e2e".to_string(),
        }
    }
}

/// Keyboard settings
///
/// Repeat timing here applies until the producer sends its own.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct KeyboardConfig {
    /// Delay before the first repeat (ms)
    pub repeat_delay: i32,
    /// Interval between repeats (ms, 0 = no local repeat)
    pub repeat_rate: i32,
}

impl Default for KeyboardConfig {
    fn default() -> Self {
        Self {
            repeat_delay: DEFAULT_REPEAT_DELAY_MS,
            repeat_rate: DEFAULT_REPEAT_RATE_MS,
        }
    }
}

impl KeyboardConfig {
    /// Local repeat timing, or `None` when disabled
    pub fn repeat_info(&self) -> Option<RepeatInfo> {
        (self.repeat_rate > 0).then_some(RepeatInfo {
            rate_ms: self.repeat_rate,
            delay_ms: self.repeat_delay,
        })
    }
}

/// Log settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    /// Default filter when RUST_LOG is unset: "error" | "warn" | "info" | "debug" | "trace"
    pub level: String,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "warn".to_string(),
        }
    }
}

impl Config {
    /// System-wide config path
    const SYSTEM_CONFIG_PATH: &'static str = "/etc/lockbridge/config.toml";

    /// Get the path that would be used for loading config
    ///
    /// Returns None if using built-in defaults
    pub fn config_path() -> Option<PathBuf> {
        // 1. LOCKBRIDGE_CONFIG environment variable
        if let Ok(path) = std::env::var("LOCKBRIDGE_CONFIG") {
            let p = Path::new(&path);
            if p.exists() {
                return Some(p.to_path_buf());
            }
        }

        // 2. User config: ~/.config/lockbridge/config.toml
        if let Some(config_dir) = dirs::config_dir() {
            let config_path = config_dir.join("lockbridge").join("config.toml");
            if config_path.exists() {
                return Some(config_path);
            }
        }

        // 3. System config
        let system_config = Path::new(Self::SYSTEM_CONFIG_PATH);
        if system_config.exists() {
            return Some(system_config.to_path_buf());
        }

        None
    }

    /// Load configuration with priority:
    /// 1. LOCKBRIDGE_CONFIG environment variable
    /// 2. ~/.config/lockbridge/config.toml (user config)
    /// 3. /etc/lockbridge/config.toml (system config)
    /// 4. Built-in defaults
    pub fn load() -> Self {
        if let Some(path) = Self::config_path() {
            match Self::load_from_file(&path) {
                Ok(config) => {
                    info!("Loaded config: {}", path.display());
                    return config;
                }
                Err(e) => {
                    warn!("Failed to load config {}: {:#}", path.display(), e);
                }
            }
        }
        info!("Using built-in default config");
        Self::default()
    }

    /// Load settings from specified path
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        Self::parse(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))
    }

    /// Parse settings from TOML text
    pub fn parse(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Background color as RGBA floats
    pub fn clear_color(&self) -> [f32; 4] {
        parse_color(&self.render.clear_color)
    }
}

/// Parse "#rrggbb" into RGBA floats (white if malformed)
pub fn parse_color(hex: &str) -> [f32; 4] {
    let hex = hex.trim_start_matches('#');
    if hex.len() != 6 || !hex.is_ascii() {
        return [1.0, 1.0, 1.0, 1.0];
    }

    let r = u8::from_str_radix(&hex[0..2], 16).unwrap_or(255);
    let g = u8::from_str_radix(&hex[2..4], 16).unwrap_or(255);
    let b = u8::from_str_radix(&hex[4..6], 16).unwrap_or(255);

    [r as f32 / 255.0, g as f32 / 255.0, b as f32 / 255.0, 1.0]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.render.width, DEFAULT_WIDTH);
        assert_eq!(config.render.poll_slice_ms, 16);
        assert_eq!(config.log.level, "warn");
        assert_eq!(
            config.keyboard.repeat_info(),
            Some(RepeatInfo {
                rate_ms: DEFAULT_REPEAT_RATE_MS,
                delay_ms: DEFAULT_REPEAT_DELAY_MS,
            })
        );
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let config = Config::parse(
            r#"
            [render]
            width = 800
            height = 600

            [keyboard]
            repeat_rate = 0
            "#,
        )
        .unwrap();
        assert_eq!((config.render.width, config.render.height), (800, 600));
        assert_eq!(config.render.poll_slice_ms, DEFAULT_POLL_SLICE_MS);
        assert_eq!(config.keyboard.repeat_delay, DEFAULT_REPEAT_DELAY_MS);
        assert!(config.keyboard.repeat_info().is_none());
    }

    #[test]
    fn test_bad_file_is_an_error() {
        assert!(Config::parse("[render]\nwidth = \"wide\"").is_err());
        let missing = Path::new("/nonexistent/lockbridge/config.toml");
        assert!(Config::load_from_file(missing).is_err());
    }

    #[test]
    fn test_parse_color() {
        let color = parse_color("ff0000");
        assert!((color[0] - 1.0).abs() < 0.01);
        assert!(color[1].abs() < 0.01);
        assert!(color[2].abs() < 0.01);
        assert_eq!(parse_color("#12"), [1.0, 1.0, 1.0, 1.0]);
    }
}
