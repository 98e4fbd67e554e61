//! Configuration loading and parsing.
//!
//! Parses `timesum.toml` (or an override path provided by the binary). Every
//! field is optional; absent sections take the defaults below. Unknown fields
//! are ignored so older binaries tolerate newer files.
//!
//! ```toml
//! [debounce]
//! recompute_ms = 800   # quiet period before a rescan
//! settle_ms = 200      # edit-settle window after a self-inserted newline
//! [label]
//! template = "[{hours}h {minutes}m]"
//! [style]
//! color = "#aabbaa"
//! bold = true
//! margin_left = 5
//! [placement]
//! max_insert_cycles = 3
//! ```
//!
//! The raw debounce values are kept as parsed; [`Config::effective_timing`]
//! clamps them at use time (settle never shorter than [`MIN_SETTLE_MS`] and
//! never longer than the recompute delay).

use anyhow::Result;
use core_duration::LabelTemplate;
use serde::Deserialize;
use std::time::Duration;
use std::{fs, path::PathBuf};
use tracing::{info, warn};

/// Lower bound for the settle window; anything shorter cannot absorb the
/// change notification of our own insertion.
pub const MIN_SETTLE_MS: u64 = 20;

#[derive(Debug, Deserialize, Clone)]
pub struct DebounceConfig {
    #[serde(default = "DebounceConfig::default_recompute_ms")]
    pub recompute_ms: u64,
    #[serde(default = "DebounceConfig::default_settle_ms")]
    pub settle_ms: u64,
}

impl Default for DebounceConfig {
    fn default() -> Self {
        Self {
            recompute_ms: Self::default_recompute_ms(),
            settle_ms: Self::default_settle_ms(),
        }
    }
}

impl DebounceConfig {
    const fn default_recompute_ms() -> u64 {
        800
    }
    const fn default_settle_ms() -> u64 {
        200
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct LabelConfig {
    #[serde(default = "LabelConfig::default_template")]
    pub template: String,
}

impl Default for LabelConfig {
    fn default() -> Self {
        Self {
            template: Self::default_template(),
        }
    }
}

impl LabelConfig {
    fn default_template() -> String {
        core_duration::DEFAULT_TEMPLATE.to_string()
    }
}

/// Presentation constants for rendered labels. Not interpreted by the
/// coordinator; handed through to the host untouched.
#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
pub struct StyleConfig {
    #[serde(default = "StyleConfig::default_color")]
    pub color: String,
    #[serde(default = "StyleConfig::default_bold")]
    pub bold: bool,
    #[serde(default = "StyleConfig::default_margin_left")]
    pub margin_left: u16,
}

impl Default for StyleConfig {
    fn default() -> Self {
        Self {
            color: Self::default_color(),
            bold: Self::default_bold(),
            margin_left: Self::default_margin_left(),
        }
    }
}

impl StyleConfig {
    fn default_color() -> String {
        "#aabbaa".to_string()
    }
    const fn default_bold() -> bool {
        true
    }
    const fn default_margin_left() -> u16 {
        5
    }

    /// Parse `color` as `#rrggbb`. `None` for anything else.
    pub fn rgb(&self) -> Option<(u8, u8, u8)> {
        let hex = self.color.strip_prefix('#')?;
        if hex.len() != 6 {
            return None;
        }
        let channel = |i: usize| u8::from_str_radix(hex.get(i..i + 2)?, 16).ok();
        Some((channel(0)?, channel(2)?, channel(4)?))
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct PlacementConfig {
    /// Consecutive cycles allowed to insert newlines before the coordinator
    /// renders in place regardless.
    #[serde(default = "PlacementConfig::default_max_insert_cycles")]
    pub max_insert_cycles: u32,
}

impl Default for PlacementConfig {
    fn default() -> Self {
        Self {
            max_insert_cycles: Self::default_max_insert_cycles(),
        }
    }
}

impl PlacementConfig {
    const fn default_max_insert_cycles() -> u32 {
        3
    }
}

#[derive(Debug, Deserialize, Default, Clone)]
pub struct ConfigFile {
    #[serde(default)]
    pub debounce: DebounceConfig,
    #[serde(default)]
    pub label: LabelConfig,
    #[serde(default)]
    pub style: StyleConfig,
    #[serde(default)]
    pub placement: PlacementConfig,
}

#[derive(Debug, Clone, Default)]
pub struct Config {
    pub raw: Option<String>, // original file string (optional)
    pub file: ConfigFile,    // parsed (or default) data
}

/// Debounce delays after clamping.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timing {
    pub recompute: Duration,
    pub settle: Duration,
}

impl Default for Timing {
    fn default() -> Self {
        Self {
            recompute: Duration::from_millis(DebounceConfig::default_recompute_ms()),
            settle: Duration::from_millis(DebounceConfig::default_settle_ms()),
        }
    }
}

/// Best-effort config path: `timesum.toml` in the working directory, then the
/// platform config dir (XDG / AppData Roaming).
pub fn discover() -> PathBuf {
    let local = PathBuf::from("timesum.toml");
    if local.exists() {
        return local;
    }
    if let Some(dir) = dirs::config_dir() {
        return dir.join("timesum").join("timesum.toml");
    }
    PathBuf::from("timesum.toml")
}

pub fn load_from(path: Option<PathBuf>) -> Result<Config> {
    let path = path.unwrap_or_else(discover);
    if let Ok(content) = fs::read_to_string(&path) {
        match toml::from_str::<ConfigFile>(&content) {
            Ok(file) => Ok(Config {
                raw: Some(content),
                file,
            }),
            Err(e) => {
                // Parse errors fall back to defaults; a broken config must not disable labels.
                warn!(target: "config", path = %path.display(), error = %e, "config_parse_error");
                Ok(Config::default())
            }
        }
    } else {
        Ok(Config::default())
    }
}

impl Config {
    /// Clamp the debounce values into a usable window and log any adjustment.
    pub fn effective_timing(&self) -> Timing {
        let raw = &self.file.debounce;
        let recompute_ms = raw.recompute_ms.max(MIN_SETTLE_MS);
        let settle_ms = raw.settle_ms.clamp(MIN_SETTLE_MS, recompute_ms);
        if recompute_ms != raw.recompute_ms || settle_ms != raw.settle_ms {
            info!(
                target: "config",
                raw_recompute_ms = raw.recompute_ms,
                raw_settle_ms = raw.settle_ms,
                recompute_ms,
                settle_ms,
                "debounce_clamped"
            );
        }
        Timing {
            recompute: Duration::from_millis(recompute_ms),
            settle: Duration::from_millis(settle_ms),
        }
    }

    /// Parsed label template; invalid templates fall back to the default.
    pub fn label_template(&self) -> LabelTemplate {
        LabelTemplate::parse_or_default(&self.file.label.template)
    }

    pub fn max_insert_cycles(&self) -> u32 {
        self.file.placement.max_insert_cycles
    }
}
