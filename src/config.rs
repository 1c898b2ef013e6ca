use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use crate::audio_system::fetch::{AssetFetcher, FileFetcher, HttpFetcher, SynthFetcher};
use crate::error::ConfigError;
use crate::sound::KeyCategory;

/// Directory name under the user config directory
pub const APP_DIR_NAME: &str = "KeyClack";

/// Extra gain per key category, applied on top of the per-play volume
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CategoryGains {
    pub generic: f32,
    pub backspace: f32,
    pub enter: f32,
    pub space: f32,
}

impl CategoryGains {
    pub fn gain_for(&self, category: KeyCategory) -> f32 {
        match category {
            KeyCategory::Generic => self.generic,
            KeyCategory::Backspace => self.backspace,
            KeyCategory::Enter => self.enter,
            KeyCategory::Space => self.space,
        }
    }
}

impl Default for CategoryGains {
    fn default() -> Self {
        Self {
            generic: 1.0,
            backspace: 0.9,
            enter: 1.1,
            space: 1.2,
        }
    }
}

/// Where the click clips come from
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SoundSource {
    /// Generated in-process
    Synth,
    /// `{path}/{action}/{category}.wav`
    Directory { path: PathBuf },
    /// `{base_url}/{action}/{category}.wav`
    Url {
        base_url: String,
        #[serde(default = "default_request_timeout_ms")]
        request_timeout_ms: u64,
    },
}

fn default_request_timeout_ms() -> u64 {
    3000
}

impl Default for SoundSource {
    fn default() -> Self {
        SoundSource::Synth
    }
}

impl SoundSource {
    /// Build the fetcher that resolves catalog assets for this source
    pub fn fetcher(&self) -> Arc<dyn AssetFetcher> {
        match self {
            SoundSource::Synth => Arc::new(SynthFetcher),
            SoundSource::Directory { path } => Arc::new(FileFetcher::new(path.clone())),
            SoundSource::Url {
                base_url,
                request_timeout_ms,
            } => Arc::new(HttpFetcher::new(
                base_url.clone(),
                Duration::from_millis(*request_timeout_ms),
            )),
        }
    }
}

/// Audio engine tuning
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Sounds allowed to overlap; extra key presses are dropped
    pub max_concurrent_sounds: usize,

    /// Volume before the user sets one (0.0-1.0)
    pub default_volume: f32,

    /// Per-asset load deadline in milliseconds
    pub load_timeout_ms: u64,

    /// Master gain ramp for volume and mute changes (0 = immediate)
    pub volume_ramp_ms: u64,

    /// Maximum random reduction of per-play volume (0.0-1.0)
    pub volume_jitter: f32,

    pub category_gains: CategoryGains,

    pub sound_source: SoundSource,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_concurrent_sounds: 10,
            default_volume: 0.5,
            load_timeout_ms: 5000,
            volume_ramp_ms: 50,
            volume_jitter: 0.08,
            category_gains: CategoryGains::default(),
            sound_source: SoundSource::Synth,
        }
    }
}

impl EngineConfig {
    pub fn load_timeout(&self) -> Duration {
        Duration::from_millis(self.load_timeout_ms)
    }

    pub fn volume_ramp(&self) -> Duration {
        Duration::from_millis(self.volume_ramp_ms)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_concurrent_sounds == 0 {
            return Err(ConfigError::Invalid(
                "max_concurrent_sounds must be at least 1".to_string(),
            ));
        }
        if !(0.0..=1.0).contains(&self.default_volume) {
            return Err(ConfigError::Invalid(format!(
                "default_volume must be within 0.0-1.0, got {}",
                self.default_volume
            )));
        }
        if !(0.0..=1.0).contains(&self.volume_jitter) {
            return Err(ConfigError::Invalid(format!(
                "volume_jitter must be within 0.0-1.0, got {}",
                self.volume_jitter
            )));
        }
        if self.load_timeout_ms == 0 {
            return Err(ConfigError::Invalid(
                "load_timeout_ms must be greater than zero".to_string(),
            ));
        }
        for category in KeyCategory::ALL {
            let gain = self.category_gains.gain_for(category);
            if !gain.is_finite() || gain < 0.0 {
                return Err(ConfigError::Invalid(format!(
                    "category gain for {} must be a non-negative number",
                    category
                )));
            }
        }
        Ok(())
    }
}

/// Global chord that toggles mute
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MuteHotkey {
    pub enabled: bool,

    /// Key name as produced by the keyboard listener (e.g. "m", "f12")
    pub key: String,

    pub ctrl: bool,
    pub alt: bool,
    pub shift: bool,
    pub meta: bool,
}

impl Default for MuteHotkey {
    fn default() -> Self {
        Self {
            enabled: true,
            key: "m".to_string(),
            ctrl: true,
            alt: true,
            shift: false,
            meta: false,
        }
    }
}

impl MuteHotkey {
    /// Format for display, e.g. "Ctrl+Alt+M"
    pub fn format(&self) -> String {
        let mut parts = Vec::new();
        if self.ctrl {
            parts.push("Ctrl".to_string());
        }
        if self.alt {
            parts.push("Alt".to_string());
        }
        if self.shift {
            parts.push("Shift".to_string());
        }
        if self.meta {
            parts.push("Meta".to_string());
        }
        parts.push(self.key.to_uppercase());
        parts.join("+")
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub engine: EngineConfig,

    pub mute_hotkey: MuteHotkey,

    /// Settings file; defaults to `settings.json` next to the config
    pub settings_path: Option<PathBuf>,
}

impl Config {
    /// Load configuration from `path`, writing defaults there on first run
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if path.exists() {
            let content = fs::read_to_string(path).map_err(|e| ConfigError::LoadFailed {
                path: path.display().to_string(),
                source: Box::new(e),
            })?;
            let config: Config =
                serde_json::from_str(&content).map_err(|e| ConfigError::LoadFailed {
                    path: path.display().to_string(),
                    source: Box::new(e),
                })?;
            config.engine.validate()?;

            tracing::info!("Loaded config from: {}", path.display());
            Ok(config)
        } else {
            let config = Config::default();
            config.save_to(path)?;
            tracing::info!("Created default config at: {}", path.display());
            Ok(config)
        }
    }

    /// Save configuration to `path` as pretty JSON
    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| ConfigError::DirectoryCreationFailed {
                path: parent.display().to_string(),
                source: e,
            })?;
        }

        let json = serde_json::to_string_pretty(self).map_err(|e| ConfigError::SaveFailed {
            path: path.display().to_string(),
            source: Box::new(e),
        })?;
        fs::write(path, json).map_err(|e| ConfigError::SaveFailed {
            path: path.display().to_string(),
            source: Box::new(e),
        })?;

        Ok(())
    }

    /// Application directory under the user config directory
    pub fn app_dir() -> Result<PathBuf, ConfigError> {
        dirs::config_dir()
            .map(|dir| dir.join(APP_DIR_NAME))
            .ok_or(ConfigError::NoConfigDirectory)
    }

    pub fn config_path() -> Result<PathBuf, ConfigError> {
        Ok(Self::app_dir()?.join("config.json"))
    }

    /// Settings file location; relative to `config_dir` unless overridden
    pub fn settings_file(&self, config_dir: &Path) -> PathBuf {
        self.settings_path
            .clone()
            .unwrap_or_else(|| config_dir.join("settings.json"))
    }
}
