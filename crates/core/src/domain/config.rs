//! Configuration management for eqchain
//!
//! This module provides:
//! - Engine configuration (sample rate, block size, channel layout)
//! - Initial EQ settings with TOML serialization
//! - A config manager that falls back to defaults on missing or corrupt files

use crate::domain::audio::{ChannelCount, ProcessSpec, Result as AudioResult};
use crate::domain::dsp::Slope;
use crate::domain::params::EqSettings;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tokio::fs;
use tracing::{debug, error, info, instrument};

pub type Result<T> = std::result::Result<T, ConfigError>;

/// Errors that can occur during configuration operations
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parsing error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("TOML serialization error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Stream parameters the engine is prepared with
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Sample rate in Hz
    pub sample_rate: f64,

    /// Largest block the host will deliver, in frames
    pub max_block_size: usize,

    /// Number of channels the host delivers (1 or 2)
    pub channels: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        let spec = ProcessSpec::default();
        Self {
            sample_rate: spec.sample_rate,
            max_block_size: spec.max_block_size,
            channels: spec.channels.count(),
        }
    }
}

impl EngineConfig {
    /// Resolve into the spec handed to `prepare`
    ///
    /// Fails with `UnsupportedConfiguration` for channel counts other than 1 or 2.
    pub fn to_process_spec(&self) -> AudioResult<ProcessSpec> {
        let channels = ChannelCount::from_count(self.channels)?;
        Ok(ProcessSpec::new(self.sample_rate, self.max_block_size, channels))
    }
}

/// Initial EQ settings
///
/// Slopes are written in dB/oct (12, 24, ... 96).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SettingsConfig {
    pub low_cut_freq: f32,
    pub low_cut_slope: u32,
    pub high_cut_freq: f32,
    pub high_cut_slope: u32,
    pub peak_freq: f32,
    pub peak_gain_db: f32,
    pub peak_q: f32,
}

impl Default for SettingsConfig {
    fn default() -> Self {
        Self::from(&EqSettings::default())
    }
}

impl From<&EqSettings> for SettingsConfig {
    fn from(settings: &EqSettings) -> Self {
        Self {
            low_cut_freq: settings.low_cut_freq,
            low_cut_slope: settings.low_cut_slope.db_per_octave(),
            high_cut_freq: settings.high_cut_freq,
            high_cut_slope: settings.high_cut_slope.db_per_octave(),
            peak_freq: settings.peak_freq,
            peak_gain_db: settings.peak_gain_db,
            peak_q: settings.peak_q,
        }
    }
}

impl SettingsConfig {
    /// Convert to engine settings, clamping continuous values into range
    pub fn to_settings(&self) -> Result<EqSettings> {
        let slope = |db: u32, which: &str| {
            Slope::from_db_per_octave(db).ok_or_else(|| {
                ConfigError::Invalid(format!(
                    "{which} slope must be one of 12, 24, ... 96 dB/oct, got {db}"
                ))
            })
        };

        let settings = EqSettings {
            low_cut_freq: self.low_cut_freq,
            high_cut_freq: self.high_cut_freq,
            peak_freq: self.peak_freq,
            peak_gain_db: self.peak_gain_db,
            peak_q: self.peak_q,
            low_cut_slope: slope(self.low_cut_slope, "low cut")?,
            high_cut_slope: slope(self.high_cut_slope, "high cut")?,
        };
        Ok(settings.sanitized())
    }
}

/// Complete eqchain configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EqConfig {
    #[serde(default)]
    pub engine: EngineConfig,

    #[serde(default)]
    pub settings: SettingsConfig,
}

impl EqConfig {
    /// Parse and validate a TOML document
    pub fn from_toml(contents: &str) -> Result<Self> {
        let config: Self = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Read an EQ configuration written by [`save_to_file`](Self::save_to_file)
    #[instrument(skip(path), fields(path = %path.as_ref().display()))]
    pub async fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let config = Self::from_toml(&fs::read_to_string(path.as_ref()).await?)?;
        info!(
            sample_rate = config.engine.sample_rate,
            channels = config.engine.channels,
            "EQ configuration read"
        );
        Ok(config)
    }

    /// Write as pretty TOML, creating missing parent directories
    #[instrument(skip(self, path), fields(path = %path.as_ref().display()))]
    pub async fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        let document = toml::to_string_pretty(self)?;

        if let Some(dir) = path.parent().filter(|dir| !dir.as_os_str().is_empty()) {
            fs::create_dir_all(dir).await?;
        }
        fs::write(path, document).await?;

        info!("EQ configuration written");
        Ok(())
    }

    /// Check engine values and slope choices
    pub fn validate(&self) -> Result<()> {
        self.engine
            .to_process_spec()
            .and_then(|spec| spec.validate())
            .map_err(|e| ConfigError::Invalid(e.to_string()))?;
        self.settings.to_settings()?;
        Ok(())
    }

    /// `<config dir>/eqchain/config.toml` for the current platform
    pub fn default_path() -> Result<PathBuf> {
        let dir = dirs::config_dir().ok_or_else(|| {
            ConfigError::Invalid("no platform configuration directory".to_string())
        })?;
        Ok(dir.join("eqchain").join("config.toml"))
    }
}

/// Owns the location of the EQ configuration file
///
/// Reads never fail: a missing file yields defaults, an unreadable one is
/// copied aside to `<name>.toml.corrupt` first.
pub struct ConfigManager {
    config_path: PathBuf,
}

impl ConfigManager {
    pub fn new(config_path: PathBuf) -> Self {
        Self { config_path }
    }

    pub fn config_path(&self) -> &Path {
        &self.config_path
    }

    /// Current configuration, or defaults when none can be read
    #[instrument(skip(self), fields(path = %self.config_path.display()))]
    pub async fn load(&self) -> EqConfig {
        if !self.exists() {
            debug!("No EQ configuration on disk, starting from defaults");
            return EqConfig::default();
        }

        match EqConfig::load_from_file(&self.config_path).await {
            Ok(config) => config,
            Err(e) => {
                error!(error = %e, "EQ configuration rejected, starting from defaults");
                self.set_aside_unreadable().await;
                EqConfig::default()
            }
        }
    }

    async fn set_aside_unreadable(&self) {
        let target = self.config_path.with_extension("toml.corrupt");
        match fs::copy(&self.config_path, &target).await {
            Ok(_) => info!(backup = %target.display(), "Kept rejected configuration"),
            Err(e) => error!(
                backup = %target.display(),
                error = %e,
                "Could not keep rejected configuration"
            ),
        }
    }

    /// Persist `config` to the managed path
    pub async fn save(&self, config: &EqConfig) -> Result<()> {
        config.save_to_file(&self.config_path).await
    }

    pub fn exists(&self) -> bool {
        self.config_path.exists()
    }
}
