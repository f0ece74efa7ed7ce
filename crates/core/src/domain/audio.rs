//! Audio stream abstractions shared by the engine
//!
//! This module defines the error type and the stream description handed to
//! the engine at prepare time. Host integration (device selection, bus layout
//! negotiation) lives outside the core.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors that can occur in the audio subsystem
#[derive(Debug, Error)]
pub enum AudioError {
    /// Invalid configuration for the processing engine
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// The engine does not support the requested configuration
    #[error("Unsupported configuration: {0}")]
    UnsupportedConfiguration(String),

    /// No parameter is registered under the given name
    #[error("Unknown parameter: {0}")]
    UnknownParameter(String),
}

pub type Result<T> = std::result::Result<T, AudioError>;

/// Number of audio channels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChannelCount {
    Mono,
    Stereo,
}

impl ChannelCount {
    pub fn count(&self) -> usize {
        match self {
            ChannelCount::Mono => 1,
            ChannelCount::Stereo => 2,
        }
    }

    /// Map a raw channel count onto a supported layout
    pub fn from_count(count: usize) -> Result<Self> {
        match count {
            1 => Ok(ChannelCount::Mono),
            2 => Ok(ChannelCount::Stereo),
            n => Err(AudioError::UnsupportedConfiguration(format!(
                "{n} channels (only mono and stereo are processed)"
            ))),
        }
    }
}

/// Stream description supplied at prepare time
///
/// A sample rate change requires a new prepare.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ProcessSpec {
    pub sample_rate: f64,
    pub max_block_size: usize,
    pub channels: ChannelCount,
}

impl ProcessSpec {
    pub fn new(sample_rate: f64, max_block_size: usize, channels: ChannelCount) -> Self {
        Self {
            sample_rate,
            max_block_size,
            channels,
        }
    }

    /// Reject sample rates and block sizes the engine cannot run with
    pub fn validate(&self) -> Result<()> {
        if !self.sample_rate.is_finite() || self.sample_rate <= 0.0 {
            return Err(AudioError::InvalidConfiguration(format!(
                "sample rate must be positive, got {}",
                self.sample_rate
            )));
        }
        if self.max_block_size == 0 {
            return Err(AudioError::InvalidConfiguration(
                "maximum block size must be positive".to_string(),
            ));
        }
        Ok(())
    }

    /// Nyquist frequency in Hz
    pub fn nyquist(&self) -> f64 {
        self.sample_rate * 0.5
    }
}

impl Default for ProcessSpec {
    fn default() -> Self {
        Self {
            sample_rate: 48000.0,
            channels: ChannelCount::Stereo,
            max_block_size: 512,
        }
    }
}
