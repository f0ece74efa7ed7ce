//! Domain entities and business rules

pub mod audio;
pub mod chain;
pub mod config;
pub mod dsp;
pub mod params;
pub mod processor;

// Re-export specific items to avoid ambiguous glob imports
pub use audio::{AudioError, ChannelCount, ProcessSpec};
pub use chain::{frequency_response, log_frequencies, peak_coeffs, ChannelChain};
pub use config::{ConfigError, ConfigManager, EngineConfig, EqConfig, SettingsConfig};
pub use dsp::{
    butterworth_q, gain_to_db, BiquadCoeffs, BiquadFilter, CutFilterBank, CutKind, Processor,
    Slope, MAX_CUT_STAGES,
};
pub use params::{
    EqSettings, ParameterId, ParameterInfo, ParameterKind, ParameterStore, PARAMETER_COUNT,
};
pub use processor::{AudioProcessor, EqProcessor, ProcessorState, MAX_PROCESSED_CHANNELS};
