//! EQ parameters and the shared parameter store
//!
//! Parameters are written by non-real-time threads (UI, automation) and read
//! by the audio thread once per block. Each value lives in its own atomic
//! cell, so a reader never sees a torn value and never blocks a writer.

use crate::domain::audio::{AudioError, Result};
use crate::domain::dsp::{Slope, MAX_CUT_STAGES};
use crossbeam::atomic::AtomicCell;
use serde::{Deserialize, Serialize};
use tracing::trace;

/// Number of exposed parameters
pub const PARAMETER_COUNT: usize = 7;

/// Stable identifier of an exposed parameter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ParameterId {
    LowCutFreq,
    HighCutFreq,
    PeakFreq,
    PeakGain,
    PeakQ,
    LowCutSlope,
    HighCutSlope,
}

impl ParameterId {
    pub const ALL: [ParameterId; PARAMETER_COUNT] = [
        ParameterId::LowCutFreq,
        ParameterId::HighCutFreq,
        ParameterId::PeakFreq,
        ParameterId::PeakGain,
        ParameterId::PeakQ,
        ParameterId::LowCutSlope,
        ParameterId::HighCutSlope,
    ];

    fn index(self) -> usize {
        self as usize
    }

    /// Name the host and the configuration refer to this parameter by
    pub fn name(&self) -> &'static str {
        self.info().name
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|id| id.name() == name)
    }

    pub fn info(&self) -> &'static ParameterInfo {
        &LAYOUT[self.index()]
    }
}

/// Value domain of a parameter
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParameterKind {
    /// Continuous value with a display unit
    Float { unit: &'static str },
    /// Index into a fixed list of slope choices
    Choice,
}

/// Range, step and default of one parameter
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ParameterInfo {
    pub id: ParameterId,
    pub name: &'static str,
    pub kind: ParameterKind,
    pub min: f32,
    pub max: f32,
    pub step: f32,
    pub default: f32,
}

impl ParameterInfo {
    /// Snap `value` to the parameter's step grid and clamp it into range
    ///
    /// NaN maps to the default.
    pub fn sanitize(&self, value: f32) -> f32 {
        if value.is_nan() {
            return self.default;
        }
        let min = f64::from(self.min);
        let step = f64::from(self.step);
        let snapped = min + step * ((f64::from(value) - min) / step).round();
        (snapped as f32).clamp(self.min, self.max)
    }

    /// Labels of the selectable choices, for choice parameters
    pub fn choices(&self) -> Option<[String; MAX_CUT_STAGES]> {
        match self.kind {
            ParameterKind::Choice => Some(Slope::ALL.map(|slope| slope.to_string())),
            ParameterKind::Float { .. } => None,
        }
    }

    /// Human-readable rendering of `value`
    pub fn display(&self, value: f32) -> String {
        match self.kind {
            ParameterKind::Float { unit } if unit.is_empty() => format!("{value:.2}"),
            ParameterKind::Float { unit } => format!("{value:.1} {unit}"),
            ParameterKind::Choice => Slope::from_index(value.round() as usize).to_string(),
        }
    }
}

const fn frequency(id: ParameterId, name: &'static str, default: f32) -> ParameterInfo {
    ParameterInfo {
        id,
        name,
        kind: ParameterKind::Float { unit: "Hz" },
        min: 20.0,
        max: 20000.0,
        step: 1.0,
        default,
    }
}

const fn slope(id: ParameterId, name: &'static str) -> ParameterInfo {
    ParameterInfo {
        id,
        name,
        kind: ParameterKind::Choice,
        min: 0.0,
        max: (MAX_CUT_STAGES - 1) as f32,
        step: 1.0,
        default: 0.0,
    }
}

static LAYOUT: [ParameterInfo; PARAMETER_COUNT] = [
    frequency(ParameterId::LowCutFreq, "LowCut Freq", 20.0),
    frequency(ParameterId::HighCutFreq, "HighCut Freq", 20000.0),
    frequency(ParameterId::PeakFreq, "Peak Freq", 750.0),
    ParameterInfo {
        id: ParameterId::PeakGain,
        name: "Peak Gain",
        kind: ParameterKind::Float { unit: "dB" },
        min: -24.0,
        max: 24.0,
        step: 0.5,
        default: 0.0,
    },
    ParameterInfo {
        id: ParameterId::PeakQ,
        name: "Peak Q",
        kind: ParameterKind::Float { unit: "" },
        min: 0.1,
        max: 10.0,
        step: 0.05,
        default: 1.0,
    },
    slope(ParameterId::LowCutSlope, "Low Slope"),
    slope(ParameterId::HighCutSlope, "High Slope"),
];

// ============================================================================
// SNAPSHOT
// ============================================================================

/// Immutable EQ settings read once per processing block
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EqSettings {
    pub low_cut_freq: f32,
    pub high_cut_freq: f32,
    pub peak_freq: f32,
    pub peak_gain_db: f32,
    pub peak_q: f32,
    pub low_cut_slope: Slope,
    pub high_cut_slope: Slope,
}

impl Default for EqSettings {
    fn default() -> Self {
        Self {
            low_cut_freq: ParameterId::LowCutFreq.info().default,
            high_cut_freq: ParameterId::HighCutFreq.info().default,
            peak_freq: ParameterId::PeakFreq.info().default,
            peak_gain_db: ParameterId::PeakGain.info().default,
            peak_q: ParameterId::PeakQ.info().default,
            low_cut_slope: Slope::default(),
            high_cut_slope: Slope::default(),
        }
    }
}

impl EqSettings {
    /// Copy with every continuous value snapped and clamped into its range
    #[must_use]
    pub fn sanitized(&self) -> Self {
        Self {
            low_cut_freq: ParameterId::LowCutFreq.info().sanitize(self.low_cut_freq),
            high_cut_freq: ParameterId::HighCutFreq.info().sanitize(self.high_cut_freq),
            peak_freq: ParameterId::PeakFreq.info().sanitize(self.peak_freq),
            peak_gain_db: ParameterId::PeakGain.info().sanitize(self.peak_gain_db),
            peak_q: ParameterId::PeakQ.info().sanitize(self.peak_q),
            ..*self
        }
    }

    /// Raw value of one parameter as the store holds it
    pub fn value(&self, id: ParameterId) -> f32 {
        match id {
            ParameterId::LowCutFreq => self.low_cut_freq,
            ParameterId::HighCutFreq => self.high_cut_freq,
            ParameterId::PeakFreq => self.peak_freq,
            ParameterId::PeakGain => self.peak_gain_db,
            ParameterId::PeakQ => self.peak_q,
            ParameterId::LowCutSlope => self.low_cut_slope.index() as f32,
            ParameterId::HighCutSlope => self.high_cut_slope.index() as f32,
        }
    }
}

// ============================================================================
// PARAMETER STORE
// ============================================================================

/// Name-keyed parameter values shared between threads
///
/// Wrap in an `Arc` and hand clones to the UI and the audio engine.
pub struct ParameterStore {
    values: [AtomicCell<f32>; PARAMETER_COUNT],
}

impl ParameterStore {
    /// Create a store holding every parameter's default
    pub fn new() -> Self {
        Self {
            values: std::array::from_fn(|i| AtomicCell::new(LAYOUT[i].default)),
        }
    }

    /// Create a store holding `settings`
    pub fn with_settings(settings: &EqSettings) -> Self {
        let store = Self::new();
        store.apply(settings);
        store
    }

    /// Every exposed parameter, in registration order
    pub fn layout() -> &'static [ParameterInfo] {
        &LAYOUT
    }

    /// Current value of `id`
    pub fn get(&self, id: ParameterId) -> f32 {
        self.values[id.index()].load()
    }

    /// Write `value` (snapped and clamped) and return what was stored
    pub fn set(&self, id: ParameterId, value: f32) -> f32 {
        let stored = id.info().sanitize(value);
        self.values[id.index()].store(stored);
        trace!(parameter = id.name(), requested = value, stored, "Parameter set");
        stored
    }

    pub fn get_by_name(&self, name: &str) -> Result<f32> {
        ParameterId::from_name(name)
            .map(|id| self.get(id))
            .ok_or_else(|| AudioError::UnknownParameter(name.to_string()))
    }

    pub fn set_by_name(&self, name: &str, value: f32) -> Result<f32> {
        ParameterId::from_name(name)
            .map(|id| self.set(id, value))
            .ok_or_else(|| AudioError::UnknownParameter(name.to_string()))
    }

    pub fn set_slope(&self, id: ParameterId, slope: Slope) {
        self.set(id, slope.index() as f32);
    }

    /// Write every parameter from `settings`
    pub fn apply(&self, settings: &EqSettings) {
        for id in ParameterId::ALL {
            self.set(id, settings.value(id));
        }
    }

    pub fn reset_to_defaults(&self) {
        for info in &LAYOUT {
            self.values[info.id.index()].store(info.default);
        }
    }

    /// Read all parameters, one atomic load each
    pub fn snapshot(&self) -> EqSettings {
        EqSettings {
            low_cut_freq: self.get(ParameterId::LowCutFreq),
            high_cut_freq: self.get(ParameterId::HighCutFreq),
            peak_freq: self.get(ParameterId::PeakFreq),
            peak_gain_db: self.get(ParameterId::PeakGain),
            peak_q: self.get(ParameterId::PeakQ),
            low_cut_slope: Slope::from_index(self.get(ParameterId::LowCutSlope).round() as usize),
            high_cut_slope: Slope::from_index(self.get(ParameterId::HighCutSlope).round() as usize),
        }
    }
}

impl Default for ParameterStore {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for ParameterStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ParameterStore")
            .field("settings", &self.snapshot())
            .finish()
    }
}
