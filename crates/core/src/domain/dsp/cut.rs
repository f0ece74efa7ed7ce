//! Cascaded Butterworth cut filters
//!
//! A cut bank holds a fixed array of biquad sections. The selected slope
//! decides how many of them are active; the rest carry identity coefficients
//! and are skipped, so changing the slope never allocates.

use super::{butterworth_q, BiquadCoeffs, BiquadFilter, Processor};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Maximum number of second-order sections in one bank (96 dB/oct)
pub const MAX_CUT_STAGES: usize = 8;

/// Roll-off rate of a cut filter
///
/// Each 12 dB/oct step adds one second-order Butterworth section.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Slope {
    #[default]
    Db12,
    Db24,
    Db36,
    Db48,
    Db60,
    Db72,
    Db84,
    Db96,
}

impl Slope {
    pub const ALL: [Slope; MAX_CUT_STAGES] = [
        Slope::Db12,
        Slope::Db24,
        Slope::Db36,
        Slope::Db48,
        Slope::Db60,
        Slope::Db72,
        Slope::Db84,
        Slope::Db96,
    ];

    /// Choice index (0 = 12 dB/oct)
    pub fn index(&self) -> usize {
        *self as usize
    }

    /// Slope for a choice index, clamped to the last choice
    pub fn from_index(index: usize) -> Self {
        Self::ALL[index.min(MAX_CUT_STAGES - 1)]
    }

    /// Slope for a dB/oct value, if it is one of the supported steps
    pub fn from_db_per_octave(db: u32) -> Option<Self> {
        if db == 0 || db % 12 != 0 {
            return None;
        }
        Self::ALL.get(db as usize / 12 - 1).copied()
    }

    pub fn db_per_octave(&self) -> u32 {
        12 * (self.index() as u32 + 1)
    }

    /// Number of active second-order sections
    pub fn stages(&self) -> usize {
        self.index() + 1
    }

    /// Filter order of the full cascade
    pub fn order(&self) -> usize {
        2 * self.stages()
    }
}

impl fmt::Display for Slope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} dB/oct", self.db_per_octave())
    }
}

/// Which side of the spectrum a bank removes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CutKind {
    /// Removes content below the cutoff (high-pass sections)
    LowCut,
    /// Removes content above the cutoff (low-pass sections)
    HighCut,
}

impl CutKind {
    fn design(&self, sample_rate: f64, freq: f64, q: f64) -> BiquadCoeffs {
        match self {
            CutKind::LowCut => BiquadCoeffs::high_pass(sample_rate, freq, q),
            CutKind::HighCut => BiquadCoeffs::low_pass(sample_rate, freq, q),
        }
    }
}

/// Coefficients for a Butterworth cascade at `slope`
///
/// Entry `k` of the result is stage `k`; stages past `slope.stages()` are identity.
pub fn butterworth_cascade(
    kind: CutKind,
    sample_rate: f64,
    freq: f64,
    slope: Slope,
) -> [BiquadCoeffs; MAX_CUT_STAGES] {
    let order = slope.order();
    let mut coeffs = [BiquadCoeffs::identity(); MAX_CUT_STAGES];
    for (stage, c) in coeffs.iter_mut().take(slope.stages()).enumerate() {
        *c = kind.design(sample_rate, freq, butterworth_q(order, stage));
    }
    coeffs
}

/// Fixed-capacity bank of cascaded biquad sections for one cut side
#[derive(Debug, Clone)]
pub struct CutFilterBank {
    kind: CutKind,
    stages: [BiquadFilter; MAX_CUT_STAGES],
    slope: Slope,
    frequency: f64,
    sample_rate: f64,
}

impl CutFilterBank {
    /// Create a bank with every stage passing through
    ///
    /// Coefficients are designed on the first [`update`](Self::update) or
    /// [`set_sample_rate`](Self::set_sample_rate).
    pub fn new(kind: CutKind) -> Self {
        Self {
            kind,
            stages: std::array::from_fn(|_| BiquadFilter::bypass()),
            slope: Slope::default(),
            frequency: match kind {
                CutKind::LowCut => 20.0,
                CutKind::HighCut => 20000.0,
            },
            sample_rate: 0.0,
        }
    }

    pub fn kind(&self) -> CutKind {
        self.kind
    }

    pub fn slope(&self) -> Slope {
        self.slope
    }

    pub fn frequency(&self) -> f64 {
        self.frequency
    }

    pub fn sample_rate(&self) -> f64 {
        self.sample_rate
    }

    /// Number of stages currently in the signal path
    pub fn active_stages(&self) -> usize {
        self.slope.stages()
    }

    /// Access one stage (active or not)
    pub fn stage(&self, index: usize) -> Option<&BiquadFilter> {
        self.stages.get(index)
    }

    /// Change the sample rate and redesign all active stages
    pub fn set_sample_rate(&mut self, sample_rate: f64) {
        self.sample_rate = sample_rate;
        self.redesign();
    }

    /// Change the slope
    ///
    /// Newly activated stages start from silent history; stages that drop out
    /// are set to identity.
    pub fn set_slope(&mut self, slope: Slope) {
        let previous = self.slope.stages();
        let next = slope.stages();

        for stage in self.stages.iter_mut().take(next).skip(previous) {
            stage.reset();
        }

        self.slope = slope;
        self.redesign();
    }

    /// Move the cutoff of every active stage
    pub fn set_frequency(&mut self, freq: f64) {
        self.frequency = freq;
        self.redesign();
    }

    /// Apply cutoff, slope and sample rate in one pass
    pub fn update(&mut self, freq: f64, slope: Slope, sample_rate: f64) {
        self.frequency = freq;
        self.sample_rate = sample_rate;
        if slope != self.slope {
            self.set_slope(slope);
        } else {
            self.redesign();
        }
    }

    fn redesign(&mut self) {
        let coeffs = butterworth_cascade(self.kind, self.sample_rate, self.frequency, self.slope);
        for (stage, c) in self.stages.iter_mut().zip(coeffs) {
            stage.set_coeffs(c);
        }
    }

    /// Cascade magnitude at `freq` in dB (active stages only)
    pub fn magnitude_db_at(&self, freq: f64) -> f64 {
        self.stages[..self.active_stages()]
            .iter()
            .map(|stage| stage.coeffs().magnitude_db_at(freq, self.sample_rate))
            .sum()
    }

    /// True when every stage has stable coefficients
    pub fn is_stable(&self) -> bool {
        self.stages.iter().all(|stage| stage.coeffs().is_stable())
    }
}

impl Processor for CutFilterBank {
    fn process(&mut self, block: &mut [f32]) {
        let active = self.active_stages();
        for stage in &mut self.stages[..active] {
            stage.process(block);
        }
    }

    #[inline]
    fn process_sample(&mut self, sample: f32) -> f32 {
        let active = self.active_stages();
        self.stages[..active]
            .iter_mut()
            .fold(sample, |x, stage| stage.process_sample(x))
    }

    fn reset(&mut self) {
        for stage in &mut self.stages {
            stage.reset();
        }
    }

    fn name(&self) -> &str {
        match self.kind {
            CutKind::LowCut => "LowCut",
            CutKind::HighCut => "HighCut",
        }
    }
}
