//! Digital Signal Processing building blocks for the EQ chain
//!
//! This module provides:
//! - Biquad coefficient design (low-cut, high-cut, peaking) via the bilinear transform
//! - Butterworth per-stage Q values for cascaded cut filters
//! - A Direct Form I biquad section
//! - Cut filter banks (see [`cut`])
//!
//! All processing is designed for:
//! - Zero allocations in the hot path
//! - Coefficient swaps between blocks without resetting history
//! - Unconditional stability: out-of-range inputs are clamped, never rejected

use num_complex::Complex64;
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;

pub mod cut;

pub use cut::{CutFilterBank, CutKind, Slope, MAX_CUT_STAGES};

/// Core trait for every stage of the filter chain
///
/// All stages process one channel in-place on f32 buffers.
pub trait Processor: Send {
    /// Process a block of samples in-place
    ///
    /// # Requirements
    /// - No allocations in the hot path
    /// - Samples are processed in time order
    /// - Handle blocks of any size
    fn process(&mut self, block: &mut [f32]);

    /// Process a single sample
    fn process_sample(&mut self, sample: f32) -> f32;

    /// Clear filter history
    ///
    /// Called on stream restart (prepare, sample-rate change, transport stop).
    fn reset(&mut self);

    /// Get stage name for debugging/display
    fn name(&self) -> &str;
}

/// Clamping bounds applied before coefficient design
pub mod limits {
    /// Lowest frequency handed to the designer (Hz)
    pub const FREQ_MIN: f64 = 20.0;
    /// Highest frequency handed to the designer, as a fraction of the sample rate
    pub const MAX_NORMALIZED_FREQUENCY: f64 = 0.49;

    /// Peak gain range (dB)
    pub const GAIN_DB_MIN: f64 = -24.0;
    pub const GAIN_DB_MAX: f64 = 24.0;

    /// Quality factor range
    pub const Q_MIN: f64 = 0.1;
    pub const Q_MAX: f64 = 10.0;
}

/// Clamp a frequency into the designable range for `sample_rate`
#[inline]
pub fn clamp_frequency(sample_rate: f64, freq: f64) -> f64 {
    let ceiling = limits::MAX_NORMALIZED_FREQUENCY * sample_rate;
    if !freq.is_finite() {
        return limits::FREQ_MIN.min(ceiling);
    }
    freq.max(limits::FREQ_MIN).min(ceiling)
}

/// Clamp a quality factor to a strictly positive value
#[inline]
pub fn clamp_q(q: f64) -> f64 {
    if !q.is_finite() || q <= 0.0 {
        return limits::Q_MIN;
    }
    q.clamp(limits::Q_MIN, limits::Q_MAX)
}

#[inline]
fn is_valid_sample_rate(sample_rate: f64) -> bool {
    sample_rate.is_finite() && sample_rate > 0.0
}

/// Q of one conjugate pole pair of an `order`-th order Butterworth prototype
///
/// `order` must be even and `stage < order / 2`. Stages are returned in
/// ascending Q, so the lowest-Q section runs first in a cascade.
pub fn butterworth_q(order: usize, stage: usize) -> f64 {
    debug_assert!(order >= 2 && order % 2 == 0);
    debug_assert!(stage < order / 2);

    let angle = PI * (2 * stage + 1) as f64 / (2 * order) as f64;
    1.0 / (2.0 * angle.cos())
}

// ============================================================================
// BIQUAD COEFFICIENTS (coefficient calculator)
// ============================================================================

/// Biquad filter coefficients
///
/// Normalized form: a0 is divided out. Designs are computed in f64 so that
/// low cutoffs at high sample rates keep their poles inside the unit circle.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BiquadCoeffs {
    /// Numerator coefficients
    pub b0: f64,
    pub b1: f64,
    pub b2: f64,
    /// Denominator coefficients (a0 is normalized to 1.0)
    pub a1: f64,
    pub a2: f64,
}

impl Default for BiquadCoeffs {
    fn default() -> Self {
        Self::identity()
    }
}

impl BiquadCoeffs {
    /// Unity gain (no filtering)
    pub const fn identity() -> Self {
        Self {
            b0: 1.0,
            b1: 0.0,
            b2: 0.0,
            a1: 0.0,
            a2: 0.0,
        }
    }

    fn normalized(b0: f64, b1: f64, b2: f64, a0: f64, a1: f64, a2: f64) -> Self {
        Self {
            b0: b0 / a0,
            b1: b1 / a0,
            b2: b2 / a0,
            a1: a1 / a0,
            a2: a2 / a0,
        }
    }

    /// Calculate coefficients for a low-pass (high-cut) section
    ///
    /// # Parameters
    /// - `sample_rate`: Audio sample rate in Hz
    /// - `freq`: Cutoff frequency in Hz (clamped below Nyquist)
    /// - `q`: Q factor, 1/sqrt(2) for a single Butterworth section
    #[must_use]
    pub fn low_pass(sample_rate: f64, freq: f64, q: f64) -> Self {
        if !is_valid_sample_rate(sample_rate) {
            return Self::identity();
        }
        let freq = clamp_frequency(sample_rate, freq);
        let q = clamp_q(q);

        let w0 = 2.0 * PI * freq / sample_rate;
        let cos_w0 = w0.cos();
        let alpha = w0.sin() / (2.0 * q);

        Self::normalized(
            (1.0 - cos_w0) / 2.0,
            1.0 - cos_w0,
            (1.0 - cos_w0) / 2.0,
            1.0 + alpha,
            -2.0 * cos_w0,
            1.0 - alpha,
        )
    }

    /// Calculate coefficients for a high-pass (low-cut) section
    #[must_use]
    pub fn high_pass(sample_rate: f64, freq: f64, q: f64) -> Self {
        if !is_valid_sample_rate(sample_rate) {
            return Self::identity();
        }
        let freq = clamp_frequency(sample_rate, freq);
        let q = clamp_q(q);

        let w0 = 2.0 * PI * freq / sample_rate;
        let cos_w0 = w0.cos();
        let alpha = w0.sin() / (2.0 * q);

        Self::normalized(
            (1.0 + cos_w0) / 2.0,
            -(1.0 + cos_w0),
            (1.0 + cos_w0) / 2.0,
            1.0 + alpha,
            -2.0 * cos_w0,
            1.0 - alpha,
        )
    }

    /// Calculate coefficients for a peaking EQ section
    ///
    /// Boosts or cuts frequencies around a center frequency. A gain of 0 dB
    /// yields a transparent section.
    #[must_use]
    pub fn peaking(sample_rate: f64, freq: f64, gain_db: f64, q: f64) -> Self {
        if !is_valid_sample_rate(sample_rate) {
            return Self::identity();
        }
        let freq = clamp_frequency(sample_rate, freq);
        let q = clamp_q(q);
        let gain_db = if gain_db.is_finite() {
            gain_db.clamp(limits::GAIN_DB_MIN, limits::GAIN_DB_MAX)
        } else {
            0.0
        };

        let a = 10.0_f64.powf(gain_db / 40.0);
        let w0 = 2.0 * PI * freq / sample_rate;
        let cos_w0 = w0.cos();
        let alpha = w0.sin() / (2.0 * q);

        Self::normalized(
            1.0 + alpha * a,
            -2.0 * cos_w0,
            1.0 - alpha * a,
            1.0 + alpha / a,
            -2.0 * cos_w0,
            1.0 - alpha / a,
        )
    }

    /// True when the section passes its input through unchanged
    pub fn is_identity(&self) -> bool {
        *self == Self::identity()
    }

    /// Both poles lie strictly inside the unit circle (Jury criterion)
    pub fn is_stable(&self) -> bool {
        self.a2.abs() < 1.0 && self.a1.abs() < 1.0 + self.a2
    }

    /// Evaluate the transfer function on the unit circle
    pub fn response_at(&self, freq: f64, sample_rate: f64) -> Complex64 {
        let w = 2.0 * PI * freq / sample_rate;
        let z1 = Complex64::from_polar(1.0, -w);
        let z2 = z1 * z1;

        let num = Complex64::new(self.b0, 0.0) + z1 * self.b1 + z2 * self.b2;
        let den = Complex64::new(1.0, 0.0) + z1 * self.a1 + z2 * self.a2;
        num / den
    }

    /// Linear magnitude at `freq`
    pub fn magnitude_at(&self, freq: f64, sample_rate: f64) -> f64 {
        self.response_at(freq, sample_rate).norm()
    }

    /// Magnitude at `freq` in decibels
    pub fn magnitude_db_at(&self, freq: f64, sample_rate: f64) -> f64 {
        gain_to_db(self.magnitude_at(freq, sample_rate))
    }
}

/// Convert a linear magnitude to dB (floored at -240 dB)
#[inline]
pub fn gain_to_db(gain: f64) -> f64 {
    20.0 * gain.max(1e-12).log10()
}

// ============================================================================
// BIQUAD FILTER
// ============================================================================

/// Values this small are flushed to zero in the feedback path
const DENORMAL_FLOOR: f64 = 1e-30;

/// Stateful biquad filter using Direct Form I
///
/// Direct Form I keeps input and output history separately, so a coefficient
/// swap continues from the existing history without a reset.
#[derive(Debug, Clone, PartialEq)]
pub struct BiquadFilter {
    coeffs: BiquadCoeffs,
    // Previous input samples (x[n-1], x[n-2])
    x1: f64,
    x2: f64,
    // Previous output samples (y[n-1], y[n-2])
    y1: f64,
    y2: f64,
}

impl BiquadFilter {
    /// Create a new biquad filter with given coefficients
    pub const fn new(coeffs: BiquadCoeffs) -> Self {
        Self {
            coeffs,
            x1: 0.0,
            x2: 0.0,
            y1: 0.0,
            y2: 0.0,
        }
    }

    /// Create a pass-through filter (unity gain)
    pub const fn bypass() -> Self {
        Self::new(BiquadCoeffs::identity())
    }

    /// Replace the transfer function
    ///
    /// History is kept: the next sample is computed from the old history with
    /// the new coefficients.
    pub fn set_coeffs(&mut self, coeffs: BiquadCoeffs) {
        self.coeffs = coeffs;
    }

    pub fn coeffs(&self) -> &BiquadCoeffs {
        &self.coeffs
    }

    /// True when history is all zeros
    pub fn is_at_rest(&self) -> bool {
        self.x1 == 0.0 && self.x2 == 0.0 && self.y1 == 0.0 && self.y2 == 0.0
    }

    #[inline]
    fn tick(&mut self, x: f64) -> f64 {
        // Direct Form I: y[n] = b0*x[n] + b1*x[n-1] + b2*x[n-2]
        //                        - a1*y[n-1] - a2*y[n-2]
        let c = &self.coeffs;
        let mut y = c.b0 * x + c.b1 * self.x1 + c.b2 * self.x2 - c.a1 * self.y1 - c.a2 * self.y2;
        if y.abs() < DENORMAL_FLOOR {
            y = 0.0;
        }

        self.x2 = self.x1;
        self.x1 = x;
        self.y2 = self.y1;
        self.y1 = y;

        y
    }
}

impl Default for BiquadFilter {
    fn default() -> Self {
        Self::bypass()
    }
}

impl Processor for BiquadFilter {
    fn process(&mut self, block: &mut [f32]) {
        for sample in block.iter_mut() {
            *sample = self.tick(f64::from(*sample)) as f32;
        }
    }

    #[inline]
    fn process_sample(&mut self, sample: f32) -> f32 {
        self.tick(f64::from(sample)) as f32
    }

    fn reset(&mut self) {
        self.x1 = 0.0;
        self.x2 = 0.0;
        self.y1 = 0.0;
        self.y2 = 0.0;
    }

    fn name(&self) -> &str {
        "Biquad"
    }
}

// ============================================================================
// TESTS
// ============================================================================
