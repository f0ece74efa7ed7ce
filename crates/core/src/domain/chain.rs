//! Per-channel filter chain
//!
//! Low-cut bank → peak filter → high-cut bank, in that fixed order. Each audio
//! channel owns one chain; chains never share history.

use crate::domain::dsp::{BiquadCoeffs, BiquadFilter, CutFilterBank, CutKind, Processor};
use crate::domain::params::EqSettings;

/// Complete EQ signal path for one channel
#[derive(Debug, Clone)]
pub struct ChannelChain {
    low_cut: CutFilterBank,
    peak: BiquadFilter,
    high_cut: CutFilterBank,
    sample_rate: f64,
}

impl ChannelChain {
    /// Create a chain designed for `settings` at `sample_rate`
    pub fn new(settings: &EqSettings, sample_rate: f64) -> Self {
        let mut chain = Self {
            low_cut: CutFilterBank::new(CutKind::LowCut),
            peak: BiquadFilter::bypass(),
            high_cut: CutFilterBank::new(CutKind::HighCut),
            sample_rate,
        };
        chain.update_settings(settings, sample_rate);
        chain
    }

    /// Push freshly designed coefficients into all three stages
    ///
    /// Allocation-free and deterministic: the same settings always produce
    /// the same coefficients, so repeated calls do not alter the output.
    pub fn update_settings(&mut self, settings: &EqSettings, sample_rate: f64) {
        self.sample_rate = sample_rate;

        self.low_cut.update(
            f64::from(settings.low_cut_freq),
            settings.low_cut_slope,
            sample_rate,
        );
        self.peak.set_coeffs(peak_coeffs(settings, sample_rate));
        self.high_cut.update(
            f64::from(settings.high_cut_freq),
            settings.high_cut_slope,
            sample_rate,
        );
    }

    pub fn sample_rate(&self) -> f64 {
        self.sample_rate
    }

    pub fn low_cut(&self) -> &CutFilterBank {
        &self.low_cut
    }

    pub fn peak(&self) -> &BiquadFilter {
        &self.peak
    }

    pub fn high_cut(&self) -> &CutFilterBank {
        &self.high_cut
    }

    /// Whole-chain magnitude at `freq` in dB
    pub fn magnitude_db_at(&self, freq: f64) -> f64 {
        self.low_cut.magnitude_db_at(freq)
            + self.peak.coeffs().magnitude_db_at(freq, self.sample_rate)
            + self.high_cut.magnitude_db_at(freq)
    }

    /// True when history in every stage is zero
    pub fn is_at_rest(&self) -> bool {
        let banks_at_rest = [&self.low_cut, &self.high_cut].iter().all(|bank| {
            (0..bank.active_stages()).all(|i| bank.stage(i).map_or(true, BiquadFilter::is_at_rest))
        });
        banks_at_rest && self.peak.is_at_rest()
    }
}

/// Peak band coefficients for `settings`
pub fn peak_coeffs(settings: &EqSettings, sample_rate: f64) -> BiquadCoeffs {
    BiquadCoeffs::peaking(
        sample_rate,
        f64::from(settings.peak_freq),
        f64::from(settings.peak_gain_db),
        f64::from(settings.peak_q),
    )
}

impl Processor for ChannelChain {
    fn process(&mut self, block: &mut [f32]) {
        self.low_cut.process(block);
        self.peak.process(block);
        self.high_cut.process(block);
    }

    #[inline]
    fn process_sample(&mut self, sample: f32) -> f32 {
        let x = self.low_cut.process_sample(sample);
        let x = self.peak.process_sample(x);
        self.high_cut.process_sample(x)
    }

    fn reset(&mut self) {
        self.low_cut.reset();
        self.peak.reset();
        self.high_cut.reset();
    }

    fn name(&self) -> &str {
        "ChannelChain"
    }
}

/// Magnitude response of `settings` at each of `freqs`, in dB
pub fn frequency_response(settings: &EqSettings, sample_rate: f64, freqs: &[f64]) -> Vec<f64> {
    let chain = ChannelChain::new(settings, sample_rate);
    freqs.iter().map(|&f| chain.magnitude_db_at(f)).collect()
}

/// `points` log-spaced frequencies between `min_hz` and `max_hz` inclusive
pub fn log_frequencies(min_hz: f64, max_hz: f64, points: usize) -> Vec<f64> {
    match points {
        0 => Vec::new(),
        1 => vec![min_hz],
        n => {
            let ratio = (max_hz / min_hz).ln();
            (0..n)
                .map(|i| min_hz * (ratio * i as f64 / (n - 1) as f64).exp())
                .collect()
        }
    }
}
