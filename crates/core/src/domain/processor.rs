//! Block processing pipeline
//!
//! `EqProcessor` owns one [`ChannelChain`] per processed channel and follows
//! the lifecycle Uninitialized → Prepared → Processing → Released. Once
//! prepared, the block path performs no allocation, locking or logging.

use crate::domain::audio::{ProcessSpec, Result};
use crate::domain::chain::ChannelChain;
use crate::domain::dsp::Processor;
use crate::domain::params::{EqSettings, ParameterStore};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Channels the engine filters; any further channels are silenced
pub const MAX_PROCESSED_CHANNELS: usize = 2;

/// Lifecycle of an audio processor
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessorState {
    Uninitialized,
    Prepared,
    Processing,
    Released,
}

/// Host-facing processing interface
///
/// The host guarantees that `process_block` calls are serialized and never
/// overlap with `prepare` or `release`.
pub trait AudioProcessor: Send {
    /// Allocate working state for `spec` and clear all history
    fn prepare(&mut self, spec: ProcessSpec) -> Result<()>;

    /// Filter a planar block in place using `settings`
    ///
    /// # Panics
    /// When called before `prepare` or after `release`.
    fn process_block(&mut self, channels: &mut [&mut [f32]], settings: &EqSettings);

    /// Clear filter history without reallocating
    ///
    /// For transport stop or seek; the next block starts from silence.
    fn reset(&mut self);

    /// Free working state
    fn release(&mut self);

    /// Get processor name for debugging/display
    fn name(&self) -> &str;
}

/// Stereo parametric EQ engine
pub struct EqProcessor {
    parameters: Arc<ParameterStore>,
    chains: Vec<ChannelChain>,
    spec: Option<ProcessSpec>,
    state: ProcessorState,
}

impl EqProcessor {
    /// Create an engine reading its parameters from `parameters`
    pub fn new(parameters: Arc<ParameterStore>) -> Self {
        Self {
            parameters,
            chains: Vec::new(),
            spec: None,
            state: ProcessorState::Uninitialized,
        }
    }

    pub fn parameters(&self) -> &Arc<ParameterStore> {
        &self.parameters
    }

    pub fn state(&self) -> ProcessorState {
        self.state
    }

    pub fn spec(&self) -> Option<&ProcessSpec> {
        self.spec.as_ref()
    }

    /// Chain of channel `index` (0 = left, 1 = right) while prepared
    pub fn chain(&self, index: usize) -> Option<&ChannelChain> {
        self.chains.get(index)
    }

    /// IIR filters add no reporting latency
    pub fn latency_samples(&self) -> usize {
        0
    }

    pub fn tail_seconds(&self) -> f64 {
        0.0
    }

    /// Check the lifecycle and resync every chain to `settings`
    fn begin_block(&mut self, settings: &EqSettings) -> ProcessSpec {
        let spec = match (self.state, self.spec) {
            (ProcessorState::Prepared | ProcessorState::Processing, Some(spec)) => spec,
            (state, _) => {
                panic!("EqProcessor cannot process in state {state:?}; call prepare() first")
            }
        };

        for chain in &mut self.chains {
            chain.update_settings(settings, spec.sample_rate);
        }
        self.state = ProcessorState::Processing;
        spec
    }

    /// Snapshot the parameter store once, then process a planar block
    pub fn process_block_from_store(&mut self, channels: &mut [&mut [f32]]) {
        let settings = self.parameters.snapshot();
        self.process_block(channels, &settings);
    }

    /// Filter an interleaved block in place
    ///
    /// Channels past the second are silenced, as is a trailing partial frame.
    pub fn process_interleaved(
        &mut self,
        buffer: &mut [f32],
        num_channels: usize,
        settings: &EqSettings,
    ) {
        self.begin_block(settings);

        if num_channels == 0 {
            buffer.fill(0.0);
            return;
        }

        let mut frames = buffer.chunks_exact_mut(num_channels);
        for frame in &mut frames {
            for (sample, chain) in frame.iter_mut().zip(self.chains.iter_mut()) {
                *sample = chain.process_sample(*sample);
            }
            if num_channels > MAX_PROCESSED_CHANNELS {
                frame[MAX_PROCESSED_CHANNELS..].fill(0.0);
            }
        }
        frames.into_remainder().fill(0.0);
    }

    /// Snapshot the parameter store once, then process an interleaved block
    pub fn process_interleaved_from_store(&mut self, buffer: &mut [f32], num_channels: usize) {
        let settings = self.parameters.snapshot();
        self.process_interleaved(buffer, num_channels, &settings);
    }
}

impl AudioProcessor for EqProcessor {
    fn prepare(&mut self, spec: ProcessSpec) -> Result<()> {
        if let Err(e) = spec.validate() {
            warn!(error = %e, "Rejected process spec");
            return Err(e);
        }

        let settings = self.parameters.snapshot();
        self.chains.clear();
        self.chains.extend(
            (0..MAX_PROCESSED_CHANNELS).map(|_| ChannelChain::new(&settings, spec.sample_rate)),
        );
        self.spec = Some(spec);
        self.state = ProcessorState::Prepared;

        info!(
            sample_rate = spec.sample_rate,
            max_block_size = spec.max_block_size,
            channels = spec.channels.count(),
            "EQ prepared"
        );
        Ok(())
    }

    fn process_block(&mut self, channels: &mut [&mut [f32]], settings: &EqSettings) {
        let spec = self.begin_block(settings);

        for (index, channel) in channels.iter_mut().enumerate() {
            debug_assert!(channel.len() <= spec.max_block_size);
            match self.chains.get_mut(index) {
                Some(chain) => chain.process(channel),
                None => channel.fill(0.0),
            }
        }
    }

    fn reset(&mut self) {
        for chain in &mut self.chains {
            chain.reset();
        }
    }

    fn release(&mut self) {
        self.chains = Vec::new();
        self.spec = None;
        self.state = ProcessorState::Released;
        debug!("EQ released");
    }

    fn name(&self) -> &str {
        "EqProcessor"
    }
}
