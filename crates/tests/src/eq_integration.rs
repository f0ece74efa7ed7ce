//! Integration tests for the EQ engine
//!
//! These tests drive the complete pipeline (parameter store, snapshot,
//! coefficient design, channel chains, processor lifecycle) the way a host does.

use eqchain_core::domain::{
    log_frequencies, peak_coeffs, AudioProcessor, BiquadFilter, ChannelChain, ChannelCount,
    EqConfig, EqProcessor, EqSettings, ParameterId, ParameterStore, ProcessSpec, Processor,
    ProcessorState, Slope,
};
use proptest::prelude::*;
use std::f64::consts::PI;
use std::sync::Arc;

const BLOCK_SIZE: usize = 512;

fn generate_sine_wave(frequency: f64, sample_rate: f64, num_samples: usize) -> Vec<f32> {
    (0..num_samples)
        .map(|i| (0.5 * (2.0 * PI * frequency * i as f64 / sample_rate).sin()) as f32)
        .collect()
}

fn rms(samples: &[f32]) -> f64 {
    let sum: f64 = samples.iter().map(|&s| f64::from(s) * f64::from(s)).sum();
    (sum / samples.len() as f64).sqrt()
}

fn prepared_processor(
    settings: &EqSettings,
    sample_rate: f64,
    channels: ChannelCount,
) -> EqProcessor {
    let store = Arc::new(ParameterStore::with_settings(settings));
    let mut processor = EqProcessor::new(store);
    processor
        .prepare(ProcessSpec::new(sample_rate, BLOCK_SIZE, channels))
        .unwrap();
    processor
}

/// Run a stereo signal through a fresh processor, block by block
fn process_stereo(settings: &EqSettings, sample_rate: f64, left: &mut [f32], right: &mut [f32]) {
    let mut processor = prepared_processor(settings, sample_rate, ChannelCount::Stereo);
    for (l, r) in left.chunks_mut(BLOCK_SIZE).zip(right.chunks_mut(BLOCK_SIZE)) {
        processor.process_block_from_store(&mut [l, r]);
    }
}

/// Steady-state output RMS of a sine through `settings`, left channel only
fn steady_state_rms(settings: &EqSettings, sample_rate: f64, frequency: f64) -> f64 {
    let settle = 8192;
    let mut left = generate_sine_wave(frequency, sample_rate, settle + 9600);
    let mut right = left.clone();
    process_stereo(settings, sample_rate, &mut left, &mut right);
    rms(&left[settle..])
}

// ============================================================================
// REFERENCE SCENARIOS
// ============================================================================

#[test]
fn test_defaults_pass_1khz_at_near_unity() {
    let sample_rate = 44100.0;
    let input = generate_sine_wave(1000.0, sample_rate, 16384);
    let mut left = input.clone();
    let mut right = input.clone();

    process_stereo(&EqSettings::default(), sample_rate, &mut left, &mut right);

    // Skip the low-cut settling time, then compare sample for sample
    for (i, (&out, &inp)) in left.iter().zip(&input).enumerate().skip(4096) {
        assert!((out - inp).abs() < 0.02, "sample {i}: {out} vs {inp}");
    }
    assert_eq!(left, right);

    let gain = rms(&left[4096..]) / rms(&input[4096..]);
    assert!((gain - 1.0).abs() < 0.005, "gain {gain}");
}

#[test]
fn test_peak_boost_quadruples_rms() {
    let settings = EqSettings {
        peak_freq: 1000.0,
        peak_gain_db: 12.0,
        peak_q: 1.0,
        ..EqSettings::default()
    };

    // 9600 samples is a whole number of 1 kHz periods at 48 kHz
    let boosted = steady_state_rms(&settings, 48000.0, 1000.0);
    let input_rms = 0.5 / 2.0f64.sqrt();
    let ratio = boosted / input_rms;

    assert!((ratio - 3.981).abs() < 0.05, "ratio {ratio}");
}

// ============================================================================
// SLOPE BEHAVIOUR
// ============================================================================

#[test]
fn test_low_cut_slope_increases_attenuation() {
    let mut previous = f64::MAX;
    for slope in Slope::ALL {
        let settings = EqSettings {
            low_cut_freq: 1000.0,
            low_cut_slope: slope,
            ..EqSettings::default()
        };
        let level = steady_state_rms(&settings, 48000.0, 500.0);
        assert!(level < previous, "{slope}: {level} !< {previous}");
        previous = level;
    }
}

#[test]
fn test_high_cut_slope_increases_attenuation() {
    let mut previous = f64::MAX;
    for slope in Slope::ALL {
        let settings = EqSettings {
            high_cut_freq: 2000.0,
            high_cut_slope: slope,
            ..EqSettings::default()
        };
        let level = steady_state_rms(&settings, 48000.0, 4000.0);
        assert!(level < previous, "{slope}: {level} !< {previous}");
        previous = level;
    }
}

#[test]
fn test_slope_attenuation_is_roughly_six_db_per_order() {
    for slope in Slope::ALL {
        let settings = EqSettings {
            low_cut_freq: 1000.0,
            low_cut_slope: slope,
            ..EqSettings::default()
        };
        let chain = ChannelChain::new(&settings, 48000.0);
        let attenuation = -chain.magnitude_db_at(500.0);
        let expected = 6.02 * slope.order() as f64;

        assert!(
            (attenuation - expected).abs() < 3.0,
            "{slope}: {attenuation:.1} dB, expected about {expected:.1} dB"
        );
    }
}

// ============================================================================
// STABILITY
// ============================================================================

#[test]
fn test_extreme_settings_are_stable() {
    let extremes = [
        (20.0, 20000.0),
        (20000.0, 20.0),
        (20.0, 20.0),
        (20000.0, 20000.0),
    ];

    for sample_rate in [44100.0, 48000.0, 96000.0] {
        for slope in Slope::ALL {
            for (low, high) in extremes {
                let settings = EqSettings {
                    low_cut_freq: low,
                    high_cut_freq: high,
                    low_cut_slope: slope,
                    high_cut_slope: slope,
                    peak_freq: high,
                    peak_gain_db: 24.0,
                    peak_q: 10.0,
                };
                let chain = ChannelChain::new(&settings, sample_rate);

                assert!(chain.low_cut().is_stable(), "low cut {low} Hz {slope} @ {sample_rate}");
                assert!(chain.high_cut().is_stable(), "high cut {high} Hz {slope} @ {sample_rate}");
                assert!(chain.peak().coeffs().is_stable());
            }
        }
    }
}

#[test]
fn test_impulse_response_decays_at_extremes() {
    let settings = EqSettings {
        low_cut_freq: 20.0,
        low_cut_slope: Slope::Db96,
        high_cut_freq: 20000.0,
        high_cut_slope: Slope::Db96,
        peak_freq: 20.0,
        peak_gain_db: -24.0,
        peak_q: 10.0,
    };

    for sample_rate in [44100.0, 48000.0, 96000.0] {
        let mut left = vec![0.0f32; sample_rate as usize * 2];
        left[0] = 1.0;
        let mut right = left.clone();
        process_stereo(&settings, sample_rate, &mut left, &mut right);

        assert!(left.iter().all(|s| s.is_finite()));
        let tail = &left[left.len() - 1024..];
        assert!(tail.iter().all(|s| s.abs() < 1e-4), "ringing at {sample_rate}");
    }
}

fn arb_settings() -> impl Strategy<Value = EqSettings> {
    (
        20.0f32..20000.0,
        20.0f32..20000.0,
        20.0f32..20000.0,
        -24.0f32..24.0,
        0.1f32..10.0,
        0usize..8,
        0usize..8,
    )
        .prop_map(|(low, high, peak, gain, q, low_slope, high_slope)| EqSettings {
            low_cut_freq: low,
            high_cut_freq: high,
            peak_freq: peak,
            peak_gain_db: gain,
            peak_q: q,
            low_cut_slope: Slope::from_index(low_slope),
            high_cut_slope: Slope::from_index(high_slope),
        })
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn prop_output_is_always_finite(
        settings in arb_settings(),
        sample_rate in prop::sample::select(vec![44100.0, 48000.0, 96000.0]),
        signal in prop::collection::vec(-1.0f32..1.0, 1..2048),
    ) {
        let mut left = signal.clone();
        let mut right = signal;
        process_stereo(&settings, sample_rate, &mut left, &mut right);

        prop_assert!(left.iter().chain(&right).all(|s| s.is_finite()));
    }

    #[test]
    fn prop_store_never_yields_unusable_settings(
        values in prop::collection::vec(
            prop_oneof![
                Just(f32::NAN),
                Just(f32::INFINITY),
                Just(f32::NEG_INFINITY),
                -1.0e6f32..1.0e6,
            ],
            7,
        ),
    ) {
        let store = ParameterStore::new();
        for (id, value) in ParameterId::ALL.iter().zip(&values) {
            store.set(*id, *value);
        }

        let settings = store.snapshot();
        for id in ParameterId::ALL {
            let info = id.info();
            let value = settings.value(id);
            prop_assert!(value >= info.min && value <= info.max, "{}: {}", info.name, value);
        }

        let chain = ChannelChain::new(&settings, 48000.0);
        prop_assert!(chain.low_cut().is_stable());
        prop_assert!(chain.high_cut().is_stable());
        prop_assert!(chain.peak().coeffs().is_stable());
    }
}

// ============================================================================
// TRANSPARENCY AND DETERMINISM
// ============================================================================

#[test]
fn test_zero_gain_peak_is_transparent() {
    for (freq, q) in [(20.0, 0.1), (750.0, 1.0), (5000.0, 10.0), (20000.0, 0.5)] {
        let settings = EqSettings {
            peak_freq: freq,
            peak_q: q,
            peak_gain_db: 0.0,
            ..EqSettings::default()
        };
        let coeffs = peak_coeffs(&settings, 48000.0);

        for f in log_frequencies(20.0, 20000.0, 64) {
            let db = coeffs.magnitude_db_at(f, 48000.0);
            assert!(db.abs() < 0.1, "peak {freq} Hz Q {q}: {db} dB at {f} Hz");
        }

        let input: Vec<f32> = (0..2048)
            .map(|i| ((i * 7919) % 2001) as f32 / 1000.0 - 1.0)
            .collect();
        let mut filter = BiquadFilter::new(coeffs);
        let mut output = input.clone();
        filter.process(&mut output);
        for (out, inp) in output.iter().zip(&input) {
            assert!((out - inp).abs() < 1e-6);
        }
    }
}

#[test]
fn test_redundant_updates_do_not_change_output() {
    let settings = EqSettings {
        low_cut_freq: 150.0,
        low_cut_slope: Slope::Db60,
        peak_freq: 3000.0,
        peak_gain_db: -7.5,
        peak_q: 3.0,
        high_cut_freq: 9000.0,
        high_cut_slope: Slope::Db36,
    };
    let input = generate_sine_wave(2500.0, 48000.0, 8192);

    let mut expected = input.clone();
    let mut expected_right = input.clone();
    process_stereo(&settings, 48000.0, &mut expected, &mut expected_right);

    let mut processor = prepared_processor(&settings, 48000.0, ChannelCount::Stereo);
    let mut left = input.clone();
    let mut right = input;
    for (l, r) in left.chunks_mut(BLOCK_SIZE).zip(right.chunks_mut(BLOCK_SIZE)) {
        processor.parameters().apply(&settings);
        processor.parameters().apply(&settings);
        processor.process_block_from_store(&mut [l, r]);
    }

    assert_eq!(left, expected);
    assert_eq!(right, expected_right);
}

#[test]
fn test_block_size_does_not_change_output() {
    let settings = EqSettings {
        low_cut_freq: 400.0,
        low_cut_slope: Slope::Db24,
        peak_gain_db: 6.0,
        ..EqSettings::default()
    };
    let input = generate_sine_wave(440.0, 48000.0, 4096);

    let run = |block: usize| {
        let mut processor = prepared_processor(&settings, 48000.0, ChannelCount::Stereo);
        let mut left = input.clone();
        let mut right = input.clone();
        for (l, r) in left.chunks_mut(block).zip(right.chunks_mut(block)) {
            processor.process_block_from_store(&mut [l, r]);
        }
        left
    };

    assert_eq!(run(64), run(BLOCK_SIZE));
}

#[test]
fn test_interleaved_matches_planar() {
    let settings = EqSettings {
        high_cut_freq: 6000.0,
        high_cut_slope: Slope::Db48,
        peak_gain_db: 3.0,
        ..EqSettings::default()
    };
    let left_in = generate_sine_wave(300.0, 48000.0, BLOCK_SIZE);
    let right_in = generate_sine_wave(7000.0, 48000.0, BLOCK_SIZE);

    let mut left = left_in.clone();
    let mut right = right_in.clone();
    let mut planar = prepared_processor(&settings, 48000.0, ChannelCount::Stereo);
    planar.process_block_from_store(&mut [left.as_mut_slice(), right.as_mut_slice()]);

    let mut interleaved: Vec<f32> = left_in
        .iter()
        .zip(&right_in)
        .flat_map(|(&l, &r)| [l, r])
        .collect();
    let mut processor = prepared_processor(&settings, 48000.0, ChannelCount::Stereo);
    processor.process_interleaved_from_store(&mut interleaved, 2);

    for (i, frame) in interleaved.chunks_exact(2).enumerate() {
        assert_eq!(frame[0], left[i]);
        assert_eq!(frame[1], right[i]);
    }
}

// ============================================================================
// CHANNEL LAYOUT AND LIFECYCLE
// ============================================================================

#[test]
fn test_mono_uses_left_chain_only() {
    let settings = EqSettings {
        peak_gain_db: 9.0,
        ..EqSettings::default()
    };
    let mut processor = prepared_processor(&settings, 48000.0, ChannelCount::Mono);
    let mut mono = generate_sine_wave(750.0, 48000.0, BLOCK_SIZE);
    processor.process_block_from_store(&mut [mono.as_mut_slice()]);

    assert!(mono.iter().all(|s| s.is_finite()));
    assert!(!processor.chain(0).unwrap().is_at_rest());
    assert!(processor.chain(1).unwrap().is_at_rest());
}

#[test]
fn test_extra_channels_are_silenced() {
    let mut processor =
        prepared_processor(&EqSettings::default(), 48000.0, ChannelCount::Stereo);
    let mut left = generate_sine_wave(1000.0, 48000.0, 128);
    let mut right = left.clone();
    let mut surround = left.clone();

    processor.process_block_from_store(&mut [
        left.as_mut_slice(),
        right.as_mut_slice(),
        surround.as_mut_slice(),
    ]);

    assert!(surround.iter().all(|&s| s == 0.0));
    assert!(left.iter().any(|&s| s != 0.0));
}

#[test]
fn test_full_lifecycle() {
    let mut processor = EqProcessor::new(Arc::new(ParameterStore::new()));
    assert_eq!(processor.state(), ProcessorState::Uninitialized);

    processor.prepare(ProcessSpec::default()).unwrap();
    assert_eq!(processor.state(), ProcessorState::Prepared);

    let mut left = generate_sine_wave(100.0, 48000.0, 256);
    let mut right = left.clone();
    processor.process_block_from_store(&mut [left.as_mut_slice(), right.as_mut_slice()]);
    assert_eq!(processor.state(), ProcessorState::Processing);

    processor.release();
    assert_eq!(processor.state(), ProcessorState::Released);

    // Re-prepare at a new rate starts from clean history
    processor
        .prepare(ProcessSpec::new(96000.0, 1024, ChannelCount::Stereo))
        .unwrap();
    assert!(processor.chain(0).unwrap().is_at_rest());
    assert_eq!(processor.chain(0).unwrap().sample_rate(), 96000.0);
}

#[test]
#[should_panic(expected = "call prepare() first")]
fn test_processing_after_release_panics() {
    let mut processor =
        prepared_processor(&EqSettings::default(), 48000.0, ChannelCount::Stereo);
    processor.release();

    let mut left = vec![0.0f32; 16];
    processor.process_block_from_store(&mut [left.as_mut_slice()]);
}

// ============================================================================
// CONCURRENCY
// ============================================================================

#[test]
fn test_parameter_writes_during_processing() {
    let store = Arc::new(ParameterStore::new());
    let mut processor = EqProcessor::new(Arc::clone(&store));
    processor.prepare(ProcessSpec::default()).unwrap();

    std::thread::scope(|scope| {
        let writer = Arc::clone(&store);
        scope.spawn(move || {
            for i in 0..5000 {
                let t = i as f32 / 5000.0;
                writer.set(ParameterId::PeakFreq, 20.0 + t * 19980.0);
                writer.set(ParameterId::PeakGain, -24.0 + t * 48.0);
                writer.set(ParameterId::LowCutFreq, 20.0 + (1.0 - t) * 2000.0);
                writer.set(ParameterId::LowCutSlope, (i % 8) as f32);
                writer.set(ParameterId::HighCutSlope, ((i + 3) % 8) as f32);
            }
        });

        // Fresh input every block, as a host delivers it
        let tone = generate_sine_wave(1000.0, 48000.0, 256 * 400);
        for block in tone.chunks(256) {
            let mut left = block.to_vec();
            let mut right = block.to_vec();
            processor.process_block_from_store(&mut [left.as_mut_slice(), right.as_mut_slice()]);

            // 0.5 peak input, at most +24 dB of boost plus cut-filter overshoot
            assert!(left.iter().chain(&right).all(|s| s.is_finite() && s.abs() < 16.0));
        }
    });
}

// ============================================================================
// CONFIGURATION
// ============================================================================

#[tokio::test]
async fn test_config_file_drives_processor() {
    let temp_dir = tempfile::TempDir::new().unwrap();
    let path = temp_dir.path().join("config.toml");

    let mut config = EqConfig::default();
    config.engine.sample_rate = 44100.0;
    config.settings.peak_freq = 1000.0;
    config.settings.peak_gain_db = 12.0;
    config.settings.low_cut_slope = 48;
    config.save_to_file(&path).await.unwrap();

    let loaded = EqConfig::load_from_file(&path).await.unwrap();
    let settings = loaded.settings.to_settings().unwrap();
    assert_eq!(settings.low_cut_slope, Slope::Db48);

    let store = Arc::new(ParameterStore::with_settings(&settings));
    let mut processor = EqProcessor::new(store);
    processor
        .prepare(loaded.engine.to_process_spec().unwrap())
        .unwrap();

    let chain = processor.chain(0).unwrap();
    assert_eq!(chain.sample_rate(), 44100.0);
    assert!((chain.magnitude_db_at(1000.0) - 12.0).abs() < 0.05);
}
