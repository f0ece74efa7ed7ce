//! Example driving the engine from two threads
//!
//! A control thread automates the peak band while an audio thread pulls
//! settings from the shared parameter store once per block.
//!
//! Run with: cargo run --package eqchain-core --example realtime_demo

use crossbeam::channel;
use eqchain_core::domain::{
    AudioProcessor, ChannelCount, EqProcessor, ParameterId, ParameterStore, ProcessSpec, Slope,
};
use std::f32::consts::PI;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

const SAMPLE_RATE: f64 = 48000.0;
const BLOCK_SIZE: usize = 256;

/// Per-block report sent from the audio thread
struct BlockReport {
    block: usize,
    peak_freq: f32,
    output_rms: f32,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter("eqchain_core=debug,info")
        .init();

    println!("=== eqchain Realtime Demo ===\n");

    let store = Arc::new(ParameterStore::new());
    store.set(ParameterId::PeakGain, 12.0);
    store.set(ParameterId::PeakQ, 4.0);
    store.set(ParameterId::LowCutFreq, 60.0);
    store.set_slope(ParameterId::LowCutSlope, Slope::Db48);

    let mut processor = EqProcessor::new(Arc::clone(&store));
    processor.prepare(ProcessSpec::new(SAMPLE_RATE, BLOCK_SIZE, ChannelCount::Stereo))?;

    let running = Arc::new(AtomicBool::new(true));
    let (report_tx, report_rx) = channel::bounded::<BlockReport>(64);

    // Audio thread: 1 kHz tone through the EQ, block after block
    let audio_running = Arc::clone(&running);
    let audio = thread::spawn(move || {
        let mut left = vec![0.0f32; BLOCK_SIZE];
        let mut right = vec![0.0f32; BLOCK_SIZE];
        let mut phase = 0.0f32;
        let step = 2.0 * PI * 1000.0 / SAMPLE_RATE as f32;
        let mut block = 0;

        while audio_running.load(Ordering::Relaxed) {
            for (l, r) in left.iter_mut().zip(right.iter_mut()) {
                *l = 0.25 * phase.sin();
                *r = *l;
                phase = (phase + step) % (2.0 * PI);
            }

            processor.process_block_from_store(&mut [left.as_mut_slice(), right.as_mut_slice()]);

            let rms = (left.iter().map(|s| s * s).sum::<f32>() / BLOCK_SIZE as f32).sqrt();
            if block % 50 == 0 {
                // Drop reports rather than block the audio thread
                let _ = report_tx.try_send(BlockReport {
                    block,
                    peak_freq: processor.parameters().get(ParameterId::PeakFreq),
                    output_rms: rms,
                });
            }
            block += 1;
            // Pace roughly like a real device callback
            thread::sleep(Duration::from_micros(
                (BLOCK_SIZE as f64 / SAMPLE_RATE * 1e6) as u64 / 4,
            ));
        }

        processor.release();
    });

    // Control thread: sweep the peak across the tone
    let control_store = Arc::clone(&store);
    let control = thread::spawn(move || {
        for step in 0..=40 {
            let freq = 250.0 * 2.0f32.powf(step as f32 / 10.0);
            control_store.set(ParameterId::PeakFreq, freq);
            thread::sleep(Duration::from_millis(25));
        }
    });

    control.join().map_err(|_| "control thread panicked")?;
    running.store(false, Ordering::Relaxed);
    audio.join().map_err(|_| "audio thread panicked")?;

    println!("{:>8} {:>12} {:>12}", "block", "peak Hz", "output rms");
    for report in report_rx.try_iter() {
        println!(
            "{:>8} {:>12.0} {:>12.4}",
            report.block, report.peak_freq, report.output_rms
        );
    }

    let settings = store.snapshot();
    println!("\nFinal settings: {settings:?}");
    println!("\n=== Demo Complete ===");
    Ok(())
}
