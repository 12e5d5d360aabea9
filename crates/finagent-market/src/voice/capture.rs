//! Microphone capture via cpal

use super::wav::{downmix, resample};
use crate::error::{MarketError, Result};
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{SampleRate, StreamConfig};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::{debug, error, info};

/// Record `duration` of audio from the default input device
///
/// Blocks the calling thread. Samples come back interleaved with `channels`
/// channels at `sample_rate`; devices that cannot record that format directly
/// are recorded natively and converted.
pub fn record(duration: Duration, sample_rate: u32, channels: u16) -> Result<Vec<f32>> {
    let host = cpal::default_host();
    let device = host
        .default_input_device()
        .ok_or_else(|| MarketError::Audio("No input device available".into()))?;

    let device_name = device.name().unwrap_or_else(|_| "Unknown".to_string());
    info!("Using input device: {device_name}");

    let requested = StreamConfig {
        channels,
        sample_rate: SampleRate(sample_rate),
        buffer_size: cpal::BufferSize::Default,
    };

    // Prefer the requested format; otherwise record natively and convert
    match capture(&device, &requested, duration) {
        Ok(samples) => Ok(samples),
        Err(e) => {
            debug!("Requested input format unavailable ({e}), using device default");
            let native: StreamConfig = device
                .default_input_config()
                .map_err(|e| MarketError::Audio(format!("Failed to get input config: {e}")))?
                .into();

            let samples = capture(&device, &native, duration)?;
            let mono = downmix(&samples, usize::from(native.channels));
            let converted = resample(&mono, native.sample_rate.0, sample_rate);
            Ok(converted
                .into_iter()
                .flat_map(|s| std::iter::repeat_n(s, usize::from(channels.max(1))))
                .collect())
        }
    }
}

fn capture(device: &cpal::Device, config: &StreamConfig, duration: Duration) -> Result<Vec<f32>> {
    let buffer = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&buffer);

    let err_fn = |err| {
        error!("Audio input stream error: {err}");
    };

    let stream = device
        .build_input_stream(
            config,
            move |data: &[f32], _: &cpal::InputCallbackInfo| {
                if let Ok(mut samples) = sink.lock() {
                    samples.extend_from_slice(data);
                }
            },
            err_fn,
            None,
        )
        .map_err(|e| MarketError::Audio(format!("Failed to build input stream: {e}")))?;

    stream
        .play()
        .map_err(|e| MarketError::Audio(format!("Failed to start input stream: {e}")))?;

    info!(
        "Listening for {:.1}s at {}Hz, {} channel(s)",
        duration.as_secs_f32(),
        config.sample_rate.0,
        config.channels
    );
    std::thread::sleep(duration);
    drop(stream);
    info!("Recording complete");

    let samples = buffer
        .lock()
        .map_err(|_| MarketError::Audio("Capture buffer poisoned".into()))?
        .clone();
    Ok(samples)
}
