// SPDX-License-Identifier: GPL-3.0-or-later

//! Recognition adapters: where the audio to recognize comes from.

use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{FromSample, Sample, SampleFormat, SizedSample};
use tracing::{debug, error, info, instrument};

use crate::decoder::{self, AudioSamples};
use crate::{EngineError, Result};

/// Source of audio for one recognition call.
///
/// Acquisition blocks until the audio is available.
pub trait RecognitionAdapter: Send + Sync {
    /// Short human-readable description, used in logs.
    fn describe(&self) -> String;

    fn acquire(&self) -> Result<AudioSamples>;
}

/// Reads and decodes an audio file.
#[derive(Debug, Clone)]
pub struct FileAdapter {
    path: PathBuf,
}

impl FileAdapter {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl RecognitionAdapter for FileAdapter {
    fn describe(&self) -> String {
        format!("file:{}", self.path.display())
    }

    fn acquire(&self) -> Result<AudioSamples> {
        decoder::decode_file(&self.path)
    }
}

/// Records from the default input device for a fixed duration.
#[derive(Debug, Clone)]
pub struct MicrophoneAdapter {
    duration: Duration,
}

impl MicrophoneAdapter {
    pub fn new(duration: Duration) -> Self {
        Self { duration }
    }
}

impl RecognitionAdapter for MicrophoneAdapter {
    fn describe(&self) -> String {
        format!("microphone:{}s", self.duration.as_secs_f64())
    }

    #[instrument(target = "capture", skip(self), fields(seconds = self.duration.as_secs_f64()))]
    fn acquire(&self) -> Result<AudioSamples> {
        let host = cpal::default_host();
        let device = host
            .default_input_device()
            .ok_or_else(|| EngineError::Capture("no input device available".to_string()))?;

        let supported = device
            .default_input_config()
            .map_err(|e| EngineError::Capture(e.to_string()))?;
        let sample_format = supported.sample_format();
        let config: cpal::StreamConfig = supported.into();
        debug!(
            target: "capture",
            device = %device.name().unwrap_or_default(),
            sample_rate = config.sample_rate.0,
            channels = config.channels,
            ?sample_format,
            "opening input stream"
        );

        let buffer = Arc::new(Mutex::new(Vec::<f32>::new()));
        let stream = match sample_format {
            SampleFormat::F32 => build_stream::<f32>(&device, &config, buffer.clone())?,
            SampleFormat::I16 => build_stream::<i16>(&device, &config, buffer.clone())?,
            SampleFormat::U16 => build_stream::<u16>(&device, &config, buffer.clone())?,
            other => {
                return Err(EngineError::Capture(format!(
                    "unsupported sample format {:?}",
                    other
                )))
            }
        };

        info!(target: "capture", "recording");
        stream.play().map_err(|e| EngineError::Capture(e.to_string()))?;
        std::thread::sleep(self.duration);
        drop(stream);

        let captured = std::mem::take(&mut *buffer.lock().unwrap_or_else(|poisoned| {
            error!(target: "capture", "capture buffer mutex poisoned, recovering");
            poisoned.into_inner()
        }));
        debug!(target: "capture", frames = captured.len(), "capture finished");

        Ok(AudioSamples::new(
            captured
                .into_iter()
                .map(|s| (s.clamp(-1.0, 1.0) * i16::MAX as f32) as i16)
                .collect(),
            config.sample_rate.0,
        ))
    }
}

/// Input stream that downmixes every frame into `buffer`.
fn build_stream<T>(
    device: &cpal::Device,
    config: &cpal::StreamConfig,
    buffer: Arc<Mutex<Vec<f32>>>,
) -> Result<cpal::Stream>
where
    T: SizedSample,
    f32: FromSample<T>,
{
    let channels = config.channels.max(1) as usize;

    device
        .build_input_stream(
            config,
            move |data: &[T], _: &cpal::InputCallbackInfo| {
                let mut buffer = buffer.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
                for frame in data.chunks(channels) {
                    let sum: f32 = frame.iter().map(|&s| f32::from_sample(s)).sum();
                    buffer.push(sum / frame.len() as f32);
                }
            },
            |err| error!(target: "capture", error = %err, "input stream error"),
            None,
        )
        .map_err(|e| EngineError::Capture(e.to_string()))
}
