// SPDX-License-Identifier: GPL-3.0-or-later

//! Audio decoding and Chromaprint fingerprint generation.
//!
//! Any container/codec symphonia is built with (FLAC, MP3, WAV, Ogg Vorbis) is
//! decoded into mono 16-bit PCM, which is what Chromaprint consumes.

use std::fs::File;
use std::io::ErrorKind;
use std::path::Path;

use chromaprint::Chromaprint;
use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::DecoderOptions;
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;
use tracing::{debug, instrument};

use crate::{EngineError, Fingerprint, Result};

/// Maximum duration used for fingerprinting (in seconds).
pub const MAX_FINGERPRINT_DURATION_SECS: u32 = 120;

/// Fallback when the stream does not declare a sample rate.
const SAMPLE_RATE: u32 = 44100;

/// Audio samples: mono, 16-bit PCM at a given sample rate.
#[derive(Debug, Clone, PartialEq)]
pub struct AudioSamples {
    pub samples: Vec<i16>,
    pub sample_rate: u32,
}

impl AudioSamples {
    pub fn new(samples: Vec<i16>, sample_rate: u32) -> Self {
        Self {
            samples,
            sample_rate,
        }
    }

    /// Whole seconds of audio, at least 1 when any samples are present.
    pub fn duration_secs(&self) -> u32 {
        if self.samples.is_empty() {
            0
        } else {
            (self.samples.len() as u32 / self.sample_rate.max(1)).max(1)
        }
    }

    /// Limit samples to the fingerprinting duration.
    pub fn limit_to_fingerprint_duration(&mut self) {
        let max_samples = (self.sample_rate.max(1) * MAX_FINGERPRINT_DURATION_SECS) as usize;
        if self.samples.len() > max_samples {
            debug!(
                target: "decoder",
                original_len = self.samples.len(),
                max_samples,
                "truncating audio samples to fingerprint duration limit"
            );
            self.samples.truncate(max_samples);
        }
    }
}

/// Decode an audio file into mono PCM.
#[instrument(target = "decoder", skip_all, fields(file = %path.display()))]
pub fn decode_file(path: &Path) -> Result<AudioSamples> {
    let reader = File::open(path).map_err(|source| EngineError::Io {
        path: path.to_path_buf(),
        source,
    })?;

    let mss = MediaSourceStream::new(Box::new(reader), Default::default());

    let mut hint = Hint::new();
    if let Some(extension) = path.extension().and_then(|ext| ext.to_str()) {
        hint.with_extension(extension);
    }

    let probed = symphonia::default::get_probe()
        .format(
            &hint,
            mss,
            &FormatOptions::default(),
            &MetadataOptions::default(),
        )
        .map_err(|e| EngineError::AudioProcessing(format!("Failed to probe stream: {}", e)))?;

    let mut format = probed.format;
    let track = format
        .default_track()
        .ok_or_else(|| EngineError::AudioProcessing("No audio tracks found".to_string()))?;
    let track_id = track.id;

    let mut decoder = symphonia::default::get_codecs()
        .make(&track.codec_params, &DecoderOptions::default())
        .map_err(|e| EngineError::AudioProcessing(format!("Failed to create decoder: {}", e)))?;

    let mut sample_rate = track.codec_params.sample_rate.unwrap_or(SAMPLE_RATE);
    let mut samples: Vec<i16> = Vec::new();

    loop {
        let packet = match format.next_packet() {
            Ok(packet) => packet,
            Err(SymphoniaError::IoError(err)) if err.kind() == ErrorKind::UnexpectedEof => break,
            Err(SymphoniaError::ResetRequired) => {
                decoder.reset();
                continue;
            }
            Err(e) => {
                return Err(EngineError::AudioProcessing(format!(
                    "Error reading packet: {}",
                    e
                )))
            }
        };

        if packet.track_id() != track_id {
            continue;
        }

        let decoded = match decoder.decode(&packet) {
            Ok(decoded) => decoded,
            Err(SymphoniaError::DecodeError(e)) => {
                debug!(target: "decoder", error = %e, "skipping undecodable frame");
                continue;
            }
            Err(e) => {
                return Err(EngineError::AudioProcessing(format!(
                    "Failed to decode frame: {}",
                    e
                )))
            }
        };

        let spec = *decoded.spec();
        if spec.rate > 0 {
            sample_rate = spec.rate;
        }
        let channels = spec.channels.count().max(1);

        let mut buffer = SampleBuffer::<i16>::new(decoded.capacity() as u64, spec);
        buffer.copy_interleaved_ref(decoded);

        for frame in buffer.samples().chunks(channels) {
            let mixed: i32 = frame.iter().map(|&s| s as i32).sum::<i32>() / frame.len() as i32;
            samples.push(mixed.clamp(i16::MIN as i32, i16::MAX as i32) as i16);
        }
    }

    debug!(target: "decoder", sample_count = samples.len(), sample_rate, "decoded audio");
    Ok(AudioSamples::new(samples, sample_rate))
}

/// Generate a Chromaprint fingerprint from mono samples.
pub fn fingerprint_samples(mut audio: AudioSamples) -> Result<Fingerprint> {
    if audio.samples.is_empty() {
        return Err(EngineError::AudioProcessing(
            "No audio samples available".to_string(),
        ));
    }

    audio.limit_to_fingerprint_duration();

    debug!(
        target: "decoder",
        sample_count = audio.samples.len(),
        duration_secs = audio.duration_secs(),
        sample_rate = audio.sample_rate,
        "generating fingerprint from audio samples"
    );

    let mut ctx = Chromaprint::new();

    if !ctx.start(audio.sample_rate as i32, 1) {
        return Err(EngineError::AudioProcessing(
            "Failed to start Chromaprint".to_string(),
        ));
    }

    if !ctx.feed(&audio.samples) {
        return Err(EngineError::AudioProcessing(
            "Failed to feed samples to Chromaprint".to_string(),
        ));
    }

    if !ctx.finish() {
        return Err(EngineError::AudioProcessing(
            "Chromaprint finalize failed".to_string(),
        ));
    }

    let hash = ctx.fingerprint().ok_or_else(|| {
        EngineError::AudioProcessing("Chromaprint did not return a fingerprint".to_string())
    })?;
    let raw = ctx
        .raw_fingerprint()
        .ok_or_else(|| {
            EngineError::AudioProcessing(
                "Chromaprint did not return sub-fingerprints".to_string(),
            )
        })?
        .into_iter()
        .map(|item| item as u32)
        .collect();

    let fingerprint = Fingerprint::new(hash, raw, audio.duration_secs());
    fingerprint.validate()?;
    Ok(fingerprint)
}
