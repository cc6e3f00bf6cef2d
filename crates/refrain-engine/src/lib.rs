// SPDX-License-Identifier: GPL-3.0-or-later

//! Audio fingerprinting and recognition engine for refrain.
//!
//! This crate provides:
//! - The [`Engine`] contract the command line drives
//! - Recognition adapters that acquire audio from a file or the microphone
//! - The result value model handed back from recognition
//! - A Chromaprint/SQLite implementation of the engine ([`RefrainEngine`])

pub mod adapter;
pub mod decoder;
pub mod engine;
pub mod error;
pub mod fingerprint;
pub mod matcher;
pub mod store;
pub mod value;

pub use adapter::{FileAdapter, MicrophoneAdapter, RecognitionAdapter};
pub use decoder::AudioSamples;
pub use engine::{Engine, EngineSettings, RefrainEngine};
pub use error::{EngineError, Result};
pub use fingerprint::Fingerprint;
pub use value::{RawResultValue, Scalar};
