// SPDX-License-Identifier: GPL-3.0-or-later
use refrain_engine::{Engine, FileAdapter, MicrophoneAdapter, RawResultValue, RecognitionAdapter};
use tracing::info;

use crate::dispatch::{Invocation, RecognitionRequest};
use crate::error::CliError;

#[derive(Debug, PartialEq)]
pub enum Outcome {
    Fingerprinted,
    Recognized(Option<RawResultValue>),
}

pub async fn execute<E>(engine: &E, invocation: &Invocation) -> Result<Outcome, CliError>
where
    E: Engine + ?Sized,
{
    match invocation {
        Invocation::FingerprintDirectory(job) => {
            let extension = job.extensions.first().map(|e| e.trim_start_matches('.'));
            println!(
                "Fingerprinting all .{} files in the {} directory",
                extension.unwrap_or_default(),
                job.directory.display()
            );
            engine
                .fingerprint_directory(&job.directory, &job.extensions, job.concurrency)
                .await?;
            Ok(Outcome::Fingerprinted)
        }
        Invocation::FingerprintFile(path) => {
            engine.fingerprint_file(path).await?;
            Ok(Outcome::Fingerprinted)
        }
        Invocation::Recognize(request) => {
            let adapter = adapter_for(request);
            info!(target: "cli", source = %adapter.describe(), "starting recognition");
            Ok(Outcome::Recognized(engine.recognize(adapter.as_ref()).await?))
        }
    }
}

fn adapter_for(request: &RecognitionRequest) -> Box<dyn RecognitionAdapter> {
    match request {
        RecognitionRequest::Microphone { duration } => Box::new(MicrophoneAdapter::new(*duration)),
        RecognitionRequest::File { path } => Box::new(FileAdapter::new(path.clone())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dispatch::FingerprintJob;
    use crate::sanitize::render;
    use async_trait::async_trait;
    use refrain_engine::{EngineError, Scalar};
    use serde_json::json;
    use std::path::{Path, PathBuf};
    use std::sync::Mutex;
    use std::time::Duration;

    #[derive(Debug, PartialEq)]
    enum Call {
        Directory(PathBuf, Vec<String>, usize),
        File(PathBuf),
        Recognize(String),
    }

    /// Records calls and answers recognition with a canned result.
    #[derive(Default)]
    struct RecordingEngine {
        calls: Mutex<Vec<Call>>,
        result: Option<RawResultValue>,
        fail: bool,
    }

    impl RecordingEngine {
        fn answering(result: RawResultValue) -> Self {
            Self {
                result: Some(result),
                ..Self::default()
            }
        }

        fn failing() -> Self {
            Self {
                fail: true,
                ..Self::default()
            }
        }

        fn calls(&self) -> Vec<Call> {
            std::mem::take(&mut *self.calls.lock().unwrap())
        }
    }

    #[async_trait]
    impl Engine for RecordingEngine {
        async fn fingerprint_directory(
            &self,
            directory: &Path,
            extensions: &[String],
            concurrency: usize,
        ) -> refrain_engine::Result<()> {
            self.calls.lock().unwrap().push(Call::Directory(
                directory.to_path_buf(),
                extensions.to_vec(),
                concurrency,
            ));
            if self.fail {
                return Err(EngineError::NotADirectory(directory.to_path_buf()));
            }
            Ok(())
        }

        async fn fingerprint_file(&self, path: &Path) -> refrain_engine::Result<()> {
            self.calls.lock().unwrap().push(Call::File(path.to_path_buf()));
            Ok(())
        }

        async fn recognize(
            &self,
            adapter: &dyn RecognitionAdapter,
        ) -> refrain_engine::Result<Option<RawResultValue>> {
            self.calls.lock().unwrap().push(Call::Recognize(adapter.describe()));
            Ok(self.result.clone())
        }
    }

    #[tokio::test]
    async fn test_directory_batch_forwards_job() {
        let engine = RecordingEngine::default();
        let invocation = Invocation::FingerprintDirectory(FingerprintJob {
            directory: PathBuf::from("/music"),
            extensions: vec![".mp3".to_string()],
            concurrency: 4,
        });

        let outcome = execute(&engine, &invocation).await.unwrap();

        assert_eq!(outcome, Outcome::Fingerprinted);
        assert_eq!(
            engine.calls(),
            vec![Call::Directory(PathBuf::from("/music"), vec![".mp3".to_string()], 4)]
        );
    }

    #[tokio::test]
    async fn test_single_file_fingerprint() {
        let engine = RecordingEngine::default();
        let invocation = Invocation::FingerprintFile(PathBuf::from("/music/song.mp3"));

        execute(&engine, &invocation).await.unwrap();
        assert_eq!(engine.calls(), vec![Call::File(PathBuf::from("/music/song.mp3"))]);
    }

    #[tokio::test]
    async fn test_file_recognition_without_match_renders_none() {
        let engine = RecordingEngine::default();
        let invocation = Invocation::Recognize(RecognitionRequest::File {
            path: PathBuf::from("/path/to/song.mp3"),
        });

        let Outcome::Recognized(result) = execute(&engine, &invocation).await.unwrap() else {
            panic!("expected recognition outcome");
        };

        assert_eq!(render(result.as_ref()).unwrap(), "None");
        assert_eq!(
            engine.calls(),
            vec![Call::Recognize("file:/path/to/song.mp3".to_string())]
        );
    }

    #[tokio::test]
    async fn test_file_recognition_null_result_renders_none() {
        let engine = RecordingEngine::answering(RawResultValue::Null);
        let invocation = Invocation::Recognize(RecognitionRequest::File {
            path: PathBuf::from("/path/to/song.mp3"),
        });

        let Outcome::Recognized(result) = execute(&engine, &invocation).await.unwrap() else {
            panic!("expected recognition outcome");
        };
        assert_eq!(render(result.as_ref()).unwrap(), "None");
    }

    #[tokio::test]
    async fn test_microphone_recognition_renders_sanitized_json() {
        let engine = RecordingEngine::answering(RawResultValue::map([
            ("song_name", RawResultValue::Bytes(b"Song".to_vec())),
            ("confidence", Scalar::F32(0.87).into()),
        ]));
        let invocation = Invocation::Recognize(RecognitionRequest::Microphone {
            duration: Duration::from_secs(5),
        });

        let Outcome::Recognized(result) = execute(&engine, &invocation).await.unwrap() else {
            panic!("expected recognition outcome");
        };
        let text = render(result.as_ref()).unwrap();

        let parsed: serde_json::Value = serde_json::from_str(&text).unwrap();
        assert_eq!(parsed, json!({"song_name": "Song", "confidence": 0.87}));
        assert_eq!(engine.calls(), vec![Call::Recognize("microphone:5s".to_string())]);
    }

    #[tokio::test]
    async fn test_engine_failure_propagates() {
        let engine = RecordingEngine::failing();
        let invocation = Invocation::FingerprintDirectory(FingerprintJob {
            directory: PathBuf::from("/missing"),
            extensions: vec![".wav".to_string()],
            concurrency: 1,
        });

        let err = execute(&engine, &invocation).await.unwrap_err();
        assert!(matches!(err, CliError::Engine(EngineError::NotADirectory(_))));
    }
}
