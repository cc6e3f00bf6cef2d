// SPDX-License-Identifier: GPL-3.0-or-later

//! Turns parsed arguments into a validated invocation.
//!
//! Fingerprinting takes precedence over recognition; clap already rejects the two
//! together, so at most one branch ever applies.

use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use crate::cli::Cli;
use crate::error::CliError;

/// Workers used for directory fingerprinting.
pub const DEFAULT_CONCURRENCY: usize = 4;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FingerprintJob {
    pub directory: PathBuf,
    /// Each entry starts with '.'.
    pub extensions: Vec<String>,
    pub concurrency: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceKind {
    Microphone,
    File,
}

impl FromStr for SourceKind {
    type Err = CliError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "mic" | "microphone" => Ok(SourceKind::Microphone),
            "file" => Ok(SourceKind::File),
            other => Err(CliError::Usage(format!(
                "unknown recognition source '{}': expected 'mic', 'microphone' or 'file'",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum RecognitionRequest {
    Microphone { duration: Duration },
    File { path: PathBuf },
}

#[derive(Debug, Clone, PartialEq)]
pub enum Invocation {
    FingerprintDirectory(FingerprintJob),
    FingerprintFile(PathBuf),
    Recognize(RecognitionRequest),
}

/// Validate arguments. `Ok(None)` means no mode was selected and help should be shown.
pub fn plan(cli: &Cli) -> Result<Option<Invocation>, CliError> {
    if let Some(values) = cli.fingerprint.as_deref().filter(|v| !v.is_empty()) {
        return match values {
            [directory, extension] => Ok(Some(Invocation::FingerprintDirectory(FingerprintJob {
                directory: PathBuf::from(directory),
                extensions: vec![normalize_extension(extension)?],
                concurrency: DEFAULT_CONCURRENCY,
            }))),
            [path] => {
                if Path::new(path).is_dir() {
                    return Err(CliError::Usage(
                        "Please specify an extension if you'd like to fingerprint a directory!"
                            .to_string(),
                    ));
                }
                Ok(Some(Invocation::FingerprintFile(PathBuf::from(path))))
            }
            _ => Err(CliError::Usage(
                "--fingerprint takes a path and an optional extension".to_string(),
            )),
        };
    }

    if let Some(values) = cli.recognize.as_deref() {
        let [source, arg] = values else {
            return Err(CliError::Usage(
                "--recognize takes a source and an argument".to_string(),
            ));
        };

        let request = match source.parse::<SourceKind>()? {
            SourceKind::Microphone => RecognitionRequest::Microphone {
                duration: parse_seconds(arg)?,
            },
            SourceKind::File => RecognitionRequest::File {
                path: PathBuf::from(arg),
            },
        };
        return Ok(Some(Invocation::Recognize(request)));
    }

    Ok(None)
}

fn normalize_extension(extension: &str) -> Result<String, CliError> {
    let bare = extension.trim_start_matches('.');
    if bare.is_empty() {
        return Err(CliError::Usage("extension must not be empty".to_string()));
    }
    Ok(format!(".{}", bare))
}

/// Capture length in seconds. Must be representable as a non-zero `Duration`.
fn parse_seconds(arg: &str) -> Result<Duration, CliError> {
    arg.parse::<f64>()
        .ok()
        .and_then(|seconds| Duration::try_from_secs_f64(seconds).ok())
        .filter(|duration| !duration.is_zero())
        .ok_or_else(|| {
            CliError::Usage(format!(
                "invalid number of seconds '{}': expected a positive number",
                arg
            ))
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    fn plan_args(args: &[&str]) -> Result<Option<Invocation>, CliError> {
        let cli = Cli::try_parse_from(std::iter::once("refrain").chain(args.iter().copied()))
            .expect("arguments parse");
        plan(&cli)
    }

    #[test]
    fn test_no_mode_shows_help() {
        assert_eq!(plan_args(&[]).unwrap(), None);
        assert_eq!(plan_args(&["--config", "x.cnf"]).unwrap(), None);
    }

    #[test]
    fn test_fingerprint_without_values_shows_help() {
        assert_eq!(plan_args(&["-f"]).unwrap(), None);
    }

    #[test]
    fn test_fingerprint_directory_with_extension() {
        let invocation = plan_args(&["--fingerprint", "/some/dir", "mp3"]).unwrap();
        assert_eq!(
            invocation,
            Some(Invocation::FingerprintDirectory(FingerprintJob {
                directory: PathBuf::from("/some/dir"),
                extensions: vec![".mp3".to_string()],
                concurrency: 4,
            }))
        );
    }

    #[test]
    fn test_extension_leading_dot_not_doubled() {
        let Some(Invocation::FingerprintDirectory(job)) =
            plan_args(&["-f", "/some/dir", ".flac"]).unwrap()
        else {
            panic!("expected directory job");
        };
        assert_eq!(job.extensions, vec![".flac".to_string()]);
    }

    #[test]
    fn test_empty_extension_rejected() {
        assert!(matches!(plan_args(&["-f", "/some/dir", "."]), Err(CliError::Usage(_))));
    }

    #[test]
    fn test_single_directory_is_usage_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = plan_args(&["-f", dir.path().to_str().unwrap()]).unwrap_err();

        assert!(matches!(err, CliError::Usage(_)));
        assert!(err.to_string().contains("specify an extension"));
    }

    #[test]
    fn test_single_file_shortcut() {
        assert_eq!(
            plan_args(&["-f", "/music/song.mp3"]).unwrap(),
            Some(Invocation::FingerprintFile(PathBuf::from("/music/song.mp3")))
        );
    }

    #[test]
    fn test_recognize_microphone_aliases() {
        for source in ["mic", "microphone"] {
            let invocation = plan_args(&["--recognize", source, "5"]).unwrap();
            assert_eq!(
                invocation,
                Some(Invocation::Recognize(RecognitionRequest::Microphone {
                    duration: Duration::from_secs(5),
                }))
            );
        }
    }

    #[test]
    fn test_recognize_fractional_seconds() {
        let Some(Invocation::Recognize(request)) = plan_args(&["-r", "mic", "2.5"]).unwrap() else {
            panic!("expected recognition");
        };
        assert_eq!(
            request,
            RecognitionRequest::Microphone {
                duration: Duration::from_millis(2500)
            }
        );
    }

    #[test]
    fn test_recognize_file() {
        let Some(Invocation::Recognize(request)) =
            plan_args(&["-r", "file", "/path/to/song.mp3"]).unwrap()
        else {
            panic!("expected recognition");
        };
        assert_eq!(
            request,
            RecognitionRequest::File {
                path: PathBuf::from("/path/to/song.mp3")
            }
        );
    }

    #[test]
    fn test_unknown_source_rejected() {
        let err = plan_args(&["-r", "radio", "101.5"]).unwrap_err();
        assert!(err.to_string().contains("unknown recognition source 'radio'"));
    }

    #[test]
    fn test_invalid_durations_rejected() {
        for seconds in ["abc", "0", "inf", "NaN", "1e20", "1e-12"] {
            assert!(
                matches!(plan_args(&["-r", "mic", seconds]), Err(CliError::Usage(_))),
                "accepted {seconds}"
            );
        }
    }

    #[test]
    fn test_sub_second_durations_accepted() {
        assert_eq!(parse_seconds("0.25").unwrap(), Duration::from_millis(250));
        assert_eq!(parse_seconds("1e-9").unwrap(), Duration::from_nanos(1));
    }

    #[test]
    fn test_modes_are_mutually_exclusive() {
        let result = Cli::try_parse_from(["refrain", "-f", "/dir", "mp3", "-r", "file", "x.mp3"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_recognize_requires_two_values() {
        assert!(Cli::try_parse_from(["refrain", "-r", "file"]).is_err());
    }

    #[test]
    fn test_fingerprint_accepts_at_most_two_values() {
        assert!(Cli::try_parse_from(["refrain", "-f", "a", "b", "c"]).is_err());
    }
}
