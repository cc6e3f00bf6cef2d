// SPDX-License-Identifier: GPL-3.0-or-later
use std::path::PathBuf;

use clap::Parser;

/// refrain: audio fingerprinting and recognition
#[derive(Parser, Debug)]
#[command(name = "refrain", version)]
pub struct Cli {
    /// Path to configuration file
    #[arg(
        short,
        long,
        value_name = "PATH",
        long_help = "Path to configuration file\nUsage:\n  --config /path/to/config-file"
    )]
    pub config: Option<PathBuf>,

    /// Fingerprint files in a directory, or a single file
    #[arg(
        short,
        long,
        num_args = 0..=2,
        value_names = ["PATH", "EXTENSION"],
        conflicts_with = "recognize",
        long_help = "Fingerprint files in a directory, or a single file\nUsage:\n  \
                     --fingerprint /path/to/directory extension\n  \
                     --fingerprint /path/to/file"
    )]
    pub fingerprint: Option<Vec<String>>,

    /// Recognize what is playing through the microphone or in a file
    #[arg(
        short,
        long,
        num_args = 2,
        value_names = ["SOURCE", "ARG"],
        long_help = "Recognize what is playing through the microphone or in a file\nUsage:\n  \
                     --recognize mic number_of_seconds\n  \
                     --recognize file path/to/file"
    )]
    pub recognize: Option<Vec<String>>,
}
