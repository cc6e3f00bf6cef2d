// SPDX-License-Identifier: GPL-3.0-or-later
mod cli;
mod dispatch;
mod error;
mod invoke;
mod sanitize;

use std::process::ExitCode;

use clap::error::ErrorKind;
use clap::{CommandFactory, Parser};
use refrain_config::{load as load_config, resolve_config_path, TelemetryConfig};
use refrain_engine::RefrainEngine;
use tracing::{debug, info};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::cli::Cli;
use crate::error::CliError;
use crate::invoke::Outcome;

#[tokio::main]
async fn main() -> ExitCode {
    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("{}", err);
            ExitCode::FAILURE
        }
    }
}

async fn run() -> Result<(), CliError> {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(err) if matches!(err.kind(), ErrorKind::DisplayHelp | ErrorKind::DisplayVersion) => {
            let _ = err.print();
            return Ok(());
        }
        Err(err) => return Err(CliError::Usage(usage_message(&err))),
    };

    let Some(invocation) = dispatch::plan(&cli)? else {
        let _ = Cli::command().print_help();
        return Ok(());
    };

    let config_path = resolve_config_path(cli.config.as_deref());
    let config = load_config(&config_path)?;
    init_tracing(&config.section::<TelemetryConfig>("telemetry")?);
    debug!(target: "cli", config = %config_path.display(), ?invocation, "starting");

    let engine = RefrainEngine::new(&config).await?;
    match invoke::execute(&engine, &invocation).await? {
        Outcome::Fingerprinted => info!(target: "cli", "fingerprinting finished"),
        Outcome::Recognized(result) => println!("{}", sanitize::render(result.as_ref())?),
    }

    Ok(())
}

/// First line of a clap error, without the `error: ` prefix.
fn usage_message(err: &clap::Error) -> String {
    let rendered = err.to_string();
    let first = rendered.lines().next().unwrap_or_default();
    first.strip_prefix("error: ").unwrap_or(first).to_string()
}

fn init_tracing(telemetry: &TelemetryConfig) {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&telemetry.log_level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let text_layer = (!telemetry.json).then(|| {
        fmt::layer()
            .with_target(true)
            .with_level(true)
            .with_writer(std::io::stderr)
    });
    let json_layer = telemetry
        .json
        .then(|| fmt::layer().json().with_target(true).with_writer(std::io::stderr));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(text_layer)
        .with(json_layer)
        .init();
}
