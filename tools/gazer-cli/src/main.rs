//! Gazer CLI: pull frames from a video source, analyse them, and optionally
//! show them in a window and record them to a movie.
//!
//! Usage:
//!   gazer -i <INPUT> -o <DIR> [-w] [-m] [-c CAL] [-s SCALE] [-D|-M|-R|-E MODEL]
//!
//! Exit status: 0 on success or help, 1 on invalid arguments or a failed
//! run, 255 when the input has no frames.

use std::process::ExitCode;

use clap::{CommandFactory, Parser};

use gazer_common::config::{GazerConfig, LoggingConfig};
use gazer_pipeline::RunOutcome;

mod analysis_log;
mod args;
mod run;
mod validate;

use args::Args;

fn main() -> ExitCode {
    if std::env::args_os().len() <= 1 {
        let _ = Args::command().print_help();
        println!();
        return ExitCode::SUCCESS;
    }

    let args = match Args::try_parse() {
        Ok(args) => args,
        Err(e) => {
            let _ = e.print();
            return if e.use_stderr() {
                ExitCode::from(1)
            } else {
                ExitCode::SUCCESS
            };
        }
    };

    let config = match &args.config {
        Some(path) => match GazerConfig::load_from(path) {
            Ok(config) => config,
            Err(e) => {
                eprintln!("Failed to load config {}: {e}", path.display());
                return ExitCode::from(1);
            }
        },
        None => GazerConfig::load(),
    };

    gazer_common::logging::init_logging(&LoggingConfig {
        level: if args.verbose {
            "debug".to_string()
        } else {
            config.logging.level.clone()
        },
        json: args.json_logs || config.logging.json,
        file: config.logging.file.clone(),
    });

    match run::run(&args, &config) {
        Ok(outcome) => {
            if let RunOutcome::Completed(summary) = &outcome {
                match serde_json::to_string(summary) {
                    Ok(json) => tracing::info!(summary = %json, "Run complete"),
                    Err(e) => tracing::debug!(error = %e, "Could not serialize run summary"),
                }
            } else {
                tracing::info!("No frames available in input");
            }
            // -1 becomes 255
            ExitCode::from(outcome.exit_code() as u8)
        }
        Err(e) => {
            tracing::error!("{e:#}");
            ExitCode::from(1)
        }
    }
}
