//! smartio CLI - stream copy and readiness waits from the shell

use anyhow::{Context, Result};
use clap::Parser;
use humansize::{format_size, BINARY};
use smartio::config::{parse_size, CliArgs, Commands, Settings};
use smartio::copy::{CopyRequest, Endpoint, StreamCopier};
use smartio::select::SelectRequest;
use std::io;
use std::os::fd::AsFd;
use std::process::ExitCode;
use tracing::debug;
use tracing_subscriber::EnvFilter;

fn main() -> ExitCode {
    // Parse CLI arguments
    let args = CliArgs::parse();

    init_logging(&args);
    debug!(version = smartio::VERSION, "smartio starting");

    match run(args) {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

/// Logs go to stderr so stdout stays free for copied data
fn init_logging(args: &CliArgs) {
    let level = match args.verbose {
        0 => "warn",
        1 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(false);

    if args.log_json {
        builder.json().init();
    } else {
        builder.init();
    }
}

fn run(args: CliArgs) -> Result<ExitCode> {
    let settings = Settings::from_cli(&args).context("Invalid configuration")?;

    match &args.command {
        Commands::Copy {
            source,
            destination,
            length,
            offset,
            ..
        } => cmd_copy(
            &settings,
            source,
            destination,
            length.as_deref(),
            offset.as_deref(),
        ),
        Commands::Wait { write, .. } => cmd_wait(&settings, *write),
    }
}

fn size_arg(name: &str, value: Option<&str>) -> Result<Option<u64>> {
    value
        .map(|v| parse_size(v).map_err(|e| anyhow::anyhow!("Invalid {}: {}", name, e)))
        .transpose()
}

fn cmd_copy(
    settings: &Settings,
    source: &str,
    destination: &str,
    length: Option<&str>,
    offset: Option<&str>,
) -> Result<ExitCode> {
    let length = size_arg("length", length)?;
    let offset = size_arg("offset", offset)?;

    let stdin = io::stdin();
    let stdout = io::stdout();

    let from = if source == "-" {
        Endpoint::handle(&stdin)
    } else {
        Endpoint::path(source)
    };
    let to = if destination == "-" {
        Endpoint::handle(&stdout)
    } else {
        Endpoint::path(destination)
    };

    let mut request = CopyRequest::new(from, to);
    request.length = length;
    request.offset = offset;

    let copier = StreamCopier::new(settings.copy.clone());
    debug!(options = ?copier.options(), "Copy options");

    let stats = copier
        .execute(request)
        .with_context(|| format!("Failed to copy {} to {}", source, destination))?;

    eprintln!(
        "Copied {} in {} ({}/s, {:?})",
        format_size(stats.bytes_copied, BINARY),
        humantime::format_duration(stats.duration),
        format_size(stats.throughput as u64, BINARY),
        stats.method
    );

    Ok(ExitCode::SUCCESS)
}

fn cmd_wait(settings: &Settings, write: bool) -> Result<ExitCode> {
    let stdin = io::stdin();
    let stdout = io::stdout();
    let stdin_fd = stdin.as_fd();
    let stdout_fd = stdout.as_fd();

    let mut request = SelectRequest::new()
        .read(&stdin_fd)
        .timeout_opt(settings.select.timeout()?);
    if write {
        request = request.write(&stdout_fd);
    }

    match request.wait().context("Wait failed")? {
        Some(ready) => {
            if !ready.readable.is_empty() {
                eprintln!("stdin: readable");
            }
            if !ready.writable.is_empty() {
                eprintln!("stdout: writable");
            }
            Ok(ExitCode::SUCCESS)
        }
        None => {
            eprintln!("timeout");
            Ok(ExitCode::from(2))
        }
    }
}
