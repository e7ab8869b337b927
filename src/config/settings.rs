//! Configuration settings for smartio
//!
//! Defines the CLI arguments, the optional JSON settings file and the
//! defaults used by the `copy` and `wait` commands.

use crate::copy::CopyOptions;
use crate::error::{IoResultExt, Result, SmartIoError};
use crate::select::{parse_timeout, timeout_from_secs};
use clap::{Parser, Subcommand};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// smartio - stream copy and readiness waiting for Unix handles
#[derive(Parser, Debug, Clone)]
#[command(name = "smartio")]
#[command(author = "SmartCopy Team")]
#[command(version = crate::VERSION)]
#[command(about = "Copy streams and wait for handle readiness")]
#[command(long_about = r#"
smartio copies bytes between files and open handles, and waits for
standard streams to become ready the way select(2) does.

Examples:
  smartio copy in.bin out.bin                  # Whole file
  smartio copy in.bin - --length 1K --offset 4 # 1 KiB from offset 4 to stdout
  cat data | smartio copy - saved.bin          # stdin to a file
  smartio wait --timeout 500ms                 # Wait for stdin to be readable
"#)]
pub struct CliArgs {
    /// Verbose output (-v debug, -vv trace)
    #[arg(short = 'v', long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Emit logs as JSON
    #[arg(long, global = true)]
    pub log_json: bool,

    /// JSON settings file
    #[arg(long, value_name = "FILE", env = "SMARTIO_CONFIG", global = true)]
    pub config: Option<PathBuf>,

    /// Command to run
    #[command(subcommand)]
    pub command: Commands,
}

/// Subcommands
#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Copy a stream; "-" stands for stdin (source) or stdout (destination)
    Copy {
        /// Source file, or "-" for stdin
        #[arg(value_name = "SOURCE")]
        source: String,

        /// Destination file, or "-" for stdout
        #[arg(value_name = "DESTINATION")]
        destination: String,

        /// Copy at most this many bytes (e.g., 512, 64K)
        #[arg(short = 'n', long, value_name = "SIZE")]
        length: Option<String>,

        /// Start reading at this source offset without moving the source position
        #[arg(short = 'o', long, value_name = "SIZE")]
        offset: Option<String>,

        /// Buffer size for the read/write loop (e.g., 128K, 1M)
        #[arg(short = 'b', long, value_name = "SIZE")]
        buffer_size: Option<String>,

        /// Never use copy_file_range
        #[arg(long)]
        no_zero_copy: bool,

        /// fsync the destination file after copying
        #[arg(long)]
        sync: bool,
    },

    /// Wait until stdin is readable (and optionally stdout writable)
    Wait {
        /// Also wait for stdout to become writable
        #[arg(long)]
        write: bool,

        /// Seconds, a duration like "250ms", or "none" to wait forever
        #[arg(short = 't', long, value_name = "TIMEOUT")]
        timeout: Option<String>,
    },
}

/// Defaults for readiness waits
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SelectOptions {
    /// Timeout in seconds; absent waits forever
    pub timeout_secs: Option<f64>,
}

impl SelectOptions {
    /// Validated timeout
    pub fn timeout(&self) -> Result<Option<Duration>> {
        self.timeout_secs.map(timeout_from_secs).transpose()
    }
}

/// Settings file contents, overridden by CLI flags
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Copy defaults
    pub copy: CopyOptions,
    /// Wait defaults
    pub select: SelectOptions,
}

impl Settings {
    /// Load settings from a JSON file
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).with_path(path)?;
        let settings: Settings = serde_json::from_str(&text)?;
        settings.validate()?;
        Ok(settings)
    }

    /// Build settings from CLI arguments and the optional settings file
    pub fn from_cli(args: &CliArgs) -> Result<Self> {
        let mut settings = match &args.config {
            Some(path) => Self::load(path)?,
            None => Self::default(),
        };

        match &args.command {
            Commands::Copy {
                buffer_size,
                no_zero_copy,
                sync,
                ..
            } => {
                if let Some(size) = buffer_size {
                    settings.copy.buffer_size = parse_size(size)
                        .map_err(|e| SmartIoError::config(format!("Invalid buffer size: {}", e)))?
                        as usize;
                }
                if *no_zero_copy {
                    settings.copy.use_zero_copy = false;
                }
                if *sync {
                    settings.copy.sync = true;
                }
            }
            Commands::Wait { timeout, .. } => {
                if let Some(timeout) = timeout {
                    settings.select.timeout_secs = parse_timeout(timeout)?.map(|d| d.as_secs_f64());
                }
            }
        }

        settings.validate()?;
        Ok(settings)
    }

    fn validate(&self) -> Result<()> {
        if self.copy.buffer_size == 0 {
            return Err(SmartIoError::config("buffer_size must be greater than zero"));
        }
        self.select.timeout()?;
        Ok(())
    }
}

/// Parse human-readable size string to bytes
pub fn parse_size(size: &str) -> std::result::Result<u64, String> {
    let size = size.trim().to_uppercase();

    if size.is_empty() {
        return Err("Empty size string".to_string());
    }

    let (num_str, multiplier) = if size.ends_with("GB") || size.ends_with('G') {
        (size.trim_end_matches(['G', 'B']), 1024u64 * 1024 * 1024)
    } else if size.ends_with("MB") || size.ends_with('M') {
        (size.trim_end_matches(['M', 'B']), 1024u64 * 1024)
    } else if size.ends_with("KB") || size.ends_with('K') {
        (size.trim_end_matches(['K', 'B']), 1024u64)
    } else {
        (size.trim_end_matches('B'), 1u64)
    };

    let num: u64 = num_str
        .trim()
        .parse()
        .map_err(|_| format!("Invalid number: {}", num_str))?;

    num.checked_mul(multiplier)
        .ok_or_else(|| format!("Size too large: {}", size))
}
