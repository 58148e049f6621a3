//! Command-line interface definitions for chordtool.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use logging::LogArgs;

/// Command-line interface for the `chordtool` binary.
#[derive(Parser, Debug)]
#[command(
    name = "chordtool",
    about = "Check chord mappings and replay key sequences",
    version
)]
pub struct Cli {
    /// Logging controls shared across binaries.
    #[command(flatten)]
    pub log: LogArgs,

    /// Which command to run.
    #[command(subcommand)]
    pub command: Commands,
}

/// Top-level commands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Load a mapping, report rejected entries and summarize apps and roots.
    Check(CheckArgs),
    /// Run key steps through an engine on an in-memory backend.
    Replay(ReplayArgs),
}

/// Arguments for the `check` subcommand.
#[derive(Args, Debug, Clone)]
pub struct CheckArgs {
    /// Mapping file (RON).
    #[arg(long, value_name = "PATH")]
    pub mapping: PathBuf,
}

/// Arguments for the `replay` subcommand.
#[derive(Args, Debug, Clone)]
pub struct ReplayArgs {
    /// Mapping file (RON).
    #[arg(long, value_name = "PATH")]
    pub mapping: PathBuf,

    /// Settings file (RON); defaults apply when absent.
    #[arg(long, value_name = "PATH")]
    pub settings: Option<PathBuf>,

    /// App focused before the first step.
    #[arg(long, value_name = "NAME")]
    pub app: Option<String>,

    /// Chords owned by another process; registering them conflicts.
    #[arg(long, value_name = "KEY")]
    pub claim: Vec<String>,

    /// Sleep in real time instead of on a virtual clock.
    #[arg(long)]
    pub realtime: bool,

    /// Steps: a key descriptor (`ctrl+x`), `wait:<duration>` (`wait:600ms`),
    /// or `app:<name>` (`app:` alone clears focus).
    #[arg(value_name = "STEP", num_args = 1..)]
    pub steps: Vec<String>,
}
