//! CLI argument definitions
//!
//! All Clap derive structs for `cadence` command-line parsing.

use std::path::PathBuf;
use std::time::Duration;

use clap::{ArgAction, Args, Parser, Subcommand, ValueEnum};

// ============================================================================
// Root CLI
// ============================================================================

/// Timed phase sequencer for looping UI animation timelines.
#[derive(Parser, Debug)]
#[command(name = "cadence", author, version, about)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,

    /// Increase verbosity (-v info, -vv debug, -vvv trace).
    #[arg(short, long, action = ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress all non-error output.
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Color output control.
    #[arg(long, default_value = "auto", global = true, env = "CADENCE_COLOR")]
    pub color: ColorChoice,

    /// Log line format on stderr.
    #[arg(long, default_value = "human", global = true, env = "CADENCE_LOG_FORMAT")]
    pub log_format: OutputFormat,
}

// ============================================================================
// Top-Level Commands
// ============================================================================

/// Top-level subcommands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Play a sequence in real time, rendering each frame to stdout.
    Play(PlayArgs),

    /// Step a sequence on a virtual clock and print the frames.
    Simulate(SimulateArgs),

    /// Validate sequence files without playing them.
    Validate(ValidateArgs),

    /// List built-in scenarios.
    List(ListArgs),

    /// Generate shell completion scripts.
    Completions(CompletionsArgs),

    /// Display version information.
    Version(VersionArgs),
}

// ============================================================================
// Sequence source
// ============================================================================

/// Where the sequence comes from. Exactly one of the two is required.
#[derive(Args, Debug, Clone)]
#[group(id = "source", required = true, multiple = false)]
pub struct SourceArgs {
    /// Path to a YAML sequence file.
    #[arg(short, long, env = "CADENCE_SEQUENCE")]
    pub sequence: Option<PathBuf>,

    /// Name of a built-in scenario (see `cadence list`).
    #[arg(long)]
    pub scenario: Option<String>,
}

// ============================================================================
// Play / Simulate
// ============================================================================

/// Arguments for `play`.
#[derive(Args, Debug)]
pub struct PlayArgs {
    /// Sequence to play.
    #[command(flatten)]
    pub source: SourceArgs,

    /// Override the number of passes.
    #[arg(long)]
    pub cycles: Option<u64>,

    /// Frame output format.
    #[arg(short, long, default_value = "human")]
    pub format: OutputFormat,

    /// Stop after this much wall-clock time (e.g. `10s`, `1m 30s`).
    #[arg(short, long, value_parser = humantime::parse_duration)]
    pub duration: Option<Duration>,

    /// Write structured JSONL events to this file.
    #[arg(long, env = "CADENCE_EVENTS_FILE")]
    pub events_file: Option<PathBuf>,

    /// Expose Prometheus metrics on this port.
    #[arg(long, env = "CADENCE_METRICS_PORT")]
    pub metrics_port: Option<u16>,
}

/// Arguments for `simulate`.
#[derive(Args, Debug)]
pub struct SimulateArgs {
    /// Sequence to simulate.
    #[command(flatten)]
    pub source: SourceArgs,

    /// Override the number of passes.
    #[arg(long)]
    pub cycles: Option<u64>,

    /// Virtual time to simulate up to.
    #[arg(long, value_parser = humantime::parse_duration)]
    pub until: Duration,

    /// Sample the display at a fixed interval instead of at each transition.
    #[arg(long, value_parser = humantime::parse_duration)]
    pub step: Option<Duration>,

    /// Frame output format.
    #[arg(short, long, default_value = "human")]
    pub format: OutputFormat,

    /// Write structured JSONL events to this file.
    #[arg(long, env = "CADENCE_EVENTS_FILE")]
    pub events_file: Option<PathBuf>,
}

// ============================================================================
// Validate / List
// ============================================================================

/// Arguments for `validate`.
#[derive(Args, Debug)]
pub struct ValidateArgs {
    /// Sequence files to validate.
    #[arg(required = true)]
    pub files: Vec<PathBuf>,

    /// Output format.
    #[arg(short, long, default_value = "human")]
    pub format: OutputFormat,

    /// Enable strict validation (warnings become errors).
    #[arg(long)]
    pub strict: bool,
}

/// Arguments for `list`.
#[derive(Args, Debug)]
pub struct ListArgs {
    /// Filter by tag.
    #[arg(long)]
    pub tag: Option<String>,

    /// Output format.
    #[arg(short, long, default_value = "human")]
    pub format: OutputFormat,
}

// ============================================================================
// Completions / Version
// ============================================================================

/// Arguments for shell completion generation.
#[derive(Args, Debug)]
pub struct CompletionsArgs {
    /// Target shell for completion script.
    pub shell: Shell,
}

/// Arguments for version display.
#[derive(Args, Debug)]
pub struct VersionArgs {
    /// Output format.
    #[arg(short, long, default_value = "human")]
    pub format: OutputFormat,
}

// ============================================================================
// CLI-Local Enums
// ============================================================================

/// Color output choice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum ColorChoice {
    /// Auto-detect terminal support.
    #[default]
    Auto,
    /// Always use color.
    Always,
    /// Never use color.
    Never,
}

/// Output format for structured output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable output.
    #[default]
    Human,
    /// JSON output.
    Json,
}

/// Shell type for completion generation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Shell {
    /// Bash shell.
    Bash,
    /// Zsh shell.
    Zsh,
    /// Fish shell.
    Fish,
    /// `PowerShell`.
    #[value(name = "powershell")]
    PowerShell,
    /// Elvish shell.
    Elvish,
}

// ============================================================================
// Tests
// ============================================================================
