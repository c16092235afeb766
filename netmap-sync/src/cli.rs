use std::path::PathBuf;

use clap::{Parser, ValueEnum};

#[derive(Parser, Debug)]
#[command(name = "netmap-sync")]
#[command(about = "Reconcile declarative NETMAP and NAT configuration with live rule tables")]
pub struct Cli {
    /// Configuration file path.
    #[arg(
        short,
        long,
        global = true,
        default_value = "/etc/netmap-sync/config.yaml"
    )]
    pub config: PathBuf,
    /// Suppress non-essential output.
    #[arg(short, long, global = true)]
    pub quiet: bool,
    /// Enable debug diagnostics.
    #[arg(short, long, global = true)]
    pub debug: bool,
    #[command(subcommand)]
    pub command: Command,
}

#[derive(clap::Subcommand, Debug)]
pub enum Command {
    /// Reconcile the live rule tables and advertisement config with the
    /// configuration.
    Apply(ApplyArgs),
    /// Print the rule set compiled from the configuration.
    Compile(CompileArgs),
    /// Synthesize a configuration document from live system state.
    Capture(CaptureArgs),
    /// Show configuration summary, live rule counts, and service state.
    Status,
    /// Validate the configuration file.
    Validate(ValidateArgs),
    /// Display live rules or advertisement settings.
    Show(ShowArgs),
}

#[derive(Parser, Debug)]
pub struct ApplyArgs {
    /// Compute and print the plans without touching the system.
    #[arg(long)]
    pub dry_run: bool,
    /// Per-command timeout in seconds for rule application.
    #[arg(long, default_value_t = 10)]
    pub timeout: u64,
    /// Also list rules that are already satisfied.
    #[arg(short, long)]
    pub verbose: bool,
}

#[derive(Parser, Debug)]
pub struct CompileArgs {
    #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
    pub format: OutputFormat,
    /// Print the rendered advertisement config instead of rule commands.
    #[arg(long)]
    pub radvd: bool,
}

#[derive(Parser, Debug)]
pub struct CaptureArgs {
    /// Omit disabled or empty sections.
    #[arg(long)]
    pub slim: bool,
    /// Write the document to a file instead of stdout.
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}

#[derive(Parser, Debug)]
pub struct ValidateArgs {
    /// Treat warnings as failures.
    #[arg(long)]
    pub strict: bool,
    #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
    pub format: OutputFormat,
}

#[derive(Parser, Debug)]
pub struct ShowArgs {
    #[arg(value_enum)]
    pub what: ShowTarget,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
pub enum ShowTarget {
    Netmap,
    Nat,
    Radvd,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}
