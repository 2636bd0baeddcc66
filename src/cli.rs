//! CLI argument parsing for the interpose demo runner

use clap::{Parser, ValueEnum};
use std::path::PathBuf;

/// Output format for the timing summary
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable table (default)
    Text,
    /// JSON report for machine parsing
    Json,
}

#[derive(Parser, Debug)]
#[command(name = "interpose")]
#[command(version)]
#[command(about = "Run the sample Calculator workload under method interception", long_about = None)]
pub struct Cli {
    /// Number of workload iterations per thread
    #[arg(short = 'n', long = "iterations", value_name = "N", default_value = "1000")]
    pub iterations: u64,

    /// Number of threads calling through the interceptors concurrently
    #[arg(short = 't', long = "threads", value_name = "N", default_value = "1")]
    pub threads: usize,

    /// Instrumentation config file (TOML); defaults time every Calculator operation
    #[arg(short = 'c', long = "config", value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Output format
    #[arg(long = "format", value_enum, default_value = "text")]
    pub format: OutputFormat,

    /// Include every individual call record in JSON output
    #[arg(long = "records")]
    pub records: bool,

    /// Keep each call's arguments on its record (shown with --records)
    #[arg(long = "capture-args")]
    pub capture_args: bool,

    /// Install interceptors but leave them disabled (bypass path)
    #[arg(long = "disable")]
    pub disable: bool,

    /// Enable debug tracing output to stderr
    #[arg(long = "debug")]
    pub debug: bool,
}
