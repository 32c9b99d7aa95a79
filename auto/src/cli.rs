//! CLI surface

use clap::Parser;
use std::path::PathBuf;

/// Autonomy - autonomous development pipeline
#[derive(Parser, Debug)]
#[command(
    name = "autonomy",
    about = "Drive specialist models through planning, coding, QA, and debugging until the objectives hold",
    version
)]
pub struct Cli {
    /// Target project directory
    pub project: PathBuf,

    /// Objective title (falls back to the project's MASTER_PLAN.md)
    #[arg(long)]
    pub objective: Option<String>,

    /// QA-focused mode: review pending work before anything else
    #[arg(long = "debug-qa")]
    pub debug_qa: bool,

    /// Command used to launch the program under test
    #[arg(long)]
    pub command: Option<String>,

    /// Seconds to run the program under test
    #[arg(long = "test-duration", value_name = "SECONDS")]
    pub test_duration: Option<u64>,

    /// Extended monitoring window after an initially clean run
    #[arg(long = "success-timeout", value_name = "SECONDS")]
    pub success_timeout: Option<u64>,

    /// Exit after a successful start, leaving the program running
    #[arg(long)]
    pub detach: bool,

    /// Tail a log file instead of running the pipeline
    #[arg(long, value_name = "PATH")]
    pub follow: Option<PathBuf>,

    /// Increase log verbosity (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Path to config file
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Safety cap on orchestration iterations
    #[arg(long = "max-iterations", value_name = "N")]
    pub max_iterations: Option<u64>,
}
