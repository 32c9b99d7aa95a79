//! Autonomy - CLI entry point

use std::path::Path;
use std::process::ExitCode;
use std::sync::atomic::Ordering;

use clap::Parser;
use tracing::info;

use autonomy::cli::Cli;
use autonomy::config::Config;
use autonomy::errors::PipelineError;
use autonomy::llm;
use autonomy::orchestrator::{Orchestrator, RunOptions};

fn setup_logging(verbose: u8) {
    let default_level = match verbose {
        0 => tracing::Level::INFO,
        1 => tracing::Level::DEBUG,
        _ => tracing::Level::TRACE,
    };
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env().add_directive(default_level.into()))
        .init();
}

/// Tail a log file until interrupted
async fn follow(path: &Path) -> Result<i32, PipelineError> {
    let mut offset = 0u64;
    loop {
        if let Ok(content) = tokio::fs::read_to_string(path).await
            && (content.len() as u64) > offset
        {
            print!("{}", &content[offset as usize..]);
            offset = content.len() as u64;
        }
        tokio::select! {
            _ = tokio::signal::ctrl_c() => return Ok(0),
            _ = tokio::time::sleep(std::time::Duration::from_millis(500)) => {}
        }
    }
}

async fn real_main(cli: Cli) -> Result<i32, PipelineError> {
    if let Some(path) = &cli.follow {
        return follow(path).await;
    }

    if !cli.project.is_dir() {
        return Err(PipelineError::Config(format!(
            "project directory {} does not exist",
            cli.project.display()
        )));
    }

    let config = Config::load(cli.config.as_ref()).map_err(|e| PipelineError::Config(e.to_string()))?;
    let llm = llm::create_client(&config.llm).map_err(|e| PipelineError::Config(e.to_string()))?;

    let mut orchestrator = Orchestrator::new(cli.project.clone(), config, llm)?;

    // Graceful Ctrl-C: the loop saves state and stops the child on its way out
    let abort = orchestrator.abort_flag();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            abort.store(true, Ordering::Relaxed);
        }
    });

    info!(project = %cli.project.display(), "pipeline starting");
    orchestrator
        .run(RunOptions {
            objective: cli.objective.clone(),
            command: cli.command.clone(),
            test_duration_secs: cli.test_duration,
            success_timeout_secs: cli.success_timeout,
            detach: cli.detach,
            debug_qa: cli.debug_qa,
            max_iterations: cli.max_iterations.unwrap_or(0),
        })
        .await
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    setup_logging(cli.verbose);

    match real_main(cli).await {
        Ok(code) => ExitCode::from(code.clamp(0, 255) as u8),
        Err(e) => {
            eprintln!("autonomy: {}", e);
            ExitCode::from(e.exit_code().clamp(0, 255) as u8)
        }
    }
}
