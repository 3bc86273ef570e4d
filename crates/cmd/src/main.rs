// Copyright 2025 Crrow
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//      http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.


use std::{panic::Location, path::PathBuf};

use clap::{Args, Parser, Subcommand};
use logspool_app::{ConsumerWorker, Failure, Level, PID_FILE_NAME, Pipeline, PipelineConfig};
use logspool_common_queue::{DirQueue, QueueClass, QueueStore};
use logspool_common_telemetry::{LoggingOptions, WorkerGuard, init_global_logging, set_panic_hook};
use logspool_common_util::{Claim, PidFile};
use logspool_common_worker::{Manager, WorkerConfig};
use snafu::{ResultExt, Whatever, whatever};
use tracing::{info, warn};

mod build_info;

#[derive(Debug, Parser)]
#[clap(
name = "logspool",
about = "Durable multi-producer log spool",
author = build_info::AUTHOR,
version = build_info::FULL_VERSION,
long_version = build_info::LONG_VERSION)]
struct Cli {
    #[command(flatten)]
    global: GlobalArgs,

    #[command(subcommand)]
    commands: Commands,
}

/// Options shared by every subcommand. Command-line values override the
/// config file.
#[derive(Debug, Clone, Args)]
struct GlobalArgs {
    /// TOML pipeline config.
    #[arg(long, global = true, env = "LOGSPOOL_CONFIG")]
    config: Option<PathBuf>,

    #[arg(long, global = true, env = "LOGSPOOL_QUEUE_DIR")]
    queue_dir: Option<PathBuf>,

    #[arg(long, global = true, env = "LOGSPOOL_FALLBACK_FILE")]
    fallback_file: Option<PathBuf>,

    /// Destination template, `%TIMENOW%` is replaced with the start time.
    #[arg(long, global = true, env = "LOGSPOOL_DESTINATION")]
    destination: Option<String>,

    #[arg(long, global = true, env = "LOGSPOOL_IDLE_INTERVAL_MS")]
    idle_interval_ms: Option<u64>,

    /// Filter for logspool's own diagnostics, e.g. `debug`.
    #[arg(long, global = true, env = "LOGSPOOL_DIAGNOSTICS")]
    diagnostics: Option<String>,
}

impl GlobalArgs {
    fn pipeline_config(&self) -> Result<PipelineConfig, Whatever> {
        let mut config = match &self.config {
            Some(path) => PipelineConfig::from_toml_file(path)
                .with_whatever_context(|_| format!("Failed to load {}", path.display()))?,
            None => PipelineConfig::default(),
        };
        if let Some(dir) = &self.queue_dir {
            config.queue_dir.clone_from(dir);
        }
        if let Some(file) = &self.fallback_file {
            config.fallback_file.clone_from(file);
        }
        if let Some(destination) = &self.destination {
            config.destination.clone_from(destination);
        }
        if let Some(ms) = self.idle_interval_ms {
            config.idle_interval_ms = ms;
        }
        Ok(config)
    }

    /// Diagnostics go to stderr; stdout belongs to command output.
    fn init_logging(&self) -> Result<Vec<WorkerGuard>, Whatever> {
        let opts = LoggingOptions::builder()
            .maybe_level(self.diagnostics.clone())
            .use_stderr(true)
            .build();
        let guards = init_global_logging("logspool", &opts)
            .whatever_context("Failed to initialise diagnostics")?;
        set_panic_hook();
        Ok(guards)
    }
}

#[derive(Debug, Subcommand)]
enum Commands {
    Consume(ConsumeArgs),
    Log(LogArgs),
    Drain(DrainArgs),
    Status(StatusArgs),
}

#[derive(Debug, Clone, Args)]
#[command(flatten_help = true)]
#[command(long_about = r"

Runs the consumer in the foreground until SIGINT or SIGTERM, then drains
what is left. Exits without doing anything if another consumer already
serves the queue directory.
Examples:

logspool consume --queue-dir logs/.cache

")]
struct ConsumeArgs {
    #[arg(long)]
    delete_retry_limit: Option<u32>,

    #[arg(long)]
    delete_backoff_ms: Option<u64>,

    #[arg(long)]
    final_drain_grace_ms: Option<u64>,

    #[arg(long)]
    final_drain_limit: Option<usize>,
}

impl ConsumeArgs {
    async fn run(&self, global: &GlobalArgs) -> Result<(), Whatever> {
        let mut config = global.pipeline_config()?;
        if let Some(limit) = self.delete_retry_limit {
            config.delete_retry_limit = limit;
        }
        if let Some(ms) = self.delete_backoff_ms {
            config.delete_backoff_ms = ms;
        }
        if let Some(ms) = self.final_drain_grace_ms {
            config.final_drain_grace_ms = ms;
        }
        if let Some(limit) = self.final_drain_limit {
            config.final_drain_limit = limit;
        }

        let pipeline = Pipeline::new(config.clone()).whatever_context("Invalid pipeline config")?;
        let queue = DirQueue::open(config.queue_config());
        queue
            .create_dir()
            .whatever_context("Failed to create queue directory")?;

        let me = std::process::id();
        let pid_file = PidFile::new(config.queue_dir.join(PID_FILE_NAME));
        if let Claim::Held(pid) = pid_file
            .claim(me)
            .whatever_context("Failed to claim consumer pid file")?
        {
            info!(pid, "Another consumer serves this queue, exiting");
            return Ok(());
        }

        let mut manager = Manager::start(
            WorkerConfig::builder()
                .shutdown_timeout(config.shutdown_timeout())
                .build(),
        )
        .whatever_context("Failed to start worker manager")?;
        let worker = manager.register(
            ConsumerWorker::builder()
                .consumer(pipeline.consumer())
                .idle_interval(config.idle_interval())
                .final_drain_grace(config.final_drain_grace())
                .final_drain_limit(config.final_drain_limit)
                .build(),
        );
        info!(pid = me, queue_dir = %config.queue_dir.display(), "Consumer running");

        tokio::select! {
            () = shutdown_signal() => info!("Shutdown signal received"),
            () = worker.finished() => warn!("Consumer stopped on its own"),
        }
        let summary = manager.shutdown().await;

        if let Err(e) = pid_file.release(me) {
            warn!(error = %e, "Failed to remove consumer pid file");
        }
        if summary.failed > 0 {
            whatever!("Consumer stopped after a fatal error");
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Args)]
#[command(flatten_help = true)]
#[command(long_about = r"

Queues one record for the running consumer.
Examples:

logspool log --level info 'backup finished'
logspool log --level error --failure 'disk full' 'backup failed'

")]
struct LogArgs {
    /// info, warning, debug or error.
    #[arg(long, default_value = "info")]
    level: Level,

    /// Failure description, required for `error`.
    #[arg(long)]
    failure: Option<String>,

    message: String,
}

impl LogArgs {
    fn run(&self, global: &GlobalArgs) -> Result<(), Whatever> {
        let pipeline = Pipeline::new(global.pipeline_config()?)
            .whatever_context("Invalid pipeline config")?;
        pipeline
            .logger()
            .log_at(
                self.level,
                Location::caller(),
                &self.message,
                self.failure.clone().map(Failure::from),
            )
            .whatever_context("Failed to queue record")
    }
}

#[derive(Debug, Clone, Args)]
#[command(flatten_help = true)]
#[command(long_about = r"

Writes every queued record to its destination now, in this process.
Examples:

logspool drain

")]
struct DrainArgs {
    /// Stop after this many records.
    #[arg(long, default_value_t = usize::MAX)]
    limit: usize,
}

impl DrainArgs {
    fn run(&self, global: &GlobalArgs) -> Result<(), Whatever> {
        let config = global.pipeline_config()?;
        if let Ok(Some(pid)) = PidFile::new(config.queue_dir.join(PID_FILE_NAME)).live_pid() {
            warn!(pid, "A consumer is running; records may be written by both");
        }
        let pipeline = Pipeline::new(config).whatever_context("Invalid pipeline config")?;
        let summary = pipeline
            .consumer()
            .drain(self.limit)
            .whatever_context("Drain failed")?;
        println!(
            "written: {}, redirected: {}",
            summary.written, summary.redirected
        );
        Ok(())
    }
}

#[derive(Debug, Clone, Args)]
#[command(flatten_help = true)]
#[command(long_about = r"

Prints queued record counts and the consumer pid, if one is running.
Examples:

logspool status

")]
struct StatusArgs {}

impl StatusArgs {
    fn run(&self, global: &GlobalArgs) -> Result<(), Whatever> {
        let config = global.pipeline_config()?;
        let queue = DirQueue::open(config.queue_config());
        let (priority, normal) = match (
            queue.len(QueueClass::Priority),
            queue.len(QueueClass::Normal),
        ) {
            (Ok(p), Ok(n)) => (p, n),
            (Err(e), _) | (_, Err(e)) if e.is_queue_dir_missing() => (0, 0),
            (Err(e), _) | (_, Err(e)) => {
                return Err(e).whatever_context("Failed to read queue");
            }
        };
        let consumer = PidFile::new(config.queue_dir.join(PID_FILE_NAME))
            .live_pid()
            .whatever_context("Failed to read consumer pid file")?;

        println!("queue:    {}", config.queue_dir.display());
        println!("priority: {priority}");
        println!("normal:   {normal}");
        match consumer {
            Some(pid) => println!("consumer: running (pid {pid})"),
            None => println!("consumer: stopped"),
        }
        Ok(())
    }
}

/// Resolves on SIGINT, or SIGTERM on Unix.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Failed to listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }
}

#[tokio::main]
async fn main() -> Result<(), Whatever> {
    let cli = Cli::parse();
    let _guards = cli.global.init_logging()?;
    match &cli.commands {
        Commands::Consume(args) => args.run(&cli.global).await,
        Commands::Log(args) => args.run(&cli.global),
        Commands::Drain(args) => args.run(&cli.global),
        Commands::Status(args) => args.run(&cli.global),
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use clap::CommandFactory;

    use super::*;

    #[test]
    fn test_cli_definition() { Cli::command().debug_assert(); }

    #[test]
    fn test_flags_override_config() {
        let cli = Cli::try_parse_from([
            "logspool",
            "status",
            "--queue-dir",
            "/tmp/q",
            "--idle-interval-ms",
            "25",
        ])
        .unwrap();
        let config = cli.global.pipeline_config().unwrap();
        assert_eq!(config.queue_dir, PathBuf::from("/tmp/q"));
        assert_eq!(config.idle_interval(), Duration::from_millis(25));
        assert_eq!(config.fallback_file, PathBuf::from("logspool_error.log"));
    }

    #[test]
    fn test_log_level_parsing() {
        let cli = Cli::try_parse_from(["logspool", "log", "--level", "warn", "hello"]).unwrap();
        let Commands::Log(args) = cli.commands else {
            panic!("expected log command");
        };
        assert_eq!(args.level, Level::Warning);
        assert_eq!(args.message, "hello");

        assert!(Cli::try_parse_from(["logspool", "log", "--level", "loud", "x"]).is_err());
    }
}
