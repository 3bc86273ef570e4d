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


//! Start and stop of the pipeline.
//!
//! [`Pipeline::start`] archives the previous run's `latest.log` and brings
//! up exactly one consumer, either as a child process or as a worker on a
//! private runtime. [`Pipeline::shutdown`] stops it and drains whatever
//! is left from the calling thread.

use std::{
    path::{Path, PathBuf},
    process::{Child, Command, Stdio},
    sync::Arc,
    time::{Duration, Instant},
};

use chrono::Local;
use logspool_common_queue::{DirQueue, QueueStore};
use logspool_common_runtime::{Runtime, RuntimeOptions};
use logspool_common_util::{Claim, PidFile, is_process_alive};
use logspool_common_worker::{Manager, WorkerConfig, WorkerHandle};
use snafu::ResultExt;
use tracing::{error, info, warn};

use crate::{
    config::{PipelineConfig, SpawnMode},
    consumer::{ConsumerLoop, ConsumerWorker},
    error::{PidFileSnafu, QueueSnafu, Result, RuntimeSnafu, SpawnSnafu, WaitSnafu},
    format::LineFormat,
    logger::Logger,
    rotation::{StampFormat, resolve_destination, rotate_latest},
};

/// Name of the file, inside the queue directory, naming the live consumer.
pub const PID_FILE_NAME: &str = "logspool-consumer.pid";

const CHILD_POLL: Duration = Duration::from_millis(20);

/// The consumer a [`Pipeline`] started or found.
pub struct ConsumerHandle {
    kind: HandleKind,
}

enum HandleKind {
    /// A consumer process spawned by this pipeline.
    Child { child: Child, pid_file: PidFile },
    /// A consumer process some other pipeline started. Never stopped from
    /// here.
    Attached { pid: u32 },
    InProcess {
        manager: Manager,
        worker:  WorkerHandle,
        runtime: Arc<Runtime>,
    },
}

impl std::fmt::Debug for ConsumerHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let kind = match &self.kind {
            HandleKind::Child { .. } => "child",
            HandleKind::Attached { .. } => "attached",
            HandleKind::InProcess { .. } => "in_process",
        };
        f.debug_struct("ConsumerHandle")
            .field("kind", &kind)
            .field("pid", &self.pid())
            .finish()
    }
}

impl ConsumerHandle {
    /// Consumer process id. `None` for an in-process consumer.
    #[must_use]
    pub fn pid(&self) -> Option<u32> {
        match &self.kind {
            HandleKind::Child { child, .. } => Some(child.id()),
            HandleKind::Attached { pid } => Some(*pid),
            HandleKind::InProcess { .. } => None,
        }
    }

    /// `true` when the handle refers to another pipeline's consumer.
    #[must_use]
    pub const fn is_attached(&self) -> bool { matches!(self.kind, HandleKind::Attached { .. }) }

    #[must_use]
    pub fn is_running(&self) -> bool {
        match &self.kind {
            HandleKind::Child { child, .. } => is_process_alive(child.id()),
            HandleKind::Attached { pid } => is_process_alive(*pid),
            HandleKind::InProcess { worker, .. } => !worker.is_finished(),
        }
    }

    /// Stops a consumer this pipeline owns, consuming the handle.
    ///
    /// A child gets SIGTERM (where available) and is killed once `timeout`
    /// passes. An in-process worker is cancelled and given `timeout` to
    /// finish before the manager's own shutdown timeout applies. Returns
    /// `false` for an attached consumer, which is left running.
    ///
    /// Safe to call from inside an async runtime; the blocking part then
    /// runs on a scoped thread.
    pub fn stop(self, timeout: Duration) -> Result<bool> {
        match self.kind {
            HandleKind::Child { child, pid_file } => {
                let pid = child.id();
                stop_child(child, timeout)?;
                pid_file.release(pid).context(PidFileSnafu)?;
                Ok(true)
            }
            HandleKind::Attached { pid } => {
                info!(pid, "Consumer belongs to another pipeline, leaving it running");
                Ok(false)
            }
            HandleKind::InProcess {
                manager,
                worker,
                runtime,
            } => {
                if tokio::runtime::Handle::try_current().is_ok() {
                    // Blocking on a runtime from inside another one panics.
                    let joined = std::thread::scope(|s| {
                        s.spawn(move || stop_in_process(manager, worker, runtime, timeout))
                            .join()
                    });
                    if joined.is_err() {
                        error!("In-process consumer shutdown panicked");
                    }
                } else {
                    stop_in_process(manager, worker, runtime, timeout);
                }
                Ok(true)
            }
        }
    }
}

fn stop_in_process(
    manager: Manager,
    worker: WorkerHandle,
    runtime: Arc<Runtime>,
    timeout: Duration,
) {
    worker.stop();
    if !runtime.block_on(worker.wait_timeout(timeout)) {
        warn!(?timeout, "In-process consumer still running after timeout");
    }
    let summary = runtime.block_on(manager.shutdown());
    info!(?summary, "In-process consumer stopped");
    if let Ok(runtime) = Arc::try_unwrap(runtime) {
        runtime.shutdown_timeout(timeout);
    }
}

fn stop_child(mut child: Child, timeout: Duration) -> Result<()> {
    let pid = child.id();
    terminate(pid)?;

    let deadline = Instant::now() + timeout;
    loop {
        if let Some(status) = child.try_wait().context(WaitSnafu { pid })? {
            info!(pid, %status, "Consumer process exited");
            return Ok(());
        }
        if Instant::now() >= deadline {
            break;
        }
        std::thread::sleep(CHILD_POLL);
    }

    warn!(pid, ?timeout, "Consumer process did not exit in time, killing it");
    child.kill().context(WaitSnafu { pid })?;
    child.wait().context(WaitSnafu { pid })?;
    Ok(())
}

#[cfg(unix)]
fn terminate(pid: u32) -> Result<()> {
    use nix::{
        errno::Errno,
        sys::signal::{Signal, kill},
        unistd::Pid,
    };

    let Ok(raw) = i32::try_from(pid) else {
        return Ok(());
    };
    match kill(Pid::from_raw(raw), Signal::SIGTERM) {
        Err(Errno::ESRCH) => Ok(()),
        other => other.context(crate::error::SignalSnafu { pid }),
    }
}

#[cfg(not(unix))]
fn terminate(_pid: u32) -> Result<()> { Ok(()) }

/// Owns the queue, the destination and at most one consumer.
///
/// Dropping a started pipeline shuts it down.
pub struct Pipeline {
    config:      PipelineConfig,
    store:       Arc<DirQueue>,
    format:      LineFormat,
    stamp:       StampFormat,
    destination: PathBuf,
    pid_file:    PidFile,
    rotated:     bool,
    handle:      Option<ConsumerHandle>,
}

impl std::fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pipeline")
            .field("queue_dir", &self.store.dir())
            .field("destination", &self.destination)
            .field("handle", &self.handle)
            .finish_non_exhaustive()
    }
}

impl Pipeline {
    pub fn new(config: PipelineConfig) -> Result<Self> {
        let format = config.line_format()?;
        let stamp = config.stamp_format()?;
        let destination = resolve_destination(
            &config.destination,
            config.use_latest_alias,
            &stamp.render(&Local::now()),
        );
        let store = Arc::new(DirQueue::open(config.queue_config()));
        let pid_file = PidFile::new(config.queue_dir.join(PID_FILE_NAME));
        Ok(Self {
            config,
            store,
            format,
            stamp,
            destination,
            pid_file,
            rotated: false,
            handle: None,
        })
    }

    #[must_use]
    pub const fn config(&self) -> &PipelineConfig { &self.config }

    /// File records are written to.
    #[must_use]
    pub fn destination(&self) -> &Path { &self.destination }

    #[must_use]
    pub fn store(&self) -> Arc<dyn QueueStore> { self.store.clone() }

    /// A producer handle. Usable before `start`; records simply wait in
    /// the queue.
    #[must_use]
    pub fn logger(&self) -> Logger {
        Logger::new(self.store(), self.destination.clone(), self.format.clone())
    }

    /// A consumer loop over this pipeline's queue, for synchronous drains.
    #[must_use]
    pub fn consumer(&self) -> ConsumerLoop {
        ConsumerLoop::new(self.store(), self.config.fallback_file.clone())
    }

    #[must_use]
    pub const fn handle(&self) -> Option<&ConsumerHandle> { self.handle.as_ref() }

    /// Starts the consumer, or returns the one already started.
    pub fn start(&mut self) -> Result<&ConsumerHandle> {
        let handle = match self.handle.take() {
            Some(handle) => handle,
            None => self.launch()?,
        };
        Ok(self.handle.insert(handle))
    }

    fn launch(&mut self) -> Result<ConsumerHandle> {
        if !self.rotated {
            if self.config.use_latest_alias {
                rotate_latest(&self.destination, &self.stamp)?;
            }
            self.rotated = true;
        }
        self.store.create_dir().context(QueueSnafu)?;

        let kind = match &self.config.spawn {
            SpawnMode::Process { program } => self.launch_process(program)?,
            SpawnMode::InProcess => self.launch_in_process()?,
        };
        Ok(ConsumerHandle { kind })
    }

    fn launch_process(&self, program: &Path) -> Result<HandleKind> {
        if let Some(pid) = self.pid_file.live_pid().context(PidFileSnafu)? {
            info!(pid, queue_dir = %self.store.dir().display(), "Attaching to running consumer");
            return Ok(HandleKind::Attached { pid });
        }

        let mut child = Command::new(program)
            .args(self.consume_args())
            .stdin(Stdio::null())
            .spawn()
            .context(SpawnSnafu { program })?;
        let pid = child.id();
        match self.pid_file.claim(pid) {
            Ok(Claim::Claimed) => {}
            Ok(Claim::Held(holder)) => {
                info!(pid, holder, "Another pipeline claimed the queue first, attaching");
                if let Err(e) = child.kill().and_then(|()| child.wait().map(drop)) {
                    warn!(pid, error = %e, "Failed to stop surplus consumer");
                }
                return Ok(HandleKind::Attached { pid: holder });
            }
            Err(e) => error!(pid, error = %e, "Failed to record consumer pid"),
        }
        info!(pid, program = %program.display(), "Consumer process started");
        Ok(HandleKind::Child {
            child,
            pid_file: self.pid_file.clone(),
        })
    }

    fn consume_args(&self) -> Vec<String> {
        let c = &self.config;
        vec![
            "--queue-dir".into(),
            c.queue_dir.display().to_string(),
            "--fallback-file".into(),
            c.fallback_file.display().to_string(),
            "--idle-interval-ms".into(),
            c.idle_interval_ms.to_string(),
            "consume".into(),
            "--delete-retry-limit".into(),
            c.delete_retry_limit.to_string(),
            "--delete-backoff-ms".into(),
            c.delete_backoff_ms.to_string(),
            "--final-drain-grace-ms".into(),
            c.final_drain_grace_ms.to_string(),
            "--final-drain-limit".into(),
            c.final_drain_limit.to_string(),
        ]
    }

    fn launch_in_process(&self) -> Result<HandleKind> {
        let runtime = Arc::new(
            RuntimeOptions::builder()
                .thread_name("logspool-consumer")
                .worker_threads(1)
                .max_blocking_threads(2)
                .build()
                .create()
                .context(RuntimeSnafu)?,
        );
        let mut manager = Manager::start(
            WorkerConfig::builder()
                .runtime(runtime.clone())
                .shutdown_timeout(self.config.shutdown_timeout())
                .build(),
        )
        .context(RuntimeSnafu)?;
        let worker = manager.register(
            ConsumerWorker::builder()
                .consumer(self.consumer())
                .idle_interval(self.config.idle_interval())
                .final_drain_grace(self.config.final_drain_grace())
                .final_drain_limit(self.config.final_drain_limit)
                .build(),
        );
        info!(queue_dir = %self.store.dir().display(), "In-process consumer started");
        Ok(HandleKind::InProcess {
            manager,
            worker,
            runtime,
        })
    }

    /// Stops the consumer and drains the rest of the queue here.
    ///
    /// Returns `true` when a consumer owned by this pipeline was stopped.
    /// An attached consumer keeps running and nothing is drained.
    pub fn shutdown(&mut self) -> Result<bool> {
        let Some(handle) = self.handle.take() else {
            return Ok(false);
        };
        if !handle.stop(self.config.shutdown_timeout())? {
            return Ok(false);
        }

        match self.consumer().drain(self.config.final_drain_limit) {
            Ok(summary) if summary.handled() > 0 => info!(
                written = summary.written,
                redirected = summary.redirected,
                "Drained remaining records"
            ),
            Ok(_) => {}
            Err(e) if e.is_queue_dir_missing() => {
                warn!(error = %e, "Queue directory gone, nothing to drain");
            }
            Err(e) => return Err(e).context(QueueSnafu),
        }
        Ok(true)
    }
}

impl Drop for Pipeline {
    fn drop(&mut self) {
        if self.handle.is_some() {
            if let Err(e) = self.shutdown() {
                error!(error = %e, "Pipeline shutdown on drop failed");
            }
        }
    }
}
