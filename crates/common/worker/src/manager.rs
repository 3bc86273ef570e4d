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


use std::{sync::Arc, time::Instant};

use logspool_common_runtime::Runtime;
use tokio::{sync::Notify, task::JoinSet};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::{
    config::WorkerConfig,
    context::WorkerContext,
    err::{WorkError, WorkResult},
    handle::WorkerHandle,
    id::WorkerId,
    metrics::{
        WORKER_ACTIVE, WORKER_EXECUTION_DURATION_SECONDS, WORKER_EXECUTION_ERRORS,
        WORKER_EXECUTIONS, WORKER_FAILED, WORKER_HOOK_ERRORS, WORKER_STARTED, WORKER_STOPPED,
    },
    trigger::Trigger,
    worker::Worker,
};

/// Outcome of [`Manager::shutdown`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ShutdownSummary {
    /// Workers that returned on their own after cancellation.
    pub stopped: usize,
    /// Workers that ended with a fatal error.
    pub failed:  usize,
    /// Workers still running when the timeout hit.
    pub aborted: usize,
}

impl ShutdownSummary {
    #[must_use]
    pub const fn total(&self) -> usize { self.stopped + self.failed + self.aborted }
}

/// Manages lifecycle of background workers.
pub struct Manager {
    cancel_token:     CancellationToken,
    runtime:          Arc<Runtime>,
    shutdown_timeout: std::time::Duration,
    joins:            JoinSet<WorkResult>,
}

impl Manager {
    /// Create a manager. Resolves the shared background runtime when the
    /// config does not carry one.
    pub fn start(config: WorkerConfig) -> logspool_common_runtime::Result<Self> {
        let runtime = match config.runtime() {
            Some(runtime) => runtime,
            None => logspool_common_runtime::background_runtime()?,
        };
        Ok(Self {
            cancel_token: CancellationToken::new(),
            runtime,
            shutdown_timeout: config.shutdown_timeout(),
            joins: JoinSet::new(),
        })
    }

    /// Register a worker and start it immediately.
    pub fn register<W>(&mut self, mut worker: W) -> WorkerHandle
    where
        W: Worker,
    {
        let id = WorkerId::new();
        let name = worker.name();
        let trigger = worker.trigger();
        let blocking = worker.is_blocking();
        let notify = Arc::new(Notify::new());
        let cancel = self.cancel_token.child_token();
        let finished = CancellationToken::new();
        let ctx = WorkerContext::new(id, name, cancel.clone(), notify.clone());

        let done = finished.clone();
        let task = async move {
            // cancels `finished` on return and on abort
            let _done = done.drop_guard();

            info!(worker = name, %id, ?trigger, "Worker starting");
            WORKER_STARTED.with_label_values(&[name]).inc();
            WORKER_ACTIVE.with_label_values(&[name]).set(1);

            if let Err(e) = worker.on_start(&ctx).await {
                error!(worker = name, %id, error = %e, "Worker failed during on_start");
                WORKER_HOOK_ERRORS
                    .with_label_values(&[name, "on_start"])
                    .inc();
                WORKER_ACTIVE.with_label_values(&[name]).set(0);
                return Err(e);
            }

            let result = Self::run_loop(&mut worker, &ctx, trigger).await;

            if let Err(e) = worker.on_shutdown(&ctx).await {
                error!(worker = name, %id, error = %e, "Worker failed during on_shutdown");
                WORKER_HOOK_ERRORS
                    .with_label_values(&[name, "on_shutdown"])
                    .inc();
            }

            match &result {
                Ok(()) => {
                    info!(worker = name, %id, "Worker stopped gracefully");
                    WORKER_STOPPED.with_label_values(&[name]).inc();
                }
                Err(e) => {
                    error!(worker = name, %id, error = %e, "Worker stopped by fatal error");
                    WORKER_FAILED.with_label_values(&[name]).inc();
                }
            }
            WORKER_ACTIVE.with_label_values(&[name]).set(0);
            result
        };

        if blocking {
            let handle = self.runtime.handle().clone();
            self.joins
                .spawn_blocking_on(move || handle.block_on(task), self.runtime.handle());
        } else {
            self.joins.spawn_on(task, self.runtime.handle());
        }

        WorkerHandle::new(id, name, notify, cancel, finished)
    }

    async fn run_loop<W>(worker: &mut W, ctx: &WorkerContext, trigger: Trigger) -> WorkResult
    where
        W: Worker,
    {
        match trigger {
            Trigger::Once => {
                if !ctx.is_cancelled() {
                    Self::execute(worker, ctx).await?;
                }
            }
            Trigger::Notify => loop {
                tokio::select! {
                    () = ctx.notified() => Self::execute(worker, ctx).await?,
                    () = ctx.cancelled() => break,
                }
            },
            Trigger::Interval(period) => {
                let mut interval = tokio::time::interval(period);
                interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
                loop {
                    tokio::select! {
                        _ = interval.tick() => Self::execute(worker, ctx).await?,
                        () = ctx.cancelled() => break,
                    }
                }
            }
        }
        Ok(())
    }

    /// Runs `work()` once. Transient errors are absorbed here; fatal ones
    /// end the run loop.
    async fn execute<W>(worker: &mut W, ctx: &WorkerContext) -> WorkResult
    where
        W: Worker,
    {
        let name = ctx.name();
        let start = Instant::now();
        match worker.work(ctx).await {
            Ok(()) => {
                WORKER_EXECUTIONS.with_label_values(&[name]).inc();
                WORKER_EXECUTION_DURATION_SECONDS
                    .with_label_values(&[name])
                    .observe(start.elapsed().as_secs_f64());
                Ok(())
            }
            Err(e) if e.is_transient() => {
                warn!(worker = name, error = %e, "Worker execution failed, retrying on next trigger");
                WORKER_EXECUTION_ERRORS
                    .with_label_values(&[name, "transient"])
                    .inc();
                Ok(())
            }
            Err(e) => {
                WORKER_EXECUTION_ERRORS
                    .with_label_values(&[name, "fatal"])
                    .inc();
                Err(e)
            }
        }
    }

    /// Cancels all workers and waits up to the configured timeout.
    ///
    /// Workers still running at the deadline are aborted. Blocking workers
    /// cannot be interrupted mid-call; they are detached and finish on
    /// their own.
    pub async fn shutdown(mut self) -> ShutdownSummary {
        info!(workers = self.joins.len(), "Shutting down worker manager");
        self.cancel_token.cancel();

        let deadline = tokio::time::Instant::now() + self.shutdown_timeout;
        let mut summary = ShutdownSummary::default();

        loop {
            tokio::select! {
                result = self.joins.join_next() => match result {
                    Some(Ok(Ok(()))) => summary.stopped += 1,
                    Some(Ok(Err(e))) => {
                        summary.failed += 1;
                        record_failure(&e);
                    }
                    Some(Err(e)) => {
                        if e.is_cancelled() {
                            summary.aborted += 1;
                        } else {
                            summary.failed += 1;
                            error!(error = %e, "Worker task panicked");
                        }
                    }
                    None => break,
                },
                () = tokio::time::sleep_until(deadline) => {
                    error!(
                        timeout = ?self.shutdown_timeout,
                        remaining = self.joins.len(),
                        "Shutdown timeout reached, aborting remaining workers"
                    );
                    summary.aborted += self.joins.len();
                    self.joins.abort_all();
                    self.joins.detach_all();
                    break;
                }
            }
        }

        if summary.aborted > 0 {
            warn!(?summary, "Worker manager shutdown complete");
        } else {
            info!(?summary, "Worker manager shutdown complete");
        }
        summary
    }
}

fn record_failure(e: &WorkError) { error!(error = %e, "Worker ended with error"); }
