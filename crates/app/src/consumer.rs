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


//! The single consumer: moves queued records into their destination files.

use std::{
    fs::{self, OpenOptions},
    io::{self, Write},
    path::{Path, PathBuf},
    sync::Arc,
    time::Duration,
};

use logspool_common_queue::{Dequeued, QueueClass, QueueRecord, QueueStore, RemoveOutcome};
use logspool_common_worker::{Trigger, WorkError, WorkResult, Worker, WorkerContext};
use tracing::{debug, error, info, warn};

use crate::metrics::{RECORDS_REDELIVERED, RECORDS_REDIRECTED, RECORDS_WRITTEN};

/// What a single [`ConsumerLoop::poll_once`] did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollOutcome {
    /// Nothing was queued.
    Idle,
    /// A record was appended to its destination.
    Written,
    /// The destination could not be written; the record went to the
    /// fallback file instead.
    Redirected,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DrainSummary {
    pub written:    usize,
    pub redirected: usize,
}

impl DrainSummary {
    #[must_use]
    pub const fn handled(&self) -> usize { self.written + self.redirected }
}

#[derive(Clone)]
pub struct ConsumerLoop {
    store:    Arc<dyn QueueStore>,
    fallback: PathBuf,
}

impl std::fmt::Debug for ConsumerLoop {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConsumerLoop")
            .field("fallback", &self.fallback)
            .finish_non_exhaustive()
    }
}

impl ConsumerLoop {
    pub fn new(store: Arc<dyn QueueStore>, fallback: impl Into<PathBuf>) -> Self {
        Self {
            store,
            fallback: fallback.into(),
        }
    }

    #[must_use]
    pub fn fallback(&self) -> &Path { &self.fallback }

    /// Handles at most one record, priority records first.
    ///
    /// The record file is removed only after its line reached the
    /// destination or the fallback file, so a crash in between means
    /// redelivery rather than loss.
    pub fn poll_once(&self) -> logspool_common_queue::Result<PollOutcome> {
        let priority = !self.store.is_empty(QueueClass::Priority)?;
        let Some(Dequeued { key, record }) = self.store.peek(priority)? else {
            return Ok(PollOutcome::Idle);
        };

        let outcome = match append_record(&record) {
            Ok(()) => {
                RECORDS_WRITTEN.inc();
                PollOutcome::Written
            }
            Err(e) => {
                warn!(
                    %key,
                    destination = %record.destination.display(),
                    error = %e,
                    "Destination not writable, redirecting record to fallback file"
                );
                self.report(&record, &e);
                RECORDS_REDIRECTED.inc();
                PollOutcome::Redirected
            }
        };

        match self.store.remove(&key)? {
            RemoveOutcome::Removed => {}
            RemoveOutcome::AlreadyGone => debug!(%key, "Record already removed"),
            RemoveOutcome::LeftInPlace => {
                warn!(%key, "Record could not be removed and will be delivered again");
                RECORDS_REDELIVERED.inc();
            }
        }
        Ok(outcome)
    }

    /// Polls until the queue is empty or `limit` records were handled.
    pub fn drain(&self, limit: usize) -> logspool_common_queue::Result<DrainSummary> {
        let mut summary = DrainSummary::default();
        while summary.handled() < limit {
            match self.poll_once()? {
                PollOutcome::Idle => break,
                PollOutcome::Written => summary.written += 1,
                PollOutcome::Redirected => summary.redirected += 1,
            }
        }
        Ok(summary)
    }

    /// Appends a diagnostic for `record` to the fallback file unless an
    /// identical entry is already there.
    fn report(&self, record: &QueueRecord, cause: &io::Error) {
        let entry = fallback_entry(record, cause);
        let result = match fs::read(&self.fallback) {
            Ok(existing) if String::from_utf8_lossy(&existing).contains(&entry) => {
                debug!(fallback = %self.fallback.display(), "Fallback entry already present");
                return;
            }
            Ok(_) => append(&self.fallback, &entry),
            Err(e) if e.kind() == io::ErrorKind::NotFound => append(&self.fallback, &entry),
            Err(e) => Err(e),
        };
        if let Err(e) = result {
            error!(
                fallback = %self.fallback.display(),
                message = %record.message,
                error = %e,
                "Failed to write fallback file, dropping record"
            );
        }
    }
}

fn fallback_entry(record: &QueueRecord, cause: &io::Error) -> String {
    format!(
        "Failed to append a log record to {}\n\"{}\"\nError: {cause}\n",
        record.destination.display(),
        record.message,
    )
}

fn record_entry(record: &QueueRecord) -> String {
    let mut entry = record.message.clone();
    entry.push('\n');
    if let Some(detail) = &record.failure_detail {
        entry.push_str(detail);
        if !detail.ends_with('\n') {
            entry.push('\n');
        }
    }
    entry
}

fn append_record(record: &QueueRecord) -> io::Result<()> {
    append(&record.destination, &record_entry(record))
}

/// Creates the parent directory, then appends `entry` with one write.
fn append(path: &Path, entry: &str) -> io::Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    let mut file = OpenOptions::new().create(true).append(true).open(path)?;
    file.write_all(entry.as_bytes())
}

/// Runs a [`ConsumerLoop`] under the worker manager.
///
/// Each tick drains until the queue is idle. After cancellation it waits
/// `final_drain_grace` for late producers and drains once more.
#[derive(Debug, bon::Builder)]
pub struct ConsumerWorker {
    consumer: ConsumerLoop,

    #[builder(default = Duration::from_secs(10))]
    idle_interval: Duration,

    #[builder(default = Duration::from_secs(1))]
    final_drain_grace: Duration,

    #[builder(default = 10_000)]
    final_drain_limit: usize,
}

impl ConsumerWorker {
    pub const NAME: &'static str = "logspool-consumer";
}

#[async_trait::async_trait]
impl Worker for ConsumerWorker {
    fn name(&self) -> &'static str { Self::NAME }

    fn trigger(&self) -> Trigger { Trigger::Interval(self.idle_interval) }

    fn is_blocking(&self) -> bool { true }

    async fn work(&mut self, ctx: &WorkerContext) -> WorkResult {
        while !ctx.is_cancelled() {
            match self.consumer.poll_once() {
                Ok(PollOutcome::Idle) => break,
                Ok(_) => {}
                Err(e) if e.is_queue_dir_missing() => {
                    return Err(WorkError::fatal_with_source("queue directory is gone", e));
                }
                Err(e) => return Err(WorkError::transient_with_source("poll failed", e)),
            }
        }
        Ok(())
    }

    async fn on_shutdown(&mut self, ctx: &WorkerContext) -> WorkResult {
        if !ctx.is_cancelled() {
            return Ok(());
        }
        tokio::time::sleep(self.final_drain_grace).await;
        let summary = self
            .consumer
            .drain(self.final_drain_limit)
            .map_err(|e| WorkError::transient_with_source("final drain failed", e))?;
        info!(
            written = summary.written,
            redirected = summary.redirected,
            "Final drain complete"
        );
        Ok(())
    }
}
