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


use std::{sync::Arc, time::Duration};

use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;

use crate::{id::WorkerId, metrics::WORKER_STOP_REQUESTS};

/// Control handle for a registered worker.
///
/// Cloning is cheap; every clone controls the same worker.
#[derive(Clone)]
pub struct WorkerHandle {
    id:       WorkerId,
    name:     &'static str,
    notify:   Arc<Notify>,
    cancel:   CancellationToken,
    finished: CancellationToken,
}

impl WorkerHandle {
    pub(crate) const fn new(
        id: WorkerId,
        name: &'static str,
        notify: Arc<Notify>,
        cancel: CancellationToken,
        finished: CancellationToken,
    ) -> Self {
        Self {
            id,
            name,
            notify,
            cancel,
            finished,
        }
    }

    #[must_use]
    pub const fn id(&self) -> WorkerId { self.id }

    #[must_use]
    pub const fn name(&self) -> &'static str { self.name }

    /// Wakes a `Notify`-triggered worker.
    pub fn notify(&self) { self.notify.notify_one(); }

    /// Requests this worker alone to stop. Its `on_shutdown` still runs.
    pub fn stop(&self) {
        if !self.cancel.is_cancelled() {
            WORKER_STOP_REQUESTS.with_label_values(&[self.name]).inc();
        }
        self.cancel.cancel();
    }

    /// `true` once the worker task has returned, including `on_shutdown`.
    #[must_use]
    pub fn is_finished(&self) -> bool { self.finished.is_cancelled() }

    /// Waits until the worker task has returned.
    pub async fn finished(&self) { self.finished.cancelled().await }

    /// Waits up to `timeout` for the worker to finish. Returns `true` if it
    /// did.
    pub async fn wait_timeout(&self, timeout: Duration) -> bool {
        tokio::time::timeout(timeout, self.finished()).await.is_ok()
    }
}

impl std::fmt::Debug for WorkerHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkerHandle")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("finished", &self.is_finished())
            .finish_non_exhaustive()
    }
}
