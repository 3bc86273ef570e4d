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


use std::sync::Arc;

use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;

use crate::id::WorkerId;

/// Context passed to every hook of a worker.
#[derive(Clone)]
pub struct WorkerContext {
    id:           WorkerId,
    name:         &'static str,
    cancel_token: CancellationToken,
    notify:       Arc<Notify>,
}

impl WorkerContext {
    pub(crate) const fn new(
        id: WorkerId,
        name: &'static str,
        cancel_token: CancellationToken,
        notify: Arc<Notify>,
    ) -> Self {
        Self {
            id,
            name,
            cancel_token,
            notify,
        }
    }

    #[must_use]
    pub const fn id(&self) -> WorkerId { self.id }

    #[must_use]
    pub const fn name(&self) -> &'static str { self.name }

    /// Check if cancellation has been requested.
    #[must_use]
    pub fn is_cancelled(&self) -> bool { self.cancel_token.is_cancelled() }

    /// Wait for cancellation signal.
    pub async fn cancelled(&self) { self.cancel_token.cancelled().await }

    pub async fn notified(&self) { self.notify.notified().await }

    /// Token for sub-tasks; cancelled together with the worker.
    #[must_use]
    pub fn child_token(&self) -> CancellationToken { self.cancel_token.child_token() }
}
