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


use std::time::Duration;

/// When the manager calls [`Worker::work`](crate::Worker::work).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Trigger {
    /// Run once right after `on_start`, then stop.
    Once,
    /// Run on every [`WorkerHandle::notify`](crate::WorkerHandle::notify).
    Notify,
    /// Run immediately, then every period. Missed ticks are skipped, so a
    /// slow `work()` never causes a burst of catch-up runs.
    Interval(Duration),
}
