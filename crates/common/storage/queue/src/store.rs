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


use crate::{
    Result,
    key::SequenceKey,
    record::{Dequeued, QueueClass, QueueRecord, RemoveOutcome},
};

/// A durable mailbox shared by many producers and a single consumer.
///
/// Producers call [`put`](Self::put); the consumer selects with
/// [`peek`](Self::peek), delivers, and only then calls
/// [`remove`](Self::remove), so a crash between the two redelivers the
/// record instead of losing it.
pub trait QueueStore: Send + Sync {
    /// Durably enqueues a record. Readers never observe a partial record.
    fn put(&self, record: &QueueRecord) -> Result<SequenceKey>;

    /// Selects the oldest record without removing it.
    ///
    /// With `priority` set, the oldest priority record wins; when there is
    /// none, the oldest record of any class is returned. Without it only
    /// normal records are considered.
    fn peek(&self, priority: bool) -> Result<Option<Dequeued>>;

    /// Deletes a previously peeked record.
    fn remove(&self, key: &SequenceKey) -> Result<RemoveOutcome>;

    /// Selects and removes the oldest record in one step.
    fn get(&self, priority: bool) -> Result<Option<QueueRecord>> {
        let Some(Dequeued { key, record }) = self.peek(priority)? else {
            return Ok(None);
        };
        self.remove(&key)?;
        Ok(Some(record))
    }

    fn is_empty(&self, class: QueueClass) -> Result<bool> { Ok(self.len(class)? == 0) }

    /// Number of published records of `class`.
    fn len(&self, class: QueueClass) -> Result<usize>;
}
