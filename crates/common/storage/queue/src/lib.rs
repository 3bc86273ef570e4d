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


//! Durable multi-producer queue backed by a directory of record files.
//!
//! ```ignore
//! let queue = QueueBuilder::new("logs/.cache").build();
//! queue.put(&QueueRecord::new("INFO - boot", "logs/latest.log"))?;
//!
//! while let Some(Dequeued { key, record }) = queue.peek(true)? {
//!     deliver(&record)?;
//!     queue.remove(&key)?;
//! }
//! ```

mod builder;
mod config;
mod dir;
mod error;
mod key;
mod record;
mod store;

pub use builder::QueueBuilder;
pub use config::{CORRUPT_DIR, QueueConfig};
pub use dir::DirQueue;
pub use error::{QueueError, Result};
pub use key::SequenceKey;
pub use record::{Dequeued, QueueClass, QueueRecord, RecordClass, RemoveOutcome};
pub use store::QueueStore;
