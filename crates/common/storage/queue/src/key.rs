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


//! Record keys and file naming.
//!
//! A record file name embeds everything a reader needs to order and filter
//! records without opening them:
//!
//! ```text
//! qitem-{class}-{nanos:020}-{pid:010}-{counter:020}.json
//! ```
//!
//! Zero padding makes lexical order equal key order. The pid and the
//! process-wide counter keep names unique when two producers hit the same
//! clock instant.

use std::{
    fmt,
    sync::atomic::{AtomicU64, Ordering},
    time::{SystemTime, UNIX_EPOCH},
};

use crate::record::RecordClass;

const PREFIX: &str = "qitem";
const EXTENSION: &str = ".json";

static COUNTER: AtomicU64 = AtomicU64::new(0);

/// Ordering key of a queued record.
///
/// Fields are compared in declaration order; `class` never decides ordering
/// because `(nanos, pid, counter)` is already unique.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SequenceKey {
    /// Wall-clock nanoseconds since the Unix epoch at enqueue time.
    pub nanos:   u64,
    /// Producer process id.
    pub pid:     u32,
    /// Process-wide enqueue counter.
    pub counter: u64,
    pub class:   RecordClass,
}

impl SequenceKey {
    /// Generates a fresh key for a record of `class` enqueued now.
    #[must_use]
    pub fn next(class: RecordClass) -> Self {
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| u64::try_from(d.as_nanos()).unwrap_or(u64::MAX))
            .unwrap_or_default();
        Self {
            nanos,
            pid: std::process::id(),
            counter: COUNTER.fetch_add(1, Ordering::Relaxed),
            class,
        }
    }

    /// File name of the record stored under this key.
    #[must_use]
    pub fn file_name(&self) -> String {
        format!(
            "{PREFIX}-{}-{:020}-{:010}-{:020}{EXTENSION}",
            self.class.marker(),
            self.nanos,
            self.pid,
            self.counter
        )
    }

    /// Name of the hidden file a producer writes before publishing.
    #[must_use]
    pub fn temp_file_name(&self) -> String { format!(".{}.tmp", self.file_name()) }

    /// Parses a record file name. Returns `None` for anything that is not a
    /// published record (temp files, pid files, subdirectories).
    #[must_use]
    pub fn parse(name: &str) -> Option<Self> {
        let stem = name.strip_prefix(PREFIX)?.strip_suffix(EXTENSION)?;
        let mut parts = stem.strip_prefix('-')?.split('-');

        let mut marker = parts.next()?.chars();
        let class = RecordClass::from_marker(marker.next()?)?;
        if marker.next().is_some() {
            return None;
        }

        let nanos = parts.next()?.parse().ok()?;
        let pid = parts.next()?.parse().ok()?;
        let counter = parts.next()?.parse().ok()?;
        if parts.next().is_some() {
            return None;
        }

        Some(Self {
            nanos,
            pid,
            counter,
            class,
        })
    }
}

impl fmt::Display for SequenceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{}:{}:{}",
            self.class.marker(),
            self.nanos,
            self.pid,
            self.counter
        )
    }
}
