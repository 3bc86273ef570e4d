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


//! Record types and on-disk body format.
//!
//! Each queued record lives in its own file. The body is a small JSON
//! object so that a record is self-describing: one queue directory can
//! serve any number of destination files.
//!
//! ```text
//! {
//!     "message": "INFO - 2026-01-14, 09.30 AM - src/main.rs:12 | boot",
//!     "failure_detail": null,
//!     "priority": false,
//!     "destination": "/var/log/app/latest.log"
//! }
//! ```

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::key::SequenceKey;

/// The unit of work passed through the queue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueRecord {
    /// Fully formatted log line (level, timestamp and call site already
    /// interpolated by the producer).
    pub message: String,

    /// Rendered failure trace, present only for error-class records.
    pub failure_detail: Option<String>,

    /// Priority records are drained before any normal record.
    pub priority: bool,

    /// Log file this record must be appended to.
    pub destination: PathBuf,
}

impl QueueRecord {
    pub fn new(message: impl Into<String>, destination: impl Into<PathBuf>) -> Self {
        Self {
            message:        message.into(),
            failure_detail: None,
            priority:       false,
            destination:    destination.into(),
        }
    }

    #[must_use]
    pub fn with_priority(mut self, priority: bool) -> Self {
        self.priority = priority;
        self
    }

    #[must_use]
    pub fn with_failure_detail(mut self, detail: impl Into<String>) -> Self {
        self.failure_detail = Some(detail.into());
        self
    }

    /// The class this record is filed under.
    #[must_use]
    pub const fn class(&self) -> RecordClass {
        if self.priority {
            RecordClass::Priority
        } else {
            RecordClass::Normal
        }
    }
}

/// Class of a single record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum RecordClass {
    Priority,
    Normal,
}

impl RecordClass {
    /// Single-character marker used in record file names.
    #[must_use]
    pub const fn marker(self) -> char {
        match self {
            Self::Priority => 'p',
            Self::Normal => 'n',
        }
    }

    #[must_use]
    pub const fn from_marker(marker: char) -> Option<Self> {
        match marker {
            'p' => Some(Self::Priority),
            'n' => Some(Self::Normal),
            _ => None,
        }
    }
}

/// Class filter for emptiness checks and counts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum QueueClass {
    Priority,
    Normal,
    Both,
}

impl QueueClass {
    #[must_use]
    pub const fn matches(self, class: RecordClass) -> bool {
        matches!(
            (self, class),
            (Self::Both, _)
                | (Self::Priority, RecordClass::Priority)
                | (Self::Normal, RecordClass::Normal)
        )
    }
}

/// A record selected by [`QueueStore::peek`](crate::QueueStore::peek) but not
/// yet removed from the queue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dequeued {
    pub key:    SequenceKey,
    pub record: QueueRecord,
}

/// Result of removing a record file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemoveOutcome {
    /// The record file was deleted.
    Removed,
    /// The file was already gone, another reader removed it first.
    AlreadyGone,
    /// Deletion kept failing until the retry ceiling; the record stays in
    /// the queue and will be redelivered.
    LeftInPlace,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_body_round_trips_through_json() {
        let record = QueueRecord::new("ERROR - boom", "/tmp/app/latest.log")
            .with_failure_detail("Caused by: disk full");

        let body = serde_json::to_string_pretty(&record).unwrap();
        assert!(body.contains("\"failure_detail\": \"Caused by: disk full\""));
        assert!(body.contains("\"priority\": false"));

        let decoded: QueueRecord = serde_json::from_str(&body).unwrap();
        assert_eq!(decoded, record);
    }

    #[test]
    fn test_absent_failure_detail_is_null() {
        let record = QueueRecord::new("INFO - boot", "latest.log");
        let body = serde_json::to_string(&record).unwrap();
        assert!(body.contains("\"failure_detail\":null"));
    }

    #[test]
    fn test_queue_class_matches() {
        assert!(QueueClass::Both.matches(RecordClass::Priority));
        assert!(QueueClass::Both.matches(RecordClass::Normal));
        assert!(QueueClass::Priority.matches(RecordClass::Priority));
        assert!(!QueueClass::Priority.matches(RecordClass::Normal));
        assert!(!QueueClass::Normal.matches(RecordClass::Priority));
    }

    #[test]
    fn test_marker_round_trip() {
        for class in [RecordClass::Priority, RecordClass::Normal] {
            assert_eq!(RecordClass::from_marker(class.marker()), Some(class));
        }
        assert_eq!(RecordClass::from_marker('x'), None);
    }
}
