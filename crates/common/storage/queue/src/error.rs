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


use std::path::PathBuf;

use snafu::Snafu;

/// Queue operation errors.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum QueueError {
    /// Filesystem I/O failure on a specific path.
    #[snafu(display("IO error on {}: {source}", path.display()))]
    Io {
        path:   PathBuf,
        source: std::io::Error,
        #[snafu(implicit)]
        loc:    snafu::Location,
    },

    /// The queue directory vanished after the queue was in use.
    ///
    /// The directory is required infrastructure; consumers treat this as
    /// fatal instead of silently skipping records.
    #[snafu(display("Queue directory {} does not exist", path.display()))]
    QueueDirMissing {
        path: PathBuf,
        #[snafu(implicit)]
        loc:  snafu::Location,
    },

    /// Failed to serialize a record body.
    #[snafu(display("Failed to encode queue record: {source}"))]
    Encode {
        source: serde_json::Error,
        #[snafu(implicit)]
        loc:    snafu::Location,
    },

    /// A record file exists but its body is not a valid record.
    #[snafu(display("Failed to decode queue record {}: {source}", path.display()))]
    Decode {
        path:   PathBuf,
        source: serde_json::Error,
        #[snafu(implicit)]
        loc:    snafu::Location,
    },
}

impl QueueError {
    /// Returns `true` when the queue directory itself has disappeared.
    #[must_use]
    pub const fn is_queue_dir_missing(&self) -> bool {
        matches!(self, Self::QueueDirMissing { .. })
    }
}

/// Result type for queue operations.
pub type Result<T> = std::result::Result<T, QueueError>;
