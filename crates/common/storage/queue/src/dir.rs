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


//! Directory-backed queue.
//!
//! One file per record, published with a temp-file-then-rename so that a
//! record file is either complete or absent. Any number of processes may
//! share a directory; the only coordination is the filesystem itself.

use std::{
    fs::{self, OpenOptions},
    io::{self, Write},
    path::{Path, PathBuf},
    sync::Arc,
};

use snafu::{IntoError, ResultExt};
use tracing::{debug, warn};

use crate::{
    QueueConfig, QueueError, Result,
    error::{DecodeSnafu, EncodeSnafu, IoSnafu, QueueDirMissingSnafu},
    key::SequenceKey,
    record::{Dequeued, QueueClass, QueueRecord, RecordClass, RemoveOutcome},
    store::QueueStore,
};

/// A [`QueueStore`] over a plain directory.
///
/// Cloning is cheap; clones share the configuration.
#[derive(Debug, Clone)]
pub struct DirQueue {
    config: Arc<QueueConfig>,
}

impl DirQueue {
    #[must_use]
    pub fn open(config: QueueConfig) -> Self {
        Self {
            config: Arc::new(config),
        }
    }

    #[must_use]
    pub fn config(&self) -> &QueueConfig { &self.config }

    #[must_use]
    pub fn dir(&self) -> &Path { &self.config.dir }

    /// Creates the queue directory if it does not exist yet.
    pub fn create_dir(&self) -> Result<()> {
        fs::create_dir_all(self.dir()).context(IoSnafu { path: self.dir() })
    }

    fn record_path(&self, key: &SequenceKey) -> PathBuf { self.dir().join(key.file_name()) }

    /// Lists published record keys, unordered.
    fn scan(&self) -> Result<Vec<SequenceKey>> {
        let entries = match fs::read_dir(self.dir()) {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                return QueueDirMissingSnafu { path: self.dir() }.fail();
            }
            Err(e) => return Err(e).context(IoSnafu { path: self.dir() }),
        };

        let mut keys = Vec::new();
        for entry in entries {
            let entry = entry.context(IoSnafu { path: self.dir() })?;
            if let Some(key) = entry.file_name().to_str().and_then(SequenceKey::parse) {
                keys.push(key);
            }
        }
        Ok(keys)
    }

    /// Reads a record body. `None` when the file vanished or had to be
    /// quarantined.
    ///
    /// An entry that cannot be read or decoded is moved to `corrupt/` so it
    /// never blocks the records queued behind it.
    fn read_record(&self, key: &SequenceKey) -> Option<QueueRecord> {
        let path = self.record_path(key);
        let failure = match fs::read(&path) {
            Ok(body) => match serde_json::from_slice(&body) {
                Ok(record) => return Some(record),
                Err(e) => DecodeSnafu { path: &path }.into_error(e),
            },
            Err(e) if e.kind() == io::ErrorKind::NotFound => return None,
            Err(e) => IoSnafu { path: &path }.into_error(e),
        };
        self.quarantine(key, &path, &failure);
        None
    }

    fn quarantine(&self, key: &SequenceKey, path: &Path, error: &QueueError) {
        let corrupt_dir = self.config.corrupt_dir();
        let target = corrupt_dir.join(key.file_name());
        let moved = fs::create_dir_all(&corrupt_dir).and_then(|()| fs::rename(path, &target));
        match moved {
            Ok(()) => warn!(
                path = %path.display(),
                target = %target.display(),
                %error,
                "Quarantined unusable queue record"
            ),
            Err(move_error) => warn!(
                path = %path.display(),
                %error,
                %move_error,
                "Unusable queue record could not be quarantined, skipping it"
            ),
        }
    }

    fn write_temp(path: &Path, body: &[u8]) -> io::Result<()> {
        let mut file = OpenOptions::new().write(true).create_new(true).open(path)?;
        file.write_all(body)?;
        file.flush()?;
        file.sync_all()
    }
}

impl QueueStore for DirQueue {
    fn put(&self, record: &QueueRecord) -> Result<SequenceKey> {
        self.create_dir()?;

        let key = SequenceKey::next(record.class());
        let body = serde_json::to_vec_pretty(record).context(EncodeSnafu)?;

        let temp_path = self.dir().join(key.temp_file_name());
        let final_path = self.record_path(&key);
        let published =
            Self::write_temp(&temp_path, &body).and_then(|()| fs::rename(&temp_path, &final_path));
        if let Err(e) = published {
            let _ = fs::remove_file(&temp_path);
            return Err(e).context(IoSnafu { path: final_path });
        }

        debug!(%key, "Record enqueued");
        Ok(key)
    }

    fn peek(&self, priority: bool) -> Result<Option<Dequeued>> {
        let keys = self.scan()?;

        let has_priority = keys.iter().any(|k| k.class == RecordClass::Priority);
        let mut candidates: Vec<SequenceKey> = match (priority, has_priority) {
            (true, true) => keys
                .into_iter()
                .filter(|k| k.class == RecordClass::Priority)
                .collect(),
            (true, false) => keys,
            (false, _) => keys
                .into_iter()
                .filter(|k| k.class == RecordClass::Normal)
                .collect(),
        };
        candidates.sort_unstable();

        for key in candidates {
            if let Some(record) = self.read_record(&key) {
                return Ok(Some(Dequeued { key, record }));
            }
        }
        Ok(None)
    }

    fn remove(&self, key: &SequenceKey) -> Result<RemoveOutcome> {
        let path = self.record_path(key);
        let limit = self.config.delete_retry_limit.max(1);

        for attempt in 1..=limit {
            match fs::remove_file(&path) {
                Ok(()) => return Ok(RemoveOutcome::Removed),
                Err(e) if e.kind() == io::ErrorKind::NotFound => {
                    return Ok(RemoveOutcome::AlreadyGone);
                }
                Err(error) => {
                    debug!(%key, attempt, %error, "Delete of queue record failed");
                    if attempt < limit {
                        std::thread::sleep(self.config.delete_backoff);
                    }
                }
            }
        }

        warn!(
            %key,
            attempts = limit,
            "Queue record left in place after repeated delete failures, it will be redelivered"
        );
        Ok(RemoveOutcome::LeftInPlace)
    }

    fn len(&self, class: QueueClass) -> Result<usize> {
        Ok(self
            .scan()?
            .into_iter()
            .filter(|k| class.matches(k.class))
            .count())
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use tempfile::TempDir;

    use super::*;
    use crate::{QueueBuilder, QueueError};

    fn queue_in(temp: &TempDir) -> DirQueue {
        QueueBuilder::new(temp.path().join("queue"))
            .delete_retry_limit(3)
            .delete_backoff(Duration::from_millis(1))
            .build()
    }

    fn record(message: &str, priority: bool) -> QueueRecord {
        QueueRecord::new(message, "latest.log").with_priority(priority)
    }

    #[test]
    fn test_put_creates_directory_lazily() {
        let temp = TempDir::new().unwrap();
        let queue = queue_in(&temp);
        assert!(!queue.dir().exists());

        let key = queue.put(&record("boot", false)).unwrap();

        assert!(queue.dir().join(key.file_name()).is_file());
        let leftovers: Vec<_> = fs::read_dir(queue.dir())
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_name().to_string_lossy().starts_with('.'))
            .collect();
        assert!(leftovers.is_empty(), "temp files left behind");
    }

    #[test]
    fn test_missing_directory_is_reported() {
        let temp = TempDir::new().unwrap();
        let queue = queue_in(&temp);

        let err = queue.is_empty(QueueClass::Both).unwrap_err();
        assert!(err.is_queue_dir_missing());
        assert!(matches!(
            queue.peek(true),
            Err(QueueError::QueueDirMissing { .. })
        ));
    }

    #[test]
    fn test_peek_does_not_remove() {
        let temp = TempDir::new().unwrap();
        let queue = queue_in(&temp);
        queue.put(&record("first", false)).unwrap();

        let a = queue.peek(false).unwrap().unwrap();
        let b = queue.peek(false).unwrap().unwrap();
        assert_eq!(a, b);
        assert_eq!(queue.len(QueueClass::Both).unwrap(), 1);
    }

    #[test]
    fn test_fifo_within_class() {
        let temp = TempDir::new().unwrap();
        let queue = queue_in(&temp);
        for i in 0..5 {
            queue.put(&record(&format!("m{i}"), false)).unwrap();
        }

        for i in 0..5 {
            let got = queue.get(false).unwrap().unwrap();
            assert_eq!(got.message, format!("m{i}"));
        }
        assert!(queue.get(false).unwrap().is_none());
        assert!(queue.is_empty(QueueClass::Both).unwrap());
    }

    #[test]
    fn test_priority_selection_and_fallback() {
        let temp = TempDir::new().unwrap();
        let queue = queue_in(&temp);
        queue.put(&record("normal-1", false)).unwrap();
        queue.put(&record("debug-1", true)).unwrap();
        queue.put(&record("normal-2", false)).unwrap();

        assert!(!queue.is_empty(QueueClass::Priority).unwrap());
        assert_eq!(queue.len(QueueClass::Normal).unwrap(), 2);

        assert_eq!(queue.get(true).unwrap().unwrap().message, "debug-1");
        assert!(queue.is_empty(QueueClass::Priority).unwrap());
        // no priority record left: falls back to the oldest of any class
        assert_eq!(queue.get(true).unwrap().unwrap().message, "normal-1");
        assert_eq!(queue.get(false).unwrap().unwrap().message, "normal-2");
    }

    #[test]
    fn test_normal_selection_ignores_priority_records() {
        let temp = TempDir::new().unwrap();
        let queue = queue_in(&temp);
        queue.put(&record("debug", true)).unwrap();

        assert!(queue.peek(false).unwrap().is_none());
        assert!(queue.peek(true).unwrap().is_some());
    }

    #[test]
    fn test_remove_outcomes() {
        let temp = TempDir::new().unwrap();
        let queue = queue_in(&temp);
        let key = queue.put(&record("once", false)).unwrap();

        assert_eq!(queue.remove(&key).unwrap(), RemoveOutcome::Removed);
        assert_eq!(queue.remove(&key).unwrap(), RemoveOutcome::AlreadyGone);
    }

    #[test]
    fn test_remove_gives_up_after_retry_limit() {
        let temp = TempDir::new().unwrap();
        let queue = queue_in(&temp);
        queue.create_dir().unwrap();

        // a directory under a record name cannot be removed with remove_file
        let key = SequenceKey::next(RecordClass::Normal);
        fs::create_dir(queue.dir().join(key.file_name())).unwrap();

        assert_eq!(queue.remove(&key).unwrap(), RemoveOutcome::LeftInPlace);
        assert!(queue.dir().join(key.file_name()).exists());
    }

    #[test]
    fn test_undecodable_record_is_quarantined() {
        let temp = TempDir::new().unwrap();
        let queue = queue_in(&temp);
        queue.create_dir().unwrap();

        let bad = SequenceKey::next(RecordClass::Normal);
        fs::write(queue.dir().join(bad.file_name()), b"{ not json").unwrap();
        queue.put(&record("good", false)).unwrap();

        let got = queue.peek(false).unwrap().unwrap();
        assert_eq!(got.record.message, "good");
        assert!(queue.config().corrupt_dir().join(bad.file_name()).is_file());
        assert_eq!(queue.len(QueueClass::Both).unwrap(), 1);
    }

    #[test]
    fn test_unreadable_record_does_not_block_the_queue() {
        let temp = TempDir::new().unwrap();
        let queue = queue_in(&temp);
        queue.create_dir().unwrap();

        // reading a directory fails with something other than NotFound
        let blocked = SequenceKey::next(RecordClass::Normal);
        fs::create_dir(queue.dir().join(blocked.file_name())).unwrap();
        queue.put(&record("behind", false)).unwrap();

        let got = queue.peek(false).unwrap().unwrap();
        assert_eq!(got.record.message, "behind");
        assert!(queue.config().corrupt_dir().join(blocked.file_name()).is_dir());
        assert_eq!(queue.get(false).unwrap().unwrap().message, "behind");
        assert!(queue.is_empty(QueueClass::Both).unwrap());
    }

    #[test]
    fn test_foreign_files_are_ignored() {
        let temp = TempDir::new().unwrap();
        let queue = queue_in(&temp);
        queue.create_dir().unwrap();
        fs::write(queue.dir().join("logspool-consumer.pid"), b"1").unwrap();
        fs::write(queue.dir().join(".qitem-n-1-1-1.json.tmp"), b"partial").unwrap();

        assert!(queue.is_empty(QueueClass::Both).unwrap());
        assert!(queue.peek(true).unwrap().is_none());
    }
}
