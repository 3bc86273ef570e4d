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


//! Producer API.
//!
//! A [`Logger`] formats a line in the caller's thread and drops it into the
//! queue; it never touches the destination file. Clones are cheap and may
//! be handed to any number of threads.

use std::{
    fmt,
    panic::Location,
    path::{Path, PathBuf},
    sync::Arc,
};

use logspool_common_queue::{QueueRecord, QueueStore};
use snafu::ResultExt;
use tracing::trace;

use crate::{
    error::{EnqueueSnafu, LogError, MissingFailureSnafu},
    failure::Failure,
    format::{Level, LineFormat},
    metrics::RECORDS_ENQUEUED,
};

#[derive(Clone)]
pub struct Logger {
    store:       Arc<dyn QueueStore>,
    destination: Arc<PathBuf>,
    format:      Arc<LineFormat>,
}

impl fmt::Debug for Logger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Logger")
            .field("destination", &self.destination)
            .field("format", &self.format)
            .finish_non_exhaustive()
    }
}

impl Logger {
    pub fn new(
        store: Arc<dyn QueueStore>,
        destination: impl Into<PathBuf>,
        format: LineFormat,
    ) -> Self {
        Self {
            store,
            destination: Arc::new(destination.into()),
            format: Arc::new(format),
        }
    }

    #[must_use]
    pub fn destination(&self) -> &Path { &self.destination }

    #[track_caller]
    pub fn info(&self, message: impl fmt::Display) -> Result<(), LogError> {
        self.log_at(Level::Info, Location::caller(), &message.to_string(), None)
    }

    #[track_caller]
    pub fn warning(&self, message: impl fmt::Display) -> Result<(), LogError> {
        self.log_at(Level::Warning, Location::caller(), &message.to_string(), None)
    }

    /// Queued ahead of every non-debug record.
    #[track_caller]
    pub fn debug(&self, message: impl fmt::Display) -> Result<(), LogError> {
        self.log_at(Level::Debug, Location::caller(), &message.to_string(), None)
    }

    /// Logs `message` with a rendered `failure`. A blank failure is rejected
    /// before anything is queued.
    #[track_caller]
    pub fn error(
        &self,
        message: impl fmt::Display,
        failure: impl Into<Failure>,
    ) -> Result<(), LogError> {
        self.log_at(
            Level::Error,
            Location::caller(),
            &message.to_string(),
            Some(failure.into()),
        )
    }

    /// Lower-level entry point taking an explicit call site.
    ///
    /// `Level::Error` requires a non-blank `failure`. Other levels attach a
    /// failure only when one is given.
    pub fn log_at(
        &self,
        level: Level,
        location: &Location<'_>,
        message: &str,
        failure: Option<Failure>,
    ) -> Result<(), LogError> {
        let failure = failure.filter(|f| !f.is_blank());
        if level == Level::Error && failure.is_none() {
            return MissingFailureSnafu.fail();
        }

        let line = self.format.render(level, location, message);
        let mut record = QueueRecord::new(line, self.destination.as_path())
            .with_priority(level.is_priority());
        if let Some(failure) = failure {
            record = record.with_failure_detail(failure.into_string());
        }

        let key = self.store.put(&record).context(EnqueueSnafu)?;
        RECORDS_ENQUEUED.with_label_values(&[level.as_str()]).inc();
        trace!(%key, %level, "Log record queued");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use logspool_common_queue::{QueueBuilder, QueueClass};
    use tempfile::TempDir;

    use super::*;

    fn logger_in(temp: &TempDir) -> (Logger, Arc<dyn QueueStore>) {
        let store: Arc<dyn QueueStore> = Arc::new(QueueBuilder::new(temp.path().join("q")).build());
        let format = LineFormat::new("%loglevel% %file% | ", "%H").unwrap();
        (Logger::new(store.clone(), "out/latest.log", format), store)
    }

    #[test]
    fn test_levels_and_priority() {
        let temp = TempDir::new().unwrap();
        let (logger, store) = logger_in(&temp);

        logger.info("boot").unwrap();
        logger.warning("low disk").unwrap();
        logger.debug("tick").unwrap();

        assert_eq!(store.len(QueueClass::Priority).unwrap(), 1);
        assert_eq!(store.len(QueueClass::Normal).unwrap(), 2);

        let first = store.get(true).unwrap().unwrap();
        assert!(first.message.starts_with("DEBUG "));
        assert!(first.message.ends_with("| tick"));
        assert!(first.priority);
        assert_eq!(first.destination, PathBuf::from("out/latest.log"));
    }

    #[test]
    fn test_call_site_is_the_caller() {
        let temp = TempDir::new().unwrap();
        let (logger, store) = logger_in(&temp);

        let line = line!() + 1;
        logger.info("here").unwrap();

        let record = store.get(false).unwrap().unwrap();
        assert!(
            record.message.contains(&format!("{}:{line}", file!())),
            "unexpected call site in {:?}",
            record.message
        );
    }

    #[test]
    fn test_error_carries_failure_detail() {
        let temp = TempDir::new().unwrap();
        let (logger, store) = logger_in(&temp);

        let io = std::io::Error::other("disk full");
        logger.error("flush failed", io).unwrap();

        let record = store.get(false).unwrap().unwrap();
        assert!(record.message.starts_with("ERROR "));
        assert_eq!(record.failure_detail.as_deref(), Some("disk full"));
        assert!(!record.priority);
    }

    #[test]
    fn test_error_without_failure_is_rejected_before_queueing() {
        let temp = TempDir::new().unwrap();
        let (logger, _store) = logger_in(&temp);

        let err = logger.error("oops", "   ").unwrap_err();
        assert!(matches!(err, LogError::MissingFailure { .. }));
        let err = logger
            .log_at(Level::Error, Location::caller(), "oops", None)
            .unwrap_err();
        assert!(matches!(err, LogError::MissingFailure { .. }));
        // the queue directory was never created
        assert!(!temp.path().join("q").exists());
    }

    #[test]
    fn test_enqueue_failure_is_returned() {
        let temp = TempDir::new().unwrap();
        // a regular file where the queue directory should be
        let blocker = temp.path().join("q");
        std::fs::write(&blocker, b"").unwrap();
        let (logger, _store) = logger_in(&temp);

        let err = logger.info("lost?").unwrap_err();
        assert!(matches!(err, LogError::Enqueue { .. }));
    }
}
