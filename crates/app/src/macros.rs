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


//! `format!`-style shorthands for [`Logger`](crate::Logger) calls.
//!
//! ```ignore
//! spool_info!(logger, "listening on {}", addr)?;
//! spool_error!(logger, err, "upload of {} failed", name)?;
//! ```

#[macro_export]
macro_rules! spool_info {
    ($logger:expr, $($arg:tt)+) => {
        $logger.info(::std::format_args!($($arg)+))
    };
}

#[macro_export]
macro_rules! spool_warning {
    ($logger:expr, $($arg:tt)+) => {
        $logger.warning(::std::format_args!($($arg)+))
    };
}

#[macro_export]
macro_rules! spool_debug {
    ($logger:expr, $($arg:tt)+) => {
        $logger.debug(::std::format_args!($($arg)+))
    };
}

/// The second argument is the failure: anything convertible into
/// [`Failure`](crate::Failure).
#[macro_export]
macro_rules! spool_error {
    ($logger:expr, $failure:expr, $($arg:tt)+) => {
        $logger.error(::std::format_args!($($arg)+), $failure)
    };
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use logspool_common_queue::{QueueBuilder, QueueStore};
    use tempfile::TempDir;

    use crate::{Failure, LineFormat, Logger};

    #[test]
    fn test_macros_format_and_keep_call_site() {
        let temp = TempDir::new().unwrap();
        let store: Arc<dyn QueueStore> = Arc::new(QueueBuilder::new(temp.path()).build());
        let logger = Logger::new(store.clone(), "x.log", LineFormat::default());

        let line = line!() + 1;
        spool_info!(logger, "user {} logged in", 42).unwrap();
        spool_warning!(logger, "{} retries left", 2).unwrap();
        spool_debug!(logger, "tick {}", 1).unwrap();
        spool_error!(logger, Failure::message("timeout"), "job {} failed", "sync").unwrap();

        let debug = store.get(true).unwrap().unwrap();
        assert!(debug.message.ends_with("tick 1"));
        let info = store.get(false).unwrap().unwrap();
        assert!(info.message.ends_with("user 42 logged in"));
        assert!(info.message.contains(&format!("{}:{line}", file!())));
        let warning = store.get(false).unwrap().unwrap();
        assert!(warning.message.starts_with("WARNING"));
        let error = store.get(false).unwrap().unwrap();
        assert_eq!(error.failure_detail.as_deref(), Some("timeout"));
    }
}
