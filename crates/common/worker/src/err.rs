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


use std::fmt;

/// Result type for worker hooks.
pub type WorkResult<T = ()> = std::result::Result<T, WorkError>;

/// How the manager reacts to a failed hook.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorSeverity {
    /// Logged and counted; the worker runs again on its next trigger.
    Transient,
    /// The worker leaves its run loop, runs `on_shutdown`, and stops.
    Fatal,
}

/// Error returned from [`Worker`](crate::Worker) hooks.
///
/// ```rust
/// use logspool_common_worker::{WorkError, WorkResult};
///
/// fn poll(dir_exists: bool, busy: bool) -> WorkResult {
///     if !dir_exists {
///         return Err(WorkError::fatal("queue directory is gone"));
///     }
///     if busy {
///         return Err(WorkError::transient("destination locked, retry later"));
///     }
///     Ok(())
/// }
/// # assert!(poll(true, false).is_ok());
/// ```
#[derive(Debug)]
pub struct WorkError {
    severity: ErrorSeverity,
    message:  String,
    source:   Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl WorkError {
    pub fn transient(message: impl Into<String>) -> Self {
        Self::new(ErrorSeverity::Transient, message.into(), None)
    }

    pub fn fatal(message: impl Into<String>) -> Self {
        Self::new(ErrorSeverity::Fatal, message.into(), None)
    }

    pub fn transient_with_source<E>(message: impl Into<String>, source: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::new(
            ErrorSeverity::Transient,
            message.into(),
            Some(Box::new(source)),
        )
    }

    pub fn fatal_with_source<E>(message: impl Into<String>, source: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::new(ErrorSeverity::Fatal, message.into(), Some(Box::new(source)))
    }

    const fn new(
        severity: ErrorSeverity,
        message: String,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    ) -> Self {
        Self {
            severity,
            message,
            source,
        }
    }

    #[must_use]
    pub const fn severity(&self) -> ErrorSeverity { self.severity }

    #[must_use]
    pub fn is_fatal(&self) -> bool { self.severity == ErrorSeverity::Fatal }

    #[must_use]
    pub fn is_transient(&self) -> bool { self.severity == ErrorSeverity::Transient }

    #[must_use]
    pub fn message(&self) -> &str { &self.message }
}

impl fmt::Display for WorkError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let severity = match self.severity {
            ErrorSeverity::Transient => "transient",
            ErrorSeverity::Fatal => "fatal",
        };
        write!(f, "[{severity}] {}", self.message)?;
        if let Some(source) = &self.source {
            write!(f, ": {source}")?;
        }
        Ok(())
    }
}

impl std::error::Error for WorkError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source
            .as_ref()
            .map(|e| e.as_ref() as &(dyn std::error::Error + 'static))
    }
}

#[cfg(test)]
mod tests {
    use std::error::Error as _;

    use super::*;

    #[test]
    fn test_display_includes_source() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "no such dir");
        let err = WorkError::fatal_with_source("queue unavailable", io);
        assert!(err.is_fatal());
        assert_eq!(err.to_string(), "[fatal] queue unavailable: no such dir");
        assert!(err.source().is_some());
    }

    #[test]
    fn test_transient_without_source() {
        let err = WorkError::transient("busy");
        assert!(err.is_transient());
        assert_eq!(err.severity(), ErrorSeverity::Transient);
        assert_eq!(err.to_string(), "[transient] busy");
        assert!(err.source().is_none());
    }
}
