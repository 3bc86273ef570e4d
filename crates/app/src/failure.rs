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


use std::{error::Error, fmt};

/// Rendered failure attached to an error record.
///
/// Built from an error value, the top-level message is followed by one
/// `Caused by:` line per source in the chain:
///
/// ```text
/// failed to upload report
/// Caused by: connection reset by peer
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Failure(String);

impl Failure {
    pub fn from_error<E: Error + ?Sized>(error: &E) -> Self {
        let mut rendered = error.to_string();
        let mut source = error.source();
        while let Some(cause) = source {
            rendered.push_str("\nCaused by: ");
            rendered.push_str(&cause.to_string());
            source = cause.source();
        }
        Self(rendered)
    }

    /// A failure described by text the caller already rendered.
    pub fn message(text: impl Into<String>) -> Self { Self(text.into()) }

    #[must_use]
    pub fn as_str(&self) -> &str { &self.0 }

    /// `true` when there is nothing but whitespace to record.
    #[must_use]
    pub fn is_blank(&self) -> bool { self.0.trim().is_empty() }

    #[must_use]
    pub fn into_string(self) -> String { self.0 }
}

impl fmt::Display for Failure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(&self.0) }
}

impl From<String> for Failure {
    fn from(text: String) -> Self { Self(text) }
}

impl From<&str> for Failure {
    fn from(text: &str) -> Self { Self(text.to_owned()) }
}

impl From<&(dyn Error + 'static)> for Failure {
    fn from(error: &(dyn Error + 'static)) -> Self { Self::from_error(error) }
}

impl From<&(dyn Error + Send + Sync + 'static)> for Failure {
    fn from(error: &(dyn Error + Send + Sync + 'static)) -> Self { Self::from_error(error) }
}

impl From<std::io::Error> for Failure {
    fn from(error: std::io::Error) -> Self { Self::from_error(&error) }
}
