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


use std::{path::PathBuf, time::Duration};

use smart_default::SmartDefault;

/// Name of the subdirectory undecodable record files are moved to.
pub const CORRUPT_DIR: &str = "corrupt";

#[derive(Debug, Clone, SmartDefault)]
pub struct QueueConfig {
    /// Directory holding one file per queued record.
    #[default(PathBuf::from("logs/.cache"))]
    pub dir:                PathBuf,
    /// Attempts made to delete a delivered record before leaving it in place.
    #[default(10)]
    pub delete_retry_limit: u32,
    /// Sleep between delete attempts.
    #[default(Duration::from_millis(10))]
    pub delete_backoff:     Duration,
}

impl QueueConfig {
    #[must_use]
    pub fn corrupt_dir(&self) -> PathBuf { self.dir.join(CORRUPT_DIR) }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = QueueConfig::default();
        assert_eq!(config.dir, PathBuf::from("logs/.cache"));
        assert_eq!(config.delete_retry_limit, 10);
        assert_eq!(config.delete_backoff, Duration::from_millis(10));
        assert_eq!(config.corrupt_dir(), PathBuf::from("logs/.cache/corrupt"));
    }
}
