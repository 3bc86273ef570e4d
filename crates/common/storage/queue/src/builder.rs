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

use crate::{DirQueue, QueueConfig};

pub struct QueueBuilder {
    config: QueueConfig,
}

impl QueueBuilder {
    pub fn new<P: Into<PathBuf>>(dir: P) -> Self {
        Self {
            config: QueueConfig {
                dir: dir.into(),
                ..Default::default()
            },
        }
    }

    /// At least one attempt is always made.
    #[must_use]
    pub fn delete_retry_limit(mut self, limit: u32) -> Self {
        self.config.delete_retry_limit = limit.max(1);
        self
    }

    #[must_use]
    pub const fn delete_backoff(mut self, backoff: Duration) -> Self {
        self.config.delete_backoff = backoff;
        self
    }

    /// The queue directory is not touched here; it is created by the first
    /// [`put`](crate::QueueStore::put) or by [`DirQueue::create_dir`].
    #[must_use]
    pub fn build(self) -> DirQueue { DirQueue::open(self.config) }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_overrides() {
        let queue = QueueBuilder::new("/tmp/q")
            .delete_retry_limit(0)
            .delete_backoff(Duration::from_millis(1))
            .build();
        assert_eq!(queue.config().delete_retry_limit, 1);
        assert_eq!(queue.config().delete_backoff, Duration::from_millis(1));
        assert_eq!(queue.dir(), std::path::Path::new("/tmp/q"));
    }
}
