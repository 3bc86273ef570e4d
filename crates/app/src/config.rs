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


use std::{
    fs,
    path::{Path, PathBuf},
    time::Duration,
};

use bon::Builder;
use logspool_common_queue::QueueConfig;
use serde::{Deserialize, Serialize};
use smart_default::SmartDefault;
use snafu::ResultExt;

use crate::{
    error::{ConfigReadSnafu, ConfigSnafu, Result},
    format::{DEFAULT_LINE_FORMAT, DEFAULT_TIME_FORMAT, LineFormat},
    rotation::{DEFAULT_FILE_TIME_FORMAT, StampFormat},
};

pub const DEFAULT_PROGRAM: &str = "logspool";

/// How the consumer is run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, SmartDefault)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum SpawnMode {
    /// A separate OS process running `<program> consume`.
    #[default]
    Process {
        #[default(PathBuf::from(DEFAULT_PROGRAM))]
        #[serde(default = "default_program")]
        program: PathBuf,
    },
    /// A worker on a dedicated runtime inside this process.
    InProcess,
}

fn default_program() -> PathBuf { PathBuf::from(DEFAULT_PROGRAM) }

/// Everything a [`Pipeline`](crate::Pipeline) needs.
///
/// Loadable from TOML; missing keys take their defaults:
///
/// ```toml
/// queue_dir = "/var/lib/app/logspool"
/// destination = "/var/log/app/%TIMENOW%.log"
/// idle_interval_ms = 2000
///
/// [spawn]
/// mode = "in_process"
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, SmartDefault, Builder)]
#[serde(default)]
pub struct PipelineConfig {
    #[default(PathBuf::from("logs/.cache"))]
    #[builder(default = PathBuf::from("logs/.cache"), into)]
    pub queue_dir: PathBuf,

    /// Destination template. `%TIMENOW%` is replaced with the start time and
    /// `.log` is appended when missing.
    #[default("logs/%TIMENOW%.log".to_string())]
    #[builder(default = "logs/%TIMENOW%.log".to_string(), into)]
    pub destination: String,

    /// Write to `latest.log` next to the resolved destination and archive
    /// the previous run's `latest.log` on start.
    #[default(true)]
    #[builder(default = true)]
    pub use_latest_alias: bool,

    #[default(DEFAULT_LINE_FORMAT.to_string())]
    #[builder(default = DEFAULT_LINE_FORMAT.to_string(), into)]
    pub line_format: String,

    #[default(DEFAULT_TIME_FORMAT.to_string())]
    #[builder(default = DEFAULT_TIME_FORMAT.to_string(), into)]
    pub time_format: String,

    /// strftime pattern for `%TIMENOW%` and archived file names. Must not
    /// render a path separator.
    #[default(DEFAULT_FILE_TIME_FORMAT.to_string())]
    #[builder(default = DEFAULT_FILE_TIME_FORMAT.to_string(), into)]
    pub file_time_format: String,

    /// Consumer sleep between drains of an empty queue.
    #[default(10_000)]
    #[builder(default = 10_000)]
    pub idle_interval_ms: u64,

    #[default(10)]
    #[builder(default = 10)]
    pub delete_retry_limit: u32,

    #[default(10)]
    #[builder(default = 10)]
    pub delete_backoff_ms: u64,

    /// Diagnostics for records whose destination could not be written.
    #[default(PathBuf::from("logspool_error.log"))]
    #[builder(default = PathBuf::from("logspool_error.log"), into)]
    pub fallback_file: PathBuf,

    #[default(5_000)]
    #[builder(default = 5_000)]
    pub shutdown_timeout_ms: u64,

    /// Wait for late records before the final drain.
    #[default(1_000)]
    #[builder(default = 1_000)]
    pub final_drain_grace_ms: u64,

    #[default(10_000)]
    #[builder(default = 10_000)]
    pub final_drain_limit: usize,

    #[builder(default)]
    pub spawn: SpawnMode,
}

impl PipelineConfig {
    pub fn from_toml_str(text: &str) -> Result<Self> { toml::from_str(text).context(ConfigSnafu) }

    pub fn from_toml_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).context(ConfigReadSnafu { path })?;
        Self::from_toml_str(&text)
    }

    #[must_use]
    pub fn queue_config(&self) -> QueueConfig {
        QueueConfig {
            dir:                self.queue_dir.clone(),
            delete_retry_limit: self.delete_retry_limit.max(1),
            delete_backoff:     Duration::from_millis(self.delete_backoff_ms),
        }
    }

    pub fn line_format(&self) -> Result<LineFormat> {
        LineFormat::new(self.line_format.clone(), self.time_format.clone())
    }

    pub fn stamp_format(&self) -> Result<StampFormat> {
        StampFormat::new(self.file_time_format.clone())
    }

    #[must_use]
    pub const fn idle_interval(&self) -> Duration { Duration::from_millis(self.idle_interval_ms) }

    #[must_use]
    pub const fn shutdown_timeout(&self) -> Duration {
        Duration::from_millis(self.shutdown_timeout_ms)
    }

    #[must_use]
    pub const fn final_drain_grace(&self) -> Duration {
        Duration::from_millis(self.final_drain_grace_ms)
    }
}
