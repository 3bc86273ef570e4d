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

use logspool_common_queue::QueueError;
use snafu::Snafu;

/// Errors surfaced to producers by [`Logger`](crate::Logger).
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum LogError {
    #[snafu(display("Failed to enqueue log record: {source}"))]
    Enqueue {
        source: QueueError,
        #[snafu(implicit)]
        loc:    snafu::Location,
    },

    /// `error` was called without a usable failure description.
    #[snafu(display("Error records require a non-empty failure description"))]
    MissingFailure {
        #[snafu(implicit)]
        loc: snafu::Location,
    },
}

/// Errors from pipeline setup, start and shutdown.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum PipelineError {
    #[snafu(display("Queue operation failed: {source}"))]
    Queue {
        source: QueueError,
        #[snafu(implicit)]
        loc:    snafu::Location,
    },

    #[snafu(display("Failed to archive {} as {}: {source}", from.display(), to.display()))]
    Rotate {
        from:   PathBuf,
        to:     PathBuf,
        source: std::io::Error,
        #[snafu(implicit)]
        loc:    snafu::Location,
    },

    #[snafu(display("Failed to inspect {}: {source}", path.display()))]
    Inspect {
        path:   PathBuf,
        source: std::io::Error,
        #[snafu(implicit)]
        loc:    snafu::Location,
    },

    #[snafu(display("Failed to spawn consumer process {}: {source}", program.display()))]
    Spawn {
        program: PathBuf,
        source:  std::io::Error,
        #[snafu(implicit)]
        loc:     snafu::Location,
    },

    #[snafu(display("Failed to wait for consumer process {pid}: {source}"))]
    Wait {
        pid:    u32,
        source: std::io::Error,
        #[snafu(implicit)]
        loc:    snafu::Location,
    },

    #[cfg(unix)]
    #[snafu(display("Failed to signal consumer process {pid}: {source}"))]
    Signal {
        pid:    u32,
        source: nix::Error,
        #[snafu(implicit)]
        loc:    snafu::Location,
    },

    #[snafu(display("Failed to build consumer runtime: {source}"))]
    Runtime {
        source: logspool_common_runtime::Error,
        #[snafu(implicit)]
        loc:    snafu::Location,
    },

    #[snafu(display("Failed to read config {}: {source}", path.display()))]
    ConfigRead {
        path:   PathBuf,
        source: std::io::Error,
        #[snafu(implicit)]
        loc:    snafu::Location,
    },

    #[snafu(display("Invalid config: {source}"))]
    Config {
        source: toml::de::Error,
        #[snafu(implicit)]
        loc:    snafu::Location,
    },

    #[snafu(display("Invalid time format {format:?}"))]
    TimeFormat {
        format: String,
        #[snafu(implicit)]
        loc:    snafu::Location,
    },

    #[snafu(display("Invalid file time format {format:?}, it must render a plain file name"))]
    FileStampFormat {
        format: String,
        #[snafu(implicit)]
        loc:    snafu::Location,
    },

    #[snafu(display("Consumer pid file error: {source}"))]
    PidFile {
        source: logspool_common_util::PidFileError,
        #[snafu(implicit)]
        loc:    snafu::Location,
    },
}

pub type Result<T> = std::result::Result<T, PipelineError>;
