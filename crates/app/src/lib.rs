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


//! Durable multi-producer, single-consumer log pipeline.
//!
//! Producers call a [`Logger`]; each record becomes one file in a queue
//! directory. A single consumer, started by [`Pipeline::start`], appends
//! the records to the destination file, debug records first.
//!
//! ```rust,no_run
//! use logspool_app::{Pipeline, PipelineConfig, spool_info};
//!
//! # fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let mut pipeline = Pipeline::new(PipelineConfig::default())?;
//! pipeline.start()?;
//!
//! let logger = pipeline.logger();
//! spool_info!(logger, "service listening on {}", 8080)?;
//!
//! pipeline.shutdown()?;
//! # Ok(())
//! # }
//! ```

#[macro_use]
mod macros;

mod config;
mod consumer;
mod error;
mod failure;
mod format;
mod lifecycle;
mod logger;
pub mod metrics;
mod panic_hook;
mod rotation;

pub use config::{DEFAULT_PROGRAM, PipelineConfig, SpawnMode};
pub use consumer::{ConsumerLoop, ConsumerWorker, DrainSummary, PollOutcome};
pub use error::{LogError, PipelineError, Result};
pub use failure::Failure;
pub use format::{
    DEFAULT_LINE_FORMAT, DEFAULT_TIME_FORMAT, Level, LineFormat, ParseLevelError,
    is_valid_time_format,
};
pub use lifecycle::{ConsumerHandle, PID_FILE_NAME, Pipeline};
pub use logger::Logger;
pub use panic_hook::install_panic_hook;
pub use rotation::{
    DEFAULT_FILE_TIME_FORMAT, LATEST_FILE_NAME, StampFormat, resolve_destination, rotate_latest,
};
