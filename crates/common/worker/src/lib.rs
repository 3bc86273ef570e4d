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


//! Supervised background workers.
//!
//! A [`Worker`] implements single-shot logic; the [`Manager`] runs it on a
//! tokio runtime according to its [`Trigger`], calls the lifecycle hooks,
//! records metrics, and stops everything within a bounded timeout.
//!
//! ```rust,no_run
//! use std::time::Duration;
//!
//! use logspool_common_worker::{
//!     Manager, Trigger, WorkResult, Worker, WorkerConfig, WorkerContext,
//! };
//!
//! struct Heartbeat;
//!
//! #[async_trait::async_trait]
//! impl Worker for Heartbeat {
//!     fn name(&self) -> &'static str { "heartbeat" }
//!
//!     fn trigger(&self) -> Trigger { Trigger::Interval(Duration::from_secs(1)) }
//!
//!     async fn work(&mut self, ctx: &WorkerContext) -> WorkResult {
//!         tracing::info!(worker = ctx.name(), "tick");
//!         Ok(())
//!     }
//! }
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let mut manager = Manager::start(WorkerConfig::builder().build())?;
//! let handle = manager.register(Heartbeat);
//! handle.stop();
//! manager.shutdown().await;
//! # Ok(())
//! # }
//! ```

mod config;
mod context;
mod err;
mod handle;
mod id;
mod manager;
mod metrics;
mod trigger;
mod worker;

pub use config::WorkerConfig;
pub use context::WorkerContext;
pub use err::{ErrorSeverity, WorkError, WorkResult};
pub use handle::WorkerHandle;
pub use id::WorkerId;
pub use manager::{Manager, ShutdownSummary};
pub use trigger::Trigger;
pub use worker::Worker;
