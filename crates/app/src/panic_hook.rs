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


//! Panic hook that turns unhandled panics into ERROR records.

use std::panic::{self, Location, PanicHookInfo};

use backtrace::Backtrace;
use tracing::warn;

use crate::{failure::Failure, format::Level, logger::Logger};

fn payload_text<'a>(info: &'a PanicHookInfo<'_>) -> &'a str {
    let payload = info.payload();
    payload
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| payload.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("Box<dyn Any>")
}

/// Queues every panic as an ERROR record through `logger`, then defers to
/// the previously installed hook.
///
/// The record is written at the panic site, with the panic message and a
/// backtrace as its failure detail.
pub fn install_panic_hook(logger: Logger) {
    let previous = panic::take_hook();
    panic::set_hook(Box::new(move |info| {
        let payload = payload_text(info);
        let location = info.location().unwrap_or_else(|| Location::caller());
        let detail = format!("panicked: {payload}\n{:?}", Backtrace::new());
        if let Err(e) = logger.log_at(
            Level::Error,
            location,
            &format!("Unhandled panic: {payload}"),
            Some(Failure::message(detail)),
        ) {
            warn!(error = %e, "Failed to queue panic record");
        }
        previous(info);
    }));
}

impl Logger {
    /// Shorthand for [`install_panic_hook`] with a clone of this logger.
    pub fn install_panic_hook(&self) { install_panic_hook(self.clone()); }
}
