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


use crate::{context::WorkerContext, err::WorkResult, trigger::Trigger};

/// A background task driven by a [`Manager`](crate::Manager).
///
/// Implementors only write single-shot logic in `work()`; the manager owns
/// the loop, the trigger, cancellation and metrics.
#[async_trait::async_trait]
pub trait Worker: Send + 'static {
    /// Name used for logging and metric labels.
    fn name(&self) -> &'static str;

    fn trigger(&self) -> Trigger;

    /// Blocking workers get a dedicated thread from the blocking pool and
    /// may call synchronous I/O freely inside their hooks.
    fn is_blocking(&self) -> bool { false }

    /// Called once before the first `work()`. An error here stops the worker
    /// without calling `on_shutdown`.
    async fn on_start(&mut self, _ctx: &WorkerContext) -> WorkResult { Ok(()) }

    async fn work(&mut self, ctx: &WorkerContext) -> WorkResult;

    /// Called once after the run loop ends, whether by cancellation or by a
    /// fatal error.
    async fn on_shutdown(&mut self, _ctx: &WorkerContext) -> WorkResult { Ok(()) }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Noop;

    #[async_trait::async_trait]
    impl Worker for Noop {
        fn name(&self) -> &'static str { "noop" }

        fn trigger(&self) -> Trigger { Trigger::Once }

        async fn work(&mut self, _ctx: &WorkerContext) -> WorkResult { Ok(()) }
    }

    #[test]
    fn test_defaults() {
        let noop = Noop;
        assert_eq!(noop.name(), "noop");
        assert_eq!(noop.trigger(), Trigger::Once);
        assert!(!noop.is_blocking());
    }
}
