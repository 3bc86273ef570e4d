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
    env,
    io::IsTerminal,
    sync::{Mutex, Once},
};

use bon::Builder;
use once_cell::sync::{Lazy, OnceCell};
use serde::{Deserialize, Serialize};
use smart_default::SmartDefault;
use snafu::ResultExt;
use tracing_appender::{
    non_blocking::WorkerGuard,
    rolling::{RollingFileAppender, Rotation},
};
use tracing_log::LogTracer;
use tracing_subscriber::{
    EnvFilter, Layer, Registry, filter,
    layer::{Layered, SubscriberExt},
    reload,
};

use crate::error::{AppenderSnafu, FilterSnafu, LogBridgeSnafu, Result, SubscriberSnafu};

/// Default directory for diagnostic log files when file output is enabled.
pub const DEFAULT_LOGGING_DIR: &str = "logs/diagnostics";

const DEFAULT_LOG_TARGETS: &str = "info";

type FilteredRegistry = Layered<reload::Layer<filter::Targets, Registry>, Registry>;
type BoxedLayer = Box<dyn Layer<FilteredRegistry> + Send + Sync>;

/// Reload handle for the level filter, set by [`init_global_logging`].
pub static RELOAD_HANDLE: OnceCell<reload::Handle<filter::Targets, Registry>> = OnceCell::new();

/// Options for the diagnostic subscriber.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq, SmartDefault, Builder)]
#[serde(default)]
pub struct LoggingOptions {
    /// Directory for hourly rotated diagnostic files. Empty disables file
    /// output.
    #[default = ""]
    #[builder(default, into)]
    pub dir: String,

    /// Target filter such as `"info,logspool_app=debug"`. Falls back to
    /// `RUST_LOG`, then `info`.
    #[builder(into)]
    pub level: Option<String>,

    #[builder(default)]
    pub log_format: LogFormat,

    /// Rotated files kept per stream.
    #[default = 72]
    #[builder(default = 72)]
    pub max_log_files: usize,

    #[default = true]
    #[builder(default = true)]
    pub append_stdout: bool,

    /// Write to stderr instead of stdout. Used by the consumer process,
    /// whose stdout may be a pipe nobody reads.
    #[default = false]
    #[builder(default)]
    pub use_stderr: bool,
}

#[derive(
    Clone, Debug, Copy, PartialEq, Eq, Serialize, Deserialize, Default, derive_more::Display,
)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    #[display("json")]
    Json,
    #[default]
    #[display("text")]
    Text,
}

static INITIALIZED: Once = Once::new();

static GLOBAL_UT_LOG_GUARD: Lazy<Mutex<Option<Vec<WorkerGuard>>>> = Lazy::new(|| Mutex::new(None));

/// Logging for tests: debug level into `UNITTEST_LOG_DIR`
/// (default `/tmp/__logspool_unittest_logs`). Safe to call from every test.
pub fn init_default_ut_logging() {
    static START: Once = Once::new();

    START.call_once(|| {
        let dir = env::var("UNITTEST_LOG_DIR")
            .unwrap_or_else(|_| "/tmp/__logspool_unittest_logs".to_string());
        let level = env::var("UNITTEST_LOG_LEVEL").unwrap_or_else(|_| "debug".to_string());
        let opts = LoggingOptions::builder()
            .dir(dir.clone())
            .level(level)
            .append_stdout(false)
            .build();

        match init_global_logging("unittest", &opts) {
            Ok(guards) => {
                if let Ok(mut slot) = GLOBAL_UT_LOG_GUARD.lock() {
                    *slot = Some(guards);
                }
                tracing::info!("logs dir = {}", dir);
            }
            Err(e) => eprintln!("unit test logging disabled: {e}"),
        }
    });
}

fn fmt_layer<W>(writer: W, format: LogFormat, ansi: bool) -> BoxedLayer
where
    W: for<'w> tracing_subscriber::fmt::MakeWriter<'w> + Send + Sync + 'static,
{
    match format {
        LogFormat::Json => tracing_subscriber::fmt::Layer::new()
            .json()
            .with_writer(writer)
            .with_ansi(ansi)
            .with_current_span(true)
            .with_span_list(true)
            .boxed(),
        LogFormat::Text => tracing_subscriber::fmt::Layer::new()
            .with_writer(writer)
            .with_ansi(ansi)
            .boxed(),
    }
}

fn rolling_appender(dir: &str, prefix: &str, max_files: usize) -> Result<RollingFileAppender> {
    RollingFileAppender::builder()
        .rotation(Rotation::HOURLY)
        .filename_prefix(prefix)
        .max_log_files(max_files)
        .build(dir)
        .context(AppenderSnafu { dir })
}

/// Installs the global subscriber.
///
/// Layers: stdout or stderr, an hourly `{app_name}` file and an error-only
/// `{app_name}-err` file when `dir` is set. The level filter is reloadable
/// through [`RELOAD_HANDLE`]. Only the first call installs anything; later
/// calls return no guards.
///
/// The returned guards flush the non-blocking writers when dropped and must
/// outlive all logging.
pub fn init_global_logging(app_name: &str, opts: &LoggingOptions) -> Result<Vec<WorkerGuard>> {
    let mut result = Ok(Vec::new());
    INITIALIZED.call_once(|| result = install(app_name, opts));
    result
}

fn install(app_name: &str, opts: &LoggingOptions) -> Result<Vec<WorkerGuard>> {
    let mut guards = vec![];

    let level = opts
        .level
        .clone()
        .or_else(|| env::var(EnvFilter::DEFAULT_ENV).ok())
        .unwrap_or_else(|| DEFAULT_LOG_TARGETS.to_string());
    let targets = level
        .parse::<filter::Targets>()
        .context(FilterSnafu { filter: &level })?;

    let mut layers: Vec<BoxedLayer> = Vec::new();

    if opts.append_stdout {
        let (writer, guard, ansi) = if opts.use_stderr {
            let (w, g) = tracing_appender::non_blocking(std::io::stderr());
            (w, g, std::io::stderr().is_terminal())
        } else {
            let (w, g) = tracing_appender::non_blocking(std::io::stdout());
            (w, g, std::io::stdout().is_terminal())
        };
        guards.push(guard);
        layers.push(fmt_layer(writer, opts.log_format, ansi));
    }

    if !opts.dir.is_empty() {
        let (writer, guard) = tracing_appender::non_blocking(rolling_appender(
            &opts.dir,
            app_name,
            opts.max_log_files,
        )?);
        guards.push(guard);
        layers.push(fmt_layer(writer, opts.log_format, false));

        let (writer, guard) = tracing_appender::non_blocking(rolling_appender(
            &opts.dir,
            &format!("{app_name}-err"),
            opts.max_log_files,
        )?);
        guards.push(guard);
        layers.push(
            tracing_subscriber::fmt::Layer::new()
                .with_writer(writer)
                .with_ansi(false)
                .with_filter(filter::LevelFilter::ERROR)
                .boxed(),
        );
    }

    let (dyn_filter, reload_handle) = reload::Layer::new(targets);
    let _ = RELOAD_HANDLE.set(reload_handle);

    let subscriber = Registry::default().with(dyn_filter).with(layers);

    tracing::subscriber::set_global_default(subscriber).context(SubscriberSnafu)?;
    LogTracer::init().context(LogBridgeSnafu)?;

    Ok(guards)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_options_from_partial_json() {
        let opts: LoggingOptions =
            serde_json::from_str(r#"{"dir": "/var/log/logspool", "log_format": "json"}"#).unwrap();
        assert_eq!(opts.dir, "/var/log/logspool");
        assert_eq!(opts.log_format, LogFormat::Json);
        assert_eq!(opts.max_log_files, 72);
        assert!(opts.append_stdout);
        assert!(!opts.use_stderr);
    }

    #[test]
    fn test_builder_matches_default() {
        assert_eq!(LoggingOptions::builder().build(), LoggingOptions::default());
    }

    #[test]
    fn test_rolling_appender_creates_dir() {
        let temp = tempfile::TempDir::new().unwrap();
        let dir = temp.path().join("diag");
        rolling_appender(dir.to_str().unwrap(), "rolling", 3).unwrap();
        assert!(dir.is_dir());
    }
}
