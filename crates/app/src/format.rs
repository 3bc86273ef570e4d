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


//! Log levels and line prefix rendering.

use std::{fmt::Write as _, panic::Location, str::FromStr};

use chrono::{
    DateTime, Local,
    format::{Item, StrftimeItems},
};
use serde::{Deserialize, Serialize};
use snafu::Snafu;

use crate::error::{Result, TimeFormatSnafu};

pub const DEFAULT_LINE_FORMAT: &str = "%loglevel% - %time% - %file% | ";
pub const DEFAULT_TIME_FORMAT: &str = "%Y-%m-%d, %I.%M %p";

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, derive_more::Display,
)]
#[serde(rename_all = "snake_case")]
pub enum Level {
    #[display("INFO")]
    Info,
    #[display("WARNING")]
    Warning,
    #[display("DEBUG")]
    Debug,
    #[display("ERROR")]
    Error,
}

impl Level {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Info => "INFO",
            Self::Warning => "WARNING",
            Self::Debug => "DEBUG",
            Self::Error => "ERROR",
        }
    }

    /// Debug records jump the queue.
    #[must_use]
    pub const fn is_priority(self) -> bool { matches!(self, Self::Debug) }
}

#[derive(Debug, Snafu)]
#[snafu(display("Unknown log level {input:?}, expected info, warning, debug or error"))]
pub struct ParseLevelError {
    input: String,
}

impl FromStr for Level {
    type Err = ParseLevelError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "info" => Ok(Self::Info),
            "warning" | "warn" => Ok(Self::Warning),
            "debug" => Ok(Self::Debug),
            "error" => Ok(Self::Error),
            _ => ParseLevelSnafu { input: s }.fail(),
        }
    }
}

/// Returns `true` if chrono accepts every specifier in `format`.
#[must_use]
pub fn is_valid_time_format(format: &str) -> bool {
    !StrftimeItems::new(format).any(|item| matches!(item, Item::Error))
}

/// Renders the prefix put in front of every message.
///
/// The template understands three tokens:
///
/// | token        | value                                   |
/// |--------------|-----------------------------------------|
/// | `%loglevel%` | `INFO`, `WARNING`, `DEBUG` or `ERROR`   |
/// | `%time%`     | local time rendered with `time_format`  |
/// | `%file%`     | `path:line` of the logging call         |
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LineFormat {
    template:    String,
    time_format: String,
}

impl Default for LineFormat {
    fn default() -> Self {
        Self {
            template:    DEFAULT_LINE_FORMAT.to_string(),
            time_format: DEFAULT_TIME_FORMAT.to_string(),
        }
    }
}

impl LineFormat {
    pub fn new(template: impl Into<String>, time_format: impl Into<String>) -> Result<Self> {
        let time_format = time_format.into();
        snafu::ensure!(
            is_valid_time_format(&time_format),
            TimeFormatSnafu {
                format: time_format
            }
        );
        Ok(Self {
            template: template.into(),
            time_format,
        })
    }

    #[must_use]
    pub fn time_format(&self) -> &str { &self.time_format }

    #[must_use]
    pub fn timestamp(&self, at: &DateTime<Local>) -> String {
        let mut out = String::new();
        // validated in `new`, so formatting cannot fail
        let _ = write!(out, "{}", at.format(&self.time_format));
        out
    }

    #[must_use]
    pub fn prefix(&self, level: Level, at: &DateTime<Local>, location: &Location<'_>) -> String {
        self.template
            .replace("%loglevel%", level.as_str())
            .replace("%time%", &self.timestamp(at))
            .replace(
                "%file%",
                &format!("{}:{}", location.file(), location.line()),
            )
    }

    /// Full line: prefix followed by the message, rendered now.
    #[must_use]
    pub fn render(&self, level: Level, location: &Location<'_>, message: &str) -> String {
        let mut line = self.prefix(level, &Local::now(), location);
        line.push_str(message);
        line
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;
    use test_case::test_case;

    use super::*;

    #[test]
    fn test_default_prefix() {
        let at = Local.with_ymd_and_hms(2026, 1, 14, 21, 5, 0).unwrap();
        let location = Location::caller();
        let prefix = LineFormat::default().prefix(Level::Warning, &at, location);
        assert_eq!(
            prefix,
            format!(
                "WARNING - 2026-01-14, 09.05 PM - {}:{} | ",
                location.file(),
                location.line()
            )
        );
    }

    #[test]
    fn test_custom_template_and_unknown_tokens() {
        let format = LineFormat::new("[%loglevel%] %other% ", "%H:%M").unwrap();
        let line = format.render(Level::Debug, Location::caller(), "tick");
        assert_eq!(line, "[DEBUG] %other% tick");
    }

    #[test]
    fn test_invalid_time_format_is_rejected() {
        assert!(LineFormat::new(DEFAULT_LINE_FORMAT, "%!").is_err());
        assert!(is_valid_time_format(DEFAULT_TIME_FORMAT));
    }

    #[test_case("info", Level::Info)]
    #[test_case("WARNING", Level::Warning)]
    #[test_case("warn", Level::Warning)]
    #[test_case("Debug", Level::Debug)]
    #[test_case("error", Level::Error)]
    fn test_level_from_str(input: &str, expected: Level) {
        assert_eq!(input.parse::<Level>().unwrap(), expected);
    }

    #[test]
    fn test_level_parse_error_names_input() {
        let err = "trace".parse::<Level>().unwrap_err();
        assert!(err.to_string().contains("\"trace\""));
    }

    #[test]
    fn test_only_debug_is_priority() {
        assert!(Level::Debug.is_priority());
        for level in [Level::Info, Level::Warning, Level::Error] {
            assert!(!level.is_priority());
            assert_eq!(level.to_string(), level.as_str());
        }
    }
}
