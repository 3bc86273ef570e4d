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


//! Destination resolution and the rename-on-restart of `latest.log`.

use std::{
    fmt::Write as _,
    fs, io,
    path::{Path, PathBuf},
};

use chrono::{DateTime, Local};
use snafu::{ResultExt, ensure};
use tracing::{info, warn};

use crate::{
    error::{FileStampFormatSnafu, InspectSnafu, Result, RotateSnafu},
    format::{DEFAULT_TIME_FORMAT, is_valid_time_format},
};

pub const LATEST_FILE_NAME: &str = "latest.log";
pub const TIMENOW_PLACEHOLDER: &str = "%TIMENOW%";
pub const DEFAULT_FILE_TIME_FORMAT: &str = DEFAULT_TIME_FORMAT;

/// strftime pattern for the time part of log file names.
///
/// Kept apart from the line time format, which may contain path separators.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StampFormat(String);

impl Default for StampFormat {
    fn default() -> Self { Self(DEFAULT_FILE_TIME_FORMAT.to_string()) }
}

impl StampFormat {
    /// Rejects patterns chrono cannot render and patterns whose output
    /// contains a path separator.
    pub fn new(format: impl Into<String>) -> Result<Self> {
        let format = format.into();
        ensure!(is_valid_time_format(&format), FileStampFormatSnafu { format });
        let stamp = Self(format);
        ensure!(
            !stamp.render(&Local::now()).contains(std::path::is_separator),
            FileStampFormatSnafu { format: stamp.0 }
        );
        Ok(stamp)
    }

    #[must_use]
    pub fn as_str(&self) -> &str { &self.0 }

    #[must_use]
    pub fn render(&self, at: &DateTime<Local>) -> String {
        let mut out = String::new();
        let _ = write!(out, "{}", at.format(&self.0));
        out
    }
}

/// Turns a destination template into the file records are written to.
///
/// `stamp` replaces `%TIMENOW%`; `.log` is appended when missing. With
/// `latest_alias` the result is `latest.log` in the same directory.
#[must_use]
pub fn resolve_destination(template: &str, latest_alias: bool, stamp: &str) -> PathBuf {
    let mut name = template.replace(TIMENOW_PLACEHOLDER, stamp);
    if !name.ends_with(".log") {
        name.push_str(".log");
    }
    let path = PathBuf::from(name);
    if latest_alias {
        path.with_file_name(LATEST_FILE_NAME)
    } else {
        path
    }
}

/// Archives a leftover `latest` file under its creation time.
///
/// Falls back to the modification time where creation time is not
/// recorded. Returns the archive path, or `None` when there was nothing to
/// rotate.
pub fn rotate_latest(latest: &Path, stamp: &StampFormat) -> Result<Option<PathBuf>> {
    let meta = match fs::metadata(latest) {
        Ok(meta) => meta,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e).context(InspectSnafu { path: latest }),
    };
    let born = meta
        .created()
        .or_else(|_| meta.modified())
        .context(InspectSnafu { path: latest })?;
    let stamp = stamp.render(&DateTime::<Local>::from(born));
    archive_as(latest, &stamp)
}

/// Moves `latest` to `<stamp>.log`, or `<stamp> (n).log` when taken.
/// `n` starts at the number of entries already carrying `stamp`.
///
/// The archive name is taken with a hard link, which fails instead of
/// replacing an existing file, so concurrent rotations never clobber each
/// other. Returns `None` when `latest` vanished first.
pub(crate) fn archive_as(latest: &Path, stamp: &str) -> Result<Option<PathBuf>> {
    let mut target = latest.with_file_name(format!("{stamp}.log"));
    let mut n = None;
    loop {
        match fs::hard_link(latest, &target) {
            Ok(()) => break,
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {
                let next = match n {
                    Some(n) => n + 1,
                    None => count_stamped(latest, stamp)?.max(1),
                };
                n = Some(next);
                target = latest.with_file_name(format!("{stamp} ({next}).log"));
            }
            // moved away by a concurrent rotation
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                // no hard links on this filesystem
                warn!(error = %e, "Hard link failed, renaming instead");
                if target.exists() {
                    let next = n.map_or(1, |n| n + 1);
                    n = Some(next);
                    target = latest.with_file_name(format!("{stamp} ({next}).log"));
                    continue;
                }
                fs::rename(latest, &target).context(RotateSnafu {
                    from: latest,
                    to:   &target,
                })?;
                info!(from = %latest.display(), to = %target.display(), "Archived previous log");
                return Ok(Some(target));
            }
        }
    }

    match fs::remove_file(latest) {
        Err(e) if e.kind() != io::ErrorKind::NotFound => {
            return Err(e).context(RotateSnafu {
                from: latest,
                to:   &target,
            });
        }
        _ => {}
    }
    info!(from = %latest.display(), to = %target.display(), "Archived previous log");
    Ok(Some(target))
}

fn count_stamped(latest: &Path, stamp: &str) -> Result<usize> {
    let dir = match latest.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir,
        _ => Path::new("."),
    };
    Ok(fs::read_dir(dir)
        .context(InspectSnafu { path: dir })?
        .filter_map(std::result::Result::ok)
        .filter(|entry| entry.file_name().to_string_lossy().contains(stamp))
        .count())
}

#[cfg(test)]
mod tests {
    use tempfile::TempDir;
    use test_case::test_case;

    use super::*;

    #[test_case("logs/%TIMENOW%.log", true, "logs/latest.log" ; "alias in template dir")]
    #[test_case("logs/%TIMENOW%.log", false, "logs/T1.log" ; "timestamped")]
    #[test_case("logs/%TIMENOW%", false, "logs/T1.log" ; "extension appended")]
    #[test_case("%TIMENOW%", true, "latest.log" ; "alias without dir")]
    #[test_case("/var/log/app-%TIMENOW%.txt", false, "/var/log/app-T1.txt.log" ; "foreign extension")]
    fn test_resolve_destination(template: &str, alias: bool, expected: &str) {
        assert_eq!(
            resolve_destination(template, alias, "T1"),
            PathBuf::from(expected)
        );
    }

    #[test]
    fn test_nothing_to_rotate() {
        let temp = TempDir::new().unwrap();
        let latest = temp.path().join(LATEST_FILE_NAME);
        assert_eq!(rotate_latest(&latest, &StampFormat::default()).unwrap(), None);
    }

    #[test]
    fn test_rotation_moves_latest_aside() {
        let temp = TempDir::new().unwrap();
        let latest = temp.path().join(LATEST_FILE_NAME);
        fs::write(&latest, "previous run\n").unwrap();

        let archived = rotate_latest(&latest, &StampFormat::default())
            .unwrap()
            .unwrap();
        assert!(!latest.exists());
        assert_eq!(archived.parent(), Some(temp.path()));
        assert_eq!(fs::read_to_string(archived).unwrap(), "previous run\n");
    }

    #[test]
    fn test_same_stamp_never_overwrites() {
        let temp = TempDir::new().unwrap();
        let latest = temp.path().join(LATEST_FILE_NAME);

        let mut archives = Vec::new();
        for run in 0..3 {
            fs::write(&latest, format!("run {run}\n")).unwrap();
            archives.push(archive_as(&latest, "2026-01-14, 09.05 PM").unwrap().unwrap());
        }

        let names: Vec<_> = archives
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, [
            "2026-01-14, 09.05 PM.log",
            "2026-01-14, 09.05 PM (1).log",
            "2026-01-14, 09.05 PM (2).log",
        ]);
        for (run, path) in archives.iter().enumerate() {
            assert_eq!(fs::read_to_string(path).unwrap(), format!("run {run}\n"));
        }
    }

    #[test]
    fn test_concurrent_archives_keep_every_file() {
        let temp = TempDir::new().unwrap();
        let sources: Vec<_> = (0..8)
            .map(|i| {
                let path = temp.path().join(format!("src{i}.log"));
                fs::write(&path, format!("source {i}\n")).unwrap();
                path
            })
            .collect();

        let barrier = std::sync::Barrier::new(sources.len());
        let archives: Vec<PathBuf> = std::thread::scope(|s| {
            let handles: Vec<_> = sources
                .iter()
                .map(|source| {
                    let barrier = &barrier;
                    s.spawn(move || {
                        barrier.wait();
                        archive_as(source, "same minute").unwrap().unwrap()
                    })
                })
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });

        let mut contents: Vec<_> = archives
            .iter()
            .map(|p| fs::read_to_string(p).unwrap())
            .collect();
        contents.sort();
        let expected: Vec<_> = (0..8).map(|i| format!("source {i}\n")).collect();
        assert_eq!(contents, expected);
        assert!(sources.iter().all(|s| !s.exists()));
    }

    #[test]
    fn test_vanished_latest_is_not_an_error() {
        let temp = TempDir::new().unwrap();
        let latest = temp.path().join(LATEST_FILE_NAME);
        assert_eq!(archive_as(&latest, "stamp").unwrap(), None);
    }

    #[test_case("%Y-%m-%d" ; "date")]
    #[test_case("%Y-%m-%d, %I.%M %p" ; "default")]
    fn test_file_stamp_accepts_plain_names(format: &str) {
        let stamp = StampFormat::new(format).unwrap();
        assert!(!stamp.render(&Local::now()).contains('/'));
    }

    #[test_case("%d/%m" ; "slash")]
    #[test_case("%D" ; "slash from specifier")]
    #[test_case("%!" ; "unknown specifier")]
    fn test_file_stamp_rejects(format: &str) {
        assert!(StampFormat::new(format).is_err());
    }
}
