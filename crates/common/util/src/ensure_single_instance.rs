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


//! One consumer per queue directory, across unrelated processes.
//!
//! The running consumer's pid is kept in a small file inside the queue
//! directory. A pid only counts if the process is still alive and not a
//! zombie, so a crashed consumer never blocks its successor. Claims are
//! serialized through an exclusive lock on a sibling `.lock` file, so two
//! claimants never both win.

use std::{
    fs::{self, OpenOptions},
    io,
    path::{Path, PathBuf},
};

use fd_lock::RwLock;
use snafu::{ResultExt, Snafu};
use sysinfo::{Pid, ProcessStatus, ProcessesToUpdate, System};

#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum PidFileError {
    #[snafu(display("Pid file I/O on {}: {source}", path.display()))]
    PidFileIo {
        path:   PathBuf,
        source: io::Error,
        #[snafu(implicit)]
        loc:    snafu::Location,
    },
}

type Result<T> = std::result::Result<T, PidFileError>;

/// Outcome of [`PidFile::claim`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Claim {
    /// The file now names the claiming pid.
    Claimed,
    /// Another live process already holds the file.
    Held(u32),
}

/// Returns `true` when `pid` names a running, non-zombie process.
#[must_use]
pub fn is_process_alive(pid: u32) -> bool {
    let pid = Pid::from_u32(pid);
    let mut sys = System::new();
    sys.refresh_processes(ProcessesToUpdate::Some(&[pid]), true);
    sys.process(pid)
        .is_some_and(|p| !matches!(p.status(), ProcessStatus::Zombie | ProcessStatus::Dead))
}

#[derive(Debug, Clone)]
pub struct PidFile {
    path: PathBuf,
}

impl PidFile {
    pub fn new(path: impl Into<PathBuf>) -> Self { Self { path: path.into() } }

    #[must_use]
    pub fn path(&self) -> &Path { &self.path }

    /// Pid recorded in the file. Missing or unparsable files read as `None`.
    pub fn read(&self) -> Result<Option<u32>> {
        match fs::read_to_string(&self.path) {
            Ok(body) => Ok(body.trim().parse().ok()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e).context(PidFileIoSnafu { path: &self.path }),
        }
    }

    /// Recorded pid, only if that process is still alive.
    pub fn live_pid(&self) -> Result<Option<u32>> {
        Ok(self.read()?.filter(|pid| is_process_alive(*pid)))
    }

    /// Records `pid`, replacing whatever the file held.
    pub fn write(&self, pid: u32) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).context(PidFileIoSnafu { path: parent })?;
        }
        let temp = self.path.with_extension(format!("pid.{pid}.tmp"));
        fs::write(&temp, format!("{pid}\n"))
            .and_then(|()| fs::rename(&temp, &self.path))
            .context(PidFileIoSnafu { path: &self.path })
    }

    /// Records `pid` unless a different live process already holds the file.
    ///
    /// The check and the write happen under an exclusive file lock, so
    /// concurrent claimants across threads and processes see each other.
    pub fn claim(&self, pid: u32) -> Result<Claim> {
        let lock_path = self.lock_path();
        if let Some(parent) = lock_path.parent() {
            fs::create_dir_all(parent).context(PidFileIoSnafu { path: parent })?;
        }
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&lock_path)
            .context(PidFileIoSnafu { path: &lock_path })?;
        let mut lock = RwLock::new(file);
        let _guard = lock
            .write()
            .context(PidFileIoSnafu { path: &lock_path })?;

        match self.live_pid()? {
            Some(holder) if holder != pid => Ok(Claim::Held(holder)),
            _ => {
                self.write(pid)?;
                Ok(Claim::Claimed)
            }
        }
    }

    fn lock_path(&self) -> PathBuf { self.path.with_extension("pid.lock") }

    /// Deletes the file. Returns `false` if it was already gone.
    pub fn remove(&self) -> Result<bool> {
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e).context(PidFileIoSnafu { path: &self.path }),
        }
    }

    /// Deletes the file only if it still names `pid`.
    pub fn release(&self, pid: u32) -> Result<bool> {
        if self.read()? == Some(pid) {
            self.remove()
        } else {
            tracing::debug!(pid, path = %self.path.display(), "Pid file owned by another process, left alone");
            Ok(false)
        }
    }
}

#[cfg(test)]
mod tests {
    use tempfile::TempDir;

    use super::*;

    #[test]
    fn test_current_process_is_alive() {
        assert!(is_process_alive(std::process::id()));
    }

    #[test]
    fn test_exited_process_is_not_alive() {
        let mut child = std::process::Command::new("true").spawn().unwrap();
        let pid = child.id();
        child.wait().unwrap();
        assert!(!is_process_alive(pid));
    }

    #[test]
    fn test_missing_and_garbage_files_read_as_none() {
        let temp = TempDir::new().unwrap();
        let file = PidFile::new(temp.path().join("consumer.pid"));
        assert_eq!(file.read().unwrap(), None);

        fs::write(file.path(), "not a pid").unwrap();
        assert_eq!(file.read().unwrap(), None);
        assert_eq!(file.live_pid().unwrap(), None);
    }

    #[test]
    fn test_claim_respects_live_holder() {
        let temp = TempDir::new().unwrap();
        let file = PidFile::new(temp.path().join("nested/consumer.pid"));
        let me = std::process::id();

        assert_eq!(file.claim(me).unwrap(), Claim::Claimed);
        assert_eq!(file.read().unwrap(), Some(me));
        assert_eq!(file.claim(me).unwrap(), Claim::Claimed);
        // this test process is alive, so nobody else gets the file
        assert_eq!(file.claim(me + 1).unwrap(), Claim::Held(me));
    }

    #[test]
    fn test_stale_holder_is_replaced() {
        let temp = TempDir::new().unwrap();
        let file = PidFile::new(temp.path().join("consumer.pid"));

        let mut child = std::process::Command::new("true").spawn().unwrap();
        let dead = child.id();
        child.wait().unwrap();
        file.write(dead).unwrap();

        let me = std::process::id();
        assert_eq!(file.claim(me).unwrap(), Claim::Claimed);
        assert_eq!(file.read().unwrap(), Some(me));
    }

    #[test]
    fn test_concurrent_claims_have_one_winner() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("consumer.pid");
        let mut sleepers: Vec<_> = (0..2)
            .map(|_| std::process::Command::new("sleep").arg("30").spawn().unwrap())
            .collect();
        let pids: Vec<u32> = sleepers.iter().map(std::process::Child::id).collect();

        for _ in 0..50 {
            let _ = fs::remove_file(&path);
            let barrier = std::sync::Barrier::new(pids.len());
            let claims: Vec<Claim> = std::thread::scope(|s| {
                let handles: Vec<_> = pids
                    .iter()
                    .map(|&pid| {
                        let file = PidFile::new(&path);
                        let barrier = &barrier;
                        s.spawn(move || {
                            barrier.wait();
                            file.claim(pid).unwrap()
                        })
                    })
                    .collect();
                handles.into_iter().map(|h| h.join().unwrap()).collect()
            });

            let winners = claims.iter().filter(|c| **c == Claim::Claimed).count();
            assert_eq!(winners, 1, "claims: {claims:?}");
            let holder = PidFile::new(&path).read().unwrap().unwrap();
            assert!(claims.contains(&Claim::Held(holder)));
        }

        for sleeper in &mut sleepers {
            sleeper.kill().unwrap();
            sleeper.wait().unwrap();
        }
    }

    #[test]
    fn test_release_only_removes_own_pid() {
        let temp = TempDir::new().unwrap();
        let file = PidFile::new(temp.path().join("consumer.pid"));
        file.write(42).unwrap();

        assert!(!file.release(7).unwrap());
        assert!(file.path().exists());
        assert!(file.release(42).unwrap());
        assert!(!file.remove().unwrap());
    }
}
