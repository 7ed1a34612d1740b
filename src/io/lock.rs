// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! Sidecar lock files serializing writers across processes
//!
//! A lock is a `<target>.lock` file created exclusively and stamped with a
//! token unique to its owner. The owner removes it on drop, but only while the
//! file still carries that token.

use std::ffi::OsString;
use std::fs::{self, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::thread;
use std::time::{Duration, Instant, SystemTime};

use tracing::{debug, warn};
use uuid::Uuid;

use crate::{PipestoreError, Result};

/// Lock files older than this are assumed to belong to a dead writer
pub const STALE_LOCK_AGE: Duration = Duration::from_secs(60);

const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Sidecar lock path for a target file (`settings.json` -> `settings.json.lock`)
pub fn lock_path_for(target: &Path) -> PathBuf {
    let mut name = OsString::from(target.as_os_str());
    name.push(".lock");
    PathBuf::from(name)
}

/// Exclusive advisory lock, released on drop
#[derive(Debug)]
pub struct FileLock {
    path: PathBuf,
    token: String,
}

impl FileLock {
    /// Acquire the lock at `path`, waiting at most `timeout`
    pub fn acquire(path: impl Into<PathBuf>, timeout: Duration) -> Result<Self> {
        let path = path.into();
        let token = format!("{}:{}", std::process::id(), Uuid::new_v4());
        let deadline = Instant::now() + timeout;

        loop {
            match OpenOptions::new().write(true).create_new(true).open(&path) {
                Ok(mut file) => {
                    if let Err(e) = file.write_all(token.as_bytes()).and_then(|()| file.flush()) {
                        drop(file);
                        let _ = fs::remove_file(&path);
                        return Err(e.into());
                    }
                    debug!("Acquired lock {:?}", path);
                    return Ok(Self { path, token });
                }
                Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                    if is_stale(&path) && break_stale(&path)? {
                        continue;
                    }
                }
                Err(e) => return Err(e.into()),
            }

            let now = Instant::now();
            if now >= deadline {
                return Err(PipestoreError::LockTimeout { path, timeout });
            }
            thread::sleep(POLL_INTERVAL.min(deadline - now));
        }
    }

    /// Path of the sidecar lock file
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Owner token written into the lock file
    pub fn token(&self) -> &str {
        &self.token
    }
}

impl Drop for FileLock {
    fn drop(&mut self) {
        match fs::read_to_string(&self.path) {
            Ok(content) if content == self.token => match fs::remove_file(&self.path) {
                Ok(()) => debug!("Released lock {:?}", self.path),
                Err(e) if e.kind() == ErrorKind::NotFound => {}
                Err(e) => warn!("Failed to release lock {:?}: {}", self.path, e),
            },
            Ok(_) => warn!("Lock {:?} was taken over by another writer", self.path),
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => warn!("Failed to read lock {:?}: {}", self.path, e),
        }
    }
}

fn is_stale(path: &Path) -> bool {
    fs::metadata(path)
        .and_then(|meta| meta.modified())
        .ok()
        .and_then(|modified| SystemTime::now().duration_since(modified).ok())
        .map_or(false, |age| age > STALE_LOCK_AGE)
}

/// Move a stale lock aside under a unique name, then delete it.
///
/// Returns `false` when the lock changed hands in the meantime; a fresh lock
/// moved aside by mistake is linked back into place.
fn break_stale(path: &Path) -> Result<bool> {
    let seen = match fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(true),
        Err(e) => return Err(e.into()),
    };

    let mut aside = OsString::from(path.as_os_str());
    aside.push(format!(".stale-{}", Uuid::new_v4()));
    let aside = PathBuf::from(aside);

    match fs::rename(path, &aside) {
        Ok(()) => {}
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(true),
        Err(e) => return Err(e.into()),
    }

    if fs::read_to_string(&aside).ok().as_deref() != Some(seen.as_str()) {
        if let Err(e) = fs::hard_link(&aside, path) {
            warn!("Could not restore lock {:?}: {}", path, e);
        }
        let _ = fs::remove_file(&aside);
        return Ok(false);
    }

    warn!("Breaking stale lock {:?}", path);
    fs::remove_file(&aside)?;
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::File;
    use tempfile::TempDir;

    #[test]
    fn test_lock_path_appends_suffix() {
        let path = lock_path_for(Path::new("/projects/demo/settings.json"));
        assert_eq!(path, PathBuf::from("/projects/demo/settings.json.lock"));
    }

    #[test]
    fn test_lock_file_removed_on_drop() {
        let dir = TempDir::new().unwrap();
        let lock_path = dir.path().join("a.json.lock");

        {
            let lock = FileLock::acquire(&lock_path, Duration::from_millis(100)).unwrap();
            assert_eq!(lock.path(), lock_path.as_path());
            assert!(lock_path.exists());
        }

        assert!(!lock_path.exists());
    }

    #[test]
    fn test_second_acquire_times_out() {
        let dir = TempDir::new().unwrap();
        let lock_path = dir.path().join("a.json.lock");

        let _held = FileLock::acquire(&lock_path, Duration::from_millis(100)).unwrap();
        let started = Instant::now();
        let result = FileLock::acquire(&lock_path, Duration::from_millis(200));

        assert!(matches!(result, Err(PipestoreError::LockTimeout { .. })));
        assert!(started.elapsed() >= Duration::from_millis(200));
    }

    #[test]
    fn test_lock_can_be_reacquired_after_release() {
        let dir = TempDir::new().unwrap();
        let lock_path = dir.path().join("a.json.lock");

        drop(FileLock::acquire(&lock_path, Duration::from_millis(100)).unwrap());
        assert!(FileLock::acquire(&lock_path, Duration::from_millis(100)).is_ok());
    }

    fn age_lock(path: &Path) {
        let file = OpenOptions::new().write(true).open(path).unwrap();
        file.set_modified(SystemTime::now() - STALE_LOCK_AGE - Duration::from_secs(1)).unwrap();
    }

    #[test]
    fn test_broken_owner_does_not_release_new_owner() {
        let dir = TempDir::new().unwrap();
        let lock_path = dir.path().join("a.json.lock");

        let first = FileLock::acquire(&lock_path, Duration::from_millis(100)).unwrap();
        age_lock(&lock_path);

        let second = FileLock::acquire(&lock_path, Duration::from_millis(100)).unwrap();
        assert_ne!(first.token(), second.token());
        drop(first);

        assert_eq!(fs::read_to_string(&lock_path).unwrap(), second.token());
        let third = FileLock::acquire(&lock_path, Duration::from_millis(100));
        assert!(matches!(third, Err(PipestoreError::LockTimeout { .. })));

        drop(second);
        assert!(!lock_path.exists());
    }

    #[test]
    fn test_drop_leaves_foreign_lock_file() {
        let dir = TempDir::new().unwrap();
        let lock_path = dir.path().join("a.json.lock");

        let lock = FileLock::acquire(&lock_path, Duration::from_millis(100)).unwrap();
        fs::write(&lock_path, "someone-else").unwrap();
        drop(lock);

        assert_eq!(fs::read_to_string(&lock_path).unwrap(), "someone-else");
    }

    #[test]
    fn test_breaking_leaves_no_stray_files() {
        let dir = TempDir::new().unwrap();
        let lock_path = dir.path().join("a.json.lock");
        fs::write(&lock_path, "dead-writer").unwrap();
        age_lock(&lock_path);

        drop(FileLock::acquire(&lock_path, Duration::from_millis(100)).unwrap());
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn test_stale_lock_is_broken() {
        let dir = TempDir::new().unwrap();
        let lock_path = dir.path().join("a.json.lock");

        let file = File::create(&lock_path).unwrap();
        let old = SystemTime::now() - STALE_LOCK_AGE - Duration::from_secs(5);
        file.set_modified(old).unwrap();
        drop(file);

        let lock = FileLock::acquire(&lock_path, Duration::from_millis(100));
        assert!(lock.is_ok());
    }
}
