use std::fs::{self, File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::Path;

use anyhow::{Context, Result, bail};
use fs2::FileExt;

use crate::config;

/// Held for the whole learn run so two runs never play courses for the
/// same account at once.
pub struct LearnerLock {
    file: File,
}

pub enum LockState {
    Free,
    Held { pid: Option<u32> },
}

impl Drop for LearnerLock {
    fn drop(&mut self) {
        let _ = self.file.set_len(0);
        let _ = self.file.unlock();
    }
}

pub fn acquire() -> Result<LearnerLock> {
    acquire_at(&config::lock_path())
}

pub fn acquire_at(path: &Path) -> Result<LearnerLock> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("failed to create lock directory {}", parent.display()))?;
    }

    let mut file = open_lock_file(path)?;
    if file.try_lock_exclusive().is_err() {
        match read_pid(path) {
            Some(pid) => bail!("another hebgb-study run is already learning (PID {pid})"),
            None => bail!("another hebgb-study run is already learning"),
        }
    }

    file.seek(SeekFrom::Start(0))?;
    file.set_len(0)?;
    file.write_all(std::process::id().to_string().as_bytes())?;
    file.flush()?;
    Ok(LearnerLock { file })
}

pub fn inspect() -> Result<LockState> {
    inspect_at(&config::lock_path())
}

pub fn inspect_at(path: &Path) -> Result<LockState> {
    if !path.exists() {
        return Ok(LockState::Free);
    }

    let file = open_lock_file(path)?;
    match file.try_lock_exclusive() {
        Ok(()) => {
            let _ = file.unlock();
            Ok(LockState::Free)
        }
        Err(_) => Ok(LockState::Held {
            pid: read_pid(path),
        }),
    }
}

fn open_lock_file(path: &Path) -> Result<File> {
    OpenOptions::new()
        .create(true)
        .read(true)
        .write(true)
        .truncate(false)
        .open(path)
        .with_context(|| format!("failed to open lock file {}", path.display()))
}

fn read_pid(path: &Path) -> Option<u32> {
    let mut raw = String::new();
    File::open(path).ok()?.read_to_string(&mut raw).ok()?;
    raw.trim().parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn second_acquire_fails_while_held() {
        let tmp = TempDir::new().expect("temp dir");
        let path = tmp.path().join("study.lock");

        let guard = acquire_at(&path).expect("first acquire");
        let err = acquire_at(&path).err().expect("second acquire must fail");
        assert!(err.to_string().contains("already learning"));

        match inspect_at(&path).expect("inspect") {
            LockState::Held { .. } => {}
            LockState::Free => panic!("expected held lock"),
        }

        drop(guard);
        match inspect_at(&path).expect("inspect after drop") {
            LockState::Free => {}
            LockState::Held { .. } => panic!("expected free lock after release"),
        }
        acquire_at(&path).expect("re-acquire after release");
    }

    #[test]
    fn missing_lock_file_is_free() {
        let tmp = TempDir::new().expect("temp dir");
        match inspect_at(&tmp.path().join("absent.lock")).expect("inspect") {
            LockState::Free => {}
            LockState::Held { .. } => panic!("expected free"),
        }
    }
}
