use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};

use crate::error::{IoResultExt, Result};

/// Exclusive advisory lock serializing operations on one dataset.
///
/// Backed by `flock` on a hidden `.<name>.lock` file next to the dataset, so
/// it excludes other processes as well as other handles in this process.
/// The lock is released when the guard drops. Lock files are never removed:
/// removing one while a waiter holds it open would split the lock.
#[derive(Debug)]
pub struct DatasetLock {
    file: File,
    path: PathBuf,
}

impl DatasetLock {
    /// Blocks until the lock for `name` under `root` is held.
    pub fn acquire(root: &Path, name: &str) -> Result<Self> {
        let path = lock_path(root, name);
        let file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(&path)
            .at(&path)?;
        lock_exclusive(&file).at(&path)?;
        Ok(Self { file, path })
    }

    /// Acquires the locks of two datasets in a fixed order.
    pub fn acquire_pair(root: &Path, first: &str, second: &str) -> Result<(Self, Option<Self>)> {
        if first == second {
            return Ok((Self::acquire(root, first)?, None));
        }
        let (low, high) = if first < second {
            (first, second)
        } else {
            (second, first)
        };
        let low = Self::acquire(root, low)?;
        let high = Self::acquire(root, high)?;
        Ok((low, Some(high)))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for DatasetLock {
    fn drop(&mut self) {
        let _ = unlock(&self.file);
    }
}

pub(crate) fn lock_path(root: &Path, name: &str) -> PathBuf {
    root.join(format!(".{name}.lock"))
}

#[cfg(unix)]
fn lock_exclusive(file: &File) -> std::io::Result<()> {
    use std::os::unix::io::AsRawFd;
    loop {
        let res = unsafe { libc::flock(file.as_raw_fd(), libc::LOCK_EX) };
        if res == 0 {
            return Ok(());
        }
        let err = std::io::Error::last_os_error();
        if err.kind() != std::io::ErrorKind::Interrupted {
            return Err(err);
        }
    }
}

#[cfg(unix)]
fn unlock(file: &File) -> std::io::Result<()> {
    use std::os::unix::io::AsRawFd;
    let res = unsafe { libc::flock(file.as_raw_fd(), libc::LOCK_UN) };
    if res == 0 {
        Ok(())
    } else {
        Err(std::io::Error::last_os_error())
    }
}

#[cfg(not(unix))]
fn lock_exclusive(_file: &File) -> std::io::Result<()> {
    Ok(())
}

#[cfg(not(unix))]
fn unlock(_file: &File) -> std::io::Result<()> {
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;
    use std::thread;
    use std::time::Duration;
    use tempfile::tempdir;

    #[test]
    fn lock_file_is_hidden_sibling() {
        let dir = tempdir().expect("tempdir");
        let lock = DatasetLock::acquire(dir.path(), "cpu").expect("lock");
        assert_eq!(lock.path(), dir.path().join(".cpu.lock"));
        assert!(lock.path().exists());
    }

    #[test]
    fn second_holder_waits_for_release() {
        let dir = tempdir().expect("tempdir");
        let root = dir.path().to_path_buf();
        let released = Arc::new(AtomicBool::new(false));

        let guard = DatasetLock::acquire(&root, "cpu").expect("lock");
        let waiter = {
            let root = root.clone();
            let released = Arc::clone(&released);
            thread::spawn(move || {
                let _guard = DatasetLock::acquire(&root, "cpu").expect("lock in thread");
                released.load(Ordering::SeqCst)
            })
        };

        thread::sleep(Duration::from_millis(50));
        released.store(true, Ordering::SeqCst);
        drop(guard);

        assert!(waiter.join().expect("join"));
    }

    #[test]
    fn pair_on_same_name_locks_once() {
        let dir = tempdir().expect("tempdir");
        let (_first, second) = DatasetLock::acquire_pair(dir.path(), "a", "a").expect("lock");
        assert!(second.is_none());
    }
}
