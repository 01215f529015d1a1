//! Size-triggered rotation of a dataset file into numbered backups.
//!
//! `name.1` is always the most recent backup and `name.<max>` the oldest.
//! The chain is shifted one rename at a time; a crash in the middle can leave
//! a gap in the numbering but never loses the live file's contents.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use log::{debug, info};

use crate::error::{IoResultExt, Result};
use crate::schema::{create_schema, read_schema};

/// What a rotation check observed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RotateOutcome {
    /// Size of the live file before any rotation.
    pub size: u64,
    pub rotated: bool,
}

/// Path of backup number `index` for the dataset file at `path`.
pub fn backup_path(path: &Path, index: u32) -> PathBuf {
    let mut name = path.as_os_str().to_os_string();
    name.push(format!(".{index}"));
    PathBuf::from(name)
}

/// Existing backups of `path`, most recent first.
pub fn list_backups(path: &Path, max: u32) -> Vec<PathBuf> {
    (1..=max)
        .map(|index| backup_path(path, index))
        .filter(|backup| backup.is_file())
        .collect()
}

/// Rotates `path` when it has reached `threshold` bytes, keeping at most
/// `max` backups. The fresh live file carries the same schema.
pub fn rotate_if_needed(path: &Path, threshold: u64, max: u32) -> Result<RotateOutcome> {
    let size = fs::metadata(path).at(path)?.len();
    if size < threshold {
        return Ok(RotateOutcome {
            size,
            rotated: false,
        });
    }

    let schema = read_schema(path)?;

    let oldest = backup_path(path, max);
    remove_if_present(&oldest)?;
    for index in (1..max).rev() {
        let from = backup_path(path, index);
        let to = backup_path(path, index + 1);
        if rename_if_present(&from, &to)? {
            debug!("shifted {} -> {}", from.display(), to.display());
        }
    }
    let first = backup_path(path, 1);
    fs::rename(path, &first).at(path)?;
    create_schema(path, &schema)?;

    info!(
        "rotated {} at {} bytes into {}",
        path.display(),
        size,
        first.display()
    );
    Ok(RotateOutcome {
        size,
        rotated: true,
    })
}

fn remove_if_present(path: &Path) -> Result<()> {
    match fs::remove_file(path) {
        Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(()),
        other => other.at(path),
    }
}

fn rename_if_present(from: &Path, to: &Path) -> Result<bool> {
    match fs::rename(from, to) {
        Ok(()) => Ok(true),
        Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(false),
        Err(err) => Err(err).at(from),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn backup_names_are_numbered_suffixes() {
        assert_eq!(backup_path(Path::new("/srv/log/cpu"), 3), PathBuf::from("/srv/log/cpu.3"));
    }

    #[test]
    fn below_threshold_is_untouched() {
        let dir = tempdir().expect("tempdir");
        let path = dir.path().join("m");
        fs::write(&path, "unixtime|timestamp|v\n1|t|x\n").expect("write");

        let outcome = rotate_if_needed(&path, 1024, 3).expect("rotate");

        assert!(!outcome.rotated);
        assert!(list_backups(&path, 3).is_empty());
    }

    #[test]
    fn rotation_shifts_chain_and_drops_oldest() {
        let dir = tempdir().expect("tempdir");
        let path = dir.path().join("m");
        let header = "unixtime|timestamp|v\n";

        for round in 0..4 {
            fs::write(&path, format!("{header}{round}|t|x\n")).expect("write");
            let outcome = rotate_if_needed(&path, 10, 2).expect("rotate");
            assert!(outcome.rotated);
        }

        assert_eq!(fs::read_to_string(&path).expect("live"), header);
        assert_eq!(
            fs::read_to_string(backup_path(&path, 1)).expect("backup 1"),
            format!("{header}3|t|x\n")
        );
        assert_eq!(
            fs::read_to_string(backup_path(&path, 2)).expect("backup 2"),
            format!("{header}2|t|x\n")
        );
        assert!(!backup_path(&path, 3).exists());
        assert_eq!(list_backups(&path, 5).len(), 2);
    }

    #[test]
    fn rotation_at_exact_threshold() {
        let dir = tempdir().expect("tempdir");
        let path = dir.path().join("m");
        let content = "a|b\n1|2\n";
        fs::write(&path, content).expect("write");

        let outcome = rotate_if_needed(&path, content.len() as u64, 10).expect("rotate");

        assert!(outcome.rotated);
        assert_eq!(outcome.size, content.len() as u64);
        assert_eq!(fs::read_to_string(&path).expect("live"), "a|b\n");
    }
}
