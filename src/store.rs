//! Dataset store: the operation surface consumed by the command line and
//! service front ends.
//!
//! Every operation validates its inputs, takes the dataset's exclusive lock,
//! does its work with freshly opened files and releases the lock on return.
//! Nothing is cached between calls.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use log::info;

use crate::clock::{Clock, SystemClock};
use crate::config::StoreConfig;
use crate::error::{Error, IoResultExt, Result};
use crate::keys::validate_keys;
use crate::lock::DatasetLock;
use crate::payload::{check_shape, IngestRequest};
use crate::query::{scan, QueryOutput, QueryResult, TimeRange};
use crate::rotate::{backup_path, list_backups, rotate_if_needed, RotateOutcome};
use crate::schema::{create_schema, read_schema};
use crate::stamp::stamp;
use crate::writer::append_rows;

/// Outcome of a successful ingest call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AddReport {
    pub rows: u64,
    pub dataset: String,
    /// Whether the call pushed the live file into rotation.
    pub rotated: bool,
}

pub struct Store {
    config: StoreConfig,
    clock: Arc<dyn Clock>,
}

impl Store {
    /// Open a store over `config.root`, creating the directory if needed.
    ///
    /// # Errors
    ///
    /// - `Error::BadJson`: the configuration does not validate
    /// - `Error::Disk`: the root directory could not be created
    pub fn open(config: StoreConfig) -> Result<Self> {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    /// Open with a custom machine-time source.
    pub fn with_clock(config: StoreConfig, clock: Arc<dyn Clock>) -> Result<Self> {
        config.validate()?;
        fs::create_dir_all(&config.root).at(&config.root)?;
        Ok(Self { config, clock })
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    /// File holding the live rows of `name`.
    pub fn dataset_path(&self, name: &str) -> Result<PathBuf> {
        check_name(name)?;
        let file_name = format!("{name}{}", self.config.extension);
        if looks_like_backup(&file_name) {
            return Err(Error::BadDataset(name.to_string()));
        }
        Ok(self.config.root.join(file_name))
    }

    pub fn backup_path(&self, name: &str, index: u32) -> Result<PathBuf> {
        Ok(backup_path(&self.dataset_path(name)?, index))
    }

    /// Existing rotation backups of `name`, most recent first.
    pub fn backups(&self, name: &str) -> Result<Vec<PathBuf>> {
        Ok(list_backups(&self.dataset_path(name)?, self.config.rotate_max))
    }

    pub fn exists(&self, name: &str) -> Result<bool> {
        Ok(self.dataset_path(name)?.is_file())
    }

    /// Current column list of `name`.
    pub fn schema(&self, name: &str) -> Result<Vec<String>> {
        let path = self.dataset_path(name)?;
        let _lock = DatasetLock::acquire(&self.config.root, name)?;
        require_live(&path, name)?;
        read_schema(&path)
    }

    /// Append `rows`, each aligned to `keys`, to dataset `dataset`.
    ///
    /// Creates the dataset on first use, grows its schema for unseen keys and
    /// rotates the live file afterwards when rotation is enabled and the size
    /// threshold is reached.
    ///
    /// # Errors
    ///
    /// - `Error::BadJson`: empty keys or rows, ragged rows, blank dataset name,
    ///   or a supplied machine time that is not an integer
    /// - `Error::BadKeys`: reserved, duplicate or blank keys
    /// - `Error::BadDataset`: the name cannot be used as a file name
    /// - `Error::Disk`: any I/O failure
    pub fn add(
        &self,
        dataset: &str,
        keys: Vec<String>,
        rows: Vec<Vec<String>>,
    ) -> Result<AddReport> {
        check_shape(dataset, &keys, &rows)?;
        validate_keys(&keys, &self.config.display_time_key)?;
        let path = self.dataset_path(dataset)?;
        let stamped = stamp(keys, rows, self.clock.as_ref(), &self.config)?;

        let _lock = DatasetLock::acquire(&self.config.root, dataset)?;
        if !path.is_file() {
            create_schema(&path, &stamped.keys)?;
            info!("created dataset {} at {}", dataset, path.display());
        }
        let written = append_rows(&path, &stamped.keys, &stamped.rows)?;
        let rotated = if self.config.rotate {
            rotate_if_needed(&path, self.config.rotate_size, self.config.rotate_max)?.rotated
        } else {
            false
        };

        Ok(AddReport {
            rows: written,
            dataset: dataset.to_string(),
            rotated,
        })
    }

    pub fn add_request(&self, request: IngestRequest) -> Result<AddReport> {
        self.add(&request.dataset, request.keys, request.values)
    }

    /// Parse an ingest document and add it.
    pub fn add_json(&self, doc: &str) -> Result<AddReport> {
        self.add_request(IngestRequest::parse(doc)?)
    }

    /// Rows of `dataset` with machine time in `[min, max]`, display time
    /// included.
    ///
    /// # Errors
    ///
    /// - `Error::BadQuery`: negative bounds or `max < min`
    /// - `Error::BadDataset`: the dataset does not exist
    /// - `Error::Disk`: the file could not be read or is malformed
    pub fn query(&self, dataset: &str, min: i64, max: i64) -> Result<QueryOutput> {
        let range = TimeRange::new(min, max).ok_or_else(|| Error::bad_query(dataset, min, max))?;
        self.query_output(dataset, range, true)
    }

    /// Like [`query`](Self::query), without the display-time column. This is
    /// the payload forwarded to a peer store.
    pub fn query_for_forward(&self, dataset: &str, min: i64, max: i64) -> Result<QueryOutput> {
        let range = TimeRange::new(min, max).ok_or_else(|| Error::bad_query(dataset, min, max))?;
        self.query_output(dataset, range, false)
    }

    /// [`query`](Self::query) with bounds given as decimal text.
    pub fn query_text(&self, dataset: &str, min: &str, max: &str) -> Result<QueryOutput> {
        let range = TimeRange::parse(min, max).ok_or_else(|| Error::bad_query(dataset, min, max))?;
        self.query_output(dataset, range, true)
    }

    /// [`query_for_forward`](Self::query_for_forward) with bounds given as
    /// decimal text.
    pub fn query_for_forward_text(&self, dataset: &str, min: &str, max: &str) -> Result<QueryOutput> {
        let range = TimeRange::parse(min, max).ok_or_else(|| Error::bad_query(dataset, min, max))?;
        self.query_output(dataset, range, false)
    }

    /// Structured query result, for callers that want rows rather than text.
    pub fn query_result(
        &self,
        dataset: &str,
        range: TimeRange,
        include_display: bool,
    ) -> Result<QueryResult> {
        let path = self.dataset_path(dataset)?;
        let _lock = DatasetLock::acquire(&self.config.root, dataset)?;
        require_live(&path, dataset)?;
        scan(&path, dataset, range, include_display)
    }

    fn query_output(
        &self,
        dataset: &str,
        range: TimeRange,
        include_display: bool,
    ) -> Result<QueryOutput> {
        let result = self.query_result(dataset, range, include_display)?;
        Ok(QueryOutput::from(&result))
    }

    /// Remove the live file of `name`. Rotation backups are kept.
    pub fn delete(&self, name: &str) -> Result<()> {
        let path = self.dataset_path(name)?;
        let _lock = DatasetLock::acquire(&self.config.root, name)?;
        require_live(&path, name)?;
        fs::remove_file(&path).at(&path)?;
        info!("deleted dataset {}", name);
        Ok(())
    }

    /// Rename the live file of `from` to `to`.
    ///
    /// # Errors
    ///
    /// - `Error::BadDataset`: `from` does not exist or `to` already does
    /// - `Error::Disk`: the rename failed
    pub fn rename(&self, from: &str, to: &str) -> Result<()> {
        let from_path = self.dataset_path(from)?;
        let to_path = self.dataset_path(to)?;
        let _locks = DatasetLock::acquire_pair(&self.config.root, from, to)?;
        require_live(&from_path, from)?;
        if to_path.exists() {
            return Err(Error::BadDataset(to.to_string()));
        }
        fs::rename(&from_path, &to_path).at(&from_path)?;
        info!("renamed dataset {} to {}", from, to);
        Ok(())
    }

    /// Rotate `name` if its live file has reached the size threshold,
    /// whether or not automatic rotation is enabled.
    pub fn rotate(&self, name: &str) -> Result<RotateOutcome> {
        let path = self.dataset_path(name)?;
        let _lock = DatasetLock::acquire(&self.config.root, name)?;
        require_live(&path, name)?;
        rotate_if_needed(&path, self.config.rotate_size, self.config.rotate_max)
    }
}

/// Must be called with the dataset lock held.
fn require_live(path: &Path, name: &str) -> Result<()> {
    if path.is_file() {
        Ok(())
    } else {
        Err(Error::BadDataset(name.to_string()))
    }
}

/// `<anything>.<digits>` is the shape of a rotation backup file; a live file
/// with that name would alias another dataset's backup chain.
fn looks_like_backup(file_name: &str) -> bool {
    match file_name.rsplit_once('.') {
        Some((stem, suffix)) => {
            !stem.is_empty() && !suffix.is_empty() && suffix.bytes().all(|b| b.is_ascii_digit())
        }
        None => false,
    }
}

/// Dataset names become file names directly under the root; hidden names are
/// taken by lock and temporary files.
fn check_name(name: &str) -> Result<()> {
    let usable = !name.trim().is_empty()
        && !name.starts_with('.')
        && !name.contains('/')
        && !name.contains('\0');
    if usable {
        Ok(())
    } else {
        Err(Error::BadDataset(name.to_string()))
    }
}
