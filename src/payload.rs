//! Ingest documents.
//!
//! The accepted shape is
//! `{"dataset":"name","keys":["key_1","key_n"],"values":[["value_1","value_n"]]}`.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IngestRequest {
    pub dataset: String,
    pub keys: Vec<String>,
    pub values: Vec<Vec<String>>,
}

impl IngestRequest {
    /// Parses and shape-checks an ingest document.
    ///
    /// # Errors
    ///
    /// - `Error::BadJson`: not a JSON object of the accepted shape, or
    ///   [`validate`](Self::validate) fails
    pub fn parse(doc: &str) -> Result<Self> {
        let request: IngestRequest = serde_json::from_str(doc).map_err(Error::bad_json)?;
        request.validate()?;
        Ok(request)
    }

    /// Checks that keys and rows are non-empty, every row is as wide as
    /// `keys`, and the dataset name is not blank.
    pub fn validate(&self) -> Result<()> {
        check_shape(&self.dataset, &self.keys, &self.values)
    }
}

pub(crate) fn check_shape(dataset: &str, keys: &[String], values: &[Vec<String>]) -> Result<()> {
    if dataset.trim().is_empty() {
        return Err(Error::bad_json("dataset name is blank"));
    }
    if keys.is_empty() {
        return Err(Error::bad_json("no keys"));
    }
    if values.is_empty() {
        return Err(Error::bad_json("no values"));
    }
    if let Some((idx, row)) = values
        .iter()
        .enumerate()
        .find(|(_, row)| row.len() != keys.len())
    {
        return Err(Error::bad_json(format!(
            "row {idx} has {} values for {} keys",
            row.len(),
            keys.len()
        )));
    }
    Ok(())
}
