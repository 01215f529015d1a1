//! Time-range queries over a dataset file.
//!
//! A query is a linear scan: every row whose machine time falls inside the
//! inclusive window is kept, optionally without its display-time column.
//!
//! # Wire format
//!
//! [`QueryResult::to_wire`] produces the text that forwarding peers and the
//! query endpoint exchange:
//!
//! ```text
//! {"dataset":"m","keys":["unixtime","timestamp","cpu"],"values":[["1","...","42"]]}
//! ```
//!
//! Row values are JSON string literals, separated by a bare `,`. Non-ASCII
//! text is written as raw UTF-8, not as `\uXXXX` escapes, so output for such
//! values differs byte-wise from writers that escape to ASCII and separate
//! values with `", "`.
//!
//! The dataset name and key names are written verbatim between quotes, so a
//! name holding `"` or `\` yields text that is not strict JSON; existing
//! consumers depend on this exact layout.
//! Use the `Serialize` impl when strict JSON is required.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use log::debug;
use serde::Serialize;

use crate::codec::decode_line;
use crate::config::{DELIMITER, LINE_TERMINATOR};
use crate::error::{Error, IoResultExt, Result};

/// Inclusive machine-time window in microseconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeRange {
    pub min: u64,
    pub max: u64,
}

impl TimeRange {
    /// Returns `None` for negative bounds or `max < min`.
    pub fn new(min: i64, max: i64) -> Option<Self> {
        let min = u64::try_from(min).ok()?;
        let max = u64::try_from(max).ok()?;
        (min <= max).then_some(Self { min, max })
    }

    /// Parses decimal bounds as passed by command lines and query strings.
    pub fn parse(min: &str, max: &str) -> Option<Self> {
        Self::new(min.trim().parse().ok()?, max.trim().parse().ok()?)
    }

    pub fn contains(&self, micros: u64) -> bool {
        self.min <= micros && micros <= self.max
    }
}

/// Rows of one dataset matching a query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QueryResult {
    pub dataset: String,
    pub keys: Vec<String>,
    pub values: Vec<Vec<String>>,
}

impl QueryResult {
    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Serialized form exchanged with consumers (see the module docs).
    pub fn to_wire(&self) -> String {
        let keys: Vec<String> = self.keys.iter().map(|key| format!("\"{key}\"")).collect();
        let rows: Vec<String> = self
            .values
            .iter()
            .map(|row| {
                let fields: Vec<String> = row
                    .iter()
                    .map(|value| serde_json::Value::from(value.as_str()).to_string())
                    .collect();
                format!("[{}]", fields.join(","))
            })
            .collect();
        format!(
            "{{\"dataset\":\"{}\",\"keys\":[{}],\"values\":[{}]}}",
            self.dataset,
            keys.join(","),
            rows.join(",")
        )
    }
}

/// Match count plus serialized result, as returned by the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryOutput {
    pub count: usize,
    pub body: String,
}

impl From<&QueryResult> for QueryOutput {
    fn from(result: &QueryResult) -> Self {
        Self {
            count: result.len(),
            body: result.to_wire(),
        }
    }
}

/// Scans the dataset file at `path` for rows inside `range`.
///
/// With `include_display` false, column 1 is dropped from the reported keys
/// and from every row; the file is not changed.
///
/// # Errors
///
/// - `Error::Disk`: the file could not be read
/// - `Error::Corrupt`: missing header, or a row whose machine time is not
///   an integer
pub fn scan(
    path: &Path,
    dataset: &str,
    range: TimeRange,
    include_display: bool,
) -> Result<QueryResult> {
    let file = File::open(path).at(path)?;
    let mut reader = BufReader::new(file);

    let mut line = String::new();
    if reader.read_line(&mut line).at(path)? == 0 {
        return Err(Error::corrupt(path, "missing header line"));
    }
    let mut keys = decode_line(line.trim_end_matches(LINE_TERMINATOR));

    let mut values = Vec::new();
    let mut scanned = 0u64;
    loop {
        line.clear();
        if reader.read_line(&mut line).at(path)? == 0 {
            break;
        }
        let row = line.trim_end_matches(LINE_TERMINATOR);
        if row.is_empty() {
            continue;
        }
        scanned += 1;
        let machine = row.split(DELIMITER).next().unwrap_or_default();
        let micros = machine.parse::<u64>().map_err(|_| {
            Error::corrupt(path, format!("machine time '{machine}' is not an integer"))
        })?;
        if !range.contains(micros) {
            continue;
        }
        let mut fields = decode_line(row);
        if !include_display && fields.len() > 1 {
            fields.remove(1);
        }
        values.push(fields);
    }

    if !include_display && keys.len() > 1 {
        keys.remove(1);
    }

    debug!(
        "query {} [{}, {}] matched {} of {} rows",
        dataset,
        range.min,
        range.max,
        values.len(),
        scanned
    );
    Ok(QueryResult {
        dataset: dataset.to_string(),
        keys,
        values,
    })
}
