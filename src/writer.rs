use std::fs::OpenOptions;
use std::io::{BufWriter, Write};
use std::path::Path;

use log::debug;

use crate::codec::{encode_line, sanitize};
use crate::error::{IoResultExt, Result};
use crate::keys::{new_keys, order_row};
use crate::schema::{evolve_schema, read_schema};

/// Appends `rows` (aligned to `keys`) to the dataset file at `path`.
///
/// Grows the schema first when `keys` names columns the file has not seen.
/// Each row is reordered to the schema and every field sanitized before it
/// is written. Returns the number of rows written.
///
/// The file must already exist with a header line.
pub fn append_rows(path: &Path, keys: &[String], rows: &[Vec<String>]) -> Result<u64> {
    let mut schema = read_schema(path)?;
    let added = new_keys(&schema, keys);
    if !added.is_empty() {
        schema = evolve_schema(path, &added)?;
    }

    let file = OpenOptions::new().append(true).open(path).at(path)?;
    let mut out = BufWriter::new(file);
    let mut written = 0u64;
    for row in rows {
        let ordered: Vec<String> = order_row(&schema, keys, row)
            .iter()
            .map(|value| sanitize(value))
            .collect();
        out.write_all(encode_line(&ordered).as_bytes()).at(path)?;
        written += 1;
    }
    out.flush().at(path)?;

    debug!("appended {} rows to {}", written, path.display());
    Ok(written)
}
