//! Dataset header handling.
//!
//! The first line of a dataset file is its schema: the ordered column names.
//! Growing the schema rewrites the whole file into a hidden sibling and
//! renames it over the original, so a failure part-way leaves the original
//! file as it was.

use std::fs::{self, File, OpenOptions};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use log::{debug, warn};

use crate::codec::{decode_line, encode_line};
use crate::config::{DELIMITER, LINE_TERMINATOR};
use crate::error::{Error, IoResultExt, Result};

/// Reads the ordered column list from the header line of `path`.
///
/// # Errors
///
/// - `Error::Disk`: the file could not be opened or read
/// - `Error::Corrupt`: the file has no header line
pub fn read_schema(path: &Path) -> Result<Vec<String>> {
    let file = File::open(path).at(path)?;
    read_header(&mut BufReader::new(file), path)
}

fn read_header(reader: &mut impl BufRead, path: &Path) -> Result<Vec<String>> {
    let mut line = String::new();
    let read = reader.read_line(&mut line).at(path)?;
    let header = line.trim_end_matches(LINE_TERMINATOR);
    if read == 0 || header.is_empty() {
        return Err(Error::corrupt(path, "missing header line"));
    }
    Ok(decode_line(header))
}

/// Creates (or truncates) `path` holding only a header line.
pub fn create_schema(path: &Path, columns: &[String]) -> Result<()> {
    let mut file = OpenOptions::new()
        .create(true)
        .write(true)
        .truncate(true)
        .open(path)
        .at(path)?;
    file.write_all(encode_line(columns).as_bytes()).at(path)?;
    Ok(())
}

/// Appends `new_columns` to the schema of `path`, giving every existing row
/// one empty field per added column. Columns already in the schema are
/// skipped; when nothing is left to add the file is not touched.
///
/// Returns the schema after the change.
pub fn evolve_schema(path: &Path, new_columns: &[String]) -> Result<Vec<String>> {
    let file = File::open(path).at(path)?;
    let mut reader = BufReader::new(file);
    let mut schema = read_header(&mut reader, path)?;

    let added: Vec<String> = new_columns
        .iter()
        .filter(|column| !schema.contains(column))
        .cloned()
        .collect();
    if added.is_empty() {
        return Ok(schema);
    }
    schema.extend(added.iter().cloned());

    let tmp = tmp_path_for(path)?;
    if tmp.exists() {
        warn!("discarding stale schema rewrite {}", tmp.display());
    }
    let result = rewrite_into(&tmp, &mut reader, &schema, added.len())
        .and_then(|rows| fs::rename(&tmp, path).at(path).map(|()| rows));
    match result {
        Ok(rows) => {
            debug!(
                "schema of {} grew by {:?} across {} rows",
                path.display(),
                added,
                rows
            );
            Ok(schema)
        }
        Err(err) => {
            let _ = fs::remove_file(&tmp);
            Err(err)
        }
    }
}

/// Writes the new header followed by every remaining row of `reader`, each
/// padded with `padding` empty fields. Returns the number of rows copied.
fn rewrite_into(
    tmp: &Path,
    reader: &mut impl BufRead,
    schema: &[String],
    padding: usize,
) -> Result<u64> {
    let file = OpenOptions::new()
        .create(true)
        .write(true)
        .truncate(true)
        .open(tmp)
        .at(tmp)?;
    let mut out = BufWriter::new(file);
    out.write_all(encode_line(schema).as_bytes()).at(tmp)?;

    let pad: String = std::iter::repeat(DELIMITER).take(padding).collect();
    let mut rows = 0u64;
    let mut line = String::new();
    loop {
        line.clear();
        if reader.read_line(&mut line).at(tmp)? == 0 {
            break;
        }
        let row = line.trim_end_matches(LINE_TERMINATOR);
        out.write_all(row.as_bytes()).at(tmp)?;
        out.write_all(pad.as_bytes()).at(tmp)?;
        out.write_all(&[LINE_TERMINATOR as u8]).at(tmp)?;
        rows += 1;
    }

    let file = out.into_inner().map_err(|err| err.into_error()).at(tmp)?;
    file.sync_all().at(tmp)?;
    Ok(rows)
}

fn tmp_path_for(path: &Path) -> Result<PathBuf> {
    let name = path
        .file_name()
        .and_then(|name| name.to_str())
        .ok_or_else(|| Error::corrupt(path, "dataset path has no file name"))?;
    Ok(path.with_file_name(format!(".{name}.evolve.tmp")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn strings(items: &[&str]) -> Vec<String> {
        items.iter().map(|item| item.to_string()).collect()
    }

    #[test]
    fn create_then_read_schema() {
        let dir = tempdir().expect("tempdir");
        let path = dir.path().join("m");
        let schema = strings(&["unixtime", "timestamp", "key_1", "key_2"]);

        create_schema(&path, &schema).expect("create");

        let content = fs::read_to_string(&path).expect("read");
        assert_eq!(content, "unixtime|timestamp|key_1|key_2\n");
        assert_eq!(read_schema(&path).expect("schema"), schema);
    }

    #[test]
    fn read_schema_of_empty_file_is_corrupt() {
        let dir = tempdir().expect("tempdir");
        let path = dir.path().join("m");
        fs::write(&path, "").expect("write");

        let err = read_schema(&path).unwrap_err();
        assert!(matches!(err, Error::Corrupt { .. }));
    }

    #[test]
    fn read_schema_of_missing_file_is_disk_error() {
        let dir = tempdir().expect("tempdir");
        let err = read_schema(&dir.path().join("absent")).unwrap_err();
        assert!(matches!(err, Error::Disk { .. }));
    }

    #[test]
    fn evolve_pads_existing_rows() {
        let dir = tempdir().expect("tempdir");
        let path = dir.path().join("m");
        fs::write(&path, "unixtime|timestamp|key_1|key_2\n0|t0|value_1|value_2\n1|t1|a|\n")
            .expect("write");

        let schema = evolve_schema(&path, &strings(&["key_3", "key_4"])).expect("evolve");

        assert_eq!(
            schema,
            strings(&["unixtime", "timestamp", "key_1", "key_2", "key_3", "key_4"])
        );
        let content = fs::read_to_string(&path).expect("read");
        assert_eq!(
            content,
            "unixtime|timestamp|key_1|key_2|key_3|key_4\n0|t0|value_1|value_2||\n1|t1|a|||\n"
        );
        assert!(!dir.path().join(".m.evolve.tmp").exists());
    }

    #[test]
    fn evolve_with_known_columns_is_noop() {
        let dir = tempdir().expect("tempdir");
        let path = dir.path().join("m");
        let original = "unixtime|timestamp|cpu\n0|t0|42\n";
        fs::write(&path, original).expect("write");

        let schema = evolve_schema(&path, &strings(&["cpu", "timestamp"])).expect("evolve");

        assert_eq!(schema, strings(&["unixtime", "timestamp", "cpu"]));
        assert_eq!(fs::read_to_string(&path).expect("read"), original);
    }

    #[test]
    fn evolve_failure_leaves_original() {
        let dir = tempdir().expect("tempdir");
        let path = dir.path().join("m");
        let original = "unixtime|timestamp|cpu\n0|t0|42\n";
        fs::write(&path, original).expect("write");
        // A directory squatting on the temporary name makes the rewrite fail.
        fs::create_dir(dir.path().join(".m.evolve.tmp")).expect("mkdir");

        let err = evolve_schema(&path, &strings(&["mem"])).unwrap_err();

        assert!(matches!(err, Error::Disk { .. }));
        assert_eq!(fs::read_to_string(&path).expect("read"), original);
    }
}
