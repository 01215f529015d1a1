//! Time column injection.
//!
//! Every stored row leads with two implicit columns: the machine time in
//! microseconds and its rendered display time. An ingest call either brings
//! its own machine time per row (by naming the machine-time column) or gets
//! one generated value shared by all of its rows.

use crate::clock::{display_time, Clock};
use crate::config::StoreConfig;
use crate::error::{Error, Result};

/// Keys and rows of one ingest call with the time columns in front.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Stamped {
    pub keys: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

/// Moves or generates the time columns for one ingest call.
///
/// Rows must already match `keys` in width.
///
/// # Errors
///
/// - `Error::BadJson`: a row is narrower than `keys`, or a supplied machine
///   time is not a non-negative integer the display formatter can render
pub fn stamp(
    mut keys: Vec<String>,
    mut rows: Vec<Vec<String>>,
    clock: &dyn Clock,
    config: &StoreConfig,
) -> Result<Stamped> {
    let machine_key = config.machine_time_key.clone();
    let display_key = config.display_time_key.clone();

    match keys.iter().position(|key| *key == machine_key) {
        Some(idx) => {
            keys.remove(idx);
            for row in &mut rows {
                if idx >= row.len() {
                    return Err(Error::bad_json(format!(
                        "row has {} values, expected {}",
                        row.len(),
                        keys.len() + 1
                    )));
                }
                let machine = row.remove(idx);
                let display = parse_machine_time(&machine, &machine_key)
                    .and_then(|micros| render(micros, &machine_key))?;
                row.splice(0..0, [machine, display]);
            }
        }
        None => {
            let micros = clock.now_micros();
            let machine = micros.to_string();
            let display = render(micros, &machine_key)?;
            for row in &mut rows {
                row.splice(0..0, [machine.clone(), display.clone()]);
            }
        }
    }
    keys.splice(0..0, [machine_key, display_key]);

    Ok(Stamped { keys, rows })
}

fn parse_machine_time(value: &str, machine_key: &str) -> Result<u64> {
    value
        .parse::<u64>()
        .map_err(|_| Error::bad_json(format!("{machine_key} value '{value}' is not an integer")))
}

fn render(micros: u64, machine_key: &str) -> Result<String> {
    display_time(micros)
        .ok_or_else(|| Error::bad_json(format!("{machine_key} value {micros} out of range")))
}
