//! Append-mostly time-series store over delimited flat files.
//!
//! Each dataset is one `|`-delimited text file whose first line names its
//! columns. Rows always lead with a microsecond machine time and its
//! rendered display time; the remaining columns grow as new keys arrive.
//! Live files rotate into numbered backups once they pass a size threshold,
//! and queries scan a file for rows inside an inclusive time window.
//!
//! # Example
//!
//! ```no_run
//! use cronbook::{Store, StoreConfig};
//!
//! let store = Store::open(StoreConfig::new("/var/lib/cronbook"))?;
//! store.add_json(r#"{"dataset":"cpu","keys":["load"],"values":[["0.42"]]}"#)?;
//! let output = store.query("cpu", 0, i64::MAX)?;
//! println!("{} rows: {}", output.count, output.body);
//! # Ok::<(), cronbook::Error>(())
//! ```

pub mod clock;
pub mod codec;
pub mod config;
pub mod error;
pub mod keys;
pub mod lock;
pub mod payload;
pub mod query;
pub mod rotate;
pub mod schema;
pub mod stamp;
pub mod store;
pub mod writer;

pub use clock::{display_time, Clock, FixedClock, SystemClock};
pub use config::StoreConfig;
pub use error::{Error, ErrorKind, Result};
pub use payload::IngestRequest;
pub use query::{QueryOutput, QueryResult, TimeRange};
pub use rotate::RotateOutcome;
pub use store::{AddReport, Store};
