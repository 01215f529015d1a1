use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

use time::OffsetDateTime;

const MICROS_PER_SEC: u64 = 1_000_000;

/// A source of machine time for ingest calls.
///
/// The store asks the clock once per ingest call that does not carry its own
/// machine-time column, so every row of that call shares one value.
pub trait Clock: Send + Sync + 'static {
    /// Returns the current time in microseconds since the UNIX epoch.
    fn now_micros(&self) -> u64;
}

/// A clock that uses `std::time::SystemTime`.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_micros(&self) -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map_or(0, |elapsed| u64::try_from(elapsed.as_micros()).unwrap_or(u64::MAX))
    }
}

/// A clock that only moves when told to.
#[derive(Debug, Default)]
pub struct FixedClock {
    micros: AtomicU64,
}

impl FixedClock {
    pub fn new(micros: u64) -> Self {
        Self {
            micros: AtomicU64::new(micros),
        }
    }

    pub fn set(&self, micros: u64) {
        self.micros.store(micros, Ordering::SeqCst);
    }

    pub fn advance(&self, delta: u64) {
        self.micros.fetch_add(delta, Ordering::SeqCst);
    }
}

impl Clock for FixedClock {
    fn now_micros(&self) -> u64 {
        self.micros.load(Ordering::SeqCst)
    }
}

/// Renders a microsecond machine time as local wall-clock text,
/// `YYYY-MM-DD HH:MM:SS.ffffff ZONE`.
///
/// Returns `None` when the value lies outside the calendar range the
/// formatter supports.
pub fn display_time(micros: u64) -> Option<String> {
    let secs = i64::try_from(micros / MICROS_PER_SEC).ok()?;
    let frac = micros % MICROS_PER_SEC;
    let (offset, zone) = local_zone(secs).unwrap_or((0, "UTC".to_string()));
    // Shifting by the offset and reading UTC fields yields local wall time.
    let wall = OffsetDateTime::from_unix_timestamp(secs.checked_add(offset)?).ok()?;
    Some(format!(
        "{:04}-{:02}-{:02} {:02}:{:02}:{:02}.{:06} {}",
        wall.year(),
        wall.month() as u8,
        wall.day(),
        wall.hour(),
        wall.minute(),
        wall.second(),
        frac,
        zone
    ))
}

/// Current wall-clock time rendered like [`display_time`].
pub fn display_now() -> String {
    let micros = SystemClock.now_micros();
    display_time(micros).unwrap_or_else(|| micros.to_string())
}

/// UTC offset in seconds and zone abbreviation in effect at `secs`.
#[cfg(unix)]
fn local_zone(secs: i64) -> Option<(i64, String)> {
    let t = libc::time_t::try_from(secs).ok()?;
    let mut tm: libc::tm = unsafe { std::mem::zeroed() };
    let res = unsafe { libc::localtime_r(&t, &mut tm) };
    if res.is_null() {
        return None;
    }
    let zone = if tm.tm_zone.is_null() {
        String::new()
    } else {
        unsafe { std::ffi::CStr::from_ptr(tm.tm_zone) }
            .to_string_lossy()
            .into_owned()
    };
    Some((i64::from(tm.tm_gmtoff), zone))
}

#[cfg(not(unix))]
fn local_zone(_secs: i64) -> Option<(i64, String)> {
    None
}
