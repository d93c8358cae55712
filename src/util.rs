//! Shared helpers
//!
//! Record id generation and time formatting used by both engines.

use chrono::{DateTime, Utc};
use rand::Rng;

use crate::config;

const BASE36: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";

/// Current wall-clock time in milliseconds since epoch
pub fn now_ms() -> i64 {
    Utc::now().timestamp_millis()
}

/// Generate a `<kind>_<timestamp>_<random-suffix>` record id.
///
/// Wall-clock time plus a random base36 suffix gives uniqueness without a
/// central sequence; collision probability is negligible for a local
/// single-writer store.
pub fn generate_id(kind: &str) -> String {
    format!("{}_{}_{}", kind, now_ms(), random_suffix(config::ID_SUFFIX_LEN))
}

fn random_suffix(len: usize) -> String {
    let mut rng = rand::thread_rng();
    (0..len)
        .map(|_| BASE36[rng.gen_range(0..BASE36.len())] as char)
        .collect()
}

/// Render a millisecond timestamp as `YYYY-MM-DD HH:MM:SS UTC`
pub fn format_timestamp(ms: i64) -> String {
    match DateTime::<Utc>::from_timestamp_millis(ms) {
        Some(dt) => dt.format("%Y-%m-%d %H:%M:%S UTC").to_string(),
        None => ms.to_string(),
    }
}

/// Render a millisecond timestamp as `YYYY-MM-DD`, for export file names
pub fn date_stamp(ms: i64) -> String {
    match DateTime::<Utc>::from_timestamp_millis(ms) {
        Some(dt) => dt.format("%Y-%m-%d").to_string(),
        None => ms.to_string(),
    }
}

/// Human-readable distance between a past timestamp and now
pub fn relative_time(timestamp_ms: i64) -> String {
    let diff = now_ms() - timestamp_ms;

    let seconds = diff / 1000;
    let minutes = seconds / 60;
    let hours = minutes / 60;
    let days = hours / 24;

    if days > 0 {
        format!("{} day{} ago", days, plural(days))
    } else if hours > 0 {
        format!("{} hour{} ago", hours, plural(hours))
    } else if minutes > 0 {
        format!("{} minute{} ago", minutes, plural(minutes))
    } else if seconds > 0 {
        format!("{} second{} ago", seconds, plural(seconds))
    } else {
        "Just now".to_string()
    }
}

fn plural(n: i64) -> &'static str {
    if n > 1 {
        "s"
    } else {
        ""
    }
}
