//! Which catalog entry is "today's".

use chrono::{DateTime, Utc};

const SECONDS_PER_DAY: i64 = 24 * 60 * 60;

/// `floor(hours since epoch / 24) mod total`. Instants before the epoch wrap
/// backwards through the catalog instead of going negative.
pub fn day_index(now: DateTime<Utc>, epoch: DateTime<Utc>, total: usize) -> i64 {
  let total = total.max(1) as i64;
  let secs = (now - epoch).num_seconds();
  secs.div_euclid(SECONDS_PER_DAY).rem_euclid(total)
}
