//! DST transition policies for local dose times.
//!
//! Occurrences are wall-clock values. Turning them into instants for reminder
//! planning needs a timezone, and a policy for the two transition cases: a
//! local time that happens twice (fall back) or never (spring forward).

use chrono::{DateTime, Duration, LocalResult, NaiveDateTime, Offset, TimeZone, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

use crate::error::{EngineError, Result};

/// Longest DST gap searched when shifting forward.
const MAX_GAP_MINUTES: i64 = 180;

/// Policy for dose times that fall during DST transitions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DstPolicy {
    /// Skip doses that fall in the DST gap (e.g., 2:30 AM during spring forward)
    Skip,
    /// Shift to the first valid local time after the gap
    ShiftForward,
    /// Read the wall-clock time with the offset in effect before the gap
    #[default]
    WallClock,
}

/// Parse an IANA timezone name.
pub fn parse_timezone(name: &str) -> Result<Tz> {
    name.parse()
        .map_err(|_| EngineError::InvalidTimezone(name.to_string()))
}

/// Resolve a local wall-clock time in `tz` to a UTC instant.
///
/// Ambiguous times (fall back) resolve to the earlier instant under every
/// policy. Times in a gap follow `policy`; `None` means the dose was skipped.
pub fn resolve_local(local: NaiveDateTime, tz: Tz, policy: DstPolicy) -> Option<DateTime<Utc>> {
    match tz.from_local_datetime(&local) {
        LocalResult::Single(dt) => Some(dt.with_timezone(&Utc)),
        LocalResult::Ambiguous(earliest, _) => Some(earliest.with_timezone(&Utc)),
        LocalResult::None => match policy {
            DstPolicy::Skip => None,
            DstPolicy::ShiftForward => first_valid_after(local, tz),
            DstPolicy::WallClock => {
                let after_gap = first_valid_after(local, tz)?;
                let before_gap = after_gap - Duration::minutes(1);
                let offset = before_gap.with_timezone(&tz).offset().fix();
                offset
                    .from_local_datetime(&local)
                    .single()
                    .map(|dt| dt.with_timezone(&Utc))
            }
        },
    }
}

fn first_valid_after(local: NaiveDateTime, tz: Tz) -> Option<DateTime<Utc>> {
    (1..=MAX_GAP_MINUTES).find_map(|m| {
        tz.from_local_datetime(&(local + Duration::minutes(m)))
            .earliest()
            .map(|dt| dt.with_timezone(&Utc))
    })
}
