//! Expected dose counting over a medication's whole active range.
//!
//! Every branch is a closed form of what [`crate::expander::expand`] would emit
//! for `window == [med_start, med_end]`; `tests/prop_consistency.rs` holds the
//! two to the same cardinality.

use chrono::{Datelike, NaiveDate};

use crate::error::Result;
use crate::expander::end_of_day_bound;
use crate::rule::{check_range, Medication, RecurrenceRule};

/// Number of doses `rule` produces between `med_start` and `med_end`
/// (both inclusive).
///
/// Returns `Ok(None)` for [`RecurrenceRule::OnDemand`], which has no
/// predetermined count. Counts beyond `u32::MAX` saturate.
///
/// # Errors
/// Same as [`crate::expander::expand`]: an inverted range or an invalid rule.
pub fn count_expected(
    rule: &RecurrenceRule,
    med_start: NaiveDate,
    med_end: NaiveDate,
) -> Result<Option<u32>> {
    check_range(med_start, med_end)?;
    rule.validate()?;

    let days = (med_end - med_start).num_days() as u64 + 1;
    let slots = rule.daily_slot_count();

    let count = match rule {
        RecurrenceRule::OnDemand => return Ok(None),
        RecurrenceRule::Daily { .. } => days * slots,
        RecurrenceRule::IntervalDays { step_days, .. } => {
            ((days - 1) / u64::from(*step_days) + 1) * slots
        }
        RecurrenceRule::SpecificWeekdays { weekdays, .. } => {
            let full_weeks = days / 7;
            let mut day = med_start.weekday();
            let mut tail = 0u64;
            for _ in 0..days % 7 {
                if weekdays.contains(day) {
                    tail += 1;
                }
                day = day.succ();
            }
            (full_weeks * u64::from(weekdays.len()) + tail) * slots
        }
        RecurrenceRule::Cyclic {
            intake_days,
            pause_days,
            ..
        } => {
            let intake = u64::from(*intake_days);
            let cycle_len = intake + u64::from(*pause_days);
            let full_cycles = days / cycle_len;
            let remainder = days % cycle_len;
            (full_cycles * intake + remainder.min(intake)) * slots
        }
        RecurrenceRule::IntervalHours {
            step_hours,
            anchor_time,
        } => {
            let first = anchor_time.on(med_start);
            let span = (end_of_day_bound(med_end) - first).num_minutes() as u64;
            let step_minutes = u64::from(*step_hours) * 60;
            span.div_ceil(step_minutes)
        }
    };

    Ok(Some(u32::try_from(count).unwrap_or(u32::MAX)))
}

/// [`count_expected`] over a medication's own range.
pub fn count_for_medication(medication: &Medication) -> Result<Option<u32>> {
    medication.validate()?;
    count_expected(&medication.rule, medication.start_date, medication.end_date)
}
