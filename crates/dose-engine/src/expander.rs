//! Occurrence expansion -- converts a recurrence rule into concrete dose instants.
//!
//! Expansion is restricted to the intersection of the medication's active range
//! and the requested window. Day indices are always counted from the
//! medication start, so expanding overlapping windows yields overlapping,
//! identical results.

use chrono::{Datelike, Duration, NaiveDate, NaiveDateTime, NaiveTime};

use crate::error::Result;
use crate::rule::{check_range, Medication, Occurrence, RecurrenceRule, TimeOfDay};

/// Expand a rule into local dose instants within `[window_start, window_end]`.
///
/// # Arguments
/// - `rule` -- the dosing rule
/// - `med_start`, `med_end` -- the medication's active range (inclusive)
/// - `window_start`, `window_end` -- the requested date window (inclusive)
///
/// The result is sorted. An empty intersection of the two ranges (including a
/// window whose end precedes its start) yields an empty list.
///
/// # Errors
/// Returns `EngineError::InvalidDateRange` if `med_end < med_start` and
/// `EngineError::InvalidRule` if the rule fails validation.
pub fn expand(
    rule: &RecurrenceRule,
    med_start: NaiveDate,
    med_end: NaiveDate,
    window_start: NaiveDate,
    window_end: NaiveDate,
) -> Result<Vec<NaiveDateTime>> {
    check_range(med_start, med_end)?;
    rule.validate()?;

    let from = med_start.max(window_start);
    let to = med_end.min(window_end);
    if from > to {
        return Ok(Vec::new());
    }

    let instants = match rule {
        RecurrenceRule::OnDemand => Vec::new(),
        RecurrenceRule::IntervalHours {
            step_hours,
            anchor_time,
        } => expand_hourly(*step_hours, *anchor_time, med_start, med_end, from, to),
        _ => {
            let slots = rule.daily_slots();
            let mut out = Vec::new();
            for date in from.iter_days().take_while(|d| *d <= to) {
                let day_index = (date - med_start).num_days();
                if is_active_day(rule, day_index, date) {
                    out.extend(slots.iter().map(|slot| slot.on(date)));
                }
            }
            out
        }
    };

    Ok(instants)
}

/// Expand a medication into occurrences within `[window_start, window_end]`.
///
/// Identical to [`expand`] but validates the whole medication and tags every
/// occurrence with its id.
pub fn expand_medication(
    medication: &Medication,
    window_start: NaiveDate,
    window_end: NaiveDate,
) -> Result<Vec<Occurrence>> {
    medication.validate()?;
    let instants = expand(
        &medication.rule,
        medication.start_date,
        medication.end_date,
        window_start,
        window_end,
    )?;

    tracing::debug!(
        medication_id = %medication.id,
        %window_start,
        %window_end,
        occurrences = instants.len(),
        "expanded medication"
    );

    Ok(instants
        .into_iter()
        .map(|instant| Occurrence {
            medication_id: medication.id.clone(),
            date: instant.date(),
            time: TimeOfDay::from(instant.time()),
        })
        .collect())
}

/// Whether a day-based rule is active on `date`, `day_index` days after the
/// medication start.
pub(crate) fn is_active_day(rule: &RecurrenceRule, day_index: i64, date: NaiveDate) -> bool {
    match rule {
        RecurrenceRule::Daily { .. } => true,
        RecurrenceRule::IntervalDays { step_days, .. } => day_index % i64::from(*step_days) == 0,
        RecurrenceRule::SpecificWeekdays { weekdays, .. } => weekdays.contains(date.weekday()),
        RecurrenceRule::Cyclic {
            intake_days,
            pause_days,
            ..
        } => {
            let cycle_len = i64::from(*intake_days) + i64::from(*pause_days);
            day_index % cycle_len < i64::from(*intake_days)
        }
        RecurrenceRule::IntervalHours { .. } | RecurrenceRule::OnDemand => false,
    }
}

/// Exclusive upper bound for hourly stepping: midnight after `date`.
pub(crate) fn end_of_day_bound(date: NaiveDate) -> NaiveDateTime {
    date.succ_opt()
        .map(|next| next.and_time(NaiveTime::MIN))
        .unwrap_or(NaiveDateTime::MAX)
}

fn expand_hourly(
    step_hours: u32,
    anchor_time: TimeOfDay,
    med_start: NaiveDate,
    med_end: NaiveDate,
    from: NaiveDate,
    to: NaiveDate,
) -> Vec<NaiveDateTime> {
    let first = anchor_time.on(med_start);
    // Stepping stops at the end of the medication's last day, however large
    // the window is.
    let upper = end_of_day_bound(to).min(end_of_day_bound(med_end));
    let lower = from.and_time(NaiveTime::MIN);
    let step_minutes = i64::from(step_hours) * 60;

    // Jump straight to the first step that lands inside the window.
    let mut k = if lower > first {
        let gap = (lower - first).num_minutes();
        (gap + step_minutes - 1) / step_minutes
    } else {
        0
    };

    let mut out = Vec::new();
    // A step past chrono's representable range ends the expansion like any
    // other step past `upper`.
    while let Some(instant) = step_instant(first, step_minutes, k) {
        if instant >= upper {
            break;
        }
        out.push(instant);
        k += 1;
    }
    out
}

fn step_instant(first: NaiveDateTime, step_minutes: i64, k: i64) -> Option<NaiveDateTime> {
    let offset = step_minutes.checked_mul(k).and_then(Duration::try_minutes)?;
    first.checked_add_signed(offset)
}
