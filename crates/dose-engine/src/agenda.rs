//! Date-keyed agendas for calendar display.
//!
//! Every date of the window is present, so a calendar can render an empty
//! cell for days without events.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use chrono_tz::Tz;
use serde::Serialize;

use crate::appointment::AppointmentEvent;
use crate::error::Skipped;
use crate::expander::expand_medication;
use crate::rule::{Medication, Occurrence};

/// Occurrences grouped by calendar date, each day in time order.
pub type Agenda = BTreeMap<NaiveDate, Vec<Occurrence>>;

/// Appointments grouped by local calendar date, each day in time order.
pub type AppointmentAgenda = BTreeMap<NaiveDate, Vec<AppointmentEvent>>;

fn empty_days<T>(window_start: NaiveDate, window_end: NaiveDate) -> BTreeMap<NaiveDate, Vec<T>> {
    window_start
        .iter_days()
        .take_while(|d| *d <= window_end)
        .map(|d| (d, Vec::new()))
        .collect()
}

/// Group occurrences by date over `[window_start, window_end]`.
///
/// Occurrences outside the window are dropped.
pub fn build_agenda<I>(occurrences: I, window_start: NaiveDate, window_end: NaiveDate) -> Agenda
where
    I: IntoIterator<Item = Occurrence>,
{
    let mut days: Agenda = empty_days(window_start, window_end);
    for occurrence in occurrences {
        if let Some(day) = days.get_mut(&occurrence.date) {
            day.push(occurrence);
        }
    }
    for day in days.values_mut() {
        day.sort();
    }
    days
}

/// Group appointments by their local date in `tz` over the window.
pub fn build_appointment_agenda(
    appointments: &[AppointmentEvent],
    window_start: NaiveDate,
    window_end: NaiveDate,
    tz: Tz,
) -> AppointmentAgenda {
    let mut days: AppointmentAgenda = empty_days(window_start, window_end);
    for appointment in appointments {
        let local_date = appointment.scheduled_at.with_timezone(&tz).date_naive();
        if let Some(day) = days.get_mut(&local_date) {
            day.push(appointment.clone());
        }
    }
    for day in days.values_mut() {
        day.sort_by(|a, b| (a.scheduled_at, &a.id).cmp(&(b.scheduled_at, &b.id)));
    }
    days
}

/// A patient's medication agenda plus the medications that could not be
/// expanded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PatientAgenda {
    pub days: Agenda,
    pub skipped: Vec<Skipped>,
}

/// Expand every medication over the window and build one agenda.
///
/// A malformed medication is skipped with a diagnostic instead of blanking the
/// whole agenda.
pub fn build_patient_agenda(
    medications: &[Medication],
    window_start: NaiveDate,
    window_end: NaiveDate,
) -> PatientAgenda {
    let mut occurrences = Vec::new();
    let mut skipped = Vec::new();

    for medication in medications {
        match expand_medication(medication, window_start, window_end) {
            Ok(expanded) => occurrences.extend(expanded),
            Err(e) => skipped.push(Skipped::warn(&medication.id, &e)),
        }
    }

    PatientAgenda {
        days: build_agenda(occurrences, window_start, window_end),
        skipped,
    }
}
