//! Reminder planning -- event instants + lead times -> trigger descriptors.
//!
//! Delivery is not done here. Triggers are handed to a [`TriggerStore`], the
//! notification collaborator, with cancel-then-replan semantics: every armed
//! trigger for a subject is cancelled before the freshly computed set is
//! armed.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Duration, NaiveDate, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

use crate::appointment::{AppointmentEvent, AppointmentStatus};
use crate::dst::{parse_timezone, resolve_local, DstPolicy};
use crate::error::{EngineError, Result, Skipped};
use crate::expander::expand_medication;
use crate::rule::{Medication, Occurrence};

/// Offset before an event at which a reminder fires.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LeadTime(u32);

impl LeadTime {
    pub const AT_TIME: LeadTime = LeadTime(0);
    pub const ONE_HOUR_BEFORE: LeadTime = LeadTime(60);
    pub const ONE_DAY_BEFORE: LeadTime = LeadTime(24 * 60);

    pub const fn minutes(minutes: u32) -> Self {
        LeadTime(minutes)
    }

    pub fn as_minutes(&self) -> u32 {
        self.0
    }

    pub fn as_duration(&self) -> Duration {
        Duration::minutes(i64::from(self.0))
    }

    /// How far away the event is when the reminder fires, for message text.
    pub fn label(&self) -> String {
        const DAY: u32 = 24 * 60;
        match self.0 {
            0 => "now".to_string(),
            DAY => "tomorrow".to_string(),
            m if m % DAY == 0 => format!("in {} days", m / DAY),
            60 => "in 1 hour".to_string(),
            m if m % 60 == 0 => format!("in {} hours", m / 60),
            1 => "in 1 minute".to_string(),
            m => format!("in {} minutes", m),
        }
    }
}

/// Title and body of a reminder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReminderText {
    pub title: String,
    pub body: String,
}

/// A reminder to be armed by the notification collaborator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReminderTrigger {
    pub subject_id: String,
    pub fire_at: DateTime<Utc>,
    pub title: String,
    pub body: String,
}

/// Plan one trigger per distinct lead time for an event at `event_at`.
///
/// A trigger whose fire time is not strictly after `now` is dropped. The result
/// is sorted by fire time.
pub fn plan<F>(
    subject_id: &str,
    event_at: DateTime<Utc>,
    lead_times: &[LeadTime],
    now: DateTime<Utc>,
    text: F,
) -> Vec<ReminderTrigger>
where
    F: Fn(LeadTime) -> ReminderText,
{
    let distinct: BTreeSet<LeadTime> = lead_times.iter().copied().collect();

    // Largest lead first gives ascending fire times.
    distinct
        .into_iter()
        .rev()
        .filter_map(|lead| {
            let fire_at = event_at - lead.as_duration();
            if fire_at <= now {
                return None;
            }
            let ReminderText { title, body } = text(lead);
            Some(ReminderTrigger {
                subject_id: subject_id.to_string(),
                fire_at,
                title,
                body,
            })
        })
        .collect()
}

fn medication_text(medication: &Medication, occurrence: &Occurrence, lead: LeadTime) -> ReminderText {
    let body = if lead == LeadTime::AT_TIME {
        format!("Time to take {} ({}).", medication.name, medication.dosage)
    } else {
        format!(
            "{} ({}) is due {} at {}.",
            medication.name,
            medication.dosage,
            lead.label(),
            occurrence.time
        )
    };
    ReminderText {
        title: "Medication reminder".to_string(),
        body,
    }
}

fn appointment_text(appointment: &AppointmentEvent, lead: LeadTime) -> ReminderText {
    let title = appointment.kind.label().to_string();
    let mut body = if lead == LeadTime::AT_TIME {
        format!("Your {} is starting now.", title.to_lowercase())
    } else {
        format!("Your {} is {}.", title.to_lowercase(), lead.label())
    };
    if let Some(notes) = appointment.notes.as_deref().filter(|n| !n.trim().is_empty()) {
        body.push_str(" Notes: ");
        body.push_str(notes.trim());
    }
    ReminderText { title, body }
}

/// Plan reminders for every dose of `medication` between `window_start` and
/// `window_end`, resolving local dose times in `tz` under `dst_policy`.
///
/// # Errors
/// Returns the validation error if the medication is malformed.
pub fn plan_medication_reminders(
    medication: &Medication,
    window_start: NaiveDate,
    window_end: NaiveDate,
    lead_times: &[LeadTime],
    now: DateTime<Utc>,
    tz: Tz,
    dst_policy: DstPolicy,
) -> Result<Vec<ReminderTrigger>> {
    let occurrences = expand_medication(medication, window_start, window_end)?;

    let mut triggers = Vec::new();
    for occurrence in &occurrences {
        let Some(event_at) = resolve_local(occurrence.local_datetime(), tz, dst_policy) else {
            tracing::debug!(
                medication_id = %medication.id,
                date = %occurrence.date,
                time = %occurrence.time,
                "dose falls in a DST gap, no reminder"
            );
            continue;
        };
        triggers.extend(plan(&medication.id, event_at, lead_times, now, |lead| {
            medication_text(medication, occurrence, lead)
        }));
    }
    triggers.sort_by_key(|t| t.fire_at);
    Ok(triggers)
}

/// Plan reminders for a single appointment. Only scheduled appointments get
/// any.
pub fn plan_appointment_reminders(
    appointment: &AppointmentEvent,
    lead_times: &[LeadTime],
    now: DateTime<Utc>,
) -> Vec<ReminderTrigger> {
    if appointment.status != AppointmentStatus::Scheduled {
        return Vec::new();
    }
    plan(
        &appointment.id,
        appointment.scheduled_at,
        lead_times,
        now,
        |lead| appointment_text(appointment, lead),
    )
}

/// Reminder settings for a patient.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReminderPolicy {
    /// IANA timezone the patient's dose times are expressed in.
    pub timezone: String,
    pub dst_policy: DstPolicy,
    pub medication_lead_minutes: Vec<LeadTime>,
    pub appointment_lead_minutes: Vec<LeadTime>,
    /// Number of days, starting today, to plan dose reminders for.
    pub horizon_days: u32,
}

impl Default for ReminderPolicy {
    fn default() -> Self {
        Self {
            timezone: "UTC".to_string(),
            dst_policy: DstPolicy::default(),
            medication_lead_minutes: vec![LeadTime::AT_TIME],
            appointment_lead_minutes: vec![LeadTime::ONE_DAY_BEFORE, LeadTime::ONE_HOUR_BEFORE],
            horizon_days: 7,
        }
    }
}

/// Reminders for a patient, grouped by subject, plus skipped medications.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PatientReminders {
    pub by_subject: BTreeMap<String, Vec<ReminderTrigger>>,
    pub skipped: Vec<Skipped>,
}

impl PatientReminders {
    pub fn trigger_count(&self) -> usize {
        self.by_subject.values().map(Vec::len).sum()
    }
}

/// Plan every dose and appointment reminder for a patient over the policy
/// horizon, starting on `now`'s local date.
///
/// Subjects with nothing to fire are still present with an empty list, so a
/// replan clears their stale triggers.
///
/// # Errors
/// Only an invalid timezone fails the batch. Malformed medications are skipped.
pub fn plan_patient_reminders(
    medications: &[Medication],
    appointments: &[AppointmentEvent],
    policy: &ReminderPolicy,
    now: DateTime<Utc>,
) -> Result<PatientReminders> {
    let tz = parse_timezone(&policy.timezone)?;
    let today = now.with_timezone(&tz).date_naive();
    let horizon_end = today + Duration::days(i64::from(policy.horizon_days.saturating_sub(1)));

    let mut reminders = PatientReminders::default();
    for medication in medications {
        match plan_medication_reminders(
            medication,
            today,
            horizon_end,
            &policy.medication_lead_minutes,
            now,
            tz,
            policy.dst_policy,
        ) {
            Ok(triggers) => {
                reminders.by_subject.insert(medication.id.clone(), triggers);
            }
            Err(e) => reminders.skipped.push(Skipped::warn(&medication.id, &e)),
        }
    }
    for appointment in appointments {
        let triggers =
            plan_appointment_reminders(appointment, &policy.appointment_lead_minutes, now);
        reminders.by_subject.insert(appointment.id.clone(), triggers);
    }

    tracing::debug!(
        subjects = reminders.by_subject.len(),
        triggers = reminders.trigger_count(),
        %today,
        %horizon_end,
        "planned patient reminders"
    );
    Ok(reminders)
}

/// The notification-delivery collaborator's scheduled-trigger table.
///
/// Implementations own the actual OS-level scheduling. Failures should be
/// reported as [`EngineError::Collaborator`].
pub trait TriggerStore {
    /// Cancel every armed trigger for `subject_id`, returning how many.
    fn cancel_subject(&mut self, subject_id: &str) -> Result<usize>;

    /// Arm `triggers`.
    fn schedule(&mut self, triggers: &[ReminderTrigger]) -> Result<()>;
}

/// What a replan changed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct ReplanOutcome {
    pub cancelled: usize,
    pub scheduled: usize,
}

/// Replace every armed trigger for `subject_id` with `triggers`.
///
/// The store is borrowed mutably for the whole cancel-then-schedule sequence,
/// so replans against one store cannot interleave. Store errors are returned
/// as-is; nothing is retried.
///
/// # Errors
/// `EngineError::InvalidRecord` if a trigger belongs to another subject (the
/// store is not touched), or whatever the store reports.
pub fn replan<S>(store: &mut S, subject_id: &str, triggers: &[ReminderTrigger]) -> Result<ReplanOutcome>
where
    S: TriggerStore + ?Sized,
{
    if let Some(stray) = triggers.iter().find(|t| t.subject_id != subject_id) {
        return Err(EngineError::InvalidRecord(format!(
            "trigger for subject {} passed to replan of {}",
            stray.subject_id, subject_id
        )));
    }

    let cancelled = store.cancel_subject(subject_id)?;
    store.schedule(triggers)?;

    tracing::debug!(subject_id, cancelled, scheduled = triggers.len(), "replanned reminders");
    Ok(ReplanOutcome {
        cancelled,
        scheduled: triggers.len(),
    })
}

/// A [`TriggerStore`] that keeps armed triggers in memory, grouped by subject.
#[derive(Debug, Clone, Default)]
pub struct InMemoryTriggerStore {
    armed: BTreeMap<String, Vec<ReminderTrigger>>,
}

impl InMemoryTriggerStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn armed(&self, subject_id: &str) -> &[ReminderTrigger] {
        self.armed.get(subject_id).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Every armed trigger, sorted by fire time.
    pub fn all(&self) -> Vec<ReminderTrigger> {
        let mut all: Vec<ReminderTrigger> = self.armed.values().flatten().cloned().collect();
        all.sort_by(|a, b| (a.fire_at, &a.subject_id).cmp(&(b.fire_at, &b.subject_id)));
        all
    }

    pub fn len(&self) -> usize {
        self.armed.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl TriggerStore for InMemoryTriggerStore {
    fn cancel_subject(&mut self, subject_id: &str) -> Result<usize> {
        Ok(self.armed.remove(subject_id).map_or(0, |v| v.len()))
    }

    fn schedule(&mut self, triggers: &[ReminderTrigger]) -> Result<()> {
        for trigger in triggers {
            self.armed
                .entry(trigger.subject_id.clone())
                .or_default()
                .push(trigger.clone());
        }
        Ok(())
    }
}
