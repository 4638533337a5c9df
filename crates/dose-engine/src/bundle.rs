//! Patient bundle -- the JSON-facing entry point used by the CLI and the WASM
//! bindings.
//!
//! A bundle carries raw persistence records. Records that do not even
//! deserialize are set aside while reading, so one bad entry never blanks the
//! patient. Each report then converts the rest, skipping (and listing) the
//! ones that fail conversion, and runs the corresponding engine component.

use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDate, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::agenda::{build_appointment_agenda, build_patient_agenda, Agenda, AppointmentAgenda};
use crate::appointment::AppointmentEvent;
use crate::counter::count_for_medication;
use crate::dst::parse_timezone;
use crate::error::{EngineError, Result, Skipped};
use crate::intake::{aggregate_patient, IntakeRecord, PatientAdherence};
use crate::record::{AppointmentRecord, MedicationRecord};
use crate::reminder::{
    plan_patient_reminders, replan, PatientReminders, ReminderPolicy, ReminderTrigger,
    ReplanOutcome, TriggerStore,
};
use crate::rule::{Medication, RecurrenceRule};

/// All records of one patient, as read from storage.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", from = "RawBundle")]
pub struct PatientBundle {
    pub medications: Vec<MedicationRecord>,
    pub intakes: Vec<IntakeRecord>,
    pub appointments: Vec<AppointmentRecord>,
    /// Entries that did not deserialize into their record type.
    #[serde(skip)]
    pub rejected: Vec<Skipped>,
}

/// The bundle's lists before each entry is read into its record type.
#[derive(Deserialize, Default)]
#[serde(rename_all = "camelCase", default)]
struct RawBundle {
    medications: Vec<Value>,
    intakes: Vec<Value>,
    appointments: Vec<Value>,
}

impl From<RawBundle> for PatientBundle {
    fn from(raw: RawBundle) -> Self {
        let mut rejected = Vec::new();
        let medications = read_entries("medications", raw.medications, true, &mut rejected);
        let intakes = read_entries("intakes", raw.intakes, false, &mut rejected);
        let appointments = read_entries("appointments", raw.appointments, true, &mut rejected);
        Self {
            medications,
            intakes,
            appointments,
            rejected,
        }
    }
}

/// Deserialize each entry on its own. A failing entry is listed under its
/// `id` when it has one, otherwise under its list position.
fn read_entries<T: DeserializeOwned>(
    list: &str,
    entries: Vec<Value>,
    keyed: bool,
    rejected: &mut Vec<Skipped>,
) -> Vec<T> {
    let mut records = Vec::with_capacity(entries.len());
    for (index, entry) in entries.into_iter().enumerate() {
        let id = entry
            .get("id")
            .and_then(Value::as_str)
            .filter(|_| keyed)
            .map(str::to_string)
            .unwrap_or_else(|| format!("{list}[{index}]"));
        match serde_json::from_value(entry) {
            Ok(record) => records.push(record),
            Err(e) => rejected.push(Skipped::warn(
                &id,
                &EngineError::InvalidRecord(format!("{list}: {e}")),
            )),
        }
    }
    records
}

/// Records that converted cleanly, and the ones that did not.
#[derive(Debug, Clone, Default)]
pub struct ResolvedBundle {
    pub medications: Vec<Medication>,
    pub appointments: Vec<AppointmentEvent>,
    pub skipped: Vec<Skipped>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AgendaReport {
    pub window_start: NaiveDate,
    pub window_end: NaiveDate,
    pub medications: Agenda,
    pub appointments: AppointmentAgenda,
    pub skipped: Vec<Skipped>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MedicationCount {
    pub medication_id: String,
    pub name: String,
    pub rule: RecurrenceRule,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    /// `None` for on-demand medications.
    pub expected: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CountReport {
    pub medications: Vec<MedicationCount>,
    pub skipped: Vec<Skipped>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReminderReport {
    pub planned_at: DateTime<Utc>,
    /// The armed set after replanning, sorted by fire time.
    pub triggers: Vec<ReminderTrigger>,
    pub replans: BTreeMap<String, ReplanOutcome>,
    pub skipped: Vec<Skipped>,
}

impl PatientBundle {
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|e| EngineError::Json(e.to_string()))
    }

    /// Convert every record, skipping the malformed ones with a diagnostic.
    pub fn resolve(&self) -> ResolvedBundle {
        let mut resolved = ResolvedBundle {
            skipped: self.rejected.clone(),
            ..ResolvedBundle::default()
        };
        for record in &self.medications {
            match Medication::try_from(record) {
                Ok(medication) => resolved.medications.push(medication),
                Err(e) => resolved.skipped.push(Skipped::warn(&record.id, &e)),
            }
        }
        for record in &self.appointments {
            match AppointmentEvent::try_from(record) {
                Ok(appointment) => resolved.appointments.push(appointment),
                Err(e) => resolved.skipped.push(Skipped::warn(&record.id, &e)),
            }
        }
        resolved
    }

    /// Medication and appointment agendas over `[window_start, window_end]`.
    /// Appointments are placed on their local date in `timezone`.
    ///
    /// # Errors
    /// `EngineError::InvalidTimezone` for an unknown timezone name.
    pub fn agenda(
        &self,
        window_start: NaiveDate,
        window_end: NaiveDate,
        timezone: &str,
    ) -> Result<AgendaReport> {
        let tz = parse_timezone(timezone)?;
        let resolved = self.resolve();
        let patient = build_patient_agenda(&resolved.medications, window_start, window_end);

        let mut skipped = resolved.skipped;
        skipped.extend(patient.skipped);

        Ok(AgendaReport {
            window_start,
            window_end,
            medications: patient.days,
            appointments: build_appointment_agenda(
                &resolved.appointments,
                window_start,
                window_end,
                tz,
            ),
            skipped,
        })
    }

    /// Per-medication and patient-wide adherence from the bundle's intakes.
    pub fn adherence(&self) -> PatientAdherence {
        let resolved = self.resolve();
        let mut adherence = aggregate_patient(&resolved.medications, &self.intakes);
        let mut skipped = resolved.skipped;
        skipped.append(&mut adherence.skipped);
        adherence.skipped = skipped;
        adherence
    }

    /// Expected dose count of every medication over its whole range.
    pub fn counts(&self) -> CountReport {
        let resolved = self.resolve();
        let mut skipped = resolved.skipped;
        let mut medications = Vec::with_capacity(resolved.medications.len());

        for medication in resolved.medications {
            match count_for_medication(&medication) {
                Ok(expected) => medications.push(MedicationCount {
                    medication_id: medication.id,
                    name: medication.name,
                    rule: medication.rule,
                    start_date: medication.start_date,
                    end_date: medication.end_date,
                    expected,
                }),
                Err(e) => skipped.push(Skipped::warn(&medication.id, &e)),
            }
        }

        CountReport {
            medications,
            skipped,
        }
    }

    /// Plan every reminder for the bundle, grouped by subject, without touching
    /// any store. Unconvertible records are listed as skipped.
    ///
    /// # Errors
    /// `EngineError::InvalidTimezone` for an unknown policy timezone.
    pub fn plan_reminders(
        &self,
        policy: &ReminderPolicy,
        now: DateTime<Utc>,
    ) -> Result<PatientReminders> {
        let resolved = self.resolve();
        let mut planned =
            plan_patient_reminders(&resolved.medications, &resolved.appointments, policy, now)?;
        let mut skipped = resolved.skipped;
        skipped.append(&mut planned.skipped);
        planned.skipped = skipped;
        Ok(planned)
    }

    /// Plan every reminder for the bundle and replan each subject in `store`.
    ///
    /// # Errors
    /// An invalid policy timezone, or the first store failure. Subjects
    /// replanned before a store failure stay replanned.
    pub fn reminders<S>(
        &self,
        policy: &ReminderPolicy,
        now: DateTime<Utc>,
        store: &mut S,
    ) -> Result<ReminderReport>
    where
        S: TriggerStore + ?Sized,
    {
        let planned = self.plan_reminders(policy, now)?;

        let mut replans = BTreeMap::new();
        let mut triggers = Vec::new();
        for (subject_id, subject_triggers) in &planned.by_subject {
            let outcome = replan(&mut *store, subject_id, subject_triggers)?;
            replans.insert(subject_id.clone(), outcome);
            triggers.extend(subject_triggers.iter().cloned());
        }
        triggers.sort_by(|a, b| (a.fire_at, &a.subject_id).cmp(&(b.fire_at, &b.subject_id)));

        Ok(ReminderReport {
            planned_at: now,
            triggers,
            replans,
            skipped: planned.skipped,
        })
    }
}
