//! Persistence-layer record shapes and their conversion into engine types.
//!
//! Records arrive loosely typed (camelCase JSON, free-form tags and
//! "HH:mm" strings). Conversion is strict: anything that cannot be turned
//! into a well-formed [`Medication`] or [`AppointmentEvent`] is an error,
//! which batch callers turn into a skipped entry.

use std::str::FromStr;

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc, Weekday};
use serde::{Deserialize, Serialize};

use crate::appointment::AppointmentEvent;
use crate::error::{EngineError, Result};
use crate::rule::{Medication, RecurrenceRule, TimeOfDay, WeekdaySet};

/// Lower-case and strip `_`, `-` and whitespace separators.
pub fn normalize_token(raw: &str) -> String {
    raw.chars()
        .filter(|c| !(c.is_whitespace() || *c == '_' || *c == '-'))
        .flat_map(char::to_lowercase)
        .collect()
}

/// The stored frequency tag of a medication.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Frequency {
    Daily,
    Interval,
    SpecificDays,
    Cyclic,
    OnDemand,
}

impl FromStr for Frequency {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self> {
        match normalize_token(s).as_str() {
            "daily" => Ok(Self::Daily),
            "interval" => Ok(Self::Interval),
            "specificdays" => Ok(Self::SpecificDays),
            "cyclic" => Ok(Self::Cyclic),
            "ondemand" => Ok(Self::OnDemand),
            _ => Err(EngineError::UnknownFrequency(s.to_string())),
        }
    }
}

/// A medication as stored by the persistence collaborator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MedicationRecord {
    pub id: String,
    pub medicine_name: String,
    #[serde(default)]
    pub dosage: String,
    pub start_date: String,
    pub end_date: String,
    #[serde(default)]
    pub frequency: String,
    pub daily_times: Option<u32>,
    pub interval_type: Option<String>,
    pub interval_value: Option<u32>,
    pub specific_days: Option<Vec<String>>,
    pub cyclic_intake_days: Option<u32>,
    pub cyclic_pause_days: Option<u32>,
    pub times: Option<Vec<String>>,
    pub on_demand: Option<bool>,
}

impl MedicationRecord {
    fn rule(&self) -> Result<RecurrenceRule> {
        if self.on_demand == Some(true) {
            return Ok(RecurrenceRule::OnDemand);
        }

        let times = self
            .times
            .iter()
            .flatten()
            .map(|t| t.parse::<TimeOfDay>())
            .collect::<Result<Vec<_>>>()?;

        let rule = match self.frequency.parse::<Frequency>()? {
            Frequency::Daily => {
                let times_per_day = if times.is_empty() {
                    self.daily_times.unwrap_or(1)
                } else {
                    times.len() as u32
                };
                RecurrenceRule::Daily {
                    times_per_day,
                    times,
                }
            }
            Frequency::Interval => {
                let step = self.interval_value.ok_or_else(|| missing("intervalValue"))?;
                let kind = self.interval_type.as_deref().ok_or_else(|| missing("intervalType"))?;
                match normalize_token(kind).as_str() {
                    "hours" | "hour" => RecurrenceRule::IntervalHours {
                        step_hours: step,
                        anchor_time: times.first().copied().unwrap_or(TimeOfDay::DEFAULT_DOSE),
                    },
                    "days" | "day" => RecurrenceRule::IntervalDays {
                        step_days: step,
                        times,
                    },
                    _ => {
                        return Err(EngineError::InvalidRecord(format!(
                            "unknown interval type: {kind}"
                        )))
                    }
                }
            }
            Frequency::SpecificDays => {
                let weekdays = self
                    .specific_days
                    .iter()
                    .flatten()
                    .map(|d| parse_weekday(d))
                    .collect::<Result<WeekdaySet>>()?;
                RecurrenceRule::SpecificWeekdays { weekdays, times }
            }
            Frequency::Cyclic => RecurrenceRule::Cyclic {
                intake_days: self
                    .cyclic_intake_days
                    .ok_or_else(|| missing("cyclicIntakeDays"))?,
                pause_days: self
                    .cyclic_pause_days
                    .ok_or_else(|| missing("cyclicPauseDays"))?,
                times,
            },
            Frequency::OnDemand => RecurrenceRule::OnDemand,
        };
        Ok(rule)
    }
}

fn missing(field: &str) -> EngineError {
    EngineError::InvalidRecord(format!("missing {field}"))
}

impl TryFrom<&MedicationRecord> for Medication {
    type Error = EngineError;

    fn try_from(record: &MedicationRecord) -> Result<Self> {
        let medication = Medication {
            id: record.id.clone(),
            name: record.medicine_name.clone(),
            dosage: record.dosage.clone(),
            start_date: parse_date(&record.start_date)?,
            end_date: parse_date(&record.end_date)?,
            rule: record.rule()?,
        };
        medication.validate()?;
        Ok(medication)
    }
}

impl TryFrom<MedicationRecord> for Medication {
    type Error = EngineError;

    fn try_from(record: MedicationRecord) -> Result<Self> {
        Medication::try_from(&record)
    }
}

/// An appointment as stored by the persistence collaborator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppointmentRecord {
    pub id: String,
    #[serde(default)]
    pub patient_id: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub scheduled_date: String,
    pub notes: Option<String>,
    pub status: String,
}

impl TryFrom<&AppointmentRecord> for AppointmentEvent {
    type Error = EngineError;

    fn try_from(record: &AppointmentRecord) -> Result<Self> {
        Ok(AppointmentEvent {
            id: record.id.clone(),
            patient_id: record.patient_id.clone(),
            scheduled_at: parse_datetime(&record.scheduled_date)?,
            kind: record.kind.parse()?,
            status: record.status.parse()?,
            notes: record.notes.clone(),
        })
    }
}

/// Parse an English weekday name or three-letter abbreviation.
pub fn parse_weekday(s: &str) -> Result<Weekday> {
    match normalize_token(s).as_str() {
        "mon" | "monday" => Ok(Weekday::Mon),
        "tue" | "tues" | "tuesday" => Ok(Weekday::Tue),
        "wed" | "wednesday" => Ok(Weekday::Wed),
        "thu" | "thur" | "thurs" | "thursday" => Ok(Weekday::Thu),
        "fri" | "friday" => Ok(Weekday::Fri),
        "sat" | "saturday" => Ok(Weekday::Sat),
        "sun" | "sunday" => Ok(Weekday::Sun),
        _ => Err(EngineError::InvalidRecord(format!("unknown weekday: {s}"))),
    }
}

/// Parse a calendar date from `YYYY-MM-DD` or an RFC 3339 datetime (the date
/// in the datetime's own offset is taken).
pub fn parse_date(s: &str) -> Result<NaiveDate> {
    let trimmed = s.trim();
    if let Ok(date) = NaiveDate::parse_from_str(trimmed, "%Y-%m-%d") {
        return Ok(date);
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(trimmed) {
        return Ok(dt.date_naive());
    }
    NaiveDateTime::parse_from_str(trimmed, "%Y-%m-%dT%H:%M:%S")
        .map(|ndt| ndt.date())
        .map_err(|e| EngineError::InvalidRecord(format!("invalid date '{}': {}", s, e)))
}

/// Parse an ISO 8601 datetime string into `DateTime<Utc>`.
///
/// Accepts both RFC 3339 (with timezone offset, e.g., "2026-02-17T14:00:00+01:00")
/// and naive local time (e.g., "2026-02-17T14:00:00"), which is interpreted as UTC.
pub fn parse_datetime(s: &str) -> Result<DateTime<Utc>> {
    let trimmed = s.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(trimmed) {
        return Ok(dt.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(trimmed, "%Y-%m-%dT%H:%M:%S")
        .map(|ndt| ndt.and_utc())
        .map_err(|e| EngineError::InvalidRecord(format!("invalid datetime '{}': {}", s, e)))
}
