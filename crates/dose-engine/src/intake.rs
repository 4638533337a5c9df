//! Adherence aggregation -- taken / not-taken / remaining doses.
//!
//! Reconciliation is count-based: records are tallied by normalized status
//! and compared against the expected total, never matched to individual
//! occurrences.

use std::convert::Infallible;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::counter::count_for_medication;
use crate::error::Skipped;
use crate::record::normalize_token;
use crate::rule::Medication;

/// Intake status after normalization.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum IntakeStatus {
    Taken,
    NotTaken,
    Pending,
    /// A status string that matched no known value. Counted nowhere.
    Unrecognized(String),
}

/// Lower-case and strip `_`, `-` and whitespace, so `"Not Taken"`,
/// `"not_taken"` and `"NOT-TAKEN"` all become `"nottaken"`.
pub fn normalize_status(raw: &str) -> String {
    normalize_token(raw)
}

impl FromStr for IntakeStatus {
    type Err = Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match normalize_status(s).as_str() {
            "taken" => Self::Taken,
            "nottaken" => Self::NotTaken,
            "pending" => Self::Pending,
            _ => Self::Unrecognized(s.to_string()),
        })
    }
}

impl From<String> for IntakeStatus {
    fn from(s: String) -> Self {
        match s.parse() {
            Ok(status) => status,
            Err(never) => match never {},
        }
    }
}

impl From<IntakeStatus> for String {
    fn from(status: IntakeStatus) -> Self {
        status.to_string()
    }
}

impl fmt::Display for IntakeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Taken => write!(f, "taken"),
            Self::NotTaken => write!(f, "not_taken"),
            Self::Pending => write!(f, "pending"),
            Self::Unrecognized(raw) => write!(f, "{raw}"),
        }
    }
}

/// A logged intake, in the shape the persistence layer stores it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IntakeRecord {
    pub medication_id: String,
    pub status: IntakeStatus,
    pub logged_at: DateTime<Utc>,
}

/// Adherence counts for one medication or a whole patient.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AdherenceStats {
    pub taken: u32,
    pub not_taken: u32,
    /// `None` when the expected total is unknown (on-demand medication).
    pub remaining: Option<u32>,
    pub total_expected: Option<u32>,
}

impl AdherenceStats {
    /// Build stats from raw counts; `remaining` is floored at zero.
    pub fn from_counts(taken: u32, not_taken: u32, total_expected: Option<u32>) -> Self {
        let remaining = total_expected
            .map(|total| total.saturating_sub(taken.saturating_add(not_taken)));
        Self {
            taken,
            not_taken,
            remaining,
            total_expected,
        }
    }

    /// Taken doses as a percentage of the expected total, one decimal.
    pub fn adherence_percent(&self) -> Option<f64> {
        match self.total_expected {
            Some(total) if total > 0 => {
                let pct = f64::from(self.taken) / f64::from(total) * 100.0;
                Some((pct * 10.0).round() / 10.0)
            }
            _ => None,
        }
    }
}

/// Tally `records` belonging to `medication` against `expected`.
///
/// Records for other medications are ignored, as are records whose status is
/// `Pending` or unrecognized.
pub fn aggregate(
    medication: &Medication,
    expected: Option<u32>,
    records: &[IntakeRecord],
) -> AdherenceStats {
    let mut taken = 0u32;
    let mut not_taken = 0u32;

    for record in records.iter().filter(|r| r.medication_id == medication.id) {
        match &record.status {
            IntakeStatus::Taken => taken = taken.saturating_add(1),
            IntakeStatus::NotTaken => not_taken = not_taken.saturating_add(1),
            IntakeStatus::Pending => {}
            IntakeStatus::Unrecognized(raw) => {
                tracing::debug!(
                    medication_id = %medication.id,
                    status = %raw,
                    "ignoring intake record with unrecognized status"
                );
            }
        }
    }

    AdherenceStats::from_counts(taken, not_taken, expected)
}

/// Sum stats across medications. `remaining` treats unknown as zero;
/// `total_expected` stays `None` only if no input had a total. Every sum
/// saturates at `u32::MAX`.
pub fn sum_stats<'a, I>(stats: I) -> AdherenceStats
where
    I: IntoIterator<Item = &'a AdherenceStats>,
{
    let mut total = AdherenceStats {
        remaining: Some(0),
        ..AdherenceStats::default()
    };
    for s in stats {
        total.taken = total.taken.saturating_add(s.taken);
        total.not_taken = total.not_taken.saturating_add(s.not_taken);
        total.remaining = Some(
            total
                .remaining
                .unwrap_or(0)
                .saturating_add(s.remaining.unwrap_or(0)),
        );
        if let Some(expected) = s.total_expected {
            total.total_expected = Some(total.total_expected.unwrap_or(0).saturating_add(expected));
        }
    }
    total
}

/// Adherence for a single medication within a patient report.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MedicationAdherence {
    pub medication_id: String,
    pub name: String,
    pub stats: AdherenceStats,
    pub adherence_percent: Option<f64>,
}

/// Per-medication and patient-wide adherence.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PatientAdherence {
    pub per_medication: Vec<MedicationAdherence>,
    pub total: AdherenceStats,
    pub skipped: Vec<Skipped>,
}

/// Aggregate every medication of a patient.
///
/// A medication that fails validation is skipped with a diagnostic; the rest
/// are still reported.
pub fn aggregate_patient(medications: &[Medication], records: &[IntakeRecord]) -> PatientAdherence {
    let mut per_medication = Vec::with_capacity(medications.len());
    let mut skipped = Vec::new();

    for medication in medications {
        match count_for_medication(medication) {
            Ok(expected) => {
                let stats = aggregate(medication, expected, records);
                per_medication.push(MedicationAdherence {
                    medication_id: medication.id.clone(),
                    name: medication.name.clone(),
                    adherence_percent: stats.adherence_percent(),
                    stats,
                });
            }
            Err(e) => skipped.push(Skipped::warn(&medication.id, &e)),
        }
    }

    let total = sum_stats(per_medication.iter().map(|m| &m.stats));
    tracing::debug!(
        medications = per_medication.len(),
        skipped = skipped.len(),
        taken = total.taken,
        not_taken = total.not_taken,
        "aggregated patient adherence"
    );

    PatientAdherence {
        per_medication,
        total,
        skipped,
    }
}
