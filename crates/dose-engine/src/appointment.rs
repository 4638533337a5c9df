//! Follow-up and dialysis appointments: single instants, no recurrence.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::error::{EngineError, Result};
use crate::record::normalize_token;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AppointmentKind {
    FollowUp,
    Dialysis,
}

impl AppointmentKind {
    /// Title used for reminders about this kind of appointment.
    pub fn label(&self) -> &'static str {
        match self {
            AppointmentKind::FollowUp => "Follow-up appointment",
            AppointmentKind::Dialysis => "Dialysis session",
        }
    }
}

impl FromStr for AppointmentKind {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self> {
        match normalize_token(s).as_str() {
            "followup" => Ok(Self::FollowUp),
            "dialysis" => Ok(Self::Dialysis),
            _ => Err(EngineError::InvalidRecord(format!(
                "unknown appointment type: {s}"
            ))),
        }
    }
}

impl fmt::Display for AppointmentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::FollowUp => write!(f, "followup"),
            Self::Dialysis => write!(f, "dialysis"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AppointmentStatus {
    Scheduled,
    Completed,
    Canceled,
}

impl FromStr for AppointmentStatus {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self> {
        match normalize_token(s).as_str() {
            "scheduled" => Ok(Self::Scheduled),
            "completed" => Ok(Self::Completed),
            "canceled" | "cancelled" => Ok(Self::Canceled),
            _ => Err(EngineError::InvalidRecord(format!(
                "unknown appointment status: {s}"
            ))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AppointmentEvent {
    pub id: String,
    pub patient_id: String,
    pub scheduled_at: DateTime<Utc>,
    pub kind: AppointmentKind,
    pub status: AppointmentStatus,
    pub notes: Option<String>,
}

impl AppointmentEvent {
    /// Still scheduled and strictly after `now`.
    pub fn is_upcoming(&self, now: DateTime<Utc>) -> bool {
        self.status == AppointmentStatus::Scheduled && self.scheduled_at > now
    }
}
