//! `dose.toml` configuration.
//!
//! ```toml
//! [schedule]
//! timezone = "Europe/Berlin"
//! dst_policy = "shift_forward"
//!
//! [reminders]
//! medication_lead_minutes = [0, 15]
//! appointment_lead_minutes = [1440, 60]
//! horizon_days = 7
//! ```

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use dose_engine::{DstPolicy, LeadTime, ReminderPolicy};
use serde::{Deserialize, Serialize};

/// Looked up in the working directory when `--config` is not given.
pub const DEFAULT_CONFIG_FILE: &str = "dose.toml";

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub schedule: ScheduleConfig,

    #[serde(default)]
    pub reminders: RemindersConfig,
}

/// How local dose times are interpreted.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ScheduleConfig {
    #[serde(default = "default_timezone")]
    pub timezone: String,

    #[serde(default)]
    pub dst_policy: DstPolicy,
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            timezone: default_timezone(),
            dst_policy: DstPolicy::default(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RemindersConfig {
    #[serde(default = "default_medication_leads")]
    pub medication_lead_minutes: Vec<u32>,

    #[serde(default = "default_appointment_leads")]
    pub appointment_lead_minutes: Vec<u32>,

    #[serde(default = "default_horizon_days")]
    pub horizon_days: u32,
}

impl Default for RemindersConfig {
    fn default() -> Self {
        Self {
            medication_lead_minutes: default_medication_leads(),
            appointment_lead_minutes: default_appointment_leads(),
            horizon_days: default_horizon_days(),
        }
    }
}

fn default_timezone() -> String {
    "UTC".to_string()
}

fn default_medication_leads() -> Vec<u32> {
    vec![0]
}

fn default_appointment_leads() -> Vec<u32> {
    vec![24 * 60, 60]
}

fn default_horizon_days() -> u32 {
    7
}

impl Config {
    /// Load from `path` if given, otherwise from `./dose.toml` if present,
    /// otherwise use defaults.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        if let Some(path) = path {
            return Self::load_from(path);
        }
        let default_path = PathBuf::from(DEFAULT_CONFIG_FILE);
        if default_path.exists() {
            Self::load_from(&default_path)
        } else {
            tracing::info!("No config file found at {:?}, using defaults", default_path);
            Ok(Self::default())
        }
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        let config: Config = toml::from_str(&contents)
            .with_context(|| format!("Invalid config file: {}", path.display()))?;
        tracing::info!("Loaded config from {:?}", path);
        Ok(config)
    }

    /// Reminder policy for the engine, optionally overriding the horizon.
    pub fn reminder_policy(&self, horizon_days: Option<u32>) -> ReminderPolicy {
        let leads = |minutes: &[u32]| minutes.iter().copied().map(LeadTime::minutes).collect();
        ReminderPolicy {
            timezone: self.schedule.timezone.clone(),
            dst_policy: self.schedule.dst_policy,
            medication_lead_minutes: leads(&self.reminders.medication_lead_minutes),
            appointment_lead_minutes: leads(&self.reminders.appointment_lead_minutes),
            horizon_days: horizon_days.unwrap_or(self.reminders.horizon_days),
        }
    }
}
