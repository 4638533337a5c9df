//! Recurrence rule model -- the typed shape of a dosing schedule.
//!
//! Nothing in here expands or counts; see [`crate::expander`] and
//! [`crate::counter`]. Validation lives here so both share one definition of
//! "well-formed".

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use chrono::{NaiveDate, NaiveDateTime, NaiveTime, Weekday};
use serde::{Deserialize, Serialize};

use crate::error::{EngineError, Result};

/// A local wall-clock time of day with minute precision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TimeOfDay {
    hour: u8,
    minute: u8,
}

impl TimeOfDay {
    /// Dose time used when a rule carries no explicit times.
    pub const DEFAULT_DOSE: TimeOfDay = TimeOfDay { hour: 8, minute: 0 };

    pub const MIDNIGHT: TimeOfDay = TimeOfDay { hour: 0, minute: 0 };

    pub fn new(hour: u8, minute: u8) -> Result<Self> {
        if hour > 23 || minute > 59 {
            return Err(EngineError::InvalidTime(format!(
                "{:02}:{:02} is out of range",
                hour, minute
            )));
        }
        Ok(Self { hour, minute })
    }

    pub fn hour(&self) -> u8 {
        self.hour
    }

    pub fn minute(&self) -> u8 {
        self.minute
    }

    /// Minutes since local midnight.
    pub fn minutes_from_midnight(&self) -> i64 {
        i64::from(self.hour) * 60 + i64::from(self.minute)
    }

    pub fn to_naive_time(self) -> NaiveTime {
        NaiveTime::from_hms_opt(u32::from(self.hour), u32::from(self.minute), 0)
            .unwrap_or(NaiveTime::MIN)
    }

    pub fn on(self, date: NaiveDate) -> NaiveDateTime {
        date.and_time(self.to_naive_time())
    }
}

impl From<NaiveTime> for TimeOfDay {
    fn from(t: NaiveTime) -> Self {
        use chrono::Timelike;
        // NaiveTime guarantees hour < 24 and minute < 60.
        Self {
            hour: t.hour() as u8,
            minute: t.minute() as u8,
        }
    }
}

impl FromStr for TimeOfDay {
    type Err = EngineError;

    /// Accepts `HH:mm`, `H:mm` and `HH:mm:ss` (seconds are discarded).
    fn from_str(s: &str) -> Result<Self> {
        let trimmed = s.trim();
        let mut parts = trimmed.split(':');
        let invalid = || EngineError::InvalidTime(s.to_string());

        let hour: u8 = parts
            .next()
            .filter(|p| !p.is_empty() && p.len() <= 2)
            .and_then(|p| p.parse().ok())
            .ok_or_else(invalid)?;
        let minute: u8 = parts
            .next()
            .filter(|p| p.len() == 2)
            .and_then(|p| p.parse().ok())
            .ok_or_else(invalid)?;
        if let Some(seconds) = parts.next() {
            let valid = seconds.len() == 2 && seconds.parse::<u8>().is_ok_and(|s| s < 60);
            if !valid {
                return Err(invalid());
            }
        }
        if parts.next().is_some() {
            return Err(invalid());
        }

        TimeOfDay::new(hour, minute).map_err(|_| invalid())
    }
}

impl TryFrom<String> for TimeOfDay {
    type Error = EngineError;

    fn try_from(s: String) -> Result<Self> {
        s.parse()
    }
}

impl From<TimeOfDay> for String {
    fn from(t: TimeOfDay) -> Self {
        t.to_string()
    }
}

impl fmt::Display for TimeOfDay {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}:{:02}", self.hour, self.minute)
    }
}

/// A set of weekdays stored as a bitmask (bit 0 = Monday).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(from = "Vec<Weekday>", into = "Vec<Weekday>")]
pub struct WeekdaySet(u8);

impl WeekdaySet {
    pub const EMPTY: WeekdaySet = WeekdaySet(0);

    pub fn insert(&mut self, day: Weekday) {
        self.0 |= 1 << day.num_days_from_monday();
    }

    pub fn contains(&self, day: Weekday) -> bool {
        self.0 & (1 << day.num_days_from_monday()) != 0
    }

    pub fn len(&self) -> u32 {
        self.0.count_ones()
    }

    pub fn is_empty(&self) -> bool {
        self.0 == 0
    }

    /// Members in Monday-first order.
    pub fn iter(&self) -> impl Iterator<Item = Weekday> + '_ {
        let mut day = Weekday::Mon;
        (0..7).filter_map(move |_| {
            let current = day;
            day = day.succ();
            self.contains(current).then_some(current)
        })
    }
}

impl FromIterator<Weekday> for WeekdaySet {
    fn from_iter<I: IntoIterator<Item = Weekday>>(iter: I) -> Self {
        let mut set = WeekdaySet::EMPTY;
        for day in iter {
            set.insert(day);
        }
        set
    }
}

impl From<Vec<Weekday>> for WeekdaySet {
    fn from(days: Vec<Weekday>) -> Self {
        days.into_iter().collect()
    }
}

impl From<WeekdaySet> for Vec<Weekday> {
    fn from(set: WeekdaySet) -> Self {
        set.iter().collect()
    }
}

/// A declarative dosing rule. Exactly one variant is active.
///
/// For the day-based variants an empty `times` list means a single dose at
/// [`TimeOfDay::DEFAULT_DOSE`] (for `Daily`, `times_per_day` copies of it).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RecurrenceRule {
    Daily {
        times_per_day: u32,
        #[serde(default)]
        times: Vec<TimeOfDay>,
    },
    IntervalHours {
        step_hours: u32,
        anchor_time: TimeOfDay,
    },
    IntervalDays {
        step_days: u32,
        #[serde(default)]
        times: Vec<TimeOfDay>,
    },
    SpecificWeekdays {
        weekdays: WeekdaySet,
        #[serde(default)]
        times: Vec<TimeOfDay>,
    },
    Cyclic {
        intake_days: u32,
        pause_days: u32,
        #[serde(default)]
        times: Vec<TimeOfDay>,
    },
    OnDemand,
}

impl RecurrenceRule {
    /// Most doses a day-based rule may place on one day, one per minute.
    pub const MAX_DOSES_PER_DAY: u32 = 24 * 60;

    /// Check the numeric parameters of the rule.
    pub fn validate(&self) -> Result<()> {
        if self.daily_slot_count() > u64::from(Self::MAX_DOSES_PER_DAY) {
            return Err(EngineError::InvalidRule(format!(
                "more than {} doses per day",
                Self::MAX_DOSES_PER_DAY
            )));
        }
        match self {
            RecurrenceRule::Daily { times_per_day, .. } => {
                if *times_per_day == 0 {
                    return Err(EngineError::InvalidRule(
                        "daily rule needs at least one dose per day".to_string(),
                    ));
                }
                if *times_per_day > Self::MAX_DOSES_PER_DAY {
                    return Err(EngineError::InvalidRule(format!(
                        "daily rule asks for {times_per_day} doses per day, at most {} allowed",
                        Self::MAX_DOSES_PER_DAY
                    )));
                }
            }
            RecurrenceRule::IntervalHours { step_hours, .. } => {
                if *step_hours == 0 {
                    return Err(EngineError::InvalidRule(
                        "hour interval must be at least 1".to_string(),
                    ));
                }
            }
            RecurrenceRule::IntervalDays { step_days, .. } => {
                if *step_days == 0 {
                    return Err(EngineError::InvalidRule(
                        "day interval must be at least 1".to_string(),
                    ));
                }
            }
            RecurrenceRule::SpecificWeekdays { .. } => {}
            RecurrenceRule::Cyclic {
                intake_days,
                pause_days,
                ..
            } => {
                let cycle_len = intake_days.checked_add(*pause_days).ok_or_else(|| {
                    EngineError::InvalidRule("cycle length overflows".to_string())
                })?;
                if cycle_len == 0 {
                    return Err(EngineError::InvalidRule(
                        "cycle length is zero".to_string(),
                    ));
                }
                if *intake_days == 0 {
                    return Err(EngineError::InvalidRule(
                        "cyclic rule needs at least one intake day".to_string(),
                    ));
                }
            }
            RecurrenceRule::OnDemand => {}
        }
        Ok(())
    }

    /// Number of doses on every active day, without building the slot list.
    /// Zero for `IntervalHours` and `OnDemand`.
    pub fn daily_slot_count(&self) -> u64 {
        match self {
            RecurrenceRule::Daily {
                times_per_day,
                times,
            } if times.is_empty() => u64::from(*times_per_day),
            RecurrenceRule::Daily { times, .. }
            | RecurrenceRule::IntervalDays { times, .. }
            | RecurrenceRule::SpecificWeekdays { times, .. }
            | RecurrenceRule::Cyclic { times, .. } => (times.len() as u64).max(1),
            RecurrenceRule::IntervalHours { .. } | RecurrenceRule::OnDemand => 0,
        }
    }

    /// Dose times used on every active day, ascending. Empty for the variants
    /// that are not day-based (`IntervalHours`, `OnDemand`). Meant for
    /// validated rules; the default-time list has `times_per_day` entries.
    pub fn daily_slots(&self) -> Vec<TimeOfDay> {
        let (times, copies) = match self {
            RecurrenceRule::Daily {
                times_per_day,
                times,
            } => (times, *times_per_day),
            RecurrenceRule::IntervalDays { times, .. }
            | RecurrenceRule::SpecificWeekdays { times, .. }
            | RecurrenceRule::Cyclic { times, .. } => (times, 1),
            RecurrenceRule::IntervalHours { .. } | RecurrenceRule::OnDemand => {
                return Vec::new()
            }
        };

        if times.is_empty() {
            return vec![TimeOfDay::DEFAULT_DOSE; copies as usize];
        }
        let mut slots = times.clone();
        slots.sort();
        slots
    }

    pub fn is_on_demand(&self) -> bool {
        matches!(self, RecurrenceRule::OnDemand)
    }
}

/// A medication with its active date range and dosing rule.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Medication {
    pub id: String,
    pub name: String,
    pub dosage: String,
    /// First active date, inclusive.
    pub start_date: NaiveDate,
    /// Last active date, inclusive.
    pub end_date: NaiveDate,
    pub rule: RecurrenceRule,
}

impl Medication {
    pub fn validate(&self) -> Result<()> {
        check_range(self.start_date, self.end_date)?;
        self.rule.validate()
    }
}

pub(crate) fn check_range(start: NaiveDate, end: NaiveDate) -> Result<()> {
    if end < start {
        return Err(EngineError::InvalidDateRange { start, end });
    }
    Ok(())
}

/// A single planned dose instant in local wall-clock time.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Occurrence {
    pub medication_id: String,
    pub date: NaiveDate,
    pub time: TimeOfDay,
}

impl Occurrence {
    pub fn local_datetime(&self) -> NaiveDateTime {
        self.time.on(self.date)
    }
}

impl Ord for Occurrence {
    fn cmp(&self, other: &Self) -> Ordering {
        (self.date, self.time, &self.medication_id).cmp(&(
            other.date,
            other.time,
            &other.medication_id,
        ))
    }
}

impl PartialOrd for Occurrence {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}
