//! # dose-engine
//!
//! Deterministic medication recurrence expansion, dose counting, adherence
//! statistics and reminder planning.
//!
//! A dosing rule ("twice daily", "every 3rd day", "Mon/Wed/Fri", "21 days on,
//! 7 days off", "as needed") is expanded into concrete dose occurrences over a
//! date window. The same rule yields the expected dose count over the
//! medication's lifetime, which together with logged intakes gives adherence
//! statistics. Reminder triggers are derived from occurrences and from
//! appointment instants.
//!
//! Everything here is pure and synchronous. The one collaborator, the
//! notification trigger store, sits behind the [`reminder::TriggerStore`] trait.
//!
//! ## Modules
//!
//! - [`rule`] - `RecurrenceRule`, `TimeOfDay`, `Medication`, `Occurrence`
//! - [`expander`] - rule + window → ordered dose occurrences
//! - [`counter`] - rule → expected dose count (closed forms)
//! - [`intake`] - intake records → adherence statistics
//! - [`reminder`] - event instants + lead times → reminder triggers
//! - [`agenda`] - occurrences / appointments grouped by calendar date
//! - [`appointment`] - follow-up and dialysis appointments
//! - [`dst`] - DST policies for resolving local dose times
//! - [`record`] - persistence record shapes and conversion
//! - [`bundle`] - JSON patient bundle facade for the CLI and WASM bindings
//! - [`cache`] - caller-owned memoization of expansions
//! - [`error`] - Error types

pub mod agenda;
pub mod appointment;
pub mod bundle;
pub mod cache;
pub mod counter;
pub mod dst;
pub mod error;
pub mod expander;
pub mod intake;
pub mod record;
pub mod reminder;
pub mod rule;

pub use agenda::{build_agenda, build_appointment_agenda, build_patient_agenda, Agenda};
pub use appointment::{AppointmentEvent, AppointmentKind, AppointmentStatus};
pub use bundle::PatientBundle;
pub use cache::ExpansionCache;
pub use counter::{count_expected, count_for_medication};
pub use dst::DstPolicy;
pub use error::{EngineError, Skipped};
pub use expander::{expand, expand_medication};
pub use intake::{aggregate, aggregate_patient, AdherenceStats, IntakeRecord, IntakeStatus};
pub use reminder::{
    plan, plan_appointment_reminders, plan_medication_reminders, replan, InMemoryTriggerStore,
    LeadTime, ReminderPolicy, ReminderTrigger, TriggerStore,
};
pub use rule::{Medication, Occurrence, RecurrenceRule, TimeOfDay, WeekdaySet};
