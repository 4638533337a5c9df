//! WASM bindings for dose-engine.
//!
//! Exposes agenda building, adherence statistics, dose counting and reminder
//! planning to JavaScript via `wasm-bindgen`. Every argument and result is a
//! JSON string; the patient bundle uses the same camelCase record shapes the
//! app stores.
//!
//! ## Build process
//!
//! ```sh
//! cargo build -p dose-engine-wasm --target wasm32-unknown-unknown --release
//! wasm-bindgen --target web --out-dir packages/dose-engine-js/wasm/ \
//!   target/wasm32-unknown-unknown/release/dose_engine_wasm.wasm
//! ```

use chrono::{DateTime, Utc};
use dose_engine::record::{parse_date, parse_datetime};
use dose_engine::{expand, EngineError, PatientBundle, RecurrenceRule, ReminderPolicy};
use serde::{Deserialize, Serialize};
use wasm_bindgen::prelude::*;

// ---------------------------------------------------------------------------
// JSON-in, JSON-out implementations (plain Rust, testable off-wasm)
// ---------------------------------------------------------------------------

/// Input for a bare rule expansion, without a stored medication.
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ExpandInput {
    rule: RecurrenceRule,
    start_date: String,
    end_date: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ExpandedDose {
    date: String,
    time: String,
}

fn to_json<T: Serialize>(value: &T) -> Result<String, EngineError> {
    serde_json::to_string(value).map_err(|e| EngineError::Json(e.to_string()))
}

fn agenda_json(
    bundle_json: &str,
    from: &str,
    to: &str,
    timezone: Option<&str>,
) -> Result<String, EngineError> {
    let bundle = PatientBundle::from_json(bundle_json)?;
    let report = bundle.agenda(parse_date(from)?, parse_date(to)?, timezone.unwrap_or("UTC"))?;
    to_json(&report)
}

fn adherence_json(bundle_json: &str) -> Result<String, EngineError> {
    to_json(&PatientBundle::from_json(bundle_json)?.adherence())
}

fn counts_json(bundle_json: &str) -> Result<String, EngineError> {
    to_json(&PatientBundle::from_json(bundle_json)?.counts())
}

fn reminders_json(
    bundle_json: &str,
    now: &str,
    policy_json: Option<&str>,
) -> Result<String, EngineError> {
    let bundle = PatientBundle::from_json(bundle_json)?;
    let now: DateTime<Utc> = parse_datetime(now)?;
    let policy: ReminderPolicy = match policy_json {
        Some(json) => serde_json::from_str(json)
            .map_err(|e| EngineError::Json(format!("invalid reminder policy: {}", e)))?,
        None => ReminderPolicy::default(),
    };
    to_json(&bundle.plan_reminders(&policy, now)?)
}

fn expand_json(input_json: &str, window_start: &str, window_end: &str) -> Result<String, EngineError> {
    let input: ExpandInput =
        serde_json::from_str(input_json).map_err(|e| EngineError::Json(e.to_string()))?;
    let instants = expand(
        &input.rule,
        parse_date(&input.start_date)?,
        parse_date(&input.end_date)?,
        parse_date(window_start)?,
        parse_date(window_end)?,
    )?;
    let doses: Vec<ExpandedDose> = instants
        .iter()
        .map(|i| ExpandedDose {
            date: i.date().to_string(),
            time: i.format("%H:%M").to_string(),
        })
        .collect();
    to_json(&doses)
}

fn js_error(e: EngineError) -> JsValue {
    JsValue::from_str(&e.to_string())
}

// ---------------------------------------------------------------------------
// WASM exports
// ---------------------------------------------------------------------------

/// Build the medication and appointment agenda for `[from, to]`.
///
/// Returns a JSON `AgendaReport` with every date of the window present.
///
/// # Arguments
/// - `bundle_json` -- patient bundle (`{medications, intakes, appointments}`)
/// - `from`, `to` -- window dates, `YYYY-MM-DD`, inclusive
/// - `timezone` -- IANA timezone for placing appointments (default `UTC`)
#[wasm_bindgen(js_name = "buildAgenda")]
pub fn build_agenda(
    bundle_json: &str,
    from: &str,
    to: &str,
    timezone: Option<String>,
) -> Result<String, JsValue> {
    agenda_json(bundle_json, from, to, timezone.as_deref()).map_err(js_error)
}

/// Per-medication and patient-wide adherence statistics.
#[wasm_bindgen(js_name = "adherenceStats")]
pub fn adherence_stats(bundle_json: &str) -> Result<String, JsValue> {
    adherence_json(bundle_json).map_err(js_error)
}

/// Expected dose count of each medication over its whole range. On-demand
/// medications report `null`.
#[wasm_bindgen(js_name = "countDoses")]
pub fn count_doses(bundle_json: &str) -> Result<String, JsValue> {
    counts_json(bundle_json).map_err(js_error)
}

/// Plan reminders grouped by subject id.
///
/// The host's notification layer should cancel every armed trigger of each
/// returned subject before arming the new list, including subjects whose list
/// is empty.
///
/// # Arguments
/// - `now` -- planning instant, RFC 3339
/// - `policy_json` -- optional `ReminderPolicy` (`timezone`, `dst_policy`,
///   lead minutes, `horizon_days`); missing fields take defaults
#[wasm_bindgen(js_name = "planReminders")]
pub fn plan_reminders(
    bundle_json: &str,
    now: &str,
    policy_json: Option<String>,
) -> Result<String, JsValue> {
    reminders_json(bundle_json, now, policy_json.as_deref()).map_err(js_error)
}

/// Expand a bare recurrence rule (`{rule, startDate, endDate}`) over a window.
///
/// Returns a JSON array of `{date, time}` local dose slots.
#[wasm_bindgen(js_name = "expandRule")]
pub fn expand_rule(input_json: &str, window_start: &str, window_end: &str) -> Result<String, JsValue> {
    expand_json(input_json, window_start, window_end).map_err(js_error)
}
