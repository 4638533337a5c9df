//! Tests for date-keyed agendas and the expansion cache.

use chrono::{NaiveDate, TimeZone, Utc, Weekday};
use dose_engine::{
    build_agenda, build_appointment_agenda, build_patient_agenda, expand_medication,
    AppointmentEvent, AppointmentKind, AppointmentStatus, ExpansionCache, Medication,
    RecurrenceRule, TimeOfDay,
};

fn d(s: &str) -> NaiveDate {
    s.parse().unwrap()
}

fn t(s: &str) -> TimeOfDay {
    s.parse().unwrap()
}

fn medication(id: &str, rule: RecurrenceRule) -> Medication {
    Medication {
        id: id.to_string(),
        name: id.to_uppercase(),
        dosage: "5mg".to_string(),
        start_date: d("2026-03-02"),
        end_date: d("2026-03-15"),
        rule,
    }
}

fn mon_wed_fri(id: &str) -> Medication {
    medication(
        id,
        RecurrenceRule::SpecificWeekdays {
            weekdays: [Weekday::Mon, Weekday::Wed, Weekday::Fri].into_iter().collect(),
            times: vec![t("09:00")],
        },
    )
}

fn appointment(id: &str, at: chrono::DateTime<Utc>) -> AppointmentEvent {
    AppointmentEvent {
        id: id.to_string(),
        patient_id: "p".to_string(),
        scheduled_at: at,
        kind: AppointmentKind::FollowUp,
        status: AppointmentStatus::Scheduled,
        notes: None,
    }
}

// ── Medication agenda ───────────────────────────────────────────────────────

#[test]
fn every_window_date_is_present_even_when_empty() {
    let occurrences = expand_medication(&mon_wed_fri("a"), d("2026-03-02"), d("2026-03-08")).unwrap();
    let agenda = build_agenda(occurrences, d("2026-03-02"), d("2026-03-08"));

    assert_eq!(agenda.len(), 7);
    assert_eq!(agenda[&d("2026-03-02")].len(), 1);
    assert!(agenda[&d("2026-03-03")].is_empty());
    assert_eq!(agenda[&d("2026-03-04")].len(), 1);
    assert!(agenda[&d("2026-03-08")].is_empty());
}

#[test]
fn occurrences_from_several_medications_are_time_ordered_per_day() {
    let twice = medication(
        "b",
        RecurrenceRule::Daily {
            times_per_day: 2,
            times: vec![t("07:30"), t("21:00")],
        },
    );
    let patient = build_patient_agenda(&[mon_wed_fri("a"), twice], d("2026-03-02"), d("2026-03-02"));

    let day = &patient.days[&d("2026-03-02")];
    let order: Vec<(&str, TimeOfDay)> = day.iter().map(|o| (o.medication_id.as_str(), o.time)).collect();
    assert_eq!(order, vec![("b", t("07:30")), ("a", t("09:00")), ("b", t("21:00"))]);
    assert!(patient.skipped.is_empty());
}

#[test]
fn occurrences_outside_window_are_dropped() {
    let occurrences = expand_medication(&mon_wed_fri("a"), d("2026-03-02"), d("2026-03-15")).unwrap();
    let agenda = build_agenda(occurrences, d("2026-03-09"), d("2026-03-09"));
    assert_eq!(agenda.len(), 1);
    assert_eq!(agenda[&d("2026-03-09")].len(), 1);
}

#[test]
fn inverted_window_yields_empty_agenda() {
    let agenda = build_agenda(Vec::new(), d("2026-03-09"), d("2026-03-01"));
    assert!(agenda.is_empty());
}

#[test]
fn malformed_medication_is_listed_as_skipped() {
    let broken = medication(
        "broken",
        RecurrenceRule::Cyclic {
            intake_days: 0,
            pause_days: 7,
            times: vec![],
        },
    );
    let patient = build_patient_agenda(&[broken, mon_wed_fri("a")], d("2026-03-02"), d("2026-03-06"));

    assert_eq!(patient.skipped.len(), 1);
    assert_eq!(patient.skipped[0].id, "broken");
    assert_eq!(patient.days.values().map(Vec::len).sum::<usize>(), 3);
}

// ── Appointment agenda ──────────────────────────────────────────────────────

#[test]
fn appointments_land_on_their_local_date() {
    // 23:30 UTC on the 2nd is already the 3rd in Berlin.
    let late = appointment("late", Utc.with_ymd_and_hms(2026, 3, 2, 23, 30, 0).unwrap());
    let early = appointment("early", Utc.with_ymd_and_hms(2026, 3, 3, 6, 0, 0).unwrap());
    let appointments = [early, late];

    let utc = build_appointment_agenda(&appointments, d("2026-03-02"), d("2026-03-03"), chrono_tz::UTC);
    assert_eq!(utc[&d("2026-03-02")].len(), 1);
    assert_eq!(utc[&d("2026-03-03")].len(), 1);

    let berlin = build_appointment_agenda(
        &appointments,
        d("2026-03-02"),
        d("2026-03-03"),
        chrono_tz::Europe::Berlin,
    );
    assert!(berlin[&d("2026-03-02")].is_empty());
    let ids: Vec<&str> = berlin[&d("2026-03-03")].iter().map(|a| a.id.as_str()).collect();
    assert_eq!(ids, vec!["late", "early"]);
}

// ── Cache ───────────────────────────────────────────────────────────────────

#[test]
fn cache_returns_same_expansion_and_counts_hits() {
    let mut cache = ExpansionCache::new();
    let med = mon_wed_fri("a");

    let first = cache.expand(&med, d("2026-03-02"), d("2026-03-08")).unwrap();
    let second = cache.expand(&med, d("2026-03-02"), d("2026-03-08")).unwrap();

    assert_eq!(first, second);
    assert_eq!(first.len(), 3);
    assert_eq!(cache.hits(), 1);
    assert_eq!(cache.misses(), 1);
    assert_eq!(cache.len(), 1);
}

#[test]
fn cache_key_includes_rule_and_window() {
    let mut cache = ExpansionCache::new();
    let mut med = mon_wed_fri("a");
    cache.expand(&med, d("2026-03-02"), d("2026-03-08")).unwrap();
    cache.expand(&med, d("2026-03-09"), d("2026-03-15")).unwrap();

    // Edited in place under the same id: a different rule is a different key.
    med.rule = RecurrenceRule::Daily {
        times_per_day: 1,
        times: vec![],
    };
    let edited = cache.expand(&med, d("2026-03-02"), d("2026-03-08")).unwrap();
    assert_eq!(edited.len(), 7);
    assert_eq!(cache.misses(), 3);

    assert_eq!(cache.invalidate("a"), 3);
    assert!(cache.is_empty());
}

#[test]
fn cache_does_not_store_errors() {
    let mut cache = ExpansionCache::new();
    let mut med = mon_wed_fri("a");
    med.end_date = d("2026-01-01");

    assert!(cache.expand(&med, d("2026-03-02"), d("2026-03-08")).is_err());
    assert!(cache.is_empty());
}
