//! End-to-end scheduling scenarios
//!
//! Each scenario solves a request and checks the outcome against the
//! independent audit in `rota_core::audit`.

use chrono::{Days, NaiveDate};
use pretty_assertions::assert_eq;
use rota_core::audit::audit;
use rota_core::locks::LockOutcome;
use rota_core::response::{ScheduleReport, SolveStatus, UnfilledReason};
use rota_core::{
    AvailabilityRecord, Employee, FailureKind, Holiday, HolidayKind, LockValue, ScheduleError,
    ScheduleRequest, ShiftType, Slot,
};
use rota_solver::{respond_request, ShiftScheduler, SolveOptions};
use std::time::Duration;

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

fn week() -> NaiveDate {
    date(2025, 1, 5)
}

fn options(seed: u64, secs: u64) -> SolveOptions {
    SolveOptions {
        time_limit: Duration::from_secs(secs),
        workers: 2,
        ..SolveOptions::with_seed(seed)
    }
}

fn roster(n: usize) -> Vec<Employee> {
    (1..=n).map(|i| Employee::new(format!("e{i}"), format!("Employee {i}"))).collect()
}

/// Sunday to Thursday declared morning-only, so every day has one slot
fn mornings_only(n: usize) -> ScheduleRequest {
    let mut request = ScheduleRequest::new(week(), roster(n));
    for day in 0..5 {
        request = request.holiday(Holiday::new(
            week() + Days::new(day),
            "Short day",
            HolidayKind::MorningOnly,
        ));
    }
    request
}

fn solve(request: &ScheduleRequest, seed: u64) -> ScheduleReport {
    let report = ShiftScheduler::new(options(seed, 20))
        .schedule(request)
        .expect("should schedule");
    let violations = audit(request, &report.assignments);
    assert!(violations.is_empty(), "hard rules broken: {violations:?}");
    report
}

// ============================================================================
// Scenario A: a single employee
// ============================================================================

#[test]
fn single_employee_covers_every_slot() {
    let request = mornings_only(1);
    let report = solve(&request, 1);

    assert_eq!(report.stats.status, SolveStatus::Optimal);
    for day in 0..6 {
        assert_eq!(report.assignments.get(Slot::new(day, ShiftType::Morning)), Some("e1"));
    }
    assert_eq!(report.assignments.assigned().count(), 6);
    assert_eq!(report.stats.unfilled_shifts, 0);
    assert_eq!(report.stats.eight_eight_eight_violations, 0);
}

#[test]
fn single_employee_cannot_cover_a_full_week() {
    let request = ScheduleRequest::new(week(), roster(1));
    let err = ShiftScheduler::new(options(1, 10)).schedule(&request).unwrap_err();
    assert!(matches!(err, ScheduleError::Infeasible(_)));
    assert_eq!(err.kind(), FailureKind::Infeasible);

    let response = respond_request(&request, &options(1, 10));
    assert!(!response.success);
    assert_eq!(response.failure_report().unwrap().error, FailureKind::Infeasible);
}

// ============================================================================
// Scenario B: vacation
// ============================================================================

#[test]
fn vacation_day_is_never_assigned() {
    let request = mornings_only(2).vacation("e2", date(2025, 1, 7));
    for seed in [3, 4] {
        let report = solve(&request, seed);
        assert_eq!(report.stats.status, SolveStatus::Optimal);
        assert_eq!(report.assignments.get(Slot::new(2, ShiftType::Morning)), Some("e1"));
        assert!(report.assignments.slots_of("e2").iter().all(|s| s.day != 2));
        assert_eq!(report.stats.unfilled_shifts, 0);
        assert_eq!(report.stats.fairness_gap, 0);
    }
}

// ============================================================================
// Scenario C: locked empty
// ============================================================================

#[test]
fn locked_empty_slot_stays_empty() {
    let slot = Slot::new(2, ShiftType::Morning);
    let request = mornings_only(2).lock(slot, LockValue::Empty);
    for seed in [5, 6] {
        let report = solve(&request, seed);
        assert_eq!(report.assignments.get(slot), None);
        assert_eq!(report.stats.unfilled_shifts, 0);
        assert_eq!(report.unfilled.len(), 1);
        assert_eq!(report.unfilled[0].reason, UnfilledReason::LockedEmpty);
        assert_eq!(report.locks[0].outcome, LockOutcome::Applied);
    }
}

#[test]
fn external_lock_leaves_slot_to_the_external_resource() {
    let slot = Slot::new(4, ShiftType::Morning);
    let request = mornings_only(2).lock(slot, LockValue::External("agency".into()));
    let report = solve(&request, 7);
    assert_eq!(report.assignments.get(slot), None);
    assert_eq!(report.unfilled[0].reason, UnfilledReason::External);
    assert_eq!(report.stats.unfilled_shifts, 0);
}

// ============================================================================
// Scenario D: lock on an unavailable employee
// ============================================================================

#[test]
fn voided_lock_falls_back_to_open_coverage() {
    let slot = Slot::new(1, ShiftType::Morning);
    let request = mornings_only(2)
        .vacation("e1", date(2025, 1, 6))
        .lock(slot, LockValue::Employee("e1".into()));
    let report = solve(&request, 8);

    assert_eq!(report.assignments.get(slot), Some("e2"));
    assert!(matches!(report.locks[0].outcome, LockOutcome::Voided { .. }));
    assert!(report.warnings.iter().any(|w| w.contains("voided")));
}

#[test]
fn voided_lock_with_nobody_left_is_a_legitimate_gap() {
    let slot = Slot::new(1, ShiftType::Morning);
    let request = mornings_only(2)
        .vacation("e1", date(2025, 1, 6))
        .availability(AvailabilityRecord::new("e2").unavailable(slot))
        .lock(slot, LockValue::Employee("e1".into()));
    let report = solve(&request, 9);

    assert_eq!(report.assignments.get(slot), None);
    assert_eq!(report.unfilled[0].reason, UnfilledReason::NoOneAvailable);
    assert_eq!(report.stats.unfilled_shifts, 0);
    assert_eq!(report.stats.uncoverable_shifts, 1);
}

// ============================================================================
// Scenario E: nobody available
// ============================================================================

#[test]
fn slot_nobody_can_work_is_not_penalized() {
    let slot = Slot::new(3, ShiftType::Morning);
    let request = mornings_only(3)
        .availability(AvailabilityRecord::new("e1").unavailable(slot))
        .availability(AvailabilityRecord::new("e2").unavailable(slot))
        .availability(AvailabilityRecord::new("e3").unavailable(slot));
    let report = solve(&request, 10);

    assert_eq!(report.assignments.get(slot), None);
    assert_eq!(report.stats.unfilled_shifts, 0);
    assert_eq!(report.stats.tier_scores.coverage, 0);
    assert_eq!(report.unfilled.len(), 1);
    assert_eq!(report.unfilled[0].date, date(2025, 1, 8));
}

// ============================================================================
// Calendar pruning end to end
// ============================================================================

#[test]
fn no_work_holiday_produces_no_assignments() {
    let festival = Holiday::new(date(2025, 1, 6), "Festival", HolidayKind::NoWork);
    let request = mornings_only(2).holiday(festival);
    let report = solve(&request, 11);
    for shift in ShiftType::ALL {
        assert_eq!(report.assignments.get(Slot::new(1, shift)), None);
    }
    assert_eq!(report.assignments.assigned().count(), 5);
}

// ============================================================================
// Pinned weekday mornings
// ============================================================================

#[test]
fn mornings_pinned_to_one_employee_leave_the_other_without_one() {
    let mut request = mornings_only(2);
    for day in 0..5 {
        let morning = Slot::new(day, ShiftType::Morning);
        request = request.lock(morning, LockValue::Employee("e1".into()));
    }
    let report = solve(&request, 13);
    assert_eq!(report.assignments.get(Slot::new(5, ShiftType::Morning)), Some("e2"));
    assert_eq!(report.stats.employees_without_morning, 1);
    assert!(report.warnings.iter().any(|w| w == "e2 has no weekday morning shift"));
}
