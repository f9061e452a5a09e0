//! Text output for schedules, slot sets and audits

use rota_core::audit::Violation;
use rota_core::calendar::WeekCalendar;
use rota_core::response::{ScheduleReport, ScheduleResponse};
use rota_core::{ShiftType, Slot, DAYS_PER_WEEK};
use std::fmt::Write;
use std::process;

// ============================================================================
// Exit Code
// ============================================================================

/// Process exit codes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitCode {
    /// Schedule produced, or nothing to report
    Success = 0,
    /// Failure response or violations found
    Failure = 1,
}

impl ExitCode {
    pub fn from_response(response: &ScheduleResponse) -> Self {
        if response.success {
            ExitCode::Success
        } else {
            ExitCode::Failure
        }
    }

    pub fn from_violations(violations: &[Violation]) -> Self {
        if violations.is_empty() {
            ExitCode::Success
        } else {
            ExitCode::Failure
        }
    }
}

impl From<ExitCode> for process::ExitCode {
    fn from(code: ExitCode) -> Self {
        process::ExitCode::from(code as u8)
    }
}

// ============================================================================
// Schedule
// ============================================================================

const EMPTY: &str = "-";

/// Human-readable response; `calendar` is absent when the request did not parse
pub fn response_text(response: &ScheduleResponse, calendar: Option<&WeekCalendar>) -> String {
    match (response.report(), response.failure_report()) {
        (Some(report), _) => schedule_text(report, calendar),
        (None, Some(failure)) => {
            let kind = serde_json::to_value(failure.error)
                .ok()
                .and_then(|v| v.as_str().map(str::to_string))
                .unwrap_or_default();
            format!("error[{kind}]: {}\n", failure.message)
        }
        (None, None) => String::new(),
    }
}

fn schedule_text(report: &ScheduleReport, calendar: Option<&WeekCalendar>) -> String {
    let stats = &report.stats;
    let mut out = String::new();
    let _ = writeln!(
        out,
        "Status: {:?}  objective {}  ({:.2}s, {} nodes, seed {})",
        stats.status,
        stats.objective_value,
        stats.solve_time_seconds,
        stats.nodes_explored,
        stats.seed
    );
    out.push('\n');

    let width = report
        .assignments
        .assigned()
        .map(|(_, id)| id.len())
        .max()
        .unwrap_or(0)
        .max("Morning".len());
    let _ = write!(out, "{:<4}{:<12}", "Day", "Date");
    for shift in ShiftType::ALL {
        let _ = write!(out, "{:<width$}  ", capitalize(shift.as_str()));
    }
    out.truncate(out.trim_end().len());
    out.push('\n');

    for day in 0..DAYS_PER_WEEK {
        let date = calendar.map(|c| c.date_for_day(day).to_string()).unwrap_or_default();
        let _ = write!(out, "{day:<4}{date:<12}");
        for shift in ShiftType::ALL {
            let slot = Slot::new(day, shift);
            let cell = match report.assignments.get(slot) {
                Some(id) => id,
                None if calendar.map_or(true, |c| c.contains(slot)) => EMPTY,
                None => "",
            };
            let _ = write!(out, "{cell:<width$}  ");
        }
        out.truncate(out.trim_end().len());
        out.push('\n');
    }

    out.push('\n');
    let _ = writeln!(out, "{:<width$}  Total  M  E  N  8-8", "Employee");
    for (id, b) in &stats.employee_breakdown {
        let _ = writeln!(
            out,
            "{id:<width$}  {:>5} {:>2} {:>2} {:>2} {:>4}",
            b.total, b.morning, b.evening, b.night, b.eight_eight
        );
    }

    out.push('\n');
    let _ = writeln!(
        out,
        "Unfilled {}  uncoverable {}  8-8 {}  fairness gap {}  shift-type gaps {}  variety {}",
        stats.unfilled_shifts,
        stats.uncoverable_shifts,
        stats.eight_eight_patterns,
        stats.fairness_gap,
        stats.shift_type_fairness,
        stats.variety_penalty
    );

    for u in &report.unfilled {
        let reason = serde_json::to_value(u.reason)
            .ok()
            .and_then(|v| v.as_str().map(str::to_string))
            .unwrap_or_default();
        let _ = writeln!(out, "  {} ({}): {reason}", u.slot, u.date);
    }
    for w in &report.warnings {
        let _ = writeln!(out, "warning: {w}");
    }
    out
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    chars
        .next()
        .map(|c| c.to_uppercase().chain(chars).collect())
        .unwrap_or_default()
}

// ============================================================================
// Slots and Audit
// ============================================================================

pub fn slots_text(calendar: &WeekCalendar) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "Week of {}: {} slots over {} days",
        calendar.week_start(),
        calendar.slots().len(),
        calendar.working_days()
    );
    for day in 0..DAYS_PER_WEEK {
        let shifts: Vec<&str> = calendar.slots_on_day(day).map(|s| s.shift.as_str()).collect();
        let listed = if shifts.is_empty() {
            EMPTY.to_string()
        } else {
            shifts.join(" ")
        };
        let _ = writeln!(out, "  day {day} {}  {listed}", calendar.date_for_day(day));
    }
    if !calendar.pruned().is_empty() {
        out.push_str("Pruned:\n");
        for p in calendar.pruned() {
            let _ = writeln!(out, "  {} ({}): {}", p.slot, p.date, p.reason);
        }
    }
    out
}

pub fn violations_text(violations: &[Violation]) -> String {
    if violations.is_empty() {
        return "No violations\n".to_string();
    }
    let mut out = String::new();
    for v in violations {
        let _ = writeln!(out, "violation: {v}");
    }
    let _ = writeln!(out, "{} violations", violations.len());
    out
}
