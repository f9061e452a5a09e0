//! Solution extraction and schedule statistics.
//!
//! Walks the full 6×3 grid, reads the winning decisions back into an
//! [`AssignmentTable`], and evaluates every objective measure exactly at the
//! solution to fill in [`ScheduleStats`].

use crate::constraints::Coverage;
use crate::model::{Evaluation, Tier};
use crate::objective::{EmployeeMeasures, ObjectiveLayout, Spread};
use crate::search::SearchStats;
use crate::{BuiltModel, SchedulingPolicy};
use rota_core::response::{
    AssignmentTable, EmployeeBreakdown, ScheduleReport, ScheduleStats, SolveStatus, TierScores,
    UnfilledReason,
    UnfilledSlot,
};
use rota_core::{ShiftType, Slot};
use std::collections::BTreeMap;
use tracing::{info, warn};

/// Fairness gaps above this are reported as warnings
const FAIRNESS_WARNING_GAP: u32 = 2;

/// Run parameters echoed into the stats
#[derive(Clone, Copy, Debug)]
pub struct RunInfo<'a> {
    pub status: SolveStatus,
    pub search: &'a SearchStats,
    pub seed: u64,
    pub policy: &'a SchedulingPolicy,
}

fn count(value: i64) -> u32 {
    u32::try_from(value.max(0)).unwrap_or(u32::MAX)
}

/// Sum of one measure over all employees
fn per_employee(layout: &ObjectiveLayout, f: impl Fn(&EmployeeMeasures) -> i64) -> u32 {
    count(layout.employees.iter().map(f).sum())
}

fn gap(eval: &Evaluation, spread: Spread) -> u32 {
    count(eval.value(spread.max) - eval.value(spread.min))
}

/// Build the response report from a complete decision vector
pub fn extract(built: &BuiltModel, values: &[bool], run: RunInfo<'_>) -> ScheduleReport {
    let shifts = &built.shifts;
    let layout = &built.layout;
    let eval = built.model.evaluate(values);

    let mut assignments = AssignmentTable::empty();
    for (i, &slot) in shifts.slots.iter().enumerate() {
        let chosen = (0..shifts.num_employees()).find(|&e| values[shifts.var(i, e).index()]);
        assignments.set(slot, chosen.map(|e| shifts.employees[e].clone()));
    }

    let mut unfilled = Vec::new();
    for (i, &slot) in shifts.slots.iter().enumerate() {
        if assignments.get(slot).is_some() {
            continue;
        }
        let reason = match shifts.coverage[i] {
            Coverage::Uncoverable => UnfilledReason::NoOneAvailable,
            Coverage::LockedEmpty => UnfilledReason::LockedEmpty,
            Coverage::External(_) => UnfilledReason::External,
            Coverage::Required | Coverage::Pinned(_) => UnfilledReason::Unfilled,
        };
        unfilled.push(UnfilledSlot {
            slot,
            date: built.calendar.date_for_day(slot.day),
            reason,
        });
    }

    let mut employee_breakdown = BTreeMap::new();
    let mut employee_shift_counts = BTreeMap::new();
    for (e, id) in shifts.employees.iter().enumerate() {
        let mine = assignments.slots_of(id);
        let of = |shift: ShiftType| count(mine.iter().filter(|s| s.shift == shift).count() as i64);
        let breakdown = EmployeeBreakdown {
            morning: of(ShiftType::Morning),
            evening: of(ShiftType::Evening),
            night: of(ShiftType::Night),
            total: count(mine.len() as i64),
            eight_eight: count(eval.value(layout.employees[e].rest_gaps)),
        };
        employee_shift_counts.insert(id.clone(), breakdown.total);
        employee_breakdown.insert(id.clone(), breakdown);
    }

    let shift_type_gaps: BTreeMap<ShiftType, u32> = ShiftType::ALL
        .iter()
        .map(|&shift| (shift, gap(&eval, layout.type_spreads[shift.index()])))
        .collect();

    let tier_score = |tier: Tier| {
        let unit = layout.weights.unit(tier).max(1);
        eval.tier_total(&built.model, tier) / unit
    };

    let stats = ScheduleStats {
        status: run.status,
        objective_value: eval.objective(),
        unfilled_shifts: count(layout.unfilled.iter().map(|&(_, a)| eval.value(a)).sum()),
        uncoverable_shifts: count(
            shifts.coverage.iter().filter(|c| **c == Coverage::Uncoverable).count() as i64,
        ),
        eight_eight_patterns: per_employee(layout, |m| eval.value(m.rest_gaps)),
        excess_eight_eight: per_employee(layout, |m| eval.value(m.rest_excess)),
        eight_eight_eight_violations: per_employee(layout, |m| eval.value(m.chains)),
        employees_without_morning: per_employee(layout, |m| {
            m.missing_morning.map_or(0, |a| eval.value(a))
        }),
        fairness_gap: gap(&eval, layout.total_spread),
        shift_type_fairness: shift_type_gaps.values().sum(),
        shift_type_gaps,
        variety_penalty: per_employee(layout, |m| {
            eval.value(m.variety.max) - eval.value(m.variety.min)
        }),
        employees_under_3_shifts: per_employee(layout, |m| eval.value(m.under_min)),
        tier_scores: TierScores {
            coverage: tier_score(Tier::Coverage),
            rest_cap: tier_score(Tier::RestCap),
            fairness: tier_score(Tier::Fairness),
            balance: tier_score(Tier::Balance),
            minimum_load: tier_score(Tier::MinimumLoad),
            tie_break: tier_score(Tier::TieBreak),
        },
        solve_time_seconds: run.search.wall_time.as_secs_f64(),
        nodes_explored: run.search.nodes,
        seed: run.seed,
        employee_shift_counts,
        employee_breakdown,
    };

    let warnings = quality_warnings(built, &eval, &stats, &unfilled, run.policy);
    for w in &warnings {
        warn!("{w}");
    }
    info!(
        status = ?stats.status,
        objective = stats.objective_value,
        unfilled = stats.unfilled_shifts,
        eight_eight = stats.eight_eight_patterns,
        fairness_gap = stats.fairness_gap,
        shift_type_fairness = stats.shift_type_fairness,
        "schedule extracted"
    );

    ScheduleReport {
        assignments,
        stats,
        unfilled,
        locks: built.locks.reports().to_vec(),
        warnings,
    }
}

fn quality_warnings(
    built: &BuiltModel,
    eval: &Evaluation,
    stats: &ScheduleStats,
    unfilled: &[UnfilledSlot],
    policy: &SchedulingPolicy,
) -> Vec<String> {
    let layout = &built.layout;
    let employees = &built.shifts.employees;
    let mut warnings = Vec::new();

    let left_open: Vec<Slot> = unfilled
        .iter()
        .filter(|u| u.reason == UnfilledReason::Unfilled)
        .map(|u| u.slot)
        .collect();
    if !left_open.is_empty() {
        let list: Vec<String> = left_open.iter().map(ToString::to_string).collect();
        warnings.push(format!(
            "{} shifts were left unfilled: {}",
            left_open.len(),
            list.join(", ")
        ));
    }

    for (id, m) in employees.iter().zip(&layout.employees) {
        if eval.value(m.rest_excess) > 0 {
            warnings.push(format!(
                "{id} has {} 8-8 patterns (cap {})",
                eval.value(m.rest_gaps),
                policy.rest_gap_cap
            ));
        }
        if m.missing_morning.is_some_and(|a| eval.value(a) > 0) {
            warnings.push(format!("{id} has no weekday morning shift"));
        }
    }

    let total: u32 = stats.employee_shift_counts.values().sum();
    let average_reaches_min =
        !employees.is_empty() && total >= policy.min_shifts * employees.len() as u32;
    if average_reaches_min {
        for (id, m) in employees.iter().zip(&layout.employees) {
            if eval.value(m.under_min) > 0 {
                warnings.push(format!(
                    "{id} has {} shifts, below the minimum of {}",
                    eval.value(m.total),
                    policy.min_shifts
                ));
            }
        }
    }

    if stats.fairness_gap > FAIRNESS_WARNING_GAP {
        warnings.push(format!("shift totals differ by {} between employees", stats.fairness_gap));
    }

    for report in built.locks.voided() {
        warnings.push(format!("lock on {} for {} was voided", report.slot, report.lock));
    }
    warnings
}
