//! Response wire format.
//!
//! ```json
//! {"success": true, "result": {"assignments": {...}, "stats": {...},
//!   "unfilled": [...], "locks": [...], "warnings": [...]}}
//! {"success": false, "result": {"error": "INFEASIBLE", "message": "..."}}
//! ```

use crate::locks::LockReport;
use crate::{EmployeeId, FailureKind, ScheduleError, ShiftType, Slot};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

// ============================================================================
// Assignment Table
// ============================================================================

/// day → shift → employee, over the full 6×3 grid
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AssignmentTable(BTreeMap<u8, BTreeMap<ShiftType, Option<EmployeeId>>>);

impl AssignmentTable {
    /// Every grid cell present and unassigned
    pub fn empty() -> Self {
        let mut table = Self::default();
        for slot in Slot::grid() {
            table.set(slot, None);
        }
        table
    }

    pub fn get(&self, slot: Slot) -> Option<&str> {
        self.0
            .get(&slot.day)
            .and_then(|day| day.get(&slot.shift))
            .and_then(|cell| cell.as_deref())
    }

    pub fn set(&mut self, slot: Slot, employee: Option<EmployeeId>) {
        self.0.entry(slot.day).or_default().insert(slot.shift, employee);
    }

    /// Assigned cells in (day, shift) order
    pub fn assigned(&self) -> impl Iterator<Item = (Slot, &str)> + '_ {
        self.0.iter().flat_map(|(&day, shifts)| {
            shifts
                .iter()
                .filter_map(move |(&shift, cell)| {
                    cell.as_deref().map(|id| (Slot::new(day, shift), id))
                })
        })
    }

    /// Slots worked by one employee, in (day, shift) order
    pub fn slots_of(&self, employee: &str) -> Vec<Slot> {
        self.assigned().filter(|(_, id)| *id == employee).map(|(slot, _)| slot).collect()
    }
}

// ============================================================================
// Statistics
// ============================================================================

/// How good the returned schedule is known to be
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SolveStatus {
    /// Proven optimal
    #[default]
    Optimal,
    /// Best found before the time limit
    Feasible,
}

/// Unweighted score of each priority tier, highest priority first
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TierScores {
    pub coverage: i64,
    pub rest_cap: i64,
    pub fairness: i64,
    pub balance: i64,
    pub minimum_load: i64,
    pub tie_break: i64,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmployeeBreakdown {
    pub morning: u32,
    pub evening: u32,
    pub night: u32,
    pub total: u32,
    /// Evening→morning and night→evening pairs on consecutive days
    pub eight_eight: u32,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ScheduleStats {
    pub status: SolveStatus,
    pub objective_value: i64,
    /// Coverage-required slots left empty
    pub unfilled_shifts: u32,
    /// Open slots nobody could work
    pub uncoverable_shifts: u32,
    pub eight_eight_patterns: u32,
    /// Employees over the rest-gap cap
    pub excess_eight_eight: u32,
    pub eight_eight_eight_violations: u32,
    pub employees_without_morning: u32,
    pub fairness_gap: u32,
    pub shift_type_fairness: u32,
    pub shift_type_gaps: BTreeMap<ShiftType, u32>,
    pub variety_penalty: u32,
    pub employees_under_3_shifts: u32,
    pub tier_scores: TierScores,
    pub solve_time_seconds: f64,
    pub nodes_explored: u64,
    pub seed: u64,
    pub employee_shift_counts: BTreeMap<EmployeeId, u32>,
    pub employee_breakdown: BTreeMap<EmployeeId, EmployeeBreakdown>,
}

// ============================================================================
// Report
// ============================================================================

/// Why a valid slot has no roster assignment
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum UnfilledReason {
    NoOneAvailable,
    LockedEmpty,
    External,
    /// Someone was available but the schedule left it empty
    Unfilled,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnfilledSlot {
    #[serde(flatten)]
    pub slot: Slot,
    pub date: NaiveDate,
    pub reason: UnfilledReason,
}

/// A successful schedule
#[derive(Clone, Debug, Serialize)]
pub struct ScheduleReport {
    pub assignments: AssignmentTable,
    pub stats: ScheduleStats,
    pub unfilled: Vec<UnfilledSlot>,
    pub locks: Vec<LockReport>,
    pub warnings: Vec<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailureReport {
    pub error: FailureKind,
    pub message: String,
}

#[derive(Clone, Debug, Serialize)]
#[serde(untagged)]
pub enum ResponseResult {
    Schedule(Box<ScheduleReport>),
    Failure(FailureReport),
}

/// Top-level response envelope
#[derive(Clone, Debug, Serialize)]
pub struct ScheduleResponse {
    pub success: bool,
    pub result: ResponseResult,
}

impl ScheduleResponse {
    pub fn success(report: ScheduleReport) -> Self {
        Self {
            success: true,
            result: ResponseResult::Schedule(Box::new(report)),
        }
    }

    pub fn failure(kind: FailureKind, message: impl Into<String>) -> Self {
        Self {
            success: false,
            result: ResponseResult::Failure(FailureReport {
                error: kind,
                message: message.into(),
            }),
        }
    }

    pub fn from_error(error: &ScheduleError) -> Self {
        Self::failure(error.kind(), error.to_string())
    }

    pub fn report(&self) -> Option<&ScheduleReport> {
        match &self.result {
            ResponseResult::Schedule(report) => Some(report),
            ResponseResult::Failure(_) => None,
        }
    }

    pub fn failure_report(&self) -> Option<&FailureReport> {
        match &self.result {
            ResponseResult::Schedule(_) => None,
            ResponseResult::Failure(failure) => Some(failure),
        }
    }

    /// Process exit status mirroring `success`
    pub fn exit_code(&self) -> i32 {
        i32::from(!self.success)
    }
}

impl From<Result<ScheduleReport, ScheduleError>> for ScheduleResponse {
    fn from(result: Result<ScheduleReport, ScheduleError>) -> Self {
        match result {
            Ok(report) => Self::success(report),
            Err(error) => Self::from_error(&error),
        }
    }
}
