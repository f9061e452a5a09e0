//! # rota-core
//!
//! Core domain model for the rota weekly shift scheduler.
//!
//! This crate provides:
//! - Domain types: `Employee`, `ShiftType`, `Slot`, `Holiday`, `Vacation`,
//!   `AvailabilityRecord`, `LockValue`, `ScheduleRequest`
//! - Request parsing and validation ([`request`])
//! - The valid slot set for a week ([`calendar`])
//! - Effective availability ([`availability`]) and frozen assignments ([`locks`])
//! - The response wire format ([`response`]) and an independent hard-rule checker ([`audit`])
//! - Error types
//!
//! ## Example
//!
//! ```rust
//! use chrono::NaiveDate;
//! use rota_core::{Employee, ScheduleRequest, ShiftType, Slot};
//! use rota_core::calendar::WeekCalendar;
//!
//! let week = NaiveDate::from_ymd_opt(2025, 1, 5).unwrap();
//! let request = ScheduleRequest::new(week, vec![Employee::new("e1", "Dana")])
//!     .vacation("e1", NaiveDate::from_ymd_opt(2025, 1, 7).unwrap());
//!
//! let calendar = WeekCalendar::build(request.week_start, &request.holidays);
//! assert!(calendar.contains(Slot::new(5, ShiftType::Morning)));
//! assert!(!calendar.contains(Slot::new(5, ShiftType::Night)));
//! ```

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

pub mod audit;
pub mod availability;
pub mod calendar;
pub mod locks;
pub mod request;
pub mod response;

// ============================================================================
// Type Aliases and Constants
// ============================================================================

/// Unique identifier for an employee
pub type EmployeeId = String;

/// Working days in one scheduling week (Sunday through Friday)
pub const DAYS_PER_WEEK: u8 = 6;

/// Day index of Friday, which only carries a morning shift
pub const FRIDAY: u8 = DAYS_PER_WEEK - 1;

// ============================================================================
// Shifts and Slots
// ============================================================================

/// One of the three daily shifts
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ShiftType {
    Morning,
    Evening,
    Night,
}

impl ShiftType {
    /// All shift types in their fixed daily order
    pub const ALL: [ShiftType; 3] = [ShiftType::Morning, ShiftType::Evening, ShiftType::Night];

    pub const fn as_str(self) -> &'static str {
        match self {
            ShiftType::Morning => "morning",
            ShiftType::Evening => "evening",
            ShiftType::Night => "night",
        }
    }

    /// Position within [`ShiftType::ALL`]
    pub const fn index(self) -> usize {
        match self {
            ShiftType::Morning => 0,
            ShiftType::Evening => 1,
            ShiftType::Night => 2,
        }
    }
}

impl fmt::Display for ShiftType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ShiftType {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "morning" => Ok(ShiftType::Morning),
            "evening" => Ok(ShiftType::Evening),
            "night" => Ok(ShiftType::Night),
            other => Err(ValidationError::UnknownShift(other.to_string())),
        }
    }
}

/// A (day, shift) cell of the weekly grid
///
/// Ordering is by day, then by shift, which is the order every slot list
/// in the workspace uses.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Slot {
    /// Day index, 0 = week start
    pub day: u8,
    pub shift: ShiftType,
}

impl Slot {
    pub const fn new(day: u8, shift: ShiftType) -> Self {
        Self { day, shift }
    }

    /// Every cell of the 6×3 grid, valid or not
    pub fn grid() -> impl Iterator<Item = Slot> {
        (0..DAYS_PER_WEEK)
            .flat_map(|day| ShiftType::ALL.into_iter().map(move |shift| Slot::new(day, shift)))
    }

    /// The same shift type on a later day, if still inside the week
    pub fn shifted(self, days: u8, shift: ShiftType) -> Option<Slot> {
        let day = self.day.checked_add(days)?;
        (day < DAYS_PER_WEEK).then_some(Slot::new(day, shift))
    }
}

impl fmt::Display for Slot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "day {} {}", self.day, self.shift)
    }
}

// ============================================================================
// Roster
// ============================================================================

/// An employee on the roster
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Employee {
    pub id: EmployeeId,
    /// Display name
    #[serde(default)]
    pub name: String,
}

impl Employee {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
        }
    }
}

// ============================================================================
// Calendar Inputs
// ============================================================================

/// How a holiday shapes the slots of its date
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum HolidayKind {
    /// No shifts at all
    NoWork,
    /// Morning shift only
    MorningOnly,
    /// Informational; the day keeps its normal shifts
    Other(String),
}

impl From<String> for HolidayKind {
    fn from(value: String) -> Self {
        match value.as_str() {
            "no-work" => HolidayKind::NoWork,
            "morning-only" => HolidayKind::MorningOnly,
            _ => HolidayKind::Other(value),
        }
    }
}

impl From<HolidayKind> for String {
    fn from(kind: HolidayKind) -> Self {
        match kind {
            HolidayKind::NoWork => "no-work".to_string(),
            HolidayKind::MorningOnly => "morning-only".to_string(),
            HolidayKind::Other(s) => s,
        }
    }
}

/// A public holiday
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Holiday {
    pub date: NaiveDate,
    pub name: String,
    pub kind: HolidayKind,
}

impl Holiday {
    pub fn new(date: NaiveDate, name: impl Into<String>, kind: HolidayKind) -> Self {
        Self {
            date,
            name: name.into(),
            kind,
        }
    }
}

/// A day off for one employee; blocks every shift on that date
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Vacation {
    pub employee_id: EmployeeId,
    pub date: NaiveDate,
    /// Free-form absence type, "vacation" unless stated
    pub kind: String,
}

// ============================================================================
// Availability
// ============================================================================

/// Status an employee submitted for one slot
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SlotStatus {
    Available,
    Unavailable,
}

/// Submitted availability of one employee for the week.
///
/// Slots without an entry are available.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct AvailabilityRecord {
    pub employee_id: EmployeeId,
    pub statuses: BTreeMap<Slot, SlotStatus>,
}

impl AvailabilityRecord {
    pub fn new(employee_id: impl Into<String>) -> Self {
        Self {
            employee_id: employee_id.into(),
            statuses: BTreeMap::new(),
        }
    }

    pub fn unavailable(mut self, slot: Slot) -> Self {
        self.statuses.insert(slot, SlotStatus::Unavailable);
        self
    }

    pub fn available(mut self, slot: Slot) -> Self {
        self.statuses.insert(slot, SlotStatus::Available);
        self
    }

    pub fn status(&self, slot: Slot) -> Option<SlotStatus> {
        self.statuses.get(&slot).copied()
    }
}

// ============================================================================
// Frozen Assignments
// ============================================================================

/// What a frozen slot is locked to
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum LockValue {
    /// A named roster employee
    Employee(EmployeeId),
    /// Intentionally left unassigned
    Empty,
    /// Covered by a resource outside the roster
    External(String),
}

impl Serialize for LockValue {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        use serde::ser::SerializeMap;
        match self {
            LockValue::Employee(id) => serializer.serialize_str(id),
            LockValue::Empty => serializer.serialize_none(),
            LockValue::External(label) => {
                let mut map = serializer.serialize_map(Some(1))?;
                map.serialize_entry("external", label)?;
                map.end()
            }
        }
    }
}

impl fmt::Display for LockValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LockValue::Employee(id) => write!(f, "employee {id}"),
            LockValue::Empty => f.write_str("empty"),
            LockValue::External(label) => write!(f, "external ({label})"),
        }
    }
}

/// A frozen assignment for one slot
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LockSpec {
    pub slot: Slot,
    pub value: LockValue,
}

// ============================================================================
// Request
// ============================================================================

/// A validated scheduling request for one week
#[derive(Clone, Debug)]
pub struct ScheduleRequest {
    pub employees: Vec<Employee>,
    /// Date of day 0
    pub week_start: NaiveDate,
    pub availabilities: Vec<AvailabilityRecord>,
    pub vacations: Vec<Vacation>,
    pub holidays: Vec<Holiday>,
    /// Frozen assignments, sorted by slot
    pub locks: Vec<LockSpec>,
}

impl ScheduleRequest {
    /// Create a request with no availability, absence, holiday or lock data
    pub fn new(week_start: NaiveDate, employees: Vec<Employee>) -> Self {
        Self {
            employees,
            week_start,
            availabilities: Vec::new(),
            vacations: Vec::new(),
            holidays: Vec::new(),
            locks: Vec::new(),
        }
    }

    /// Parse and validate a JSON request
    pub fn from_json(input: &str) -> Result<Self, ValidationError> {
        request::RawRequest::from_json(input)?.validate()
    }

    pub fn availability(mut self, record: AvailabilityRecord) -> Self {
        self.availabilities.push(record);
        self
    }

    pub fn vacation(mut self, employee_id: impl Into<String>, date: NaiveDate) -> Self {
        self.vacations.push(Vacation {
            employee_id: employee_id.into(),
            date,
            kind: "vacation".into(),
        });
        self
    }

    pub fn holiday(mut self, holiday: Holiday) -> Self {
        self.holidays.push(holiday);
        self
    }

    /// Freeze a slot; a later lock on the same slot replaces an earlier one
    pub fn lock(mut self, slot: Slot, value: LockValue) -> Self {
        self.locks.retain(|l| l.slot != slot);
        self.locks.push(LockSpec { slot, value });
        self.locks.sort_by_key(|l| l.slot);
        self
    }

    /// Roster position of an employee
    pub fn employee_index(&self, id: &str) -> Option<usize> {
        self.employees.iter().position(|e| e.id == id)
    }
}

// ============================================================================
// Errors
// ============================================================================

/// A request that cannot be scheduled as given
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("Missing required field: {0}")]
    MissingField(&'static str),

    #[error("Employee list is empty")]
    EmptyRoster,

    #[error("Duplicate employee id: {0}")]
    DuplicateEmployee(EmployeeId),

    #[error("Invalid date in {field}: {value:?}")]
    InvalidDate { field: &'static str, value: String },

    #[error("Invalid frozen assignment: day {day:?}, shift {shift:?}")]
    InvalidLockKey { day: String, shift: String },

    #[error("Unknown shift type: {0}")]
    UnknownShift(String),

    #[error("Malformed request: {0}")]
    Malformed(String),
}

/// Failure kinds carried on the wire
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FailureKind {
    Infeasible,
    Unknown,
    Exception,
}

/// Scheduling error
#[derive(Debug, Error)]
pub enum ScheduleError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("No solution exists with given constraints: {0}")]
    Infeasible(String),

    #[error("Solver status: {0}")]
    SolverFailure(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl ScheduleError {
    /// The wire error kind this error is reported as
    pub fn kind(&self) -> FailureKind {
        match self {
            ScheduleError::Infeasible(_) => FailureKind::Infeasible,
            ScheduleError::SolverFailure(_) => FailureKind::Unknown,
            ScheduleError::Validation(_) | ScheduleError::Internal(_) => FailureKind::Exception,
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
