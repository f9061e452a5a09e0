//! Hard-rule checker for an assignment table.
//!
//! Works only from the request and the table, so it can check schedules
//! produced anywhere, including hand-edited ones.

use crate::availability::AvailabilityResolver;
use crate::calendar::WeekCalendar;
use crate::locks::{LockTable, SlotLock};
use crate::response::AssignmentTable;
use crate::{EmployeeId, LockValue, ScheduleRequest, ShiftType, Slot};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

/// A broken hard rule
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum Violation {
    /// Assignment to a pruned slot
    OutsideValidSet { slot: Slot, employee: EmployeeId },
    UnknownEmployee { slot: Slot, employee: EmployeeId },
    Unavailable { slot: Slot, employee: EmployeeId },
    /// Two or more slots on one day
    DoubleBooked { day: u8, employee: EmployeeId },
    /// Night on `day`, morning on the next day
    NightThenMorning { day: u8, employee: EmployeeId },
    /// Night on `day`, evening the day after, morning the day after that
    ThreeChain { day: u8, employee: EmployeeId },
    LockBroken {
        slot: Slot,
        lock: String,
        found: Option<EmployeeId>,
    },
    /// Coverage-required slot left empty
    Uncovered { slot: Slot },
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Violation::OutsideValidSet { slot, employee } => {
                write!(f, "{employee} assigned to {slot}, which is not scheduled")
            }
            Violation::UnknownEmployee { slot, employee } => {
                write!(f, "{slot} assigned to {employee}, who is not on the roster")
            }
            Violation::Unavailable { slot, employee } => {
                write!(f, "{employee} is not available for {slot}")
            }
            Violation::DoubleBooked { day, employee } => {
                write!(f, "{employee} works more than one shift on day {day}")
            }
            Violation::NightThenMorning { day, employee } => {
                write!(f, "{employee} works night on day {day} and morning on day {}", day + 1)
            }
            Violation::ThreeChain { day, employee } => write!(
                f,
                "{employee} works night, evening, morning on days {day}, {}, {}",
                day + 1,
                day + 2
            ),
            Violation::LockBroken { slot, lock, found } => match found {
                Some(id) => write!(f, "{slot} is locked to {lock} but assigned to {id}"),
                None => write!(f, "{slot} is locked to {lock} but unassigned"),
            },
            Violation::Uncovered { slot } => {
                write!(f, "{slot} is empty although someone could work it")
            }
        }
    }
}

/// Check a table against the request's hard rules
pub fn audit(request: &ScheduleRequest, table: &AssignmentTable) -> Vec<Violation> {
    let calendar = WeekCalendar::build(request.week_start, &request.holidays);
    let resolver = AvailabilityResolver::new(request, &calendar);
    let locks = LockTable::resolve(request, &calendar, &resolver);
    audit_with(request, &resolver, &locks, table)
}

/// [`audit`] with an already-resolved calendar, availability and lock table
pub fn audit_with(
    request: &ScheduleRequest,
    resolver: &AvailabilityResolver<'_>,
    locks: &LockTable,
    table: &AssignmentTable,
) -> Vec<Violation> {
    let calendar = resolver.calendar();
    let mut violations = Vec::new();
    let mut worked: BTreeMap<&str, BTreeSet<Slot>> = BTreeMap::new();

    for (slot, id) in table.assigned() {
        let employee = id.to_string();
        if !calendar.contains(slot) {
            violations.push(Violation::OutsideValidSet { slot, employee });
        } else if request.employee_index(id).is_none() {
            violations.push(Violation::UnknownEmployee { slot, employee });
        } else if !resolver.is_available(id, slot) {
            violations.push(Violation::Unavailable { slot, employee });
        }
        worked.entry(id).or_default().insert(slot);
    }

    for (id, slots) in &worked {
        let works = |day: u8, shift: ShiftType| slots.contains(&Slot::new(day, shift));
        let days: BTreeSet<u8> = slots.iter().map(|s| s.day).collect();
        for &day in &days {
            if slots.iter().filter(|s| s.day == day).count() > 1 {
                violations.push(Violation::DoubleBooked {
                    day,
                    employee: id.to_string(),
                });
            }
            if works(day, ShiftType::Night) && works(day + 1, ShiftType::Morning) {
                violations.push(Violation::NightThenMorning {
                    day,
                    employee: id.to_string(),
                });
            }
            if works(day, ShiftType::Night)
                && works(day + 1, ShiftType::Evening)
                && works(day + 2, ShiftType::Morning)
            {
                violations.push(Violation::ThreeChain {
                    day,
                    employee: id.to_string(),
                });
            }
        }
    }

    for (index, &slot) in calendar.slots().iter().enumerate() {
        let found = table.get(slot);
        let expected = match locks.state(index) {
            SlotLock::Open => {
                let coverable =
                    request.employees.iter().any(|e| resolver.is_available(&e.id, slot));
                if found.is_none() && coverable {
                    violations.push(Violation::Uncovered { slot });
                }
                continue;
            }
            SlotLock::Pinned(e) => LockValue::Employee(request.employees[*e].id.clone()),
            SlotLock::Empty => LockValue::Empty,
            SlotLock::External(label) => LockValue::External(label.clone()),
        };
        let honoured = match &expected {
            LockValue::Employee(id) => found == Some(id.as_str()),
            LockValue::Empty | LockValue::External(_) => found.is_none(),
        };
        if !honoured {
            violations.push(Violation::LockBroken {
                slot,
                lock: expected.to_string(),
                found: found.map(str::to_string),
            });
        }
    }

    violations.sort();
    violations
}
