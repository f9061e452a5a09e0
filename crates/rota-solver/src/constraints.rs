//! Decision variables and hard constraints.
//!
//! One boolean per (employee, valid slot), allocated slot-major. Hard rules:
//! 1. unavailable employees are fixed to 0
//! 2. each coverage-required slot gets exactly one employee; a slot nobody
//!    can work gets none
//! 3. at most one slot per employee per day
//! 4. no night on day d followed by morning on day d+1
//! 5. no night → evening → morning chain over three consecutive days
//!
//! Locks replace rule 2 for their slot: an empty or external lock forces the
//! slot's sum to 0, a pinned lock forces its employee to 1 and everyone else
//! to 0.

use crate::model::{DecisionId, ModelBuilder};
use rota_core::availability::AvailabilityResolver;
use rota_core::calendar::WeekCalendar;
use rota_core::locks::{LockTable, SlotLock};
use rota_core::{EmployeeId, ScheduleRequest, ShiftType, Slot, DAYS_PER_WEEK};
use tracing::{debug, info};

/// Coverage rule applied to a valid slot
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Coverage {
    /// Exactly one roster employee
    Required,
    /// Open, but nobody can work it
    Uncoverable,
    LockedEmpty,
    External(String),
    /// Locked to the employee at this roster index
    Pinned(usize),
}

/// Decisions laid out over slots and employees
#[derive(Clone, Debug)]
pub struct ShiftModel {
    /// Valid slots, same order as the calendar
    pub slots: Vec<Slot>,
    pub employees: Vec<EmployeeId>,
    /// `[slot][employee]`
    pub vars: Vec<Vec<DecisionId>>,
    /// `[slot][employee]`: availability alone, before any lock applies
    pub available: Vec<Vec<bool>>,
    /// `[slot][employee]`: the employee may be given the slot
    pub assignable: Vec<Vec<bool>>,
    pub coverage: Vec<Coverage>,
}

impl ShiftModel {
    pub fn var(&self, slot: usize, employee: usize) -> DecisionId {
        self.vars[slot][employee]
    }

    pub fn slot_index(&self, slot: Slot) -> Option<usize> {
        self.slots.binary_search(&slot).ok()
    }

    pub fn num_employees(&self) -> usize {
        self.employees.len()
    }

    /// Slots whose coverage is a hard requirement
    pub fn required_slots(&self) -> impl Iterator<Item = usize> + '_ {
        self.coverage
            .iter()
            .enumerate()
            .filter(|(_, c)| **c == Coverage::Required)
            .map(|(i, _)| i)
    }

    /// Slot indices on one day
    pub fn slots_on_day(&self, day: u8) -> impl Iterator<Item = usize> + '_ {
        self.slots.iter().enumerate().filter(move |(_, s)| s.day == day).map(|(i, _)| i)
    }

    /// Index of `slot` moved `days` ahead with a different shift type
    pub fn follow(&self, slot: usize, days: u8, shift: ShiftType) -> Option<usize> {
        self.slots[slot].shifted(days, shift).and_then(|s| self.slot_index(s))
    }
}

/// Allocate decisions and emit every hard constraint
pub fn build_shift_model(
    builder: &mut ModelBuilder,
    request: &ScheduleRequest,
    calendar: &WeekCalendar,
    resolver: &AvailabilityResolver<'_>,
    locks: &LockTable,
) -> ShiftModel {
    let slots = calendar.slots().to_vec();
    let employees: Vec<EmployeeId> = request.employees.iter().map(|e| e.id.clone()).collect();

    for id in &employees {
        debug!(
            employee = %id,
            available = resolver.available_count(id, &slots),
            of = slots.len(),
            "availability"
        );
    }

    let vars: Vec<Vec<DecisionId>> = slots
        .iter()
        .enumerate()
        .map(|(i, slot)| {
            employees
                .iter()
                .map(|id| {
                    builder.decision(format!("x[{id},{},{}]", slot.day, slot.shift), i as u32)
                })
                .collect()
        })
        .collect();

    let mut availability = Vec::with_capacity(slots.len());
    let mut assignable = Vec::with_capacity(slots.len());
    let mut coverage = Vec::with_capacity(slots.len());

    for (i, &slot) in slots.iter().enumerate() {
        let available: Vec<bool> =
            employees.iter().map(|id| resolver.is_available(id, slot)).collect();
        for (e, &free) in available.iter().enumerate() {
            if !free {
                builder.fix("unavailable", vars[i][e], false);
            }
        }

        let all: Vec<(DecisionId, i64)> = vars[i].iter().map(|&d| (d, 1)).collect();
        let (kind, allowed) = match locks.state(i) {
            SlotLock::Empty => {
                builder.constrain("locked-empty", all, 0, 0);
                (Coverage::LockedEmpty, vec![false; employees.len()])
            }
            SlotLock::External(label) => {
                builder.constrain("locked-external", all, 0, 0);
                (Coverage::External(label.clone()), vec![false; employees.len()])
            }
            SlotLock::Pinned(pinned) => {
                for (e, &d) in vars[i].iter().enumerate() {
                    builder.fix("lock", d, e == *pinned);
                }
                let allowed = (0..employees.len()).map(|e| e == *pinned).collect();
                (Coverage::Pinned(*pinned), allowed)
            }
            SlotLock::Open if available.iter().any(|&a| a) => {
                builder.constrain("coverage", all, 1, 1);
                (Coverage::Required, available.clone())
            }
            SlotLock::Open => {
                debug!(%slot, "nobody available");
                builder.constrain("coverage", all, 0, 0);
                (Coverage::Uncoverable, available.clone())
            }
        };
        availability.push(available);
        coverage.push(kind);
        assignable.push(allowed);
    }

    let model = ShiftModel {
        slots,
        employees,
        vars,
        available: availability,
        assignable,
        coverage,
    };

    for e in 0..model.num_employees() {
        for day in 0..DAYS_PER_WEEK {
            let on_day: Vec<(DecisionId, i64)> =
                model.slots_on_day(day).map(|i| (model.var(i, e), 1)).collect();
            if on_day.len() > 1 {
                builder.constrain("one-shift-per-day", on_day, 0, 1);
            }
        }

        for (i, slot) in model.slots.iter().enumerate() {
            if slot.shift != ShiftType::Night {
                continue;
            }
            if let Some(morning) = model.follow(i, 1, ShiftType::Morning) {
                builder.constrain(
                    "night-then-morning",
                    vec![(model.var(i, e), 1), (model.var(morning, e), 1)],
                    0,
                    1,
                );
            }
            if let (Some(evening), Some(morning)) = (
                model.follow(i, 1, ShiftType::Evening),
                model.follow(i, 2, ShiftType::Morning),
            ) {
                builder.constrain(
                    "three-chain",
                    vec![
                        (model.var(i, e), 1),
                        (model.var(evening, e), 1),
                        (model.var(morning, e), 1),
                    ],
                    0,
                    2,
                );
            }
        }
    }

    info!(
        decisions = builder.num_decisions(),
        required = model.required_slots().count(),
        "hard constraints built"
    );
    model
}
