//! Frozen assignments reconciled against the calendar and current availability.
//!
//! A lock naming an employee who can no longer work the slot, or who is not
//! on the roster, is voided: the slot falls back to ordinary coverage. A lock
//! on a slot outside the valid set is ignored. Neither is an error; both are
//! reported.

use crate::availability::AvailabilityResolver;
use crate::calendar::WeekCalendar;
use crate::{LockValue, ScheduleRequest, Slot};
use serde::Serialize;
use tracing::{info, warn};

/// Effective lock state of one valid slot
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SlotLock {
    /// No lock in force
    Open,
    /// Locked empty; no roster assignment
    Empty,
    /// Covered outside the roster; no roster assignment
    External(String),
    /// Pinned to the employee at this roster index
    Pinned(usize),
}

/// What became of one lock entry
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "lowercase")]
pub enum LockOutcome {
    Applied,
    /// The slot is scheduled as if unlocked
    Voided { reason: String },
    /// The slot is not in the valid set
    Ignored { reason: String },
}

/// A lock entry together with its outcome
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct LockReport {
    #[serde(flatten)]
    pub slot: Slot,
    pub lock: LockValue,
    #[serde(flatten)]
    pub outcome: LockOutcome,
}

/// Per-slot lock states, parallel to [`WeekCalendar::slots`]
#[derive(Clone, Debug)]
pub struct LockTable {
    states: Vec<SlotLock>,
    reports: Vec<LockReport>,
}

impl LockTable {
    pub fn resolve(
        request: &ScheduleRequest,
        calendar: &WeekCalendar,
        resolver: &AvailabilityResolver<'_>,
    ) -> Self {
        let mut states = vec![SlotLock::Open; calendar.slots().len()];
        let mut reports = Vec::with_capacity(request.locks.len());

        for requested in &request.locks {
            let (state, outcome) = match calendar.index_of(requested.slot) {
                None => {
                    let reason = calendar.prune_reason(requested.slot).map_or_else(
                        || "slot is not scheduled".to_string(),
                        |r| format!("slot is not scheduled: {r}"),
                    );
                    (None, LockOutcome::Ignored { reason })
                }
                Some(index) => {
                    let (state, outcome) =
                        Self::reconcile(request, resolver, requested.slot, &requested.value);
                    (Some((index, state)), outcome)
                }
            };

            let (slot, lock) = (requested.slot, &requested.value);
            match &outcome {
                LockOutcome::Applied => info!(%slot, %lock, "lock applied"),
                LockOutcome::Voided { reason } => {
                    warn!(%slot, %lock, %reason, "lock voided, slot scheduled normally")
                }
                LockOutcome::Ignored { reason } => warn!(%slot, %lock, %reason, "lock ignored"),
            }

            if let Some((index, state)) = state {
                states[index] = state;
            }
            reports.push(LockReport {
                slot: requested.slot,
                lock: requested.value.clone(),
                outcome,
            });
        }

        Self { states, reports }
    }

    fn reconcile(
        request: &ScheduleRequest,
        resolver: &AvailabilityResolver<'_>,
        slot: Slot,
        value: &LockValue,
    ) -> (SlotLock, LockOutcome) {
        match value {
            LockValue::Empty => (SlotLock::Empty, LockOutcome::Applied),
            LockValue::External(label) => (SlotLock::External(label.clone()), LockOutcome::Applied),
            LockValue::Employee(id) => match request.employee_index(id) {
                None => (
                    SlotLock::Open,
                    LockOutcome::Voided {
                        reason: format!("{id} is not on the roster"),
                    },
                ),
                Some(_) if !resolver.is_available(id, slot) => (
                    SlotLock::Open,
                    LockOutcome::Voided {
                        reason: format!("{id} is not available"),
                    },
                ),
                Some(index) => (SlotLock::Pinned(index), LockOutcome::Applied),
            },
        }
    }

    /// Lock state of the valid slot at `index`
    pub fn state(&self, index: usize) -> &SlotLock {
        &self.states[index]
    }

    pub fn states(&self) -> &[SlotLock] {
        &self.states
    }

    pub fn reports(&self) -> &[LockReport] {
        &self.reports
    }

    pub fn voided(&self) -> impl Iterator<Item = &LockReport> {
        self.reports
            .iter()
            .filter(|r| matches!(r.outcome, LockOutcome::Voided { .. }))
    }
}
