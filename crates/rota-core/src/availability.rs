//! Effective availability of an employee for a slot.
//!
//! Precedence, highest first:
//! 1. a vacation on the slot's date makes every shift that day unavailable
//! 2. an explicit `unavailable` status in the availability record
//! 3. otherwise available (unspecified means available)

use crate::calendar::WeekCalendar;
use crate::{AvailabilityRecord, ScheduleRequest, Slot, SlotStatus};
use chrono::NaiveDate;
use std::collections::{HashMap, HashSet};
use tracing::debug;

/// Read-only availability lookups over one request
#[derive(Debug)]
pub struct AvailabilityResolver<'a> {
    calendar: &'a WeekCalendar,
    vacations: HashMap<&'a str, HashSet<NaiveDate>>,
    records: HashMap<&'a str, &'a AvailabilityRecord>,
}

impl<'a> AvailabilityResolver<'a> {
    /// Index vacations and availability records by employee.
    ///
    /// When one employee has several availability records the last one wins.
    pub fn new(request: &'a ScheduleRequest, calendar: &'a WeekCalendar) -> Self {
        let mut vacations: HashMap<&str, HashSet<NaiveDate>> = HashMap::new();
        for vacation in &request.vacations {
            debug!(
                employee = %vacation.employee_id,
                date = %vacation.date,
                kind = %vacation.kind,
                "absence"
            );
            vacations.entry(vacation.employee_id.as_str()).or_default().insert(vacation.date);
        }

        let records = request
            .availabilities
            .iter()
            .map(|record| (record.employee_id.as_str(), record))
            .collect();

        Self {
            calendar,
            vacations,
            records,
        }
    }

    pub fn is_on_vacation(&self, employee: &str, date: NaiveDate) -> bool {
        self.vacations.get(employee).is_some_and(|dates| dates.contains(&date))
    }

    /// Whether the employee may work the slot
    pub fn is_available(&self, employee: &str, slot: Slot) -> bool {
        if self.is_on_vacation(employee, self.calendar.date_for_day(slot.day)) {
            return false;
        }
        self.records
            .get(employee)
            .and_then(|record| record.status(slot))
            .map_or(true, |status| status == SlotStatus::Available)
    }

    /// How many of `slots` the employee may work
    pub fn available_count(&self, employee: &str, slots: &[Slot]) -> usize {
        slots.iter().filter(|&&slot| self.is_available(employee, slot)).count()
    }

    pub fn calendar(&self) -> &'a WeekCalendar {
        self.calendar
    }
}
