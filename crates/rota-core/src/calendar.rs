//! Valid slot set for one week.
//!
//! A slot of the 6×3 grid is pruned when:
//! - it falls on Friday (day 5) and is not a morning
//! - its date is a `no-work` holiday
//! - its date is a `morning-only` holiday and it is not a morning
//!
//! The Friday rule is checked first, so a Friday that is also a
//! holiday reports the Friday reason.

use crate::{Holiday, HolidayKind, ShiftType, Slot, DAYS_PER_WEEK, FRIDAY};
use chrono::NaiveDate;
use serde::Serialize;
use std::collections::HashMap;
use std::fmt;
use tracing::{debug, info};

/// Why a grid slot is absent from the valid set
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "reason", content = "holiday", rename_all = "kebab-case")]
pub enum PruneReason {
    /// Friday only has a morning shift
    FridayMorningOnly,
    NoWorkHoliday(String),
    MorningOnlyHoliday(String),
}

impl fmt::Display for PruneReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PruneReason::FridayMorningOnly => f.write_str("friday, morning only"),
            PruneReason::NoWorkHoliday(name) => write!(f, "no-work holiday ({name})"),
            PruneReason::MorningOnlyHoliday(name) => write!(f, "morning-only holiday ({name})"),
        }
    }
}

/// A grid slot removed from the valid set
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct PrunedSlot {
    #[serde(flatten)]
    pub slot: Slot,
    pub date: NaiveDate,
    #[serde(flatten)]
    pub reason: PruneReason,
}

/// The week's dates and valid slots
#[derive(Clone, Debug)]
pub struct WeekCalendar {
    week_start: NaiveDate,
    slots: Vec<Slot>,
    pruned: Vec<PrunedSlot>,
}

impl WeekCalendar {
    /// Compute the valid slot set; when several holidays share a date the last one applies
    pub fn build(week_start: NaiveDate, holidays: &[Holiday]) -> Self {
        let by_date: HashMap<NaiveDate, &Holiday> = holidays.iter().map(|h| (h.date, h)).collect();

        let mut slots = Vec::new();
        let mut pruned = Vec::new();
        for slot in Slot::grid() {
            let date = day_date(week_start, slot.day);
            let reason = if slot.day == FRIDAY && slot.shift != ShiftType::Morning {
                Some(PruneReason::FridayMorningOnly)
            } else {
                by_date.get(&date).and_then(|holiday| match holiday.kind {
                    HolidayKind::NoWork => Some(PruneReason::NoWorkHoliday(holiday.name.clone())),
                    HolidayKind::MorningOnly if slot.shift != ShiftType::Morning => {
                        Some(PruneReason::MorningOnlyHoliday(holiday.name.clone()))
                    }
                    _ => None,
                })
            };
            match reason {
                Some(reason) => {
                    debug!(%slot, %date, %reason, "slot pruned");
                    pruned.push(PrunedSlot { slot, date, reason });
                }
                None => slots.push(slot),
            }
        }

        info!(%week_start, valid = slots.len(), pruned = pruned.len(), "week calendar built");
        Self {
            week_start,
            slots,
            pruned,
        }
    }

    pub fn week_start(&self) -> NaiveDate {
        self.week_start
    }

    /// Calendar date of a day index
    pub fn date_for_day(&self, day: u8) -> NaiveDate {
        day_date(self.week_start, day)
    }

    /// Valid slots in ascending (day, shift) order
    pub fn slots(&self) -> &[Slot] {
        &self.slots
    }

    pub fn pruned(&self) -> &[PrunedSlot] {
        &self.pruned
    }

    pub fn contains(&self, slot: Slot) -> bool {
        self.index_of(slot).is_some()
    }

    /// Position of a slot in [`WeekCalendar::slots`]
    pub fn index_of(&self, slot: Slot) -> Option<usize> {
        self.slots.binary_search(&slot).ok()
    }

    pub fn slots_on_day(&self, day: u8) -> impl Iterator<Item = Slot> + '_ {
        self.slots.iter().copied().filter(move |s| s.day == day)
    }

    /// Number of days with at least one valid slot
    pub fn working_days(&self) -> usize {
        (0..DAYS_PER_WEEK).filter(|&d| self.slots_on_day(d).next().is_some()).count()
    }

    pub fn prune_reason(&self, slot: Slot) -> Option<&PruneReason> {
        self.pruned.iter().find(|p| p.slot == slot).map(|p| &p.reason)
    }
}

fn day_date(week_start: NaiveDate, day: u8) -> NaiveDate {
    week_start + chrono::Duration::days(i64::from(day))
}
