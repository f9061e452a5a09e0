//! Request wire format and validation.
//!
//! The wire shape is deliberately loose (every field optional) so that
//! validation, not deserialization, decides which fields are missing and
//! reports them by their wire names.

use crate::{
    AvailabilityRecord, Employee, Holiday, HolidayKind, LockSpec, LockValue, ScheduleRequest,
    ShiftType, Slot,
    SlotStatus, ValidationError, Vacation, DAYS_PER_WEEK,
};
use chrono::NaiveDate;
use serde::Deserialize;
use std::collections::{BTreeMap, HashSet};
use tracing::{debug, warn};

/// A request exactly as received
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawRequest {
    pub employees: Option<Vec<Employee>>,
    pub week_start: Option<String>,
    pub availabilities: Option<Vec<RawAvailability>>,
    pub vacations: Option<Vec<RawVacation>>,
    pub holidays: Option<Vec<RawHoliday>>,
    /// day → shift → lock
    pub frozen_assignments: Option<BTreeMap<String, BTreeMap<String, Option<RawLock>>>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawAvailability {
    pub employee_id: String,
    pub week_start: Option<String>,
    /// day → shift → entry
    #[serde(default)]
    pub shifts: BTreeMap<String, BTreeMap<String, RawShiftEntry>>,
}

#[derive(Debug, Default, Deserialize)]
pub struct RawShiftEntry {
    /// An entry without a status leaves the slot available
    pub status: Option<SlotStatus>,
    #[serde(default)]
    pub comment: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawVacation {
    pub employee_id: String,
    pub date: String,
    #[serde(rename = "type")]
    pub kind: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct RawHoliday {
    pub date: String,
    #[serde(default)]
    pub name: String,
    #[serde(rename = "type")]
    pub kind: Option<HolidayKind>,
}

/// A non-null lock value
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum RawLock {
    Employee(String),
    External { external: String },
}

impl RawRequest {
    pub fn from_json(input: &str) -> Result<Self, ValidationError> {
        serde_json::from_str(input).map_err(|e| ValidationError::Malformed(e.to_string()))
    }

    /// Check required fields and convert into a [`ScheduleRequest`]
    pub fn validate(self) -> Result<ScheduleRequest, ValidationError> {
        let employees = self.employees.ok_or(ValidationError::MissingField("employees"))?;
        let week_start = self.week_start.ok_or(ValidationError::MissingField("weekStart"))?;
        let week_start = parse_date("weekStart", &week_start)?;

        if employees.is_empty() {
            return Err(ValidationError::EmptyRoster);
        }
        let mut seen = HashSet::new();
        for employee in &employees {
            if !seen.insert(employee.id.as_str()) {
                return Err(ValidationError::DuplicateEmployee(employee.id.clone()));
            }
        }

        let availabilities = self
            .availabilities
            .unwrap_or_default()
            .into_iter()
            .map(|raw| convert_availability(raw, week_start))
            .collect();

        let vacations = self
            .vacations
            .unwrap_or_default()
            .into_iter()
            .map(|raw| {
                Ok(Vacation {
                    date: parse_date("vacations.date", &raw.date)?,
                    employee_id: raw.employee_id,
                    kind: raw.kind.unwrap_or_else(|| "vacation".into()),
                })
            })
            .collect::<Result<Vec<_>, ValidationError>>()?;

        let holidays = self
            .holidays
            .unwrap_or_default()
            .into_iter()
            .map(|raw| {
                Ok(Holiday {
                    date: parse_date("holidays.date", &raw.date)?,
                    name: raw.name,
                    kind: raw.kind.unwrap_or_else(|| HolidayKind::Other(String::new())),
                })
            })
            .collect::<Result<Vec<_>, ValidationError>>()?;

        let mut locks = Vec::new();
        for (day_key, shifts) in self.frozen_assignments.unwrap_or_default() {
            for (shift_key, raw) in shifts {
                let slot = parse_slot(&day_key, &shift_key).ok_or_else(|| {
                    ValidationError::InvalidLockKey {
                        day: day_key.clone(),
                        shift: shift_key.clone(),
                    }
                })?;
                let value = match raw {
                    None => LockValue::Empty,
                    Some(RawLock::Employee(id)) => LockValue::Employee(id),
                    Some(RawLock::External { external }) => LockValue::External(external),
                };
                locks.push(LockSpec { slot, value });
            }
        }
        locks.sort_by_key(|l| l.slot);

        Ok(ScheduleRequest {
            employees,
            week_start,
            availabilities,
            vacations,
            holidays,
            locks,
        })
    }
}

fn convert_availability(raw: RawAvailability, week_start: NaiveDate) -> AvailabilityRecord {
    if let Some(record_week) = raw.week_start.as_deref() {
        if parse_date("availabilities.weekStart", record_week).ok() != Some(week_start) {
            warn!(
                employee = %raw.employee_id,
                record_week,
                "availability record belongs to a different week"
            );
        }
    }

    let mut record = AvailabilityRecord::new(raw.employee_id);
    for (day_key, shifts) in raw.shifts {
        for (shift_key, entry) in shifts {
            let Some(slot) = parse_slot(&day_key, &shift_key) else {
                debug!(
                    employee = %record.employee_id,
                    day = %day_key,
                    shift = %shift_key,
                    "ignoring availability outside the grid"
                );
                continue;
            };
            if let Some(status) = entry.status {
                record.statuses.insert(slot, status);
            }
        }
    }
    record
}

/// Parse a `YYYY-MM-DD` date, or the date part of an ISO-8601 timestamp
pub fn parse_date(field: &'static str, value: &str) -> Result<NaiveDate, ValidationError> {
    let invalid = || ValidationError::InvalidDate {
        field,
        value: value.to_string(),
    };
    let date_part = match value.len() {
        10 => value,
        n if n > 10 && matches!(value.as_bytes()[10], b'T' | b' ') => {
            value.get(..10).ok_or_else(invalid)?
        }
        _ => return Err(invalid()),
    };
    NaiveDate::parse_from_str(date_part, "%Y-%m-%d").map_err(|_| invalid())
}

fn parse_slot(day: &str, shift: &str) -> Option<Slot> {
    let day: u8 = day.parse().ok()?;
    if day >= DAYS_PER_WEEK {
        return None;
    }
    let shift: ShiftType = shift.parse().ok()?;
    Some(Slot::new(day, shift))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn minimal_request() {
        let request = ScheduleRequest::from_json(
            r#"{"employees": [{"id": "e1", "name": "Dana", "role": "guard"}],
                "weekStart": "2025-01-05"}"#,
        )
        .unwrap();
        assert_eq!(request.employees, vec![Employee::new("e1", "Dana")]);
        assert_eq!(request.week_start, date(2025, 1, 5));
        assert!(request.availabilities.is_empty());
        assert!(request.locks.is_empty());
    }

    #[test]
    fn missing_fields_are_named() {
        let err = ScheduleRequest::from_json(r#"{"weekStart": "2025-01-05"}"#).unwrap_err();
        assert_eq!(err.to_string(), "Missing required field: employees");

        let json = r#"{"employees": [{"id": "e1", "name": "A"}]}"#;
        let err = ScheduleRequest::from_json(json).unwrap_err();
        assert_eq!(err, ValidationError::MissingField("weekStart"));
    }

    #[test]
    fn empty_and_duplicate_rosters_rejected() {
        let json = r#"{"employees": [], "weekStart": "2025-01-05"}"#;
        let err = ScheduleRequest::from_json(json).unwrap_err();
        assert_eq!(err, ValidationError::EmptyRoster);

        let err = ScheduleRequest::from_json(
            r#"{"employees": [{"id": "e1", "name": "A"}, {"id": "e1", "name": "B"}],
                "weekStart": "2025-01-05"}"#,
        )
        .unwrap_err();
        assert_eq!(err, ValidationError::DuplicateEmployee("e1".into()));
    }

    #[test]
    fn malformed_json_is_reported() {
        let err = ScheduleRequest::from_json("{not json").unwrap_err();
        assert!(matches!(err, ValidationError::Malformed(_)));
    }

    #[test]
    fn dates_accept_timestamps() {
        assert_eq!(parse_date("d", "2025-01-07").unwrap(), date(2025, 1, 7));
        assert_eq!(parse_date("d", "2025-01-07T22:00:00.000Z").unwrap(), date(2025, 1, 7));
        assert_eq!(parse_date("d", "2025-01-07 08:30").unwrap(), date(2025, 1, 7));
        assert!(parse_date("d", "2025-01-0").is_err());
        assert!(parse_date("d", "2025-01-07X").is_err());
        assert!(parse_date("d", "07/01/2025").is_err());
    }

    #[test]
    fn full_request() {
        let request = ScheduleRequest::from_json(
            r#"{
                "employees": [{"id": "e1", "name": "Dana"}, {"id": "e2", "name": "Noa"}],
                "weekStart": "2025-01-05T00:00:00.000Z",
                "availabilities": [
                    {"employeeId": "e1", "weekStart": "2025-01-05", "shifts": {
                        "0": {"morning": {"status": "unavailable", "comment": "exam"},
                              "night": {"status": "available"}},
                        "1": {"evening": {}},
                        "6": {"morning": {"status": "unavailable"}}
                    }}
                ],
                "vacations": [{"employeeId": "e2", "date": "2025-01-07T00:00:00Z"}],
                "holidays": [{"date": "2025-01-08", "name": "Festival", "type": "no-work"}],
                "frozenAssignments": {
                    "2": {"morning": "e1", "evening": null, "night": {"external": "agency"}}
                }
            }"#,
        )
        .unwrap();

        let record = &request.availabilities[0];
        assert_eq!(record.status(Slot::new(0, ShiftType::Morning)), Some(SlotStatus::Unavailable));
        assert_eq!(record.status(Slot::new(0, ShiftType::Night)), Some(SlotStatus::Available));
        assert_eq!(record.status(Slot::new(1, ShiftType::Evening)), None);
        assert_eq!(record.statuses.len(), 2);

        assert_eq!(request.vacations[0].date, date(2025, 1, 7));
        assert_eq!(request.vacations[0].kind, "vacation");
        assert_eq!(request.holidays[0].kind, HolidayKind::NoWork);

        assert_eq!(
            request.locks,
            vec![
                LockSpec {
                    slot: Slot::new(2, ShiftType::Morning),
                    value: LockValue::Employee("e1".into()),
                },
                LockSpec {
                    slot: Slot::new(2, ShiftType::Evening),
                    value: LockValue::Empty,
                },
                LockSpec {
                    slot: Slot::new(2, ShiftType::Night),
                    value: LockValue::External("agency".into()),
                },
            ]
        );
    }

    #[test]
    fn null_optional_sections_are_empty() {
        let request = ScheduleRequest::from_json(
            r#"{"employees": [{"id": "e1", "name": "A"}], "weekStart": "2025-01-05",
                "availabilities": null, "vacations": null, "holidays": null,
                "frozenAssignments": null}"#,
        )
        .unwrap();
        assert!(request.vacations.is_empty());
        assert!(request.holidays.is_empty());
    }

    #[test]
    fn bad_lock_keys_rejected() {
        let err = ScheduleRequest::from_json(
            r#"{"employees": [{"id": "e1", "name": "A"}], "weekStart": "2025-01-05",
                "frozenAssignments": {"7": {"morning": "e1"}}}"#,
        )
        .unwrap_err();
        assert_eq!(
            err,
            ValidationError::InvalidLockKey {
                day: "7".into(),
                shift: "morning".into()
            }
        );

        let err = ScheduleRequest::from_json(
            r#"{"employees": [{"id": "e1", "name": "A"}], "weekStart": "2025-01-05",
                "frozenAssignments": {"1": {"afternoon": null}}}"#,
        )
        .unwrap_err();
        assert!(matches!(err, ValidationError::InvalidLockKey { .. }));
    }
}
