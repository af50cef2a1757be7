//! Request and response bodies for the controller bridge.
//!
//! Field names follow the bridge's camelCase JSON contract.

use accessgate_core::directory::{Person, WorkSchedule};
use accessgate_core::types::{DbId, Timestamp};
use serde::{Deserialize, Serialize};

/// Response `code` the bridge returns when a device accepted the command.
pub const CODE_ACCEPTED: i64 = 201;

/// Schedule reference attached to a grant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScheduleRef {
    pub id: i32,
    pub description: String,
}

impl From<&WorkSchedule> for ScheduleRef {
    fn from(schedule: &WorkSchedule) -> Self {
        Self {
            id: schedule.code,
            description: schedule.name.clone(),
        }
    }
}

/// `POST /add`: enroll a person on a device.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddAccessRequest {
    pub person_id: DbId,
    pub person_code: Option<String>,
    pub name: String,
    pub picture_url: Option<String>,
    pub schedules: Vec<ScheduleRef>,
    pub ip: String,
    pub init_date: Option<Timestamp>,
    pub end_date: Option<Timestamp>,
}

impl AddAccessRequest {
    /// Grant `person` access on the device at `ip` for the given window.
    pub fn grant(
        person: &Person,
        schedules: &[WorkSchedule],
        ip: &str,
        window: (Timestamp, Timestamp),
    ) -> Self {
        Self {
            person_id: person.id,
            person_code: person.code.clone(),
            name: person.name.clone(),
            picture_url: person.picture_url.clone(),
            schedules: schedules.iter().map(ScheduleRef::from).collect(),
            ip: ip.to_string(),
            init_date: Some(window.0),
            end_date: Some(window.1),
        }
    }
}

/// `POST /delete`: remove a person from a device.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoveAccessRequest {
    pub person_id: DbId,
    pub ip: String,
}

/// `POST /add-user-right-week-plan-template`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WeekPlanTemplateRequest {
    pub id: i32,
    pub name: String,
    pub ip: String,
}

/// Work-schedule registration. The bridge routes this through `/delete`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkScheduleRequest {
    pub schedule_id: i32,
    pub ip: String,
    pub days: Vec<i16>,
    /// `HH:MM:SS`
    pub start_time: String,
    /// `HH:MM:SS`
    pub end_time: String,
}

impl WorkScheduleRequest {
    pub fn for_device(schedule: &WorkSchedule, ip: &str) -> Self {
        Self {
            schedule_id: schedule.code,
            ip: ip.to_string(),
            days: schedule.days.clone(),
            start_time: schedule.start_time.format("%H:%M:%S").to_string(),
            end_time: schedule.end_time.format("%H:%M:%S").to_string(),
        }
    }
}

/// Body every bridge command answers with.
#[derive(Debug, Clone, Deserialize)]
pub struct ControllerResponse {
    pub code: i64,
    #[serde(default)]
    pub message: Option<String>,
}

#[cfg(test)]
mod tests {
    use chrono::NaiveTime;

    use super::*;

    #[test]
    fn add_request_serializes_camel_case() {
        let request = AddAccessRequest {
            person_id: 7,
            person_code: Some("A-7".into()),
            name: "Ana".into(),
            picture_url: None,
            schedules: vec![ScheduleRef {
                id: 1,
                description: "Full time".into(),
            }],
            ip: "10.0.0.1".into(),
            init_date: None,
            end_date: None,
        };
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["personId"], 7);
        assert_eq!(json["personCode"], "A-7");
        assert_eq!(json["schedules"][0]["description"], "Full time");
        assert!(json["initDate"].is_null());
    }

    #[test]
    fn work_schedule_times_are_formatted() {
        let schedule = WorkSchedule {
            id: 1,
            tenant_id: 1,
            code: 3,
            name: "Morning".into(),
            days: vec![1, 2, 3],
            start_time: NaiveTime::from_hms_opt(8, 0, 0).unwrap(),
            end_time: NaiveTime::from_hms_opt(12, 30, 0).unwrap(),
        };
        let request = WorkScheduleRequest::for_device(&schedule, "10.0.0.9");
        assert_eq!(request.schedule_id, 3);
        assert_eq!(request.start_time, "08:00:00");
        assert_eq!(request.end_time, "12:30:00");
    }
}
