//! Entry/exit record constants and snapshot payloads.
//!
//! Snapshots are frozen copies of collaborator data taken when the record
//! is written, so later edits to a person or access point never rewrite
//! history.

use serde::{Deserialize, Serialize};

use crate::directory::{AccessPoint, Person};
use crate::error::CoreError;
use crate::types::DbId;

pub const DIRECTION_ENTRY: &str = "entry";
pub const DIRECTION_EXIT: &str = "exit";

pub fn validate_direction(direction: &str) -> Result<(), CoreError> {
    match direction {
        DIRECTION_ENTRY | DIRECTION_EXIT => Ok(()),
        other => Err(CoreError::Validation(format!(
            "Direction must be '{DIRECTION_ENTRY}' or '{DIRECTION_EXIT}', got '{other}'"
        ))),
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PersonSnapshot {
    pub id: DbId,
    pub name: String,
    pub picture_url: Option<String>,
    pub person_type_id: DbId,
    pub person_type_name: Option<String>,
    pub category: Option<String>,
}

impl From<&Person> for PersonSnapshot {
    fn from(person: &Person) -> Self {
        Self {
            id: person.id,
            name: person.name.clone(),
            picture_url: person.picture_url.clone(),
            person_type_id: person.person_type_id,
            person_type_name: person.person_type_name.clone(),
            category: person.category.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AreaSnapshot {
    pub id: DbId,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccessPointSnapshot {
    pub id: DbId,
    pub name: String,
    pub area: AreaSnapshot,
}

impl From<&AccessPoint> for AccessPointSnapshot {
    fn from(point: &AccessPoint) -> Self {
        Self {
            id: point.id,
            name: point.name.clone(),
            area: AreaSnapshot {
                id: point.area_id,
                name: point.area_name.clone(),
            },
        }
    }
}

/// Whether a release scoped to `area_ids` / `access_point_id` covers `point`.
///
/// A release bound to a single access point only covers that point; an
/// area-scoped release covers every point inside its areas.
pub fn point_in_scope(point: &AccessPoint, area_ids: &[DbId], access_point_id: Option<DbId>) -> bool {
    match access_point_id {
        Some(id) => id == point.id,
        None => area_ids.contains(&point.area_id),
    }
}
