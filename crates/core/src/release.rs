//! Access-release lifecycle rules.
//!
//! Pure functions and constants shared by the repository layer, the
//! lifecycle engine, and the scheduler. Nothing here touches the database
//! or the network.

use chrono::Duration;
use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::types::{DbId, Timestamp};

// ---------------------------------------------------------------------------
// Release types
// ---------------------------------------------------------------------------

pub const RELEASE_TYPE_MANUAL: &str = "manual";
pub const RELEASE_TYPE_FACIAL: &str = "facial";
pub const RELEASE_TYPE_QR_CODE: &str = "qr-code";
pub const RELEASE_TYPE_INVITE: &str = "invite";

const VALID_RELEASE_TYPES: &[&str] = &[
    RELEASE_TYPE_MANUAL,
    RELEASE_TYPE_FACIAL,
    RELEASE_TYPE_QR_CODE,
    RELEASE_TYPE_INVITE,
];

/// Reject release types the equipment vendors do not understand.
pub fn validate_release_type(release_type: &str) -> Result<(), CoreError> {
    if VALID_RELEASE_TYPES.contains(&release_type) {
        Ok(())
    } else {
        Err(CoreError::Validation(format!(
            "Unknown release type '{release_type}'. Expected one of: {}",
            VALID_RELEASE_TYPES.join(", ")
        )))
    }
}

// ---------------------------------------------------------------------------
// Audit actions
// ---------------------------------------------------------------------------

pub const ACTION_CREATE: &str = "create";
pub const ACTION_UPDATE: &str = "update";
pub const ACTION_ACTIVATE: &str = "activate";
pub const ACTION_EXPIRE: &str = "expire";
pub const ACTION_CONFLICT: &str = "conflict";
pub const ACTION_DELETE: &str = "delete";

/// One entry of a release's append-only `actions` log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReleaseAction {
    pub action: String,
    pub date: Timestamp,
    /// `None` when the transition was driven by the scheduler.
    pub actor: Option<DbId>,
}

impl ReleaseAction {
    pub fn new(action: &str, date: Timestamp, actor: Option<DbId>) -> Self {
        Self {
            action: action.to_string(),
            date,
            actor,
        }
    }
}

// ---------------------------------------------------------------------------
// State machine
// ---------------------------------------------------------------------------

/// Release status IDs matching `release_statuses` seed data.
pub mod state_machine {
    pub const SCHEDULED: i16 = 1;
    pub const ACTIVE: i16 = 2;
    pub const EXPIRED: i16 = 3;
    pub const DISABLED: i16 = 4;
    pub const CONFLICT: i16 = 5;
    pub const DELETED: i16 = 6;

    /// Returns the set of valid target status IDs reachable from `from_status`.
    pub fn valid_transitions(from_status: i16) -> &'static [i16] {
        match from_status {
            SCHEDULED => &[ACTIVE, EXPIRED, DISABLED, CONFLICT, DELETED],
            ACTIVE => &[EXPIRED, DISABLED, DELETED],
            // Ended releases can still be removed from listings.
            EXPIRED | DISABLED | CONFLICT => &[DELETED],
            DELETED => &[],
            _ => &[],
        }
    }

    pub fn can_transition(from: i16, to: i16) -> bool {
        valid_transitions(from).contains(&to)
    }

    /// Validate a state transition, returning an error message for invalid ones.
    pub fn validate_transition(from: i16, to: i16) -> Result<(), String> {
        if can_transition(from, to) {
            Ok(())
        } else {
            Err(format!(
                "Invalid transition: {} ({from}) -> {} ({to})",
                status_name(from),
                status_name(to)
            ))
        }
    }

    /// A release in one of these statuses will never grant access again.
    pub fn is_ended(status: i16) -> bool {
        matches!(status, EXPIRED | DISABLED | CONFLICT | DELETED)
    }

    pub fn status_name(id: i16) -> &'static str {
        match id {
            SCHEDULED => "Scheduled",
            ACTIVE => "Active",
            EXPIRED => "Expired",
            DISABLED => "Disabled",
            CONFLICT => "Conflict",
            DELETED => "Deleted",
            _ => "Unknown",
        }
    }
}

// ---------------------------------------------------------------------------
// Date policy
// ---------------------------------------------------------------------------

/// Default schedule code every tenant is seeded with.
pub const DEFAULT_WORK_SCHEDULE_CODE: i32 = 1;

/// Default validity when neither an end date nor an expiring time is given.
pub const DEFAULT_VALIDITY_HOURS: i64 = 24;

/// Longest configurable default validity (one leap year).
pub const MAX_VALIDITY_HOURS: i64 = 24 * 366;

/// Longest `expiring_minutes` a request may ask for (one year).
pub const MAX_EXPIRING_MINUTES: i64 = 525_600;

/// Tenant-level defaults applied when a release omits optional fields.
#[derive(Debug, Clone)]
pub struct ReleasePolicy {
    pub default_validity: Duration,
    pub default_work_schedule_code: i32,
}

impl Default for ReleasePolicy {
    fn default() -> Self {
        Self {
            default_validity: Duration::hours(DEFAULT_VALIDITY_HOURS),
            default_work_schedule_code: DEFAULT_WORK_SCHEDULE_CODE,
        }
    }
}

impl ReleasePolicy {
    /// Build a policy from configured values, rejecting validities outside
    /// `1..=MAX_VALIDITY_HOURS`.
    pub fn new(validity_hours: i64, default_work_schedule_code: i32) -> Result<Self, CoreError> {
        if !(1..=MAX_VALIDITY_HOURS).contains(&validity_hours) {
            return Err(CoreError::Validation(format!(
                "Default validity must be between 1 and {MAX_VALIDITY_HOURS} hours, got {validity_hours}"
            )));
        }
        Ok(Self {
            default_validity: Duration::hours(validity_hours),
            default_work_schedule_code,
        })
    }

    /// Empty schedule lists fall back to the tenant default code.
    pub fn work_schedule_codes(&self, requested: &[i32]) -> Vec<i32> {
        if requested.is_empty() {
            vec![self.default_work_schedule_code]
        } else {
            requested.to_vec()
        }
    }

    /// Compute the `(init, end)` window for a new release.
    ///
    /// `init` defaults to `now`. `end` defaults to `init + expiring_minutes`
    /// when an expiring time is supplied, otherwise to `init` plus the
    /// default validity. An explicit `end` earlier than `init` is rejected,
    /// never corrected.
    pub fn resolve_window(
        &self,
        now: Timestamp,
        init: Option<Timestamp>,
        end: Option<Timestamp>,
        expiring_minutes: Option<i64>,
    ) -> Result<(Timestamp, Timestamp), CoreError> {
        let init = init.unwrap_or(now);
        let end = match (end, expiring_minutes) {
            (Some(end), _) => end,
            (None, Some(minutes)) if (1..=MAX_EXPIRING_MINUTES).contains(&minutes) => {
                extend(init, Duration::minutes(minutes))?
            }
            (None, Some(minutes)) => {
                return Err(CoreError::Validation(format!(
                    "expiring_minutes must be between 1 and {MAX_EXPIRING_MINUTES}, got {minutes}"
                )))
            }
            (None, None) => extend(init, self.default_validity)?,
        };
        validate_date_range(init, end)?;
        Ok((init, end))
    }
}

fn extend(init: Timestamp, validity: Duration) -> Result<Timestamp, CoreError> {
    init.checked_add_signed(validity).ok_or_else(|| {
        CoreError::Validation(format!("init_date {init} plus validity is out of range"))
    })
}

/// `end_date >= init_date` must hold for every release.
pub fn validate_date_range(init: Timestamp, end: Timestamp) -> Result<(), CoreError> {
    if end < init {
        return Err(CoreError::Validation(format!(
            "end_date ({end}) must not be before init_date ({init})"
        )));
    }
    Ok(())
}

/// An invitation accepted late never starts in the past.
pub fn invitation_init_date(now: Timestamp, invitation_init: Option<Timestamp>) -> Timestamp {
    match invitation_init {
        Some(init) if init > now => init,
        _ => now,
    }
}

/// Closed-interval overlap test for two release windows.
pub fn windows_overlap(a: (Timestamp, Timestamp), b: (Timestamp, Timestamp)) -> bool {
    a.0 <= b.1 && b.0 <= a.1
}

/// IDs of the existing windows that overlap `candidate`.
pub fn overlapping(
    existing: &[(DbId, Timestamp, Timestamp)],
    candidate: (Timestamp, Timestamp),
) -> Vec<DbId> {
    existing
        .iter()
        .filter(|(_, init, end)| windows_overlap((*init, *end), candidate))
        .map(|(id, _, _)| *id)
        .collect()
}
