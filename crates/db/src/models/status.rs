//! Typed view over the `release_statuses` lookup table.

use accessgate_core::release::state_machine::{
    ACTIVE, CONFLICT, DELETED, DISABLED, EXPIRED, SCHEDULED,
};

/// Status ID type matching SMALLINT/SMALLSERIAL in the database.
pub type StatusId = i16;

/// Access release lifecycle status. Discriminants are the seeded row ids.
#[repr(i16)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReleaseStatus {
    Scheduled = SCHEDULED,
    Active = ACTIVE,
    Expired = EXPIRED,
    Disabled = DISABLED,
    Conflict = CONFLICT,
    Deleted = DELETED,
}

impl ReleaseStatus {
    pub fn id(self) -> StatusId {
        self as StatusId
    }

    /// `None` for ids outside the seeded range.
    pub fn from_id(id: StatusId) -> Option<Self> {
        let status = match id {
            SCHEDULED => Self::Scheduled,
            ACTIVE => Self::Active,
            EXPIRED => Self::Expired,
            DISABLED => Self::Disabled,
            CONFLICT => Self::Conflict,
            DELETED => Self::Deleted,
            _ => return None,
        };
        Some(status)
    }
}

impl From<ReleaseStatus> for StatusId {
    fn from(value: ReleaseStatus) -> Self {
        value.id()
    }
}
