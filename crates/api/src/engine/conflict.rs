//! One-active-release rule checks.
//!
//! The database partial unique index is the final guard; these checks give
//! callers a domain error with the offending release id before it comes to
//! that.

use std::sync::Arc;

use accessgate_core::error::CoreError;
use accessgate_core::release::overlapping;
use accessgate_core::types::{DbId, Timestamp};
use accessgate_db::models::access_release::AccessRelease;

use crate::engine::store::ReleaseStore;
use crate::error::AppResult;

#[derive(Clone)]
pub struct ConflictValidator {
    releases: Arc<dyn ReleaseStore>,
}

impl ConflictValidator {
    pub fn new(releases: Arc<dyn ReleaseStore>) -> Self {
        Self { releases }
    }

    /// Reject when the person already holds an active release.
    pub async fn ensure_no_active_release(&self, person_id: DbId, tenant_id: DbId) -> AppResult<()> {
        if let Some(active) = self
            .releases
            .find_active_for_person(person_id, tenant_id)
            .await?
        {
            return Err(CoreError::Conflict(format!(
                "Person {person_id} already has an active access release ({})",
                active.id
            ))
            .into());
        }
        Ok(())
    }

    /// The active release of the same person, if it is not `release` itself.
    pub async fn find_other_active(&self, release: &AccessRelease) -> AppResult<Option<AccessRelease>> {
        let active = self
            .releases
            .find_active_for_person(release.person_id, release.tenant_id)
            .await?;
        Ok(active.filter(|other| other.id != release.id))
    }

    /// Open releases whose window overlaps the candidate. Overlaps are
    /// allowed; they are only reported.
    pub async fn overlapping_releases(
        &self,
        person_id: DbId,
        tenant_id: DbId,
        window: (Timestamp, Timestamp),
    ) -> AppResult<Vec<DbId>> {
        let open = self
            .releases
            .list_open_for_person(person_id, tenant_id)
            .await?;
        let windows: Vec<_> = open
            .iter()
            .map(|r| (r.id, r.init_date, r.end_date))
            .collect();
        let ids = overlapping(&windows, window);
        if !ids.is_empty() {
            tracing::warn!(
                person_id,
                tenant_id,
                overlapping = ?ids,
                "New access release overlaps existing open releases"
            );
        }
        Ok(ids)
    }
}
