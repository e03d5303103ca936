//! Faculty–student allocation engine.
//!
//! Layers, leaf first:
//! - `capacity`: the per-faculty ceiling
//! - `workload`: active counts per faculty from one snapshot
//! - `manual`: caller-chosen allocation, the single write path
//! - `auto`: least-loaded selection on top of `manual`, with bounded retry
//! - `bulk`: a loop of independent auto allocations
//!
//! The engine holds no mutable state of its own. All atomicity lives in
//! [`AllocationStore::create_allocation`], so any number of engine handles can
//! run concurrently against the same store.

mod auto;
mod bulk;
pub mod capacity;
mod error;
mod manual;
pub mod workload;

use std::collections::HashSet;
use std::num::NonZeroU32;
use std::sync::Arc;

use mentorship_id::AllocationId;
use tracing::{info, instrument};

use crate::model::{Allocation, AllocationFilter, Student};
use crate::store::{AllocationStore, RosterProvider};

pub use auto::{select_faculty, AutoAllocation};
pub use bulk::{BulkAllocationItem, BulkAllocationSummary, BulkOutcome};
pub use capacity::CapacityPolicy;
pub use error::AllocationError;
pub use workload::FacultyWorkload;

/// Tunables for the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineConfig {
    /// Maximum active allocations per faculty member.
    pub capacity_limit: NonZeroU32,

    /// Selection attempts per auto allocation, including the first.
    pub max_attempts: NonZeroU32,
}

impl EngineConfig {
    pub const DEFAULT_MAX_ATTEMPTS: NonZeroU32 = match NonZeroU32::new(3) {
        Some(n) => n,
        None => unreachable!(),
    };
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            capacity_limit: CapacityPolicy::DEFAULT_LIMIT,
            max_attempts: Self::DEFAULT_MAX_ATTEMPTS,
        }
    }
}

/// Allocation engine over a store and a roster.
#[derive(Clone)]
pub struct AllocationEngine {
    store: Arc<dyn AllocationStore>,
    roster: Arc<dyn RosterProvider>,
    policy: CapacityPolicy,
    max_attempts: u32,
}

impl AllocationEngine {
    pub fn new(
        store: Arc<dyn AllocationStore>,
        roster: Arc<dyn RosterProvider>,
        config: EngineConfig,
    ) -> Self {
        Self {
            store,
            roster,
            policy: CapacityPolicy::new(config.capacity_limit),
            max_attempts: config.max_attempts.get(),
        }
    }

    pub fn policy(&self) -> CapacityPolicy {
        self.policy
    }

    /// Allocations matching `filter`, ordered by id.
    pub async fn list_allocations(
        &self,
        filter: AllocationFilter,
    ) -> Result<Vec<Allocation>, AllocationError> {
        Ok(self.store.list_allocations(filter).await?)
    }

    /// Rostered students without an active allocation, ordered by id.
    pub async fn unallocated_students(&self) -> Result<Vec<Student>, AllocationError> {
        let mentored: HashSet<_> = self
            .store
            .list_allocations(AllocationFilter::active())
            .await?
            .into_iter()
            .map(|a| a.student_id)
            .collect();

        let mut students: Vec<Student> = self
            .roster
            .list_students()
            .await?
            .into_iter()
            .filter(|s| !mentored.contains(&s.id))
            .collect();
        students.sort_by_key(|s| s.id);
        Ok(students)
    }

    /// Close an active allocation, freeing the faculty slot and letting the
    /// student be allocated again.
    #[instrument(skip_all, fields(allocation_id = %allocation_id))]
    pub async fn complete_allocation(
        &self,
        allocation_id: AllocationId,
    ) -> Result<Allocation, AllocationError> {
        let allocation = self.store.complete_allocation(allocation_id).await?;
        info!(
            faculty_id = %allocation.faculty_id,
            student_id = %allocation.student_id,
            "Allocation completed"
        );
        Ok(allocation)
    }
}
