//! Storage seams for the allocation engine.
//!
//! Two traits separate the engine from persistence:
//! - [`AllocationStore`] owns allocation rows and enforces the capacity,
//!   uniqueness and single-mentor invariants atomically at write time
//! - [`RosterProvider`] is a read-only view of users owned by another system
//!
//! `memory` holds in-process implementations; the Postgres ones live in
//! [`crate::db`].

mod error;
pub mod memory;

use std::collections::HashMap;

use async_trait::async_trait;
use mentorship_id::{AllocationId, FacultyId, StudentId};

use crate::model::{Allocation, AllocationFilter, Faculty, Student};

pub use error::StoreError;
pub use memory::{MemoryAllocationStore, MemoryRoster};

/// Durable table of allocations.
#[async_trait]
pub trait AllocationStore: Send + Sync {
    /// Allocations matching `filter`, ordered by id.
    async fn list_allocations(
        &self,
        filter: AllocationFilter,
    ) -> Result<Vec<Allocation>, StoreError>;

    /// Insert an `active` allocation.
    ///
    /// The single-mentor check, the pair uniqueness check, the capacity check
    /// against `capacity_limit` and the insert happen as one atomic unit per
    /// faculty. Implementations must not let two concurrent calls both observe
    /// room for the last slot.
    async fn create_allocation(
        &self,
        faculty_id: FacultyId,
        student_id: StudentId,
        capacity_limit: i64,
    ) -> Result<Allocation, StoreError>;

    /// Number of active allocations held by one faculty member.
    async fn count_active(&self, faculty_id: FacultyId) -> Result<i64, StoreError>;

    /// Active counts for every faculty member with at least one active
    /// allocation, taken from a single snapshot.
    async fn active_counts(&self) -> Result<HashMap<FacultyId, i64>, StoreError>;

    /// The student's current active allocation, if any.
    async fn active_allocation_for_student(
        &self,
        student_id: StudentId,
    ) -> Result<Option<Allocation>, StoreError>;

    /// Move an active allocation to `completed`.
    async fn complete_allocation(
        &self,
        allocation_id: AllocationId,
    ) -> Result<Allocation, StoreError>;
}

/// Read-only roster of students and faculty.
#[async_trait]
pub trait RosterProvider: Send + Sync {
    async fn faculty(&self, id: FacultyId) -> Result<Option<Faculty>, StoreError>;

    async fn student(&self, id: StudentId) -> Result<Option<Student>, StoreError>;

    /// All faculty, ordered by id.
    async fn list_faculty(&self) -> Result<Vec<Faculty>, StoreError>;

    /// All students, ordered by id.
    async fn list_students(&self) -> Result<Vec<Student>, StoreError>;
}
