//! Allocation error taxonomy.

use mentorship_id::{AllocationId, FacultyId, StudentId};
use thiserror::Error;

use crate::store::StoreError;

/// Errors surfaced by the allocation engine.
#[derive(Debug, Error)]
pub enum AllocationError {
    #[error("faculty {0} not found")]
    FacultyNotFound(FacultyId),

    #[error("student {0} not found")]
    StudentNotFound(StudentId),

    #[error("student {student_id} already has an active mentor")]
    StudentAlreadyMentored { student_id: StudentId },

    #[error("student {student_id} has already been allocated to faculty {faculty_id}")]
    DuplicateAllocation {
        faculty_id: FacultyId,
        student_id: StudentId,
    },

    #[error("faculty {faculty_id} has reached the maximum of {limit} students")]
    FacultyAtCapacity {
        faculty_id: FacultyId,
        active: i64,
        limit: i64,
    },

    #[error("no faculty has capacity for another student")]
    NoCapacityAvailable,

    #[error("allocation lost a race with a concurrent request")]
    ConcurrencyConflict,

    #[error("allocation {0} not found")]
    AllocationNotFound(AllocationId),

    #[error("allocation {0} is not active")]
    AllocationNotActive(AllocationId),

    /// Storage is unavailable or returned bad data. The source is kept for logs
    /// and never rendered to callers.
    #[error("storage failure")]
    StorageFailure(#[source] StoreError),
}

impl AllocationError {
    /// Stable machine-readable code for API bodies and bulk outcomes.
    pub fn code(&self) -> &'static str {
        match self {
            Self::FacultyNotFound(_) | Self::StudentNotFound(_) => "not_found",
            Self::StudentAlreadyMentored { .. } => "student_already_mentored",
            Self::DuplicateAllocation { .. } => "duplicate_allocation",
            Self::FacultyAtCapacity { .. } => "faculty_at_capacity",
            Self::NoCapacityAvailable => "no_capacity_available",
            Self::ConcurrencyConflict => "concurrency_conflict",
            Self::AllocationNotFound(_) => "allocation_not_found",
            Self::AllocationNotActive(_) => "allocation_not_active",
            Self::StorageFailure(_) => "storage_failure",
        }
    }

    /// Errors caused by another writer taking the chosen faculty's slot.
    /// Auto allocation re-selects on these; everything else is final.
    pub fn is_contention(&self) -> bool {
        matches!(
            self,
            Self::FacultyAtCapacity { .. } | Self::ConcurrencyConflict
        )
    }
}

impl From<StoreError> for AllocationError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::DuplicateAllocation {
                faculty_id,
                student_id,
            } => Self::DuplicateAllocation {
                faculty_id,
                student_id,
            },
            StoreError::StudentAlreadyMentored { student_id } => {
                Self::StudentAlreadyMentored { student_id }
            }
            StoreError::FacultyAtCapacity {
                faculty_id,
                active,
                limit,
            } => Self::FacultyAtCapacity {
                faculty_id,
                active,
                limit,
            },
            StoreError::UnknownFaculty(id) => Self::FacultyNotFound(id),
            StoreError::AllocationNotFound(id) => Self::AllocationNotFound(id),
            StoreError::AllocationNotActive(id) => Self::AllocationNotActive(id),
            StoreError::ConcurrencyConflict => Self::ConcurrencyConflict,
            other @ (StoreError::Query(_) | StoreError::InvalidRow(_)) => {
                Self::StorageFailure(other)
            }
        }
    }
}
