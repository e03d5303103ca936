//! Store error types.

use mentorship_id::{AllocationId, FacultyId, StudentId};
use thiserror::Error;

/// Errors returned by allocation stores and roster providers.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The `(faculty, student)` pair already has a row in some status.
    #[error("allocation already exists for faculty {faculty_id} and student {student_id}")]
    DuplicateAllocation {
        faculty_id: FacultyId,
        student_id: StudentId,
    },

    /// The student already holds an active allocation.
    #[error("student {student_id} already has an active mentor")]
    StudentAlreadyMentored { student_id: StudentId },

    /// The faculty member has no free slot under the supplied limit.
    #[error("faculty {faculty_id} is at capacity ({active}/{limit})")]
    FacultyAtCapacity {
        faculty_id: FacultyId,
        active: i64,
        limit: i64,
    },

    /// The faculty row to lock does not exist.
    #[error("faculty {0} is not in the roster")]
    UnknownFaculty(FacultyId),

    #[error("allocation {0} not found")]
    AllocationNotFound(AllocationId),

    #[error("allocation {0} is not active")]
    AllocationNotActive(AllocationId),

    /// A concurrent transaction won the race (serialization failure or deadlock).
    #[error("concurrent allocation conflict")]
    ConcurrencyConflict,

    /// Failed to execute a query.
    #[error("query failed: {0}")]
    Query(#[source] sqlx::Error),

    /// A persisted row could not be decoded into the model.
    #[error("invalid row: {0}")]
    InvalidRow(String),
}
