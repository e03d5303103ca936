//! Caller-chosen allocation.
//!
//! [`AllocationEngine::allocate`] is the only engine path that writes
//! allocations; auto and bulk allocation both end here.

use mentorship_id::{FacultyId, StudentId};
use tracing::{info, instrument};

use super::{AllocationEngine, AllocationError};
use crate::model::{Allocation, Faculty, Student};

impl AllocationEngine {
    /// Assign `student_id` to `faculty_id`.
    ///
    /// Checks, in order: both ids resolve in the roster, the student has no
    /// active mentor, the faculty has room. The store then repeats the last two
    /// checks atomically with the insert. Never retried.
    #[instrument(skip_all, fields(faculty_id = %faculty_id, student_id = %student_id))]
    pub async fn allocate(
        &self,
        faculty_id: FacultyId,
        student_id: StudentId,
    ) -> Result<Allocation, AllocationError> {
        self.require_faculty(faculty_id).await?;
        self.require_student(student_id).await?;
        self.ensure_unmentored(student_id).await?;

        let active = self.store.count_active(faculty_id).await?;
        if !self.policy.has_room(active) {
            return Err(AllocationError::FacultyAtCapacity {
                faculty_id,
                active,
                limit: self.policy.limit(),
            });
        }

        let allocation = self
            .store
            .create_allocation(faculty_id, student_id, self.policy.limit())
            .await?;

        info!(allocation_id = %allocation.id, "Student allocated to faculty");
        Ok(allocation)
    }

    pub(crate) async fn require_faculty(
        &self,
        faculty_id: FacultyId,
    ) -> Result<Faculty, AllocationError> {
        self.roster
            .faculty(faculty_id)
            .await?
            .ok_or(AllocationError::FacultyNotFound(faculty_id))
    }

    pub(crate) async fn require_student(
        &self,
        student_id: StudentId,
    ) -> Result<Student, AllocationError> {
        self.roster
            .student(student_id)
            .await?
            .ok_or(AllocationError::StudentNotFound(student_id))
    }

    pub(crate) async fn ensure_unmentored(
        &self,
        student_id: StudentId,
    ) -> Result<(), AllocationError> {
        match self.store.active_allocation_for_student(student_id).await? {
            Some(_) => Err(AllocationError::StudentAlreadyMentored { student_id }),
            None => Ok(()),
        }
    }
}
