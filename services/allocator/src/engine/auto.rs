//! System-chosen allocation: least-loaded faculty first.

use std::collections::HashSet;

use mentorship_id::{FacultyId, StudentId};
use serde::Serialize;
use tracing::{debug, info, instrument, warn};

use super::{workload::FacultyWorkload, AllocationEngine, AllocationError};
use crate::model::{Allocation, AllocationFilter};

/// Result of a successful auto allocation.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AutoAllocation {
    pub allocation: Allocation,
    pub faculty_id: FacultyId,
}

/// Pick the faculty member with room and the fewest active students.
///
/// Ties go to the smallest faculty id. Faculty in `excluded` are skipped.
pub fn select_faculty<'a>(
    workloads: &'a [FacultyWorkload],
    excluded: &HashSet<FacultyId>,
) -> Option<&'a FacultyWorkload> {
    workloads
        .iter()
        .filter(|w| w.has_room() && !excluded.contains(&w.faculty_id))
        .min_by_key(|w| (w.student_count, w.faculty_id))
}

impl AllocationEngine {
    /// Allocate `student_id` to the least-loaded faculty member with room.
    ///
    /// Selection runs against a fresh workload snapshot on every attempt. If
    /// the chosen faculty fills up before the write commits, selection is
    /// repeated up to `max_attempts` times in total.
    #[instrument(skip_all, fields(student_id = %student_id))]
    pub async fn auto_allocate(
        &self,
        student_id: StudentId,
    ) -> Result<AutoAllocation, AllocationError> {
        self.require_student(student_id).await?;
        self.ensure_unmentored(student_id).await?;

        // A completed allocation still occupies its (faculty, student) pair.
        let excluded: HashSet<FacultyId> = self
            .store
            .list_allocations(AllocationFilter {
                student_id: Some(student_id),
                ..Default::default()
            })
            .await?
            .into_iter()
            .map(|a| a.faculty_id)
            .collect();

        let mut last_error = None;
        for attempt in 1..=self.max_attempts {
            let workloads = self.workloads().await?;
            let Some(choice) = select_faculty(&workloads, &excluded) else {
                warn!(attempt, "No faculty has capacity");
                return Err(AllocationError::NoCapacityAvailable);
            };

            debug!(
                attempt,
                faculty_id = %choice.faculty_id,
                student_count = choice.student_count,
                "Selected faculty"
            );

            match self.allocate(choice.faculty_id, student_id).await {
                Ok(allocation) => {
                    info!(
                        faculty_id = %allocation.faculty_id,
                        attempt,
                        "Auto allocation complete"
                    );
                    return Ok(AutoAllocation {
                        faculty_id: allocation.faculty_id,
                        allocation,
                    });
                }
                Err(e) if e.is_contention() => {
                    warn!(attempt, error = %e, "Chosen faculty filled concurrently; reselecting");
                    last_error = Some(e);
                }
                Err(e) => return Err(e),
            }
        }

        Err(last_error.unwrap_or(AllocationError::NoCapacityAvailable))
    }
}
