//! Best-effort batch allocation of every unallocated student.
//!
//! Each student is an independent auto allocation. A failure is recorded and
//! the loop moves on; nothing already committed is rolled back.

use mentorship_id::{AllocationId, FacultyId, StudentId};
use serde::Serialize;
use tracing::{info, instrument, warn};

use super::{AllocationEngine, AllocationError};

/// Outcome for one student in a bulk run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(
    tag = "outcome",
    rename_all = "lowercase",
    rename_all_fields = "camelCase"
)]
pub enum BulkOutcome {
    Allocated {
        allocation_id: AllocationId,
        faculty_id: FacultyId,
    },
    Failed {
        code: String,
        message: String,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BulkAllocationItem {
    pub student_id: StudentId,
    #[serde(flatten)]
    pub outcome: BulkOutcome,
}

/// Aggregate of a bulk run. `success_count + failed_count == attempted`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BulkAllocationSummary {
    pub attempted: usize,
    pub success_count: usize,
    pub failed_count: usize,
    pub details: Vec<BulkAllocationItem>,
}

impl BulkAllocationSummary {
    fn record(
        &mut self,
        student_id: StudentId,
        result: Result<(AllocationId, FacultyId), AllocationError>,
    ) {
        let outcome = match result {
            Ok((allocation_id, faculty_id)) => {
                self.success_count += 1;
                BulkOutcome::Allocated {
                    allocation_id,
                    faculty_id,
                }
            }
            Err(e) => {
                self.failed_count += 1;
                BulkOutcome::Failed {
                    code: e.code().to_string(),
                    message: e.to_string(),
                }
            }
        };
        self.attempted += 1;
        self.details.push(BulkAllocationItem {
            student_id,
            outcome,
        });
    }
}

impl AllocationEngine {
    /// Auto-allocate every student without an active mentor.
    ///
    /// The student set is fixed at call start. Only a failure to enumerate it
    /// fails the whole call.
    #[instrument(skip_all)]
    pub async fn bulk_allocate(&self) -> Result<BulkAllocationSummary, AllocationError> {
        let students = self.unallocated_students().await?;
        info!(students = students.len(), "Starting bulk allocation");

        let mut summary = BulkAllocationSummary::default();
        for student in students {
            let result = self
                .auto_allocate(student.id)
                .await
                .map(|auto| (auto.allocation.id, auto.faculty_id));

            if let Err(e) = &result {
                match e {
                    AllocationError::StorageFailure(source) => {
                        warn!(
                            student_id = %student.id,
                            error = %source,
                            "Bulk allocation item hit a storage failure"
                        );
                    }
                    _ => warn!(student_id = %student.id, error = %e, "Bulk allocation item failed"),
                }
            }

            summary.record(student.id, result);
        }

        info!(
            attempted = summary.attempted,
            success = summary.success_count,
            failed = summary.failed_count,
            "Bulk allocation complete"
        );
        Ok(summary)
    }
}
