//! Per-faculty workload reporting.

use std::collections::HashMap;

use mentorship_id::FacultyId;
use serde::Serialize;

use super::{capacity::CapacityPolicy, AllocationEngine, AllocationError};
use crate::model::Faculty;

/// Active allocation count for one faculty member.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FacultyWorkload {
    pub faculty_id: FacultyId,
    pub name: String,
    pub student_count: i64,
    pub capacity: i64,
    /// Free slots under the ceiling; zero once full.
    pub remaining: i64,
    pub utilization_percent: u8,
}

impl FacultyWorkload {
    pub fn has_room(&self) -> bool {
        self.student_count < self.capacity
    }
}

/// Joins the roster with one snapshot of active counts. Faculty without
/// allocations report zero. Output follows roster order.
pub fn aggregate(
    faculty: &[Faculty],
    active_counts: &HashMap<FacultyId, i64>,
    policy: CapacityPolicy,
) -> Vec<FacultyWorkload> {
    faculty
        .iter()
        .map(|f| {
            let student_count = active_counts.get(&f.id).copied().unwrap_or(0);
            FacultyWorkload {
                faculty_id: f.id,
                name: f.name.clone(),
                student_count,
                capacity: policy.limit(),
                remaining: policy.remaining(student_count),
                utilization_percent: policy.utilization_percent(student_count),
            }
        })
        .collect()
}

impl AllocationEngine {
    /// Workload of every rostered faculty member, ordered by faculty id.
    pub async fn workloads(&self) -> Result<Vec<FacultyWorkload>, AllocationError> {
        let mut faculty = self.roster.list_faculty().await?;
        faculty.sort_by_key(|f| f.id);
        let counts = self.store.active_counts().await?;
        Ok(aggregate(&faculty, &counts, self.policy))
    }
}
