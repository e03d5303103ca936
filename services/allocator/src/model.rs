//! Roster and allocation data model.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use mentorship_id::{AllocationId, FacultyId, StudentId};
use serde::{Deserialize, Serialize};

/// A student as supplied by the roster.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Student {
    pub id: StudentId,
    pub name: String,
    pub email: String,
}

/// A faculty member as supplied by the roster.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Faculty {
    pub id: FacultyId,
    pub name: String,
    pub email: String,
}

/// Lifecycle of an allocation. Only `Active` rows count against capacity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AllocationStatus {
    Active,
    Completed,
}

impl AllocationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Completed => "completed",
        }
    }
}

impl fmt::Display for AllocationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AllocationStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "active" => Ok(Self::Active),
            "completed" => Ok(Self::Completed),
            other => Err(format!("unknown allocation status '{other}'")),
        }
    }
}

/// A persistent assignment of one student to one faculty mentor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Allocation {
    pub id: AllocationId,
    pub faculty_id: FacultyId,
    pub student_id: StudentId,
    pub status: AllocationStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Allocation {
    /// A fresh `active` allocation stamped with the current time.
    pub fn new_active(faculty_id: FacultyId, student_id: StudentId) -> Self {
        let now = Utc::now();
        Self {
            id: AllocationId::new(),
            faculty_id,
            student_id,
            status: AllocationStatus::Active,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn is_active(&self) -> bool {
        self.status == AllocationStatus::Active
    }
}

/// Optional constraints for listing allocations. Empty matches everything.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AllocationFilter {
    pub faculty_id: Option<FacultyId>,
    pub student_id: Option<StudentId>,
    pub status: Option<AllocationStatus>,
}

impl AllocationFilter {
    pub fn active() -> Self {
        Self {
            status: Some(AllocationStatus::Active),
            ..Default::default()
        }
    }

    pub fn matches(&self, allocation: &Allocation) -> bool {
        self.faculty_id.is_none_or(|id| id == allocation.faculty_id)
            && self.student_id.is_none_or(|id| id == allocation.student_id)
            && self.status.is_none_or(|s| s == allocation.status)
    }
}
