//! In-process store and roster.
//!
//! The allocation map sits behind one `RwLock`; `create_allocation` holds the
//! write guard across check and insert, so every decision is atomic.

use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use chrono::Utc;
use mentorship_id::{AllocationId, FacultyId, StudentId};
use tokio::sync::RwLock;

use super::{AllocationStore, RosterProvider, StoreError};
use crate::model::{Allocation, AllocationFilter, AllocationStatus, Faculty, Student};

/// Allocation store backed by an ordered map keyed by allocation id.
#[derive(Debug, Default)]
pub struct MemoryAllocationStore {
    rows: RwLock<BTreeMap<AllocationId, Allocation>>,
}

impl MemoryAllocationStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl AllocationStore for MemoryAllocationStore {
    async fn list_allocations(
        &self,
        filter: AllocationFilter,
    ) -> Result<Vec<Allocation>, StoreError> {
        let rows = self.rows.read().await;
        Ok(rows
            .values()
            .filter(|a| filter.matches(a))
            .cloned()
            .collect())
    }

    async fn create_allocation(
        &self,
        faculty_id: FacultyId,
        student_id: StudentId,
        capacity_limit: i64,
    ) -> Result<Allocation, StoreError> {
        let mut rows = self.rows.write().await;

        if rows
            .values()
            .any(|a| a.student_id == student_id && a.is_active())
        {
            return Err(StoreError::StudentAlreadyMentored { student_id });
        }

        if rows
            .values()
            .any(|a| a.student_id == student_id && a.faculty_id == faculty_id)
        {
            return Err(StoreError::DuplicateAllocation {
                faculty_id,
                student_id,
            });
        }

        let active = rows
            .values()
            .filter(|a| a.faculty_id == faculty_id && a.is_active())
            .count() as i64;
        if active >= capacity_limit {
            return Err(StoreError::FacultyAtCapacity {
                faculty_id,
                active,
                limit: capacity_limit,
            });
        }

        let allocation = Allocation::new_active(faculty_id, student_id);
        rows.insert(allocation.id, allocation.clone());
        Ok(allocation)
    }

    async fn count_active(&self, faculty_id: FacultyId) -> Result<i64, StoreError> {
        let rows = self.rows.read().await;
        Ok(rows
            .values()
            .filter(|a| a.faculty_id == faculty_id && a.is_active())
            .count() as i64)
    }

    async fn active_counts(&self) -> Result<HashMap<FacultyId, i64>, StoreError> {
        let rows = self.rows.read().await;
        let mut counts = HashMap::new();
        for allocation in rows.values().filter(|a| a.is_active()) {
            *counts.entry(allocation.faculty_id).or_insert(0) += 1;
        }
        Ok(counts)
    }

    async fn active_allocation_for_student(
        &self,
        student_id: StudentId,
    ) -> Result<Option<Allocation>, StoreError> {
        let rows = self.rows.read().await;
        Ok(rows
            .values()
            .find(|a| a.student_id == student_id && a.is_active())
            .cloned())
    }

    async fn complete_allocation(
        &self,
        allocation_id: AllocationId,
    ) -> Result<Allocation, StoreError> {
        let mut rows = self.rows.write().await;
        let allocation = rows
            .get_mut(&allocation_id)
            .ok_or(StoreError::AllocationNotFound(allocation_id))?;

        if !allocation.is_active() {
            return Err(StoreError::AllocationNotActive(allocation_id));
        }

        allocation.status = AllocationStatus::Completed;
        allocation.updated_at = Utc::now();
        Ok(allocation.clone())
    }
}

/// Fixed roster, mainly for tests and embedding.
#[derive(Debug, Default)]
pub struct MemoryRoster {
    faculty: RwLock<BTreeMap<FacultyId, Faculty>>,
    students: RwLock<BTreeMap<StudentId, Student>>,
}

impl MemoryRoster {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn add_faculty(&self, name: impl Into<String>, email: impl Into<String>) -> Faculty {
        let faculty = Faculty {
            id: FacultyId::new(),
            name: name.into(),
            email: email.into(),
        };
        self.faculty
            .write()
            .await
            .insert(faculty.id, faculty.clone());
        faculty
    }

    pub async fn add_student(&self, name: impl Into<String>, email: impl Into<String>) -> Student {
        let student = Student {
            id: StudentId::new(),
            name: name.into(),
            email: email.into(),
        };
        self.students
            .write()
            .await
            .insert(student.id, student.clone());
        student
    }
}

#[async_trait]
impl RosterProvider for MemoryRoster {
    async fn faculty(&self, id: FacultyId) -> Result<Option<Faculty>, StoreError> {
        Ok(self.faculty.read().await.get(&id).cloned())
    }

    async fn student(&self, id: StudentId) -> Result<Option<Student>, StoreError> {
        Ok(self.students.read().await.get(&id).cloned())
    }

    async fn list_faculty(&self) -> Result<Vec<Faculty>, StoreError> {
        Ok(self.faculty.read().await.values().cloned().collect())
    }

    async fn list_students(&self) -> Result<Vec<Student>, StoreError> {
        Ok(self.students.read().await.values().cloned().collect())
    }
}
