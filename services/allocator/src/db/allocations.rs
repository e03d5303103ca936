//! Postgres allocation store.
//!
//! `create_allocation` runs in one transaction that first takes a row lock on
//! the faculty's roster row (`FOR UPDATE`). Every writer targeting the same
//! faculty queues on that lock, so the count it reads cannot go stale before
//! its insert commits. The unique constraint on `(faculty_id, student_id)` and
//! the partial unique index on active `student_id` back the application checks
//! at write time.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use mentorship_id::{AllocationId, FacultyId, StudentId};
use sqlx::PgPool;
use tracing::{debug, instrument};

use crate::model::{Allocation, AllocationFilter, AllocationStatus};
use crate::store::{AllocationStore, StoreError};

const PAIR_CONSTRAINT: &str = "allocations_faculty_student_key";
const ACTIVE_STUDENT_INDEX: &str = "allocations_active_student_idx";

const UNIQUE_VIOLATION: &str = "23505";
const SERIALIZATION_FAILURE: &str = "40001";
const DEADLOCK_DETECTED: &str = "40P01";

/// Allocation store over the `allocations` table.
#[derive(Clone)]
pub struct PgAllocationStore {
    pool: PgPool,
}

impl PgAllocationStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl AllocationStore for PgAllocationStore {
    async fn list_allocations(
        &self,
        filter: AllocationFilter,
    ) -> Result<Vec<Allocation>, StoreError> {
        let rows = sqlx::query_as::<_, AllocationRow>(
            r#"
            SELECT allocation_id, faculty_id, student_id, status, created_at, updated_at
            FROM allocations
            WHERE ($1::TEXT IS NULL OR faculty_id = $1)
              AND ($2::TEXT IS NULL OR student_id = $2)
              AND ($3::TEXT IS NULL OR status = $3)
            ORDER BY allocation_id COLLATE "C" ASC
            "#,
        )
        .bind(filter.faculty_id.map(|id| id.to_string()))
        .bind(filter.student_id.map(|id| id.to_string()))
        .bind(filter.status.map(|s| s.as_str()))
        .fetch_all(&self.pool)
        .await
        .map_err(map_query_error)?;

        rows.into_iter().map(Allocation::try_from).collect()
    }

    #[instrument(skip_all, fields(faculty_id = %faculty_id, student_id = %student_id))]
    async fn create_allocation(
        &self,
        faculty_id: FacultyId,
        student_id: StudentId,
        capacity_limit: i64,
    ) -> Result<Allocation, StoreError> {
        let mut tx = self.pool.begin().await.map_err(map_query_error)?;

        let locked: Option<String> = sqlx::query_scalar(
            r#"
            SELECT user_id
            FROM roster_users
            WHERE user_id = $1 AND role = 'faculty'
            FOR UPDATE
            "#,
        )
        .bind(faculty_id.to_string())
        .fetch_optional(&mut *tx)
        .await
        .map_err(map_query_error)?;

        if locked.is_none() {
            return Err(StoreError::UnknownFaculty(faculty_id));
        }

        let mentored: bool = sqlx::query_scalar(
            "SELECT EXISTS (SELECT 1 FROM allocations WHERE student_id = $1 AND status = 'active')",
        )
        .bind(student_id.to_string())
        .fetch_one(&mut *tx)
        .await
        .map_err(map_query_error)?;

        if mentored {
            return Err(StoreError::StudentAlreadyMentored { student_id });
        }

        let paired: bool = sqlx::query_scalar(
            "SELECT EXISTS (SELECT 1 FROM allocations WHERE faculty_id = $1 AND student_id = $2)",
        )
        .bind(faculty_id.to_string())
        .bind(student_id.to_string())
        .fetch_one(&mut *tx)
        .await
        .map_err(map_query_error)?;

        if paired {
            return Err(StoreError::DuplicateAllocation {
                faculty_id,
                student_id,
            });
        }

        let active: i64 = sqlx::query_scalar(
            "SELECT COUNT(*)::BIGINT FROM allocations WHERE faculty_id = $1 AND status = 'active'",
        )
        .bind(faculty_id.to_string())
        .fetch_one(&mut *tx)
        .await
        .map_err(map_query_error)?;

        if active >= capacity_limit {
            return Err(StoreError::FacultyAtCapacity {
                faculty_id,
                active,
                limit: capacity_limit,
            });
        }

        let row = sqlx::query_as::<_, AllocationRow>(
            r#"
            INSERT INTO allocations (allocation_id, faculty_id, student_id, status, created_at, updated_at)
            VALUES ($1, $2, $3, 'active', $4, $4)
            RETURNING allocation_id, faculty_id, student_id, status, created_at, updated_at
            "#,
        )
        .bind(AllocationId::new().to_string())
        .bind(faculty_id.to_string())
        .bind(student_id.to_string())
        .bind(Utc::now())
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| map_insert_error(e, faculty_id, student_id))?;

        tx.commit().await.map_err(map_query_error)?;

        debug!(active_before = active, "Allocation row committed");
        Allocation::try_from(row)
    }

    async fn count_active(&self, faculty_id: FacultyId) -> Result<i64, StoreError> {
        sqlx::query_scalar(
            "SELECT COUNT(*)::BIGINT FROM allocations WHERE faculty_id = $1 AND status = 'active'",
        )
        .bind(faculty_id.to_string())
        .fetch_one(&self.pool)
        .await
        .map_err(map_query_error)
    }

    async fn active_counts(&self) -> Result<HashMap<FacultyId, i64>, StoreError> {
        let rows: Vec<(String, i64)> = sqlx::query_as(
            r#"
            SELECT faculty_id, COUNT(*)::BIGINT
            FROM allocations
            WHERE status = 'active'
            GROUP BY faculty_id
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .map_err(map_query_error)?;

        let mut counts = HashMap::with_capacity(rows.len());
        for (faculty_id, count) in rows {
            counts.insert(parse_id(&faculty_id)?, count);
        }
        Ok(counts)
    }

    async fn active_allocation_for_student(
        &self,
        student_id: StudentId,
    ) -> Result<Option<Allocation>, StoreError> {
        let row = sqlx::query_as::<_, AllocationRow>(
            r#"
            SELECT allocation_id, faculty_id, student_id, status, created_at, updated_at
            FROM allocations
            WHERE student_id = $1 AND status = 'active'
            "#,
        )
        .bind(student_id.to_string())
        .fetch_optional(&self.pool)
        .await
        .map_err(map_query_error)?;

        row.map(Allocation::try_from).transpose()
    }

    #[instrument(skip_all, fields(allocation_id = %allocation_id))]
    async fn complete_allocation(
        &self,
        allocation_id: AllocationId,
    ) -> Result<Allocation, StoreError> {
        let row = sqlx::query_as::<_, AllocationRow>(
            r#"
            UPDATE allocations
            SET status = 'completed', updated_at = now()
            WHERE allocation_id = $1 AND status = 'active'
            RETURNING allocation_id, faculty_id, student_id, status, created_at, updated_at
            "#,
        )
        .bind(allocation_id.to_string())
        .fetch_optional(&self.pool)
        .await
        .map_err(map_query_error)?;

        if let Some(row) = row {
            return Allocation::try_from(row);
        }

        let exists: bool = sqlx::query_scalar(
            "SELECT EXISTS (SELECT 1 FROM allocations WHERE allocation_id = $1)",
        )
        .bind(allocation_id.to_string())
        .fetch_one(&self.pool)
        .await
        .map_err(map_query_error)?;

        if exists {
            Err(StoreError::AllocationNotActive(allocation_id))
        } else {
            Err(StoreError::AllocationNotFound(allocation_id))
        }
    }
}

fn is_retryable_code(code: Option<&str>) -> bool {
    matches!(code, Some(SERIALIZATION_FAILURE) | Some(DEADLOCK_DETECTED))
}

fn map_query_error(e: sqlx::Error) -> StoreError {
    if let sqlx::Error::Database(ref db_err) = e {
        if is_retryable_code(db_err.code().as_deref()) {
            return StoreError::ConcurrencyConflict;
        }
    }
    StoreError::Query(e)
}

fn map_insert_error(e: sqlx::Error, faculty_id: FacultyId, student_id: StudentId) -> StoreError {
    if let sqlx::Error::Database(ref db_err) = e {
        if db_err.code().as_deref() == Some(UNIQUE_VIOLATION) {
            match db_err.constraint() {
                Some(ACTIVE_STUDENT_INDEX) => {
                    return StoreError::StudentAlreadyMentored { student_id };
                }
                Some(PAIR_CONSTRAINT) => {
                    return StoreError::DuplicateAllocation {
                        faculty_id,
                        student_id,
                    };
                }
                _ => {}
            }
        }
    }
    map_query_error(e)
}

fn parse_id<T>(raw: &str) -> Result<T, StoreError>
where
    T: std::str::FromStr<Err = mentorship_id::IdError>,
{
    raw.parse()
        .map_err(|e| StoreError::InvalidRow(format!("bad id '{raw}': {e}")))
}

// =============================================================================
// Database Row Types
// =============================================================================

#[derive(Debug)]
struct AllocationRow {
    allocation_id: String,
    faculty_id: String,
    student_id: String,
    status: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl<'r> sqlx::FromRow<'r, sqlx::postgres::PgRow> for AllocationRow {
    fn from_row(row: &'r sqlx::postgres::PgRow) -> Result<Self, sqlx::Error> {
        use sqlx::Row;
        Ok(Self {
            allocation_id: row.try_get("allocation_id")?,
            faculty_id: row.try_get("faculty_id")?,
            student_id: row.try_get("student_id")?,
            status: row.try_get("status")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }
}

impl TryFrom<AllocationRow> for Allocation {
    type Error = StoreError;

    fn try_from(row: AllocationRow) -> Result<Self, Self::Error> {
        let status: AllocationStatus = row.status.parse().map_err(StoreError::InvalidRow)?;
        Ok(Self {
            id: parse_id(&row.allocation_id)?,
            faculty_id: parse_id(&row.faculty_id)?,
            student_id: parse_id(&row.student_id)?,
            status,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}
