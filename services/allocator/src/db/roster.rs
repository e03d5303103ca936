//! Read-only roster over `roster_users`.

use async_trait::async_trait;
use mentorship_id::{FacultyId, StudentId};
use sqlx::PgPool;

use crate::model::{Faculty, Student};
use crate::store::{RosterProvider, StoreError};

/// Roster backed by the `roster_users` table.
#[derive(Clone)]
pub struct PgRoster {
    pool: PgPool,
}

impl PgRoster {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn fetch_one(&self, user_id: String, role: &str) -> Result<Option<UserRow>, StoreError> {
        sqlx::query_as::<_, UserRow>(
            "SELECT user_id, name, email FROM roster_users WHERE user_id = $1 AND role = $2",
        )
        .bind(user_id)
        .bind(role)
        .fetch_optional(&self.pool)
        .await
        .map_err(StoreError::Query)
    }

    async fn fetch_all(&self, role: &str) -> Result<Vec<UserRow>, StoreError> {
        sqlx::query_as::<_, UserRow>(
            r#"
            SELECT user_id, name, email
            FROM roster_users
            WHERE role = $1
            ORDER BY user_id COLLATE "C" ASC
            "#,
        )
        .bind(role)
        .fetch_all(&self.pool)
        .await
        .map_err(StoreError::Query)
    }
}

#[async_trait]
impl RosterProvider for PgRoster {
    async fn faculty(&self, id: FacultyId) -> Result<Option<Faculty>, StoreError> {
        self.fetch_one(id.to_string(), "faculty")
            .await?
            .map(Faculty::try_from)
            .transpose()
    }

    async fn student(&self, id: StudentId) -> Result<Option<Student>, StoreError> {
        self.fetch_one(id.to_string(), "student")
            .await?
            .map(Student::try_from)
            .transpose()
    }

    async fn list_faculty(&self) -> Result<Vec<Faculty>, StoreError> {
        self.fetch_all("faculty")
            .await?
            .into_iter()
            .map(Faculty::try_from)
            .collect()
    }

    async fn list_students(&self) -> Result<Vec<Student>, StoreError> {
        self.fetch_all("student")
            .await?
            .into_iter()
            .map(Student::try_from)
            .collect()
    }
}

#[derive(Debug)]
struct UserRow {
    user_id: String,
    name: String,
    email: String,
}

impl<'r> sqlx::FromRow<'r, sqlx::postgres::PgRow> for UserRow {
    fn from_row(row: &'r sqlx::postgres::PgRow) -> Result<Self, sqlx::Error> {
        use sqlx::Row;
        Ok(Self {
            user_id: row.try_get("user_id")?,
            name: row.try_get("name")?,
            email: row.try_get("email")?,
        })
    }
}

impl TryFrom<UserRow> for Faculty {
    type Error = StoreError;

    fn try_from(row: UserRow) -> Result<Self, Self::Error> {
        let id = row.user_id.parse().map_err(|e| {
            StoreError::InvalidRow(format!("bad faculty id '{}': {e}", row.user_id))
        })?;
        Ok(Self {
            id,
            name: row.name,
            email: row.email,
        })
    }
}

impl TryFrom<UserRow> for Student {
    type Error = StoreError;

    fn try_from(row: UserRow) -> Result<Self, Self::Error> {
        let id = row.user_id.parse().map_err(|e| {
            StoreError::InvalidRow(format!("bad student id '{}': {e}", row.user_id))
        })?;
        Ok(Self {
            id,
            name: row.name,
            email: row.email,
        })
    }
}
