//! Allocation API endpoints.
//!
//! Thin handlers over [`crate::engine::AllocationEngine`]; every decision and
//! invariant lives in the engine.

use axum::{
    extract::{rejection::JsonRejection, Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use mentorship_id::{AllocationId, FacultyId, StudentId};
use serde::{Deserialize, Serialize};

use crate::api::error::ApiError;
use crate::api::request_context::RequestContext;
use crate::engine::{BulkAllocationItem, FacultyWorkload};
use crate::model::{Allocation, AllocationFilter, AllocationStatus, Student};
use crate::state::AppState;

/// Allocation routes.
///
/// /api/allocations
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/", get(list_allocations).post(create_allocation))
        .route("/unallocated-students", get(list_unallocated_students))
        .route("/faculty-workloads", get(list_faculty_workloads))
        .route("/auto-allocate/{student_id}", post(auto_allocate))
        .route("/bulk-allocate", post(bulk_allocate))
        .route("/{allocation_id}/complete", post(complete_allocation))
}

// =============================================================================
// Request/Response Types
// =============================================================================

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListAllocationsQuery {
    pub faculty_id: Option<String>,
    pub student_id: Option<String>,
    pub status: Option<String>,
}

#[derive(Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateAllocationRequest {
    pub faculty_id: String,
    pub student_id: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AutoAllocateResponse {
    pub success: bool,
    pub message: String,
    pub allocation: Allocation,
    pub faculty_id: FacultyId,
}

#[derive(Debug, Serialize)]
pub struct BulkAllocateResult {
    pub attempted: usize,
    pub success: usize,
    pub failed: usize,
    pub details: Vec<BulkAllocationItem>,
}

#[derive(Debug, Serialize)]
pub struct BulkAllocateResponse {
    pub success: bool,
    pub message: String,
    pub result: BulkAllocateResult,
}

fn parse_id<T>(raw: &str, code: &str, what: &str, request_id: &str) -> Result<T, ApiError>
where
    T: std::str::FromStr<Err = mentorship_id::IdError>,
{
    raw.trim().parse().map_err(|e| {
        ApiError::bad_request(code, format!("Invalid {what}: {e}"))
            .with_request_id(request_id.to_string())
    })
}

impl ListAllocationsQuery {
    fn into_filter(self, request_id: &str) -> Result<AllocationFilter, ApiError> {
        let faculty_id = self
            .faculty_id
            .as_deref()
            .map(|raw| parse_id(raw, "invalid_faculty_id", "faculty ID", request_id))
            .transpose()?;
        let student_id = self
            .student_id
            .as_deref()
            .map(|raw| parse_id(raw, "invalid_student_id", "student ID", request_id))
            .transpose()?;
        let status = self
            .status
            .as_deref()
            .map(|raw| {
                raw.parse::<AllocationStatus>().map_err(|e| {
                    ApiError::bad_request("invalid_status", e)
                        .with_request_id(request_id.to_string())
                })
            })
            .transpose()?;

        Ok(AllocationFilter {
            faculty_id,
            student_id,
            status,
        })
    }
}

// =============================================================================
// Handlers
// =============================================================================

/// List allocations, optionally filtered.
///
/// GET /api/allocations?facultyId=&studentId=&status=
async fn list_allocations(
    State(state): State<AppState>,
    ctx: RequestContext,
    Query(query): Query<ListAllocationsQuery>,
) -> Result<Json<Vec<Allocation>>, ApiError> {
    let filter = query.into_filter(&ctx.request_id)?;

    let allocations = state
        .engine()
        .list_allocations(filter)
        .await
        .map_err(|e| ApiError::from_allocation(e, &ctx.request_id))?;

    Ok(Json(allocations))
}

/// Students with no active allocation.
///
/// GET /api/allocations/unallocated-students
async fn list_unallocated_students(
    State(state): State<AppState>,
    ctx: RequestContext,
) -> Result<Json<Vec<Student>>, ApiError> {
    let students = state
        .engine()
        .unallocated_students()
        .await
        .map_err(|e| ApiError::from_allocation(e, &ctx.request_id))?;

    Ok(Json(students))
}

/// Active allocation count per faculty member.
///
/// GET /api/allocations/faculty-workloads
async fn list_faculty_workloads(
    State(state): State<AppState>,
    ctx: RequestContext,
) -> Result<Json<Vec<FacultyWorkload>>, ApiError> {
    let workloads = state
        .engine()
        .workloads()
        .await
        .map_err(|e| ApiError::from_allocation(e, &ctx.request_id))?;

    Ok(Json(workloads))
}

/// Manually allocate a student to a faculty member.
///
/// POST /api/allocations
async fn create_allocation(
    State(state): State<AppState>,
    ctx: RequestContext,
    payload: Result<Json<CreateAllocationRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let request_id = ctx.request_id;

    let Json(req) = payload.map_err(|e| {
        ApiError::bad_request("invalid_request", e.body_text()).with_request_id(request_id.clone())
    })?;

    let faculty_id: FacultyId = parse_id(
        &req.faculty_id,
        "invalid_faculty_id",
        "faculty ID",
        &request_id,
    )?;
    let student_id: StudentId = parse_id(
        &req.student_id,
        "invalid_student_id",
        "student ID",
        &request_id,
    )?;

    let allocation = state
        .engine()
        .allocate(faculty_id, student_id)
        .await
        .map_err(|e| ApiError::from_allocation(e, &request_id))?;

    Ok((StatusCode::CREATED, Json(allocation)))
}

/// Allocate one student to the least-loaded faculty member.
///
/// POST /api/allocations/auto-allocate/{student_id}
async fn auto_allocate(
    State(state): State<AppState>,
    ctx: RequestContext,
    Path(student_id): Path<String>,
) -> Result<Json<AutoAllocateResponse>, ApiError> {
    let request_id = ctx.request_id;
    let student_id: StudentId =
        parse_id(&student_id, "invalid_student_id", "student ID", &request_id)?;

    let auto = state
        .engine()
        .auto_allocate(student_id)
        .await
        .map_err(|e| ApiError::from_allocation(e, &request_id))?;

    Ok(Json(AutoAllocateResponse {
        success: true,
        message: format!("Student allocated to faculty {}", auto.faculty_id),
        allocation: auto.allocation,
        faculty_id: auto.faculty_id,
    }))
}

/// Auto-allocate every unallocated student.
///
/// POST /api/allocations/bulk-allocate
async fn bulk_allocate(
    State(state): State<AppState>,
    ctx: RequestContext,
) -> Result<Json<BulkAllocateResponse>, ApiError> {
    let summary = state
        .engine()
        .bulk_allocate()
        .await
        .map_err(|e| ApiError::from_allocation(e, &ctx.request_id))?;

    let message = format!(
        "Allocated {} of {} students ({} failed)",
        summary.success_count, summary.attempted, summary.failed_count
    );

    Ok(Json(BulkAllocateResponse {
        success: true,
        message,
        result: BulkAllocateResult {
            attempted: summary.attempted,
            success: summary.success_count,
            failed: summary.failed_count,
            details: summary.details,
        },
    }))
}

/// Mark an active allocation completed.
///
/// POST /api/allocations/{allocation_id}/complete
async fn complete_allocation(
    State(state): State<AppState>,
    ctx: RequestContext,
    Path(allocation_id): Path<String>,
) -> Result<Json<Allocation>, ApiError> {
    let request_id = ctx.request_id;
    let allocation_id: AllocationId = parse_id(
        &allocation_id,
        "invalid_allocation_id",
        "allocation ID",
        &request_id,
    )?;

    let allocation = state
        .engine()
        .complete_allocation(allocation_id)
        .await
        .map_err(|e| ApiError::from_allocation(e, &request_id))?;

    Ok(Json(allocation))
}
