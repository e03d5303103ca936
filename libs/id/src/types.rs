//! Typed ID definitions.

use crate::define_id;

// =============================================================================
// Roster
// =============================================================================

define_id!(FacultyId, "fac");
define_id!(StudentId, "stu");

// =============================================================================
// Allocations
// =============================================================================

define_id!(AllocationId, "alloc");

// =============================================================================
// Requests
// =============================================================================

define_id!(RequestId, "req");

// =============================================================================
// Tests
// =============================================================================
