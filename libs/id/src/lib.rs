//! # mentorship-id
//!
//! Typed identifiers for the mentorship allocator.
//!
//! Every ID is rendered as `{prefix}_{ulid}`:
//!
//! - `fac_01HV4Z2WQXKJNM8GPQY6VBKC3D` (faculty member)
//! - `stu_01HV4Z3MXNKPQR9HSTZ7WCLD4E` (student)
//! - `alloc_01HV4Z4NYPLTRS0JTUA8XDME5F` (allocation)
//! - `req_01HV4Z5PZQMVST1KUVB9YENF6G` (request)
//!
//! The prefix keeps a student id from ever being passed where a faculty id is
//! expected, and the ULID body sorts by creation time, which gives stores a
//! stable listing order for free.

mod error;
mod macros;
mod types;

pub use error::IdError;
pub use types::*;

pub use ulid::Ulid;

/// Split `raw` into its kind prefix and ULID body and check the prefix.
///
/// Used by [`define_id!`]; ULIDs never contain `_`, so the last separator is
/// the boundary.
#[doc(hidden)]
pub fn parse_prefixed(raw: &str, expected: &'static str) -> Result<Ulid, IdError> {
    if raw.is_empty() {
        return Err(IdError::Empty);
    }
    let (kind, body) = raw.rsplit_once('_').ok_or(IdError::MissingPrefix)?;
    if kind != expected {
        return Err(IdError::WrongKind {
            expected,
            found: kind.to_string(),
        });
    }
    Ok(Ulid::from_string(body)?)
}
