//! ID parsing errors.

use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum IdError {
    #[error("id is empty")]
    Empty,

    /// Well-formed id of another kind, e.g. a student id where a faculty id
    /// was expected.
    #[error("expected a '{expected}_' id, found '{found}_'")]
    WrongKind {
        expected: &'static str,
        found: String,
    },

    #[error("id has no '<kind>_' prefix")]
    MissingPrefix,

    #[error("id body is not a ULID: {0}")]
    BadUlid(#[from] ulid::DecodeError),
}
