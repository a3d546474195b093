//! Application error types.
//!
//! All fallible operations in the core return [`AppError`], a typed error
//! carrying an [`ErrorKind`] plus the underlying [`anyhow::Error`]. The core
//! is transport-agnostic: callers (an HTTP layer, a CLI, a test) map kinds to
//! whatever representation they need.

use anyhow::Error;
use serde::Serialize;
use std::fmt;

/// Classification of a core failure.
///
/// Each variant corresponds to one invariant or failure class of the domain;
/// an embedding layer maps these to status codes or exit codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// A referenced entity id does not exist.
    NotFound,
    /// An active enrollment already exists for the (student, academic year) pair.
    DuplicateActiveEnrollment,
    /// The (teacher, class, subject, academic year) assignment tuple already exists.
    DuplicateAssignment,
    /// A grade already exists for the (student, exam) pair.
    DuplicateGrade,
    /// The (student, parent) link or (student, fee) assignment already exists.
    DuplicateRelationship,
    /// A numeric value is outside a domain-required bound.
    OutOfRange,
    /// A delete was refused because dependent records exist.
    HasDependents,
    /// A delete or demotion was refused on the current academic year.
    CurrentYearProtected,
    /// Malformed input caught before it reached the store.
    Validation,
    /// A uniqueness rule outside the named duplicate classes was violated.
    Conflict,
    /// The underlying store failed.
    Database,
}

/// A typed core error: what went wrong plus the full error chain.
#[derive(Debug)]
pub struct AppError {
    pub kind: ErrorKind,
    pub error: Error,
}

impl AppError {
    pub fn new<E>(kind: ErrorKind, err: E) -> Self
    where
        E: Into<Error>,
    {
        Self {
            kind,
            error: err.into(),
        }
    }

    pub fn not_found<E>(err: E) -> Self
    where
        E: Into<Error>,
    {
        Self::new(ErrorKind::NotFound, err)
    }

    pub fn duplicate_active_enrollment<E>(err: E) -> Self
    where
        E: Into<Error>,
    {
        Self::new(ErrorKind::DuplicateActiveEnrollment, err)
    }

    pub fn duplicate_assignment<E>(err: E) -> Self
    where
        E: Into<Error>,
    {
        Self::new(ErrorKind::DuplicateAssignment, err)
    }

    pub fn duplicate_grade<E>(err: E) -> Self
    where
        E: Into<Error>,
    {
        Self::new(ErrorKind::DuplicateGrade, err)
    }

    pub fn duplicate_relationship<E>(err: E) -> Self
    where
        E: Into<Error>,
    {
        Self::new(ErrorKind::DuplicateRelationship, err)
    }

    pub fn out_of_range<E>(err: E) -> Self
    where
        E: Into<Error>,
    {
        Self::new(ErrorKind::OutOfRange, err)
    }

    pub fn has_dependents<E>(err: E) -> Self
    where
        E: Into<Error>,
    {
        Self::new(ErrorKind::HasDependents, err)
    }

    pub fn current_year_protected<E>(err: E) -> Self
    where
        E: Into<Error>,
    {
        Self::new(ErrorKind::CurrentYearProtected, err)
    }

    pub fn validation<E>(err: E) -> Self
    where
        E: Into<Error>,
    {
        Self::new(ErrorKind::Validation, err)
    }

    pub fn conflict<E>(err: E) -> Self
    where
        E: Into<Error>,
    {
        Self::new(ErrorKind::Conflict, err)
    }

    pub fn database<E>(err: E) -> Self
    where
        E: Into<Error>,
    {
        Self::new(ErrorKind::Database, err)
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.error)
    }
}

impl<E> From<E> for AppError
where
    E: Into<Error>,
{
    fn from(err: E) -> Self {
        AppError::database(err)
    }
}

/// True when the sqlx error is a unique-constraint violation.
///
/// Services use this to map insert races on the storage-level unique indexes
/// to the same typed duplicate error as the application-level precondition
/// check.
pub fn is_unique_violation(err: &sqlx::Error) -> bool {
    matches!(err, sqlx::Error::Database(db_err) if db_err.is_unique_violation())
}

/// True when the sqlx error is a foreign-key violation, i.e. a referenced
/// entity id does not exist.
pub fn is_foreign_key_violation(err: &sqlx::Error) -> bool {
    matches!(err, sqlx::Error::Database(db_err) if db_err.is_foreign_key_violation())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_constructor_sets_kind() {
        let err = AppError::not_found(anyhow::anyhow!("student not found"));
        assert_eq!(err.kind, ErrorKind::NotFound);
        assert_eq!(err.to_string(), "student not found");
    }

    #[test]
    fn test_blanket_from_is_database() {
        fn fails() -> Result<(), AppError> {
            Err(std::io::Error::other("disk on fire"))?;
            Ok(())
        }
        assert_eq!(fails().unwrap_err().kind, ErrorKind::Database);
    }

    #[test]
    fn test_kind_serializes_snake_case() {
        let json = serde_json::to_string(&ErrorKind::DuplicateActiveEnrollment).unwrap();
        assert_eq!(json, "\"duplicate_active_enrollment\"");
    }
}
