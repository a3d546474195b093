//! Academic year models and DTOs.
//!
//! An academic year is the system-wide time period (e.g., "2024-2025") that
//! scopes classes, enrollments, exams, and fees. At most one academic year is
//! current at any time; the partial unique index in the schema backs that
//! invariant under concurrent writers.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use validator::Validate;

use crate::ids::AcademicYearId;

/// An academic year.
#[derive(Serialize, FromRow, Debug, Clone)]
pub struct AcademicYear {
    pub id: AcademicYearId,
    pub name: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub is_current: bool,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub updated_at: chrono::DateTime<chrono::Utc>,
}

/// DTO for creating a new academic year.
#[derive(Deserialize, Debug, Validate)]
pub struct CreateAcademicYearDto {
    #[validate(length(min = 1, max = 100))]
    pub name: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
}

/// DTO for updating an academic year.
///
/// All fields are optional; only provided fields will be updated. The
/// current flag is not updatable here; use the set-current operation so the
/// singleton invariant is maintained in one transaction.
#[derive(Deserialize, Debug, Default, Validate)]
pub struct UpdateAcademicYearDto {
    #[validate(length(min = 1, max = 100))]
    pub name: Option<String>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
}
