//! Enrollment models and DTOs.
//!
//! An enrollment ties a student to a class for one academic year. Enrollments
//! are never deleted: a transfer withdraws the old row and inserts a new one,
//! and year end completes the active rows.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use crate::ids::{AcademicYearId, ClassRoomId, EnrollmentId, StudentId};

/// Lifecycle status of an enrollment.
#[derive(Serialize, Deserialize, sqlx::Type, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
#[sqlx(type_name = "TEXT", rename_all = "snake_case")]
pub enum EnrollmentStatus {
    Active,
    Completed,
    Withdrawn,
}

/// A student's membership in a class for one academic year.
#[derive(Serialize, FromRow, Debug, Clone)]
pub struct Enrollment {
    pub id: EnrollmentId,
    pub student_id: StudentId,
    pub class_id: ClassRoomId,
    pub academic_year_id: AcademicYearId,
    pub enrollment_date: NaiveDate,
    pub status: EnrollmentStatus,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub updated_at: chrono::DateTime<chrono::Utc>,
}

/// DTO for creating an enrollment. The new enrollment is always active.
#[derive(Deserialize, Debug)]
pub struct CreateEnrollmentDto {
    pub student_id: StudentId,
    pub class_id: ClassRoomId,
    pub academic_year_id: AcademicYearId,
    /// Defaults to today when omitted.
    pub enrollment_date: Option<NaiveDate>,
}

/// Query filters for listing enrollments. All filters are conjunctive.
#[derive(Deserialize, Debug, Default)]
pub struct EnrollmentFilterParams {
    pub student_id: Option<StudentId>,
    pub class_id: Option<ClassRoomId>,
    pub academic_year_id: Option<AcademicYearId>,
    pub status: Option<EnrollmentStatus>,
}
