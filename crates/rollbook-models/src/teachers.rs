//! Teacher and class-assignment models and DTOs.
//!
//! A class assignment ties a teacher to a class (and optionally a subject)
//! for one academic year. The full (teacher, class, subject, year) tuple is
//! unique; the schema collapses a missing subject to a sentinel so the rule
//! also holds for class-level assignments.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use validator::Validate;

use crate::ids::{AcademicYearId, ClassAssignmentId, ClassRoomId, SubjectId, TeacherId};

/// Employment status of a teacher.
#[derive(Serialize, Deserialize, sqlx::Type, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
#[sqlx(type_name = "TEXT", rename_all = "snake_case")]
pub enum TeacherStatus {
    Active,
    Inactive,
    Terminated,
}

/// A teacher.
#[derive(Serialize, FromRow, Debug, Clone)]
pub struct Teacher {
    pub id: TeacherId,
    /// Employee code, unique system-wide.
    pub employee_code: String,
    pub first_name: String,
    pub last_name: String,
    pub hire_date: NaiveDate,
    pub status: TeacherStatus,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub updated_at: chrono::DateTime<chrono::Utc>,
}

/// DTO for creating a teacher.
#[derive(Deserialize, Debug, Validate)]
pub struct CreateTeacherDto {
    #[validate(length(min = 1, max = 50))]
    pub employee_code: String,
    #[validate(length(min = 1, max = 100))]
    pub first_name: String,
    #[validate(length(min = 1, max = 100))]
    pub last_name: String,
    pub hire_date: NaiveDate,
}

/// A teacher's assignment to a class, optionally scoped to a subject.
#[derive(Serialize, FromRow, Debug, Clone)]
pub struct ClassAssignment {
    pub id: ClassAssignmentId,
    pub teacher_id: TeacherId,
    pub class_id: ClassRoomId,
    pub subject_id: Option<SubjectId>,
    pub academic_year_id: AcademicYearId,
    /// Whether this teacher is the primary (homeroom) teacher for the class.
    pub is_primary: bool,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub updated_at: chrono::DateTime<chrono::Utc>,
}

/// DTO for creating a class assignment.
#[derive(Deserialize, Debug)]
pub struct CreateClassAssignmentDto {
    pub teacher_id: TeacherId,
    pub class_id: ClassRoomId,
    pub subject_id: Option<SubjectId>,
    pub academic_year_id: AcademicYearId,
    #[serde(default)]
    pub is_primary: bool,
}

/// Query filters for listing assignments. All filters are conjunctive.
#[derive(Deserialize, Debug, Default)]
pub struct ClassAssignmentFilterParams {
    pub teacher_id: Option<TeacherId>,
    pub class_id: Option<ClassRoomId>,
    pub academic_year_id: Option<AcademicYearId>,
}
