//! Exam models and DTOs.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use validator::Validate;

use crate::ids::{AcademicYearId, ClassRoomId, ExamId, SubjectId};

/// Kind of assessment.
#[derive(Serialize, Deserialize, sqlx::Type, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
#[sqlx(type_name = "TEXT", rename_all = "snake_case")]
pub enum ExamType {
    Quiz,
    Test,
    Midterm,
    Final,
    Assignment,
    Project,
}

/// An exam held for one class in one subject.
#[derive(Serialize, FromRow, Debug, Clone)]
pub struct Exam {
    pub id: ExamId,
    pub name: String,
    pub exam_type: ExamType,
    pub class_id: ClassRoomId,
    pub subject_id: SubjectId,
    pub academic_year_id: AcademicYearId,
    pub total_marks: f64,
    pub passing_marks: f64,
    pub exam_date: NaiveDate,
    pub is_published: bool,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub updated_at: chrono::DateTime<chrono::Utc>,
}

/// DTO for creating an exam.
///
/// The mark bounds (total > 0, 0 <= passing <= total) involve two fields and
/// are re-checked in the service.
#[derive(Deserialize, Debug, Validate)]
pub struct CreateExamDto {
    #[validate(length(min = 1, max = 150))]
    pub name: String,
    pub exam_type: ExamType,
    pub class_id: ClassRoomId,
    pub subject_id: SubjectId,
    pub academic_year_id: AcademicYearId,
    pub total_marks: f64,
    pub passing_marks: f64,
    pub exam_date: NaiveDate,
}

/// Query filters for listing exams. All filters are conjunctive.
#[derive(Deserialize, Debug, Default)]
pub struct ExamFilterParams {
    pub class_id: Option<ClassRoomId>,
    pub subject_id: Option<SubjectId>,
    pub academic_year_id: Option<AcademicYearId>,
    pub exam_type: Option<ExamType>,
    pub is_published: Option<bool>,
}

/// Aggregate statistics for one exam across all graded students.
///
/// Zero-valued when the exam has no grades; `passing_students +
/// failing_students` always equals `total_students`.
#[derive(Serialize, Debug, PartialEq)]
pub struct ExamStatistics {
    pub total_students: i64,
    pub average_marks: f64,
    pub highest_marks: f64,
    pub lowest_marks: f64,
    pub pass_percentage: f64,
    pub passing_students: i64,
    pub failing_students: i64,
}
