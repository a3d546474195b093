//! Student models and DTOs.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use validator::Validate;

use crate::ids::{AcademicYearId, ClassRoomId, StudentId};

/// Lifecycle status of a student.
#[derive(Serialize, Deserialize, sqlx::Type, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
#[sqlx(type_name = "TEXT", rename_all = "snake_case")]
pub enum StudentStatus {
    Active,
    Inactive,
    Graduated,
    Transferred,
}

/// A student.
#[derive(Serialize, FromRow, Debug, Clone)]
pub struct Student {
    pub id: StudentId,
    /// External student code, unique system-wide.
    pub student_code: String,
    pub first_name: String,
    pub last_name: String,
    pub date_of_birth: NaiveDate,
    pub status: StudentStatus,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub updated_at: chrono::DateTime<chrono::Utc>,
}

/// DTO for creating a new student.
#[derive(Deserialize, Debug, Validate)]
pub struct CreateStudentDto {
    #[validate(length(min = 1, max = 50))]
    pub student_code: String,
    #[validate(length(min = 1, max = 100))]
    pub first_name: String,
    #[validate(length(min = 1, max = 100))]
    pub last_name: String,
    pub date_of_birth: NaiveDate,
}

/// DTO for updating an existing student.
///
/// All fields are optional; only provided fields will be updated.
#[derive(Deserialize, Debug, Default, Validate)]
pub struct UpdateStudentDto {
    #[validate(length(min = 1, max = 100))]
    pub first_name: Option<String>,
    #[validate(length(min = 1, max = 100))]
    pub last_name: Option<String>,
    pub date_of_birth: Option<NaiveDate>,
    pub status: Option<StudentStatus>,
}

/// Query filters for listing students. All filters are conjunctive; the
/// class and academic-year filters match through active enrollments.
#[derive(Deserialize, Debug, Default)]
pub struct StudentFilterParams {
    pub status: Option<StudentStatus>,
    pub class_id: Option<ClassRoomId>,
    pub academic_year_id: Option<AcademicYearId>,
    /// Case-insensitive substring match on name or student code.
    pub search: Option<String>,
}

/// Headcount statistics across the student body.
#[derive(Serialize, Debug, PartialEq, Eq)]
pub struct StudentStatistics {
    pub total_students: i64,
    pub active_students: i64,
    pub graduated_students: i64,
    pub transferred_students: i64,
    /// Students with an active enrollment in the current academic year;
    /// 0 when no year is marked current.
    pub enrolled_this_year: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_student_dto_validation() {
        let dto = CreateStudentDto {
            student_code: "STU-1042".to_string(),
            first_name: "Amina".to_string(),
            last_name: "Diallo".to_string(),
            date_of_birth: NaiveDate::from_ymd_opt(2012, 4, 17).unwrap(),
        };
        assert!(dto.validate().is_ok());
    }

    #[test]
    fn test_create_student_dto_empty_code() {
        let dto = CreateStudentDto {
            student_code: "".to_string(),
            first_name: "Amina".to_string(),
            last_name: "Diallo".to_string(),
            date_of_birth: NaiveDate::from_ymd_opt(2012, 4, 17).unwrap(),
        };
        assert!(dto.validate().is_err());
    }

    #[test]
    fn test_status_serializes_snake_case() {
        let json = serde_json::to_string(&StudentStatus::Graduated).unwrap();
        assert_eq!(json, "\"graduated\"");
    }
}
