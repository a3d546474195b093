//! Classroom models and DTOs.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use validator::Validate;

use crate::ids::{AcademicYearId, ClassRoomId};

/// A classroom within one academic year.
#[derive(Serialize, FromRow, Debug, Clone)]
pub struct ClassRoom {
    pub id: ClassRoomId,
    pub name: String,
    pub academic_year_id: AcademicYearId,
    pub grade_level: i32,
    pub capacity: i32,
    pub is_active: bool,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub updated_at: chrono::DateTime<chrono::Utc>,
}

/// DTO for creating a classroom.
#[derive(Deserialize, Debug, Validate)]
pub struct CreateClassRoomDto {
    #[validate(length(min = 1, max = 100))]
    pub name: String,
    pub academic_year_id: AcademicYearId,
    /// School grade level, 1 through 12.
    #[validate(range(min = 1, max = 12))]
    pub grade_level: i32,
    #[validate(range(min = 1))]
    pub capacity: i32,
}

/// Query filters for listing classrooms. All filters are conjunctive.
#[derive(Deserialize, Debug, Default)]
pub struct ClassRoomFilterParams {
    pub academic_year_id: Option<AcademicYearId>,
    pub grade_level: Option<i32>,
    pub is_active: Option<bool>,
}
