//! Subject models and DTOs.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use validator::Validate;

use crate::ids::SubjectId;

/// A taught subject (e.g., "Mathematics").
#[derive(Serialize, FromRow, Debug, Clone)]
pub struct Subject {
    pub id: SubjectId,
    pub name: String,
    /// Short unique code, e.g. "MATH".
    pub code: String,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub updated_at: chrono::DateTime<chrono::Utc>,
}

/// DTO for creating a subject.
#[derive(Deserialize, Debug, Validate)]
pub struct CreateSubjectDto {
    #[validate(length(min = 1, max = 100))]
    pub name: String,
    #[validate(length(min = 1, max = 20))]
    pub code: String,
}
