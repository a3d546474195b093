//! Parent and student-parent-link models and DTOs.
//!
//! Parents relate to students many-to-many through links carrying per-link
//! contact flags. A student has at most one primary-contact link and at most
//! one emergency-contact link; asserting a flag clears it on every competing
//! link in the same transaction.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use validator::Validate;

use crate::ids::{ParentId, StudentId, StudentParentLinkId};

/// A parent or guardian.
#[derive(Serialize, FromRow, Debug, Clone)]
pub struct Parent {
    pub id: ParentId,
    pub first_name: String,
    pub last_name: String,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub updated_at: chrono::DateTime<chrono::Utc>,
}

/// DTO for creating a parent.
#[derive(Deserialize, Debug, Validate)]
pub struct CreateParentDto {
    #[validate(length(min = 1, max = 100))]
    pub first_name: String,
    #[validate(length(min = 1, max = 100))]
    pub last_name: String,
    #[validate(length(max = 30))]
    pub phone: Option<String>,
    #[validate(email)]
    pub email: Option<String>,
}

/// One student-parent relationship with its per-link flags.
#[derive(Serialize, FromRow, Debug, Clone)]
pub struct StudentParentLink {
    pub id: StudentParentLinkId,
    pub student_id: StudentId,
    pub parent_id: ParentId,
    /// Free-form kinship label, e.g. "mother", "guardian".
    pub relationship: Option<String>,
    pub is_primary_contact: bool,
    pub is_emergency_contact: bool,
    pub can_pickup: bool,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub updated_at: chrono::DateTime<chrono::Utc>,
}

/// DTO for linking a parent to a student.
#[derive(Deserialize, Debug, Validate)]
pub struct CreateStudentParentLinkDto {
    pub student_id: StudentId,
    pub parent_id: ParentId,
    #[validate(length(max = 50))]
    pub relationship: Option<String>,
    #[serde(default)]
    pub is_primary_contact: bool,
    #[serde(default)]
    pub is_emergency_contact: bool,
    #[serde(default)]
    pub can_pickup: bool,
}

/// DTO for updating a link's flags.
#[derive(Deserialize, Debug, Default, Validate)]
pub struct UpdateStudentParentLinkDto {
    #[validate(length(max = 50))]
    pub relationship: Option<String>,
    pub is_primary_contact: Option<bool>,
    pub is_emergency_contact: Option<bool>,
    pub can_pickup: Option<bool>,
}
