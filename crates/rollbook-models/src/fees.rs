//! Fee, student-fee, and payment models.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use validator::Validate;

use crate::ids::{AcademicYearId, FeeId, FeePaymentId, StudentFeeId, StudentId};

/// Payment state of a student's fee assignment.
#[derive(Serialize, Deserialize, sqlx::Type, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
#[sqlx(type_name = "TEXT", rename_all = "snake_case")]
pub enum StudentFeeStatus {
    Pending,
    Partial,
    Paid,
}

/// A fee schedule item for one academic year.
#[derive(Serialize, FromRow, Debug, Clone)]
pub struct Fee {
    pub id: FeeId,
    pub name: String,
    pub amount: f64,
    pub academic_year_id: AcademicYearId,
    pub due_date: Option<NaiveDate>,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub updated_at: chrono::DateTime<chrono::Utc>,
}

/// DTO for creating a fee.
#[derive(Deserialize, Debug, Validate)]
pub struct CreateFeeDto {
    #[validate(length(min = 1, max = 150))]
    pub name: String,
    #[validate(range(min = 0.01))]
    pub amount: f64,
    pub academic_year_id: AcademicYearId,
    pub due_date: Option<NaiveDate>,
}

/// A fee assigned to one student, with running payment totals.
///
/// `status` is derived from the amounts on every payment and never edited
/// directly.
#[derive(Serialize, FromRow, Debug, Clone)]
pub struct StudentFee {
    pub id: StudentFeeId,
    pub student_id: StudentId,
    pub fee_id: FeeId,
    pub amount_due: f64,
    pub amount_paid: f64,
    pub status: StudentFeeStatus,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub updated_at: chrono::DateTime<chrono::Utc>,
}

/// One payment against a student's fee assignment.
#[derive(Serialize, FromRow, Debug, Clone)]
pub struct FeePayment {
    pub id: FeePaymentId,
    pub student_fee_id: StudentFeeId,
    pub amount: f64,
    pub method: Option<String>,
    pub paid_at: chrono::DateTime<chrono::Utc>,
    pub created_at: chrono::DateTime<chrono::Utc>,
}
