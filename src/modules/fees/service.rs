use sqlx::PgPool;
use tracing::instrument;
use validator::Validate;

use rollbook_core::{AppError, is_foreign_key_violation, is_unique_violation};
use rollbook_models::grades::round2;
use rollbook_models::ids::{AcademicYearId, FeeId, StudentFeeId, StudentId};

use crate::modules::fees::model::{
    CreateFeeDto, Fee, FeePayment, StudentFee, StudentFeeStatus,
};

pub struct FeeService;

impl FeeService {
    /// Create a fee schedule item for an academic year.
    #[instrument(skip(db))]
    pub async fn create_fee(db: &PgPool, dto: CreateFeeDto) -> Result<Fee, AppError> {
        dto.validate().map_err(AppError::validation)?;

        let fee = sqlx::query_as::<_, Fee>(
            r#"INSERT INTO fees (name, amount, academic_year_id, due_date)
               VALUES ($1, $2, $3, $4)
               RETURNING id, name, amount, academic_year_id, due_date, created_at, updated_at"#,
        )
        .bind(&dto.name)
        .bind(dto.amount)
        .bind(dto.academic_year_id)
        .bind(dto.due_date)
        .fetch_one(db)
        .await
        .map_err(|e| {
            if is_foreign_key_violation(&e) {
                return AppError::not_found(anyhow::anyhow!("Academic year not found"));
            }
            AppError::from(e)
        })?;

        Ok(fee)
    }

    /// List fees, optionally narrowed to one academic year.
    #[instrument(skip(db))]
    pub async fn list_fees(
        db: &PgPool,
        academic_year_id: Option<AcademicYearId>,
    ) -> Result<Vec<Fee>, AppError> {
        let fees = sqlx::query_as::<_, Fee>(
            r#"SELECT id, name, amount, academic_year_id, due_date, created_at, updated_at
               FROM fees
               WHERE ($1::uuid IS NULL OR academic_year_id = $1)
               ORDER BY due_date NULLS LAST, name"#,
        )
        .bind(academic_year_id)
        .fetch_all(db)
        .await?;

        Ok(fees)
    }

    /// Assign a fee to a student, opening a pending balance equal to the
    /// fee amount. Each (student, fee) pair is assigned at most once.
    #[instrument(skip(db))]
    pub async fn assign_fee(
        db: &PgPool,
        student_id: StudentId,
        fee_id: FeeId,
    ) -> Result<StudentFee, AppError> {
        let amount = sqlx::query_scalar::<_, f64>("SELECT amount FROM fees WHERE id = $1")
            .bind(fee_id)
            .fetch_optional(db)
            .await?
            .ok_or_else(|| AppError::not_found(anyhow::anyhow!("Fee not found")))?;

        let student_fee = sqlx::query_as::<_, StudentFee>(
            r#"INSERT INTO student_fees (student_id, fee_id, amount_due)
               VALUES ($1, $2, $3)
               RETURNING id, student_id, fee_id, amount_due, amount_paid, status, created_at, updated_at"#,
        )
        .bind(student_id)
        .bind(fee_id)
        .bind(amount)
        .fetch_one(db)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                return AppError::duplicate_relationship(anyhow::anyhow!(
                    "This fee is already assigned to this student"
                ));
            }
            if is_foreign_key_violation(&e) {
                return AppError::not_found(anyhow::anyhow!("Student not found"));
            }
            AppError::from(e)
        })?;

        Ok(student_fee)
    }

    /// Record a payment against a student's fee assignment.
    ///
    /// The row is locked for the duration of the transaction so concurrent
    /// payments settle sequentially and can never overpay. The derived
    /// status moves pending -> partial -> paid with the running total.
    #[instrument(skip(db))]
    pub async fn record_payment(
        db: &PgPool,
        student_fee_id: StudentFeeId,
        amount: f64,
        method: Option<String>,
    ) -> Result<StudentFee, AppError> {
        if amount <= 0.0 {
            return Err(AppError::out_of_range(anyhow::anyhow!(
                "Payment amount must be positive"
            )));
        }

        let mut tx = db.begin().await?;

        let student_fee = sqlx::query_as::<_, StudentFee>(
            r#"SELECT id, student_id, fee_id, amount_due, amount_paid, status, created_at, updated_at
               FROM student_fees WHERE id = $1 FOR UPDATE"#,
        )
        .bind(student_fee_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| AppError::not_found(anyhow::anyhow!("Fee assignment not found")))?;

        let outstanding = round2(student_fee.amount_due - student_fee.amount_paid);
        if amount > outstanding {
            return Err(AppError::out_of_range(anyhow::anyhow!(
                "Payment of {} exceeds the outstanding balance of {}",
                amount,
                outstanding
            )));
        }

        sqlx::query(
            "INSERT INTO fee_payments (student_fee_id, amount, method) VALUES ($1, $2, $3)",
        )
        .bind(student_fee_id)
        .bind(amount)
        .bind(&method)
        .execute(&mut *tx)
        .await?;

        let new_paid = round2(student_fee.amount_paid + amount);
        let status = if new_paid >= student_fee.amount_due {
            StudentFeeStatus::Paid
        } else {
            StudentFeeStatus::Partial
        };

        let updated = sqlx::query_as::<_, StudentFee>(
            r#"UPDATE student_fees
               SET amount_paid = $1, status = $2, updated_at = NOW()
               WHERE id = $3
               RETURNING id, student_id, fee_id, amount_due, amount_paid, status, created_at, updated_at"#,
        )
        .bind(new_paid)
        .bind(status)
        .bind(student_fee_id)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;

        Ok(updated)
    }

    /// Payments recorded against one fee assignment, oldest first.
    #[instrument(skip(db))]
    pub async fn payment_history(
        db: &PgPool,
        student_fee_id: StudentFeeId,
    ) -> Result<Vec<FeePayment>, AppError> {
        let payments = sqlx::query_as::<_, FeePayment>(
            r#"SELECT id, student_fee_id, amount, method, paid_at, created_at
               FROM fee_payments
               WHERE student_fee_id = $1
               ORDER BY paid_at"#,
        )
        .bind(student_fee_id)
        .fetch_all(db)
        .await?;

        Ok(payments)
    }

    /// A student's fee assignments.
    #[instrument(skip(db))]
    pub async fn student_fees(
        db: &PgPool,
        student_id: StudentId,
    ) -> Result<Vec<StudentFee>, AppError> {
        let fees = sqlx::query_as::<_, StudentFee>(
            r#"SELECT id, student_id, fee_id, amount_due, amount_paid, status, created_at, updated_at
               FROM student_fees
               WHERE student_id = $1
               ORDER BY created_at"#,
        )
        .bind(student_id)
        .fetch_all(db)
        .await?;

        Ok(fees)
    }

    /// The student's total unpaid balance across all assigned fees.
    #[instrument(skip(db))]
    pub async fn outstanding_balance(
        db: &PgPool,
        student_id: StudentId,
    ) -> Result<f64, AppError> {
        let balance = sqlx::query_scalar::<_, f64>(
            r#"SELECT COALESCE(SUM(amount_due - amount_paid), 0)
               FROM student_fees WHERE student_id = $1"#,
        )
        .bind(student_id)
        .fetch_one(db)
        .await?;

        Ok(round2(balance))
    }
}
