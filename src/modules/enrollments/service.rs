use chrono::Utc;
use sqlx::PgPool;
use tracing::instrument;

use rollbook_core::{AppError, is_foreign_key_violation, is_unique_violation};
use rollbook_models::ids::{AcademicYearId, EnrollmentId};

use crate::modules::enrollments::model::{
    CreateEnrollmentDto, Enrollment, EnrollmentFilterParams, EnrollmentStatus,
};

pub struct EnrollmentService;

impl EnrollmentService {
    /// Enroll a student in a class for an academic year.
    ///
    /// A student holds at most one active enrollment per academic year. The
    /// check here gives a clean error on the common path; the partial unique
    /// index catches the insert race, which is mapped to the same error.
    #[instrument(skip(db))]
    pub async fn create_enrollment(
        db: &PgPool,
        dto: CreateEnrollmentDto,
    ) -> Result<Enrollment, AppError> {
        let already_active = sqlx::query_scalar::<_, bool>(
            r#"SELECT EXISTS(
                   SELECT 1 FROM enrollments
                   WHERE student_id = $1 AND academic_year_id = $2 AND status = 'active')"#,
        )
        .bind(dto.student_id)
        .bind(dto.academic_year_id)
        .fetch_one(db)
        .await?;

        if already_active {
            return Err(AppError::duplicate_active_enrollment(anyhow::anyhow!(
                "Student already has an active enrollment in this academic year"
            )));
        }

        let enrollment_date = dto.enrollment_date.unwrap_or_else(|| Utc::now().date_naive());

        let enrollment = sqlx::query_as::<_, Enrollment>(
            r#"INSERT INTO enrollments (student_id, class_id, academic_year_id, enrollment_date)
               VALUES ($1, $2, $3, $4)
               RETURNING id, student_id, class_id, academic_year_id, enrollment_date, status, created_at, updated_at"#,
        )
        .bind(dto.student_id)
        .bind(dto.class_id)
        .bind(dto.academic_year_id)
        .bind(enrollment_date)
        .fetch_one(db)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                return AppError::duplicate_active_enrollment(anyhow::anyhow!(
                    "Student already has an active enrollment in this academic year"
                ));
            }
            if is_foreign_key_violation(&e) {
                return AppError::not_found(anyhow::anyhow!(
                    "Student, class, or academic year not found"
                ));
            }
            AppError::from(e)
        })?;

        Ok(enrollment)
    }

    /// Get an enrollment by ID.
    #[instrument(skip(db))]
    pub async fn get_enrollment(
        db: &PgPool,
        enrollment_id: EnrollmentId,
    ) -> Result<Enrollment, AppError> {
        let enrollment = sqlx::query_as::<_, Enrollment>(
            r#"SELECT id, student_id, class_id, academic_year_id, enrollment_date, status, created_at, updated_at
               FROM enrollments WHERE id = $1"#,
        )
        .bind(enrollment_id)
        .fetch_optional(db)
        .await?
        .ok_or_else(|| AppError::not_found(anyhow::anyhow!("Enrollment not found")))?;

        Ok(enrollment)
    }

    /// List enrollments matching the filters, newest first.
    #[instrument(skip(db))]
    pub async fn list_enrollments(
        db: &PgPool,
        filters: EnrollmentFilterParams,
    ) -> Result<Vec<Enrollment>, AppError> {
        let enrollments = sqlx::query_as::<_, Enrollment>(
            r#"SELECT id, student_id, class_id, academic_year_id, enrollment_date, status, created_at, updated_at
               FROM enrollments
               WHERE ($1::uuid IS NULL OR student_id = $1)
                 AND ($2::uuid IS NULL OR class_id = $2)
                 AND ($3::uuid IS NULL OR academic_year_id = $3)
                 AND ($4::text IS NULL OR status = $4)
               ORDER BY enrollment_date DESC, created_at DESC"#,
        )
        .bind(filters.student_id)
        .bind(filters.class_id)
        .bind(filters.academic_year_id)
        .bind(filters.status)
        .fetch_all(db)
        .await?;

        Ok(enrollments)
    }

    /// Mark an enrollment completed (year finished).
    #[instrument(skip(db))]
    pub async fn complete_enrollment(
        db: &PgPool,
        enrollment_id: EnrollmentId,
    ) -> Result<Enrollment, AppError> {
        Self::set_status(db, enrollment_id, EnrollmentStatus::Completed).await
    }

    /// Mark an enrollment withdrawn (student left the class).
    #[instrument(skip(db))]
    pub async fn withdraw_enrollment(
        db: &PgPool,
        enrollment_id: EnrollmentId,
    ) -> Result<Enrollment, AppError> {
        Self::set_status(db, enrollment_id, EnrollmentStatus::Withdrawn).await
    }

    /// Complete every active enrollment in an academic year, returning the
    /// number of enrollments closed. Used at year end before promoting the
    /// next year.
    #[instrument(skip(db))]
    pub async fn complete_academic_year(
        db: &PgPool,
        year_id: AcademicYearId,
    ) -> Result<u64, AppError> {
        let result = sqlx::query(
            r#"UPDATE enrollments
               SET status = 'completed', updated_at = NOW()
               WHERE academic_year_id = $1 AND status = 'active'"#,
        )
        .bind(year_id)
        .execute(db)
        .await?;

        Ok(result.rows_affected())
    }

    async fn set_status(
        db: &PgPool,
        enrollment_id: EnrollmentId,
        status: EnrollmentStatus,
    ) -> Result<Enrollment, AppError> {
        let enrollment = sqlx::query_as::<_, Enrollment>(
            r#"UPDATE enrollments
               SET status = $1, updated_at = NOW()
               WHERE id = $2
               RETURNING id, student_id, class_id, academic_year_id, enrollment_date, status, created_at, updated_at"#,
        )
        .bind(status)
        .bind(enrollment_id)
        .fetch_optional(db)
        .await?
        .ok_or_else(|| AppError::not_found(anyhow::anyhow!("Enrollment not found")))?;

        Ok(enrollment)
    }
}
