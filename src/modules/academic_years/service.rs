use sqlx::PgPool;
use tracing::instrument;
use validator::Validate;

use rollbook_core::{AppError, is_unique_violation};
use rollbook_models::ids::AcademicYearId;

use crate::modules::academic_years::model::{
    AcademicYear, CreateAcademicYearDto, UpdateAcademicYearDto,
};

pub struct AcademicYearService;

impl AcademicYearService {
    /// Create a new academic year.
    ///
    /// Validates that:
    /// - start_date < end_date
    /// - The year name is unique
    ///
    /// New years are never current; promote one with
    /// [`set_current_academic_year`](Self::set_current_academic_year).
    #[instrument(skip(db))]
    pub async fn create_academic_year(
        db: &PgPool,
        dto: CreateAcademicYearDto,
    ) -> Result<AcademicYear, AppError> {
        dto.validate().map_err(AppError::validation)?;

        if dto.start_date >= dto.end_date {
            return Err(AppError::validation(anyhow::anyhow!(
                "Start date must be before end date"
            )));
        }

        let year = sqlx::query_as::<_, AcademicYear>(
            r#"INSERT INTO academic_years (name, start_date, end_date)
               VALUES ($1, $2, $3)
               RETURNING id, name, start_date, end_date, is_current, created_at, updated_at"#,
        )
        .bind(&dto.name)
        .bind(dto.start_date)
        .bind(dto.end_date)
        .fetch_one(db)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                return AppError::conflict(anyhow::anyhow!(
                    "An academic year with this name already exists"
                ));
            }
            AppError::from(e)
        })?;

        Ok(year)
    }

    /// Get an academic year by ID.
    #[instrument(skip(db))]
    pub async fn get_academic_year(
        db: &PgPool,
        year_id: AcademicYearId,
    ) -> Result<AcademicYear, AppError> {
        let year = sqlx::query_as::<_, AcademicYear>(
            r#"SELECT id, name, start_date, end_date, is_current, created_at, updated_at
               FROM academic_years WHERE id = $1"#,
        )
        .bind(year_id)
        .fetch_optional(db)
        .await?
        .ok_or_else(|| AppError::not_found(anyhow::anyhow!("Academic year not found")))?;

        Ok(year)
    }

    /// List all academic years, most recent first.
    #[instrument(skip(db))]
    pub async fn list_academic_years(db: &PgPool) -> Result<Vec<AcademicYear>, AppError> {
        let years = sqlx::query_as::<_, AcademicYear>(
            r#"SELECT id, name, start_date, end_date, is_current, created_at, updated_at
               FROM academic_years ORDER BY start_date DESC"#,
        )
        .fetch_all(db)
        .await?;

        Ok(years)
    }

    /// Get the current academic year, if one has been set.
    #[instrument(skip(db))]
    pub async fn get_current_academic_year(
        db: &PgPool,
    ) -> Result<Option<AcademicYear>, AppError> {
        let year = sqlx::query_as::<_, AcademicYear>(
            r#"SELECT id, name, start_date, end_date, is_current, created_at, updated_at
               FROM academic_years WHERE is_current = TRUE"#,
        )
        .fetch_optional(db)
        .await?;

        Ok(year)
    }

    /// Mark an academic year as the current one.
    ///
    /// Demotes the previous current year and promotes the target in one
    /// transaction, so at most one year is current at any point in time. The
    /// partial unique index on `is_current` backs the same invariant against
    /// concurrent promoters.
    #[instrument(skip(db))]
    pub async fn set_current_academic_year(
        db: &PgPool,
        year_id: AcademicYearId,
    ) -> Result<AcademicYear, AppError> {
        let mut tx = db.begin().await?;

        let exists = sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS(SELECT 1 FROM academic_years WHERE id = $1)",
        )
        .bind(year_id)
        .fetch_one(&mut *tx)
        .await?;

        if !exists {
            return Err(AppError::not_found(anyhow::anyhow!(
                "Academic year not found"
            )));
        }

        sqlx::query(
            "UPDATE academic_years SET is_current = FALSE, updated_at = NOW() WHERE is_current = TRUE",
        )
        .execute(&mut *tx)
        .await?;

        let year = sqlx::query_as::<_, AcademicYear>(
            r#"UPDATE academic_years
               SET is_current = TRUE, updated_at = NOW()
               WHERE id = $1
               RETURNING id, name, start_date, end_date, is_current, created_at, updated_at"#,
        )
        .bind(year_id)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                return AppError::conflict(anyhow::anyhow!(
                    "Another academic year was promoted concurrently"
                ));
            }
            AppError::from(e)
        })?;

        tx.commit().await?;

        Ok(year)
    }

    /// Update an academic year's name or dates.
    #[instrument(skip(db))]
    pub async fn update_academic_year(
        db: &PgPool,
        year_id: AcademicYearId,
        dto: UpdateAcademicYearDto,
    ) -> Result<AcademicYear, AppError> {
        dto.validate().map_err(AppError::validation)?;

        let existing = Self::get_academic_year(db, year_id).await?;

        let name = dto.name.unwrap_or(existing.name);
        let start_date = dto.start_date.unwrap_or(existing.start_date);
        let end_date = dto.end_date.unwrap_or(existing.end_date);

        if start_date >= end_date {
            return Err(AppError::validation(anyhow::anyhow!(
                "Start date must be before end date"
            )));
        }

        let year = sqlx::query_as::<_, AcademicYear>(
            r#"UPDATE academic_years
               SET name = $1, start_date = $2, end_date = $3, updated_at = NOW()
               WHERE id = $4
               RETURNING id, name, start_date, end_date, is_current, created_at, updated_at"#,
        )
        .bind(&name)
        .bind(start_date)
        .bind(end_date)
        .bind(year_id)
        .fetch_one(db)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                return AppError::conflict(anyhow::anyhow!(
                    "An academic year with this name already exists"
                ));
            }
            AppError::from(e)
        })?;

        Ok(year)
    }

    /// Delete an academic year.
    ///
    /// The current year cannot be deleted; demote it first by promoting
    /// another year.
    #[instrument(skip(db))]
    pub async fn delete_academic_year(
        db: &PgPool,
        year_id: AcademicYearId,
    ) -> Result<(), AppError> {
        let is_current =
            sqlx::query_scalar::<_, bool>("SELECT is_current FROM academic_years WHERE id = $1")
                .bind(year_id)
                .fetch_optional(db)
                .await?
                .ok_or_else(|| AppError::not_found(anyhow::anyhow!("Academic year not found")))?;

        if is_current {
            return Err(AppError::current_year_protected(anyhow::anyhow!(
                "Cannot delete the current academic year"
            )));
        }

        sqlx::query("DELETE FROM academic_years WHERE id = $1")
            .bind(year_id)
            .execute(db)
            .await?;

        Ok(())
    }
}
