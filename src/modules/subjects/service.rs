use sqlx::PgPool;
use tracing::instrument;
use validator::Validate;

use rollbook_core::{AppError, is_unique_violation};
use rollbook_models::ids::SubjectId;

use crate::modules::subjects::model::{CreateSubjectDto, Subject};

pub struct SubjectService;

impl SubjectService {
    /// Create a subject. Subject codes are unique system-wide.
    #[instrument(skip(db))]
    pub async fn create_subject(db: &PgPool, dto: CreateSubjectDto) -> Result<Subject, AppError> {
        dto.validate().map_err(AppError::validation)?;

        let subject = sqlx::query_as::<_, Subject>(
            r#"INSERT INTO subjects (name, code)
               VALUES ($1, $2)
               RETURNING id, name, code, created_at, updated_at"#,
        )
        .bind(&dto.name)
        .bind(&dto.code)
        .fetch_one(db)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                return AppError::conflict(anyhow::anyhow!(
                    "A subject with this code already exists"
                ));
            }
            AppError::from(e)
        })?;

        Ok(subject)
    }

    /// Get a subject by ID.
    #[instrument(skip(db))]
    pub async fn get_subject(db: &PgPool, subject_id: SubjectId) -> Result<Subject, AppError> {
        let subject = sqlx::query_as::<_, Subject>(
            "SELECT id, name, code, created_at, updated_at FROM subjects WHERE id = $1",
        )
        .bind(subject_id)
        .fetch_optional(db)
        .await?
        .ok_or_else(|| AppError::not_found(anyhow::anyhow!("Subject not found")))?;

        Ok(subject)
    }

    /// List all subjects, ordered by name.
    #[instrument(skip(db))]
    pub async fn list_subjects(db: &PgPool) -> Result<Vec<Subject>, AppError> {
        let subjects = sqlx::query_as::<_, Subject>(
            "SELECT id, name, code, created_at, updated_at FROM subjects ORDER BY name",
        )
        .fetch_all(db)
        .await?;

        Ok(subjects)
    }
}
