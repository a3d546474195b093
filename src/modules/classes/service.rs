use sqlx::PgPool;
use tracing::instrument;
use validator::Validate;

use rollbook_core::{AppError, is_foreign_key_violation, is_unique_violation};
use rollbook_models::ids::ClassRoomId;
use rollbook_models::students::Student;

use crate::modules::classes::model::{ClassRoom, ClassRoomFilterParams, CreateClassRoomDto};

pub struct ClassService;

impl ClassService {
    /// Create a classroom in an academic year.
    ///
    /// Class names are unique within a year; the same name may recur across
    /// years.
    #[instrument(skip(db))]
    pub async fn create_class(
        db: &PgPool,
        dto: CreateClassRoomDto,
    ) -> Result<ClassRoom, AppError> {
        dto.validate().map_err(AppError::validation)?;

        let class = sqlx::query_as::<_, ClassRoom>(
            r#"INSERT INTO classes (name, academic_year_id, grade_level, capacity)
               VALUES ($1, $2, $3, $4)
               RETURNING id, name, academic_year_id, grade_level, capacity, is_active, created_at, updated_at"#,
        )
        .bind(&dto.name)
        .bind(dto.academic_year_id)
        .bind(dto.grade_level)
        .bind(dto.capacity)
        .fetch_one(db)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                return AppError::conflict(anyhow::anyhow!(
                    "A class with this name already exists in this academic year"
                ));
            }
            if is_foreign_key_violation(&e) {
                return AppError::not_found(anyhow::anyhow!("Academic year not found"));
            }
            AppError::from(e)
        })?;

        Ok(class)
    }

    /// Get a classroom by ID.
    #[instrument(skip(db))]
    pub async fn get_class(db: &PgPool, class_id: ClassRoomId) -> Result<ClassRoom, AppError> {
        let class = sqlx::query_as::<_, ClassRoom>(
            r#"SELECT id, name, academic_year_id, grade_level, capacity, is_active, created_at, updated_at
               FROM classes WHERE id = $1"#,
        )
        .bind(class_id)
        .fetch_optional(db)
        .await?
        .ok_or_else(|| AppError::not_found(anyhow::anyhow!("Class not found")))?;

        Ok(class)
    }

    /// List classrooms, filtered by year, grade level, or active flag.
    #[instrument(skip(db))]
    pub async fn list_classes(
        db: &PgPool,
        filters: ClassRoomFilterParams,
    ) -> Result<Vec<ClassRoom>, AppError> {
        let classes = sqlx::query_as::<_, ClassRoom>(
            r#"SELECT id, name, academic_year_id, grade_level, capacity, is_active, created_at, updated_at
               FROM classes
               WHERE ($1::uuid IS NULL OR academic_year_id = $1)
                 AND ($2::int IS NULL OR grade_level = $2)
                 AND ($3::bool IS NULL OR is_active = $3)
               ORDER BY grade_level, name"#,
        )
        .bind(filters.academic_year_id)
        .bind(filters.grade_level)
        .bind(filters.is_active)
        .fetch_all(db)
        .await?;

        Ok(classes)
    }

    /// List the students actively enrolled in a class, ordered by name.
    #[instrument(skip(db))]
    pub async fn get_class_roster(
        db: &PgPool,
        class_id: ClassRoomId,
    ) -> Result<Vec<Student>, AppError> {
        // Ensure the class exists so an empty roster is distinguishable
        // from a bad id.
        Self::get_class(db, class_id).await?;

        let students = sqlx::query_as::<_, Student>(
            r#"SELECT s.id, s.student_code, s.first_name, s.last_name, s.date_of_birth,
                      s.status, s.created_at, s.updated_at
               FROM students s
               JOIN enrollments e ON e.student_id = s.id
               WHERE e.class_id = $1 AND e.status = 'active'
               ORDER BY s.last_name, s.first_name"#,
        )
        .bind(class_id)
        .fetch_all(db)
        .await?;

        Ok(students)
    }

    /// Delete a classroom.
    ///
    /// Refused while the class still has active enrollments; withdraw or
    /// transfer the students first.
    #[instrument(skip(db))]
    pub async fn delete_class(db: &PgPool, class_id: ClassRoomId) -> Result<(), AppError> {
        let active_enrollments = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM enrollments WHERE class_id = $1 AND status = 'active'",
        )
        .bind(class_id)
        .fetch_one(db)
        .await?;

        if active_enrollments > 0 {
            return Err(AppError::has_dependents(anyhow::anyhow!(
                "Cannot delete class: {} active enrollment(s) exist",
                active_enrollments
            )));
        }

        let result = sqlx::query("DELETE FROM classes WHERE id = $1")
            .bind(class_id)
            .execute(db)
            .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::not_found(anyhow::anyhow!("Class not found")));
        }

        Ok(())
    }
}
