use sqlx::PgPool;
use tracing::instrument;
use validator::Validate;

use rollbook_core::{AppError, is_foreign_key_violation, is_unique_violation};
use rollbook_models::ids::{AcademicYearId, ClassAssignmentId, ClassRoomId, SubjectId, TeacherId};

use crate::modules::teachers::model::{
    ClassAssignment, ClassAssignmentFilterParams, CreateClassAssignmentDto, CreateTeacherDto,
    Teacher, TeacherStatus,
};

pub struct TeacherService;

impl TeacherService {
    /// Hire a teacher. Employee codes are unique system-wide.
    #[instrument(skip(db))]
    pub async fn create_teacher(db: &PgPool, dto: CreateTeacherDto) -> Result<Teacher, AppError> {
        dto.validate().map_err(AppError::validation)?;

        let teacher = sqlx::query_as::<_, Teacher>(
            r#"INSERT INTO teachers (employee_code, first_name, last_name, hire_date)
               VALUES ($1, $2, $3, $4)
               RETURNING id, employee_code, first_name, last_name, hire_date, status, created_at, updated_at"#,
        )
        .bind(&dto.employee_code)
        .bind(&dto.first_name)
        .bind(&dto.last_name)
        .bind(dto.hire_date)
        .fetch_one(db)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                return AppError::conflict(anyhow::anyhow!(
                    "A teacher with this employee code already exists"
                ));
            }
            AppError::from(e)
        })?;

        Ok(teacher)
    }

    /// Get a teacher by ID.
    #[instrument(skip(db))]
    pub async fn get_teacher(db: &PgPool, teacher_id: TeacherId) -> Result<Teacher, AppError> {
        let teacher = sqlx::query_as::<_, Teacher>(
            r#"SELECT id, employee_code, first_name, last_name, hire_date, status, created_at, updated_at
               FROM teachers WHERE id = $1"#,
        )
        .bind(teacher_id)
        .fetch_optional(db)
        .await?
        .ok_or_else(|| AppError::not_found(anyhow::anyhow!("Teacher not found")))?;

        Ok(teacher)
    }

    /// List teachers, optionally by employment status, ordered by name.
    #[instrument(skip(db))]
    pub async fn list_teachers(
        db: &PgPool,
        status: Option<TeacherStatus>,
    ) -> Result<Vec<Teacher>, AppError> {
        let teachers = sqlx::query_as::<_, Teacher>(
            r#"SELECT id, employee_code, first_name, last_name, hire_date, status, created_at, updated_at
               FROM teachers
               WHERE ($1::text IS NULL OR status = $1)
               ORDER BY last_name, first_name"#,
        )
        .bind(status)
        .fetch_all(db)
        .await?;

        Ok(teachers)
    }

    /// Delete a teacher.
    ///
    /// Refused while the teacher still holds class assignments; unassign
    /// first so the assignment history stays attributable.
    #[instrument(skip(db))]
    pub async fn delete_teacher(db: &PgPool, teacher_id: TeacherId) -> Result<(), AppError> {
        let assignments = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM class_assignments WHERE teacher_id = $1",
        )
        .bind(teacher_id)
        .fetch_one(db)
        .await?;

        if assignments > 0 {
            return Err(AppError::has_dependents(anyhow::anyhow!(
                "Cannot delete teacher: {} class assignment(s) exist",
                assignments
            )));
        }

        let result = sqlx::query("DELETE FROM teachers WHERE id = $1")
            .bind(teacher_id)
            .execute(db)
            .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::not_found(anyhow::anyhow!("Teacher not found")));
        }

        Ok(())
    }

    /// Assign a teacher to a class, optionally for one subject.
    ///
    /// The full (teacher, class, subject, year) tuple is unique. A missing
    /// subject means a class-level (homeroom style) assignment and collides
    /// with other subject-less assignments of the same tuple.
    #[instrument(skip(db))]
    pub async fn create_assignment(
        db: &PgPool,
        dto: CreateClassAssignmentDto,
    ) -> Result<ClassAssignment, AppError> {
        let duplicate = sqlx::query_scalar::<_, bool>(
            r#"SELECT EXISTS(
                   SELECT 1 FROM class_assignments
                   WHERE teacher_id = $1 AND class_id = $2 AND academic_year_id = $3
                     AND subject_id IS NOT DISTINCT FROM $4)"#,
        )
        .bind(dto.teacher_id)
        .bind(dto.class_id)
        .bind(dto.academic_year_id)
        .bind(dto.subject_id)
        .fetch_one(db)
        .await?;

        if duplicate {
            return Err(AppError::duplicate_assignment(anyhow::anyhow!(
                "This teacher is already assigned to this class for this subject and year"
            )));
        }

        let assignment = sqlx::query_as::<_, ClassAssignment>(
            r#"INSERT INTO class_assignments (teacher_id, class_id, subject_id, academic_year_id, is_primary)
               VALUES ($1, $2, $3, $4, $5)
               RETURNING id, teacher_id, class_id, subject_id, academic_year_id, is_primary, created_at, updated_at"#,
        )
        .bind(dto.teacher_id)
        .bind(dto.class_id)
        .bind(dto.subject_id)
        .bind(dto.academic_year_id)
        .bind(dto.is_primary)
        .fetch_one(db)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                return AppError::duplicate_assignment(anyhow::anyhow!(
                    "This teacher is already assigned to this class for this subject and year"
                ));
            }
            if is_foreign_key_violation(&e) {
                return AppError::not_found(anyhow::anyhow!(
                    "Teacher, class, subject, or academic year not found"
                ));
            }
            AppError::from(e)
        })?;

        Ok(assignment)
    }

    /// Remove a class assignment.
    #[instrument(skip(db))]
    pub async fn delete_assignment(
        db: &PgPool,
        assignment_id: ClassAssignmentId,
    ) -> Result<(), AppError> {
        let result = sqlx::query("DELETE FROM class_assignments WHERE id = $1")
            .bind(assignment_id)
            .execute(db)
            .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::not_found(anyhow::anyhow!(
                "Class assignment not found"
            )));
        }

        Ok(())
    }

    /// List class assignments matching the filters.
    #[instrument(skip(db))]
    pub async fn list_assignments(
        db: &PgPool,
        filters: ClassAssignmentFilterParams,
    ) -> Result<Vec<ClassAssignment>, AppError> {
        let assignments = sqlx::query_as::<_, ClassAssignment>(
            r#"SELECT id, teacher_id, class_id, subject_id, academic_year_id, is_primary, created_at, updated_at
               FROM class_assignments
               WHERE ($1::uuid IS NULL OR teacher_id = $1)
                 AND ($2::uuid IS NULL OR class_id = $2)
                 AND ($3::uuid IS NULL OR academic_year_id = $3)
               ORDER BY created_at DESC"#,
        )
        .bind(filters.teacher_id)
        .bind(filters.class_id)
        .bind(filters.academic_year_id)
        .fetch_all(db)
        .await?;

        Ok(assignments)
    }

    /// Active teachers not yet assigned to the given (class, subject, year)
    /// tuple, ordered by name. Used to populate assignment pickers.
    #[instrument(skip(db))]
    pub async fn available_teachers(
        db: &PgPool,
        class_id: ClassRoomId,
        subject_id: Option<SubjectId>,
        year_id: AcademicYearId,
    ) -> Result<Vec<Teacher>, AppError> {
        let teachers = sqlx::query_as::<_, Teacher>(
            r#"SELECT t.id, t.employee_code, t.first_name, t.last_name, t.hire_date, t.status, t.created_at, t.updated_at
               FROM teachers t
               WHERE t.status = 'active'
                 AND NOT EXISTS (
                     SELECT 1 FROM class_assignments a
                     WHERE a.teacher_id = t.id
                       AND a.class_id = $1
                       AND a.academic_year_id = $2
                       AND a.subject_id IS NOT DISTINCT FROM $3)
               ORDER BY t.last_name, t.first_name"#,
        )
        .bind(class_id)
        .bind(year_id)
        .bind(subject_id)
        .fetch_all(db)
        .await?;

        Ok(teachers)
    }
}
