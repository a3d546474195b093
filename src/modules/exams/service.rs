use sqlx::PgPool;
use tracing::instrument;
use validator::Validate;

use rollbook_core::{AppError, is_foreign_key_violation};
use rollbook_models::grades::round2;
use rollbook_models::ids::ExamId;

use crate::modules::exams::model::{
    CreateExamDto, Exam, ExamFilterParams, ExamStatistics,
};

pub struct ExamService;

impl ExamService {
    /// Schedule an exam for a class and subject.
    ///
    /// Mark bounds: total_marks > 0 and 0 <= passing_marks <= total_marks.
    #[instrument(skip(db))]
    pub async fn create_exam(db: &PgPool, dto: CreateExamDto) -> Result<Exam, AppError> {
        dto.validate().map_err(AppError::validation)?;

        if dto.total_marks <= 0.0 {
            return Err(AppError::out_of_range(anyhow::anyhow!(
                "Total marks must be positive"
            )));
        }
        if dto.passing_marks < 0.0 || dto.passing_marks > dto.total_marks {
            return Err(AppError::out_of_range(anyhow::anyhow!(
                "Passing marks must be between 0 and total marks"
            )));
        }

        let exam = sqlx::query_as::<_, Exam>(
            r#"INSERT INTO exams (name, exam_type, class_id, subject_id, academic_year_id,
                                  total_marks, passing_marks, exam_date)
               VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
               RETURNING id, name, exam_type, class_id, subject_id, academic_year_id,
                         total_marks, passing_marks, exam_date, is_published, created_at, updated_at"#,
        )
        .bind(&dto.name)
        .bind(dto.exam_type)
        .bind(dto.class_id)
        .bind(dto.subject_id)
        .bind(dto.academic_year_id)
        .bind(dto.total_marks)
        .bind(dto.passing_marks)
        .bind(dto.exam_date)
        .fetch_one(db)
        .await
        .map_err(|e| {
            if is_foreign_key_violation(&e) {
                return AppError::not_found(anyhow::anyhow!(
                    "Class, subject, or academic year not found"
                ));
            }
            AppError::from(e)
        })?;

        Ok(exam)
    }

    /// Get an exam by ID.
    #[instrument(skip(db))]
    pub async fn get_exam(db: &PgPool, exam_id: ExamId) -> Result<Exam, AppError> {
        let exam = sqlx::query_as::<_, Exam>(
            r#"SELECT id, name, exam_type, class_id, subject_id, academic_year_id,
                      total_marks, passing_marks, exam_date, is_published, created_at, updated_at
               FROM exams WHERE id = $1"#,
        )
        .bind(exam_id)
        .fetch_optional(db)
        .await?
        .ok_or_else(|| AppError::not_found(anyhow::anyhow!("Exam not found")))?;

        Ok(exam)
    }

    /// List exams matching the filters, newest exam date first.
    #[instrument(skip(db))]
    pub async fn list_exams(
        db: &PgPool,
        filters: ExamFilterParams,
    ) -> Result<Vec<Exam>, AppError> {
        let exams = sqlx::query_as::<_, Exam>(
            r#"SELECT id, name, exam_type, class_id, subject_id, academic_year_id,
                      total_marks, passing_marks, exam_date, is_published, created_at, updated_at
               FROM exams
               WHERE ($1::uuid IS NULL OR class_id = $1)
                 AND ($2::uuid IS NULL OR subject_id = $2)
                 AND ($3::uuid IS NULL OR academic_year_id = $3)
                 AND ($4::text IS NULL OR exam_type = $4)
                 AND ($5::bool IS NULL OR is_published = $5)
               ORDER BY exam_date DESC"#,
        )
        .bind(filters.class_id)
        .bind(filters.subject_id)
        .bind(filters.academic_year_id)
        .bind(filters.exam_type)
        .bind(filters.is_published)
        .fetch_all(db)
        .await?;

        Ok(exams)
    }

    /// Flip the published flag of an exam's results.
    #[instrument(skip(db))]
    pub async fn toggle_publish(db: &PgPool, exam_id: ExamId) -> Result<Exam, AppError> {
        let exam = sqlx::query_as::<_, Exam>(
            r#"UPDATE exams
               SET is_published = NOT is_published, updated_at = NOW()
               WHERE id = $1
               RETURNING id, name, exam_type, class_id, subject_id, academic_year_id,
                         total_marks, passing_marks, exam_date, is_published, created_at, updated_at"#,
        )
        .bind(exam_id)
        .fetch_optional(db)
        .await?
        .ok_or_else(|| AppError::not_found(anyhow::anyhow!("Exam not found")))?;

        Ok(exam)
    }

    /// Delete an exam.
    ///
    /// Refused once grades have been recorded for it.
    #[instrument(skip(db))]
    pub async fn delete_exam(db: &PgPool, exam_id: ExamId) -> Result<(), AppError> {
        let graded = sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS(SELECT 1 FROM grades WHERE exam_id = $1)",
        )
        .bind(exam_id)
        .fetch_one(db)
        .await?;

        if graded {
            return Err(AppError::has_dependents(anyhow::anyhow!(
                "Cannot delete an exam with recorded grades"
            )));
        }

        let result = sqlx::query("DELETE FROM exams WHERE id = $1")
            .bind(exam_id)
            .execute(db)
            .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::not_found(anyhow::anyhow!("Exam not found")));
        }

        Ok(())
    }

    /// Aggregate statistics for one exam across all recorded grades.
    ///
    /// All-zero when the exam has no grades yet.
    #[instrument(skip(db))]
    pub async fn exam_statistics(db: &PgPool, exam_id: ExamId) -> Result<ExamStatistics, AppError> {
        let exam = Self::get_exam(db, exam_id).await?;

        let (total, average, highest, lowest, passing) =
            sqlx::query_as::<_, (i64, f64, f64, f64, i64)>(
                r#"SELECT COUNT(*),
                          COALESCE(AVG(obtained_marks), 0),
                          COALESCE(MAX(obtained_marks), 0),
                          COALESCE(MIN(obtained_marks), 0),
                          COUNT(*) FILTER (WHERE obtained_marks >= $2)
                   FROM grades WHERE exam_id = $1"#,
            )
            .bind(exam_id)
            .bind(exam.passing_marks)
            .fetch_one(db)
            .await?;

        let pass_percentage = if total > 0 {
            round2(passing as f64 / total as f64 * 100.0)
        } else {
            0.0
        };

        Ok(ExamStatistics {
            total_students: total,
            average_marks: round2(average),
            highest_marks: highest,
            lowest_marks: lowest,
            pass_percentage,
            passing_students: passing,
            failing_students: total - passing,
        })
    }
}
