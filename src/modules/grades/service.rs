use std::collections::HashMap;

use sqlx::PgPool;
use tracing::instrument;
use validator::Validate;

use rollbook_core::{AppError, is_foreign_key_violation, is_unique_violation};
use rollbook_models::exams::Exam;
use rollbook_models::ids::{ClassRoomId, ExamId, GradeId, StudentId, TeacherId};

use crate::modules::exams::ExamService;
use crate::modules::grades::model::{
    BulkCreateGradesResult, BulkGradeEntry, ClassGradeReport, ClassGradeStatistics,
    CreateGradeDto, Grade, GradeFilterParams, GradeReportFilters, GradeWithExam,
    StudentGradeReport, StudentGradeStatistics, grade_letter, percentage, round2,
};

const GRADE_WITH_EXAM_SELECT: &str = r#"
    SELECT g.id, g.student_id, g.exam_id, g.obtained_marks, g.grade_letter, g.remarks,
           e.name AS exam_name, e.exam_date, e.subject_id, e.total_marks, e.passing_marks,
           g.created_at
    FROM grades g
    JOIN exams e ON e.id = g.exam_id"#;

pub struct GradeService;

impl GradeService {
    /// Record a grade for one student on one exam.
    ///
    /// The letter is derived from the percentage at write time and stored as
    /// a cache; reads always re-derive from the marks.
    #[instrument(skip(db))]
    pub async fn create_grade(db: &PgPool, dto: CreateGradeDto) -> Result<Grade, AppError> {
        dto.validate().map_err(AppError::validation)?;

        let exam = ExamService::get_exam(db, dto.exam_id).await?;
        Self::check_marks(dto.obtained_marks, &exam)?;

        let letter = grade_letter(percentage(dto.obtained_marks, exam.total_marks));

        let grade = sqlx::query_as::<_, Grade>(
            r#"INSERT INTO grades (student_id, exam_id, obtained_marks, grade_letter, remarks, created_by)
               VALUES ($1, $2, $3, $4, $5, $6)
               RETURNING id, student_id, exam_id, obtained_marks, grade_letter, remarks, created_by, created_at, updated_at"#,
        )
        .bind(dto.student_id)
        .bind(dto.exam_id)
        .bind(dto.obtained_marks)
        .bind(letter)
        .bind(&dto.remarks)
        .bind(dto.created_by)
        .fetch_one(db)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                return AppError::duplicate_grade(anyhow::anyhow!(
                    "A grade already exists for this student and exam"
                ));
            }
            if is_foreign_key_violation(&e) {
                return AppError::not_found(anyhow::anyhow!("Student or teacher not found"));
            }
            AppError::from(e)
        })?;

        Ok(grade)
    }

    /// Get a grade by ID.
    #[instrument(skip(db))]
    pub async fn get_grade(db: &PgPool, grade_id: GradeId) -> Result<Grade, AppError> {
        let grade = sqlx::query_as::<_, Grade>(
            r#"SELECT id, student_id, exam_id, obtained_marks, grade_letter, remarks, created_by, created_at, updated_at
               FROM grades WHERE id = $1"#,
        )
        .bind(grade_id)
        .fetch_optional(db)
        .await?
        .ok_or_else(|| AppError::not_found(anyhow::anyhow!("Grade not found")))?;

        Ok(grade)
    }

    /// Correct a grade's marks or remarks. The letter cache is recomputed.
    #[instrument(skip(db))]
    pub async fn update_grade(
        db: &PgPool,
        grade_id: GradeId,
        obtained_marks: f64,
        remarks: Option<String>,
    ) -> Result<Grade, AppError> {
        let existing = Self::get_grade(db, grade_id).await?;
        let exam = ExamService::get_exam(db, existing.exam_id).await?;
        Self::check_marks(obtained_marks, &exam)?;

        let letter = grade_letter(percentage(obtained_marks, exam.total_marks));
        let remarks = remarks.or(existing.remarks);

        let grade = sqlx::query_as::<_, Grade>(
            r#"UPDATE grades
               SET obtained_marks = $1, grade_letter = $2, remarks = $3, updated_at = NOW()
               WHERE id = $4
               RETURNING id, student_id, exam_id, obtained_marks, grade_letter, remarks, created_by, created_at, updated_at"#,
        )
        .bind(obtained_marks)
        .bind(letter)
        .bind(&remarks)
        .bind(grade_id)
        .fetch_one(db)
        .await?;

        Ok(grade)
    }

    /// Delete a grade.
    #[instrument(skip(db))]
    pub async fn delete_grade(db: &PgPool, grade_id: GradeId) -> Result<(), AppError> {
        let result = sqlx::query("DELETE FROM grades WHERE id = $1")
            .bind(grade_id)
            .execute(db)
            .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::not_found(anyhow::anyhow!("Grade not found")));
        }

        Ok(())
    }

    /// List grades with their exam context, newest exam first.
    #[instrument(skip(db))]
    pub async fn list_grades(
        db: &PgPool,
        filters: GradeFilterParams,
    ) -> Result<Vec<GradeWithExam>, AppError> {
        let query = format!(
            r#"{}
               WHERE ($1::uuid IS NULL OR g.student_id = $1)
                 AND ($2::uuid IS NULL OR g.exam_id = $2)
                 AND ($3::uuid IS NULL OR e.class_id = $3)
                 AND ($4::uuid IS NULL OR e.subject_id = $4)
                 AND ($5::uuid IS NULL OR e.academic_year_id = $5)
                 AND ($6::bool IS NULL OR (g.obtained_marks >= e.passing_marks) = $6)
               ORDER BY e.exam_date DESC, g.created_at DESC"#,
            GRADE_WITH_EXAM_SELECT
        );

        let grades = sqlx::query_as::<_, GradeWithExam>(&query)
            .bind(filters.student_id)
            .bind(filters.exam_id)
            .bind(filters.class_id)
            .bind(filters.subject_id)
            .bind(filters.academic_year_id)
            .bind(filters.passing)
            .fetch_all(db)
            .await?;

        Ok(grades)
    }

    /// Record grades for many students of one exam in a single transaction.
    ///
    /// Entries whose (student, exam) pair is already graded are skipped and
    /// reported, not failed. Any out-of-range mark aborts the whole batch.
    #[instrument(skip(db, entries), fields(entries = entries.len()))]
    pub async fn bulk_create_grades(
        db: &PgPool,
        exam_id: ExamId,
        entries: Vec<BulkGradeEntry>,
        created_by: Option<TeacherId>,
    ) -> Result<BulkCreateGradesResult, AppError> {
        let exam = ExamService::get_exam(db, exam_id).await?;

        let mut tx = db.begin().await?;
        let mut created = Vec::with_capacity(entries.len());
        let mut skipped_student_ids = Vec::new();

        for entry in entries {
            Self::check_marks(entry.obtained_marks, &exam)?;
            let letter = grade_letter(percentage(entry.obtained_marks, exam.total_marks));

            // ON CONFLICT DO NOTHING makes the duplicate check and the
            // insert one atomic statement, so concurrent batches cannot
            // race past each other.
            let inserted = sqlx::query_as::<_, Grade>(
                r#"INSERT INTO grades (student_id, exam_id, obtained_marks, grade_letter, remarks, created_by)
                   VALUES ($1, $2, $3, $4, $5, $6)
                   ON CONFLICT (student_id, exam_id) DO NOTHING
                   RETURNING id, student_id, exam_id, obtained_marks, grade_letter, remarks, created_by, created_at, updated_at"#,
            )
            .bind(entry.student_id)
            .bind(exam_id)
            .bind(entry.obtained_marks)
            .bind(letter)
            .bind(&entry.remarks)
            .bind(created_by)
            .fetch_optional(&mut *tx)
            .await
            .map_err(|e| {
                if is_foreign_key_violation(&e) {
                    return AppError::not_found(anyhow::anyhow!("Student or teacher not found"));
                }
                AppError::from(e)
            })?;

            match inserted {
                Some(grade) => created.push(grade),
                None => skipped_student_ids.push(entry.student_id),
            }
        }

        tx.commit().await?;

        Ok(BulkCreateGradesResult {
            created,
            skipped_student_ids,
        })
    }

    /// A student's report card: grades plus derived statistics, optionally
    /// narrowed to one year or subject.
    #[instrument(skip(db))]
    pub async fn student_report(
        db: &PgPool,
        student_id: StudentId,
        filters: GradeReportFilters,
    ) -> Result<StudentGradeReport, AppError> {
        let grades = Self::list_grades(
            db,
            GradeFilterParams {
                student_id: Some(student_id),
                subject_id: filters.subject_id,
                academic_year_id: filters.academic_year_id,
                ..Default::default()
            },
        )
        .await?;

        let statistics = Self::student_statistics(&grades);

        Ok(StudentGradeReport {
            student_id,
            grades,
            statistics,
        })
    }

    /// Grade distribution across every exam held in one class.
    #[instrument(skip(db))]
    pub async fn class_report(
        db: &PgPool,
        class_id: ClassRoomId,
        filters: GradeReportFilters,
    ) -> Result<ClassGradeReport, AppError> {
        let grades = Self::list_grades(
            db,
            GradeFilterParams {
                class_id: Some(class_id),
                subject_id: filters.subject_id,
                academic_year_id: filters.academic_year_id,
                ..Default::default()
            },
        )
        .await?;

        let statistics = Self::class_statistics(&grades);

        Ok(ClassGradeReport {
            class_id,
            grades,
            statistics,
        })
    }

    fn check_marks(obtained: f64, exam: &Exam) -> Result<(), AppError> {
        if obtained < 0.0 || obtained > exam.total_marks {
            return Err(AppError::out_of_range(anyhow::anyhow!(
                "Obtained marks must be between 0 and {}",
                exam.total_marks
            )));
        }
        Ok(())
    }

    fn student_statistics(grades: &[GradeWithExam]) -> StudentGradeStatistics {
        if grades.is_empty() {
            return StudentGradeStatistics {
                total_exams: 0,
                average_percentage: 0.0,
                highest_grade: None,
                lowest_grade: None,
                passing_exams: 0,
                failing_exams: 0,
            };
        }

        let percentages: Vec<f64> = grades.iter().map(GradeWithExam::percentage).collect();
        let average = round2(percentages.iter().sum::<f64>() / percentages.len() as f64);
        let best = percentages.iter().cloned().fold(f64::MIN, f64::max);
        let worst = percentages.iter().cloned().fold(f64::MAX, f64::min);
        let passing = grades.iter().filter(|g| g.is_passing()).count() as i64;

        StudentGradeStatistics {
            total_exams: grades.len() as i64,
            average_percentage: average,
            highest_grade: Some(grade_letter(best).to_string()),
            lowest_grade: Some(grade_letter(worst).to_string()),
            passing_exams: passing,
            failing_exams: grades.len() as i64 - passing,
        }
    }

    fn class_statistics(grades: &[GradeWithExam]) -> ClassGradeStatistics {
        if grades.is_empty() {
            return ClassGradeStatistics {
                total_grades: 0,
                average_percentage: 0.0,
                passing_percentage: 0.0,
                grade_distribution: HashMap::new(),
            };
        }

        let total = grades.len() as i64;
        let average = round2(
            grades.iter().map(GradeWithExam::percentage).sum::<f64>() / total as f64,
        );
        let passing = grades.iter().filter(|g| g.is_passing()).count() as i64;

        let mut grade_distribution: HashMap<String, i64> = HashMap::new();
        for grade in grades {
            let letter = grade_letter(grade.percentage()).to_string();
            *grade_distribution.entry(letter).or_insert(0) += 1;
        }

        ClassGradeStatistics {
            total_grades: total,
            average_percentage: average,
            passing_percentage: round2(passing as f64 / total as f64 * 100.0),
            grade_distribution,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use rollbook_core::ErrorKind;
    use rollbook_models::academic_years::CreateAcademicYearDto;
    use rollbook_models::classes::CreateClassRoomDto;
    use rollbook_models::exams::{CreateExamDto, ExamType};
    use rollbook_models::ids::AcademicYearId;
    use rollbook_models::students::CreateStudentDto;
    use rollbook_models::subjects::CreateSubjectDto;

    use crate::modules::academic_years::AcademicYearService;
    use crate::modules::classes::ClassService;
    use crate::modules::students::StudentService;
    use crate::modules::subjects::SubjectService;

    struct Fixture {
        year_id: AcademicYearId,
        class_id: ClassRoomId,
        exam_id: ExamId,
        students: Vec<StudentId>,
    }

    async fn seed(pool: &PgPool, student_count: usize) -> Fixture {
        let year = AcademicYearService::create_academic_year(
            pool,
            CreateAcademicYearDto {
                name: "2024-2025".to_string(),
                start_date: NaiveDate::from_ymd_opt(2024, 9, 1).unwrap(),
                end_date: NaiveDate::from_ymd_opt(2025, 6, 30).unwrap(),
            },
        )
        .await
        .unwrap();
        let class = ClassService::create_class(
            pool,
            CreateClassRoomDto {
                name: "Grade 7A".to_string(),
                academic_year_id: year.id,
                grade_level: 7,
                capacity: 30,
            },
        )
        .await
        .unwrap();
        let subject = SubjectService::create_subject(
            pool,
            CreateSubjectDto {
                name: "Mathematics".to_string(),
                code: "MATH".to_string(),
            },
        )
        .await
        .unwrap();
        let exam = ExamService::create_exam(
            pool,
            CreateExamDto {
                name: "Midterm".to_string(),
                exam_type: ExamType::Midterm,
                class_id: class.id,
                subject_id: subject.id,
                academic_year_id: year.id,
                total_marks: 100.0,
                passing_marks: 40.0,
                exam_date: NaiveDate::from_ymd_opt(2025, 1, 20).unwrap(),
            },
        )
        .await
        .unwrap();

        let mut students = Vec::new();
        for i in 0..student_count {
            let student = StudentService::create_student(
                pool,
                CreateStudentDto {
                    student_code: format!("STU-{}", i),
                    first_name: "Student".to_string(),
                    last_name: format!("Number{:02}", i),
                    date_of_birth: NaiveDate::from_ymd_opt(2012, 4, 17).unwrap(),
                },
            )
            .await
            .unwrap();
            students.push(student.id);
        }

        Fixture {
            year_id: year.id,
            class_id: class.id,
            exam_id: exam.id,
            students,
        }
    }

    #[sqlx::test(migrations = "./migrations")]
    async fn test_create_grade_derives_letter(pool: PgPool) {
        let fx = seed(&pool, 1).await;

        let grade = GradeService::create_grade(
            &pool,
            CreateGradeDto {
                student_id: fx.students[0],
                exam_id: fx.exam_id,
                obtained_marks: 85.0,
                remarks: None,
                created_by: None,
            },
        )
        .await
        .unwrap();
        assert_eq!(grade.grade_letter, "B");
    }

    #[sqlx::test(migrations = "./migrations")]
    async fn test_duplicate_grade_rejected(pool: PgPool) {
        let fx = seed(&pool, 1).await;
        let dto = || CreateGradeDto {
            student_id: fx.students[0],
            exam_id: fx.exam_id,
            obtained_marks: 85.0,
            remarks: None,
            created_by: None,
        };

        GradeService::create_grade(&pool, dto()).await.unwrap();
        let err = GradeService::create_grade(&pool, dto()).await.unwrap_err();
        assert_eq!(err.kind, ErrorKind::DuplicateGrade);
    }

    #[sqlx::test(migrations = "./migrations")]
    async fn test_marks_out_of_range(pool: PgPool) {
        let fx = seed(&pool, 1).await;

        let err = GradeService::create_grade(
            &pool,
            CreateGradeDto {
                student_id: fx.students[0],
                exam_id: fx.exam_id,
                obtained_marks: 110.0,
                remarks: None,
                created_by: None,
            },
        )
        .await
        .unwrap_err();
        assert_eq!(err.kind, ErrorKind::OutOfRange);
    }

    #[sqlx::test(migrations = "./migrations")]
    async fn test_update_grade_recomputes_letter(pool: PgPool) {
        let fx = seed(&pool, 1).await;
        let grade = GradeService::create_grade(
            &pool,
            CreateGradeDto {
                student_id: fx.students[0],
                exam_id: fx.exam_id,
                obtained_marks: 85.0,
                remarks: None,
                created_by: None,
            },
        )
        .await
        .unwrap();

        let updated = GradeService::update_grade(&pool, grade.id, 97.0, None)
            .await
            .unwrap();
        assert_eq!(updated.obtained_marks, 97.0);
        assert_eq!(updated.grade_letter, "A+");
    }

    #[sqlx::test(migrations = "./migrations")]
    async fn test_bulk_create_skips_already_graded(pool: PgPool) {
        let fx = seed(&pool, 3).await;

        GradeService::create_grade(
            &pool,
            CreateGradeDto {
                student_id: fx.students[1],
                exam_id: fx.exam_id,
                obtained_marks: 50.0,
                remarks: None,
                created_by: None,
            },
        )
        .await
        .unwrap();

        let entries = fx
            .students
            .iter()
            .map(|&student_id| BulkGradeEntry {
                student_id,
                obtained_marks: 70.0,
                remarks: None,
            })
            .collect();

        let result = GradeService::bulk_create_grades(&pool, fx.exam_id, entries, None)
            .await
            .unwrap();
        assert_eq!(result.created.len(), 2);
        assert_eq!(result.skipped_student_ids, vec![fx.students[1]]);

        // The pre-existing grade was not overwritten.
        let existing = GradeService::list_grades(
            &pool,
            GradeFilterParams {
                student_id: Some(fx.students[1]),
                ..Default::default()
            },
        )
        .await
        .unwrap();
        assert_eq!(existing[0].obtained_marks, 50.0);
    }

    #[sqlx::test(migrations = "./migrations")]
    async fn test_bulk_create_out_of_range_aborts_batch(pool: PgPool) {
        let fx = seed(&pool, 2).await;

        let entries = vec![
            BulkGradeEntry {
                student_id: fx.students[0],
                obtained_marks: 70.0,
                remarks: None,
            },
            BulkGradeEntry {
                student_id: fx.students[1],
                obtained_marks: 170.0,
                remarks: None,
            },
        ];

        let err = GradeService::bulk_create_grades(&pool, fx.exam_id, entries, None)
            .await
            .unwrap_err();
        assert_eq!(err.kind, ErrorKind::OutOfRange);

        // Nothing from the batch was committed.
        let count = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM grades")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(count, 0);
    }

    #[sqlx::test(migrations = "./migrations")]
    async fn test_exam_statistics_scenario(pool: PgPool) {
        let fx = seed(&pool, 4).await;

        for (student_id, marks) in fx.students.iter().zip([85.0, 39.0, 40.0, 100.0]) {
            GradeService::create_grade(
                &pool,
                CreateGradeDto {
                    student_id: *student_id,
                    exam_id: fx.exam_id,
                    obtained_marks: marks,
                    remarks: None,
                    created_by: None,
                },
            )
            .await
            .unwrap();
        }

        let stats = ExamService::exam_statistics(&pool, fx.exam_id).await.unwrap();
        assert_eq!(stats.total_students, 4);
        assert_eq!(stats.average_marks, 66.0);
        assert_eq!(stats.highest_marks, 100.0);
        assert_eq!(stats.lowest_marks, 39.0);
        assert_eq!(stats.passing_students, 3);
        assert_eq!(stats.failing_students, 1);
        assert_eq!(stats.pass_percentage, 75.0);
    }

    #[sqlx::test(migrations = "./migrations")]
    async fn test_student_report_statistics(pool: PgPool) {
        let fx = seed(&pool, 1).await;
        let subject = SubjectService::create_subject(
            &pool,
            CreateSubjectDto {
                name: "Science".to_string(),
                code: "SCI".to_string(),
            },
        )
        .await
        .unwrap();
        let second_exam = ExamService::create_exam(
            &pool,
            CreateExamDto {
                name: "Science Quiz".to_string(),
                exam_type: ExamType::Quiz,
                class_id: fx.class_id,
                subject_id: subject.id,
                academic_year_id: fx.year_id,
                total_marks: 50.0,
                passing_marks: 20.0,
                exam_date: NaiveDate::from_ymd_opt(2025, 2, 10).unwrap(),
            },
        )
        .await
        .unwrap();

        for (exam_id, marks) in [(fx.exam_id, 93.0), (second_exam.id, 15.0)] {
            GradeService::create_grade(
                &pool,
                CreateGradeDto {
                    student_id: fx.students[0],
                    exam_id,
                    obtained_marks: marks,
                    remarks: None,
                    created_by: None,
                },
            )
            .await
            .unwrap();
        }

        let report = GradeService::student_report(
            &pool,
            fx.students[0],
            GradeReportFilters::default(),
        )
        .await
        .unwrap();

        // 93% and 30%: average 61.5, best letter A, worst F.
        assert_eq!(report.statistics.total_exams, 2);
        assert_eq!(report.statistics.average_percentage, 61.5);
        assert_eq!(report.statistics.highest_grade.as_deref(), Some("A"));
        assert_eq!(report.statistics.lowest_grade.as_deref(), Some("F"));
        assert_eq!(report.statistics.passing_exams, 1);
        assert_eq!(report.statistics.failing_exams, 1);
    }

    #[sqlx::test(migrations = "./migrations")]
    async fn test_class_report_distribution(pool: PgPool) {
        let fx = seed(&pool, 3).await;

        for (student_id, marks) in fx.students.iter().zip([95.0, 85.0, 30.0]) {
            GradeService::create_grade(
                &pool,
                CreateGradeDto {
                    student_id: *student_id,
                    exam_id: fx.exam_id,
                    obtained_marks: marks,
                    remarks: None,
                    created_by: None,
                },
            )
            .await
            .unwrap();
        }

        let report = GradeService::class_report(&pool, fx.class_id, GradeReportFilters::default())
            .await
            .unwrap();

        assert_eq!(report.statistics.total_grades, 3);
        assert_eq!(report.statistics.grade_distribution.get("A"), Some(&1));
        assert_eq!(report.statistics.grade_distribution.get("B"), Some(&1));
        assert_eq!(report.statistics.grade_distribution.get("F"), Some(&1));
        assert_eq!(report.statistics.passing_percentage, 66.67);
    }
}
