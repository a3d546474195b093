use chrono::Utc;
use sqlx::PgPool;
use tracing::instrument;
use validator::Validate;

use rollbook_core::{AppError, PaginationMeta, PaginationParams, is_foreign_key_violation, is_unique_violation};
use rollbook_models::enrollments::Enrollment;
use rollbook_models::ids::{ClassRoomId, StudentId};

use crate::modules::students::model::{
    CreateStudentDto, PaginatedStudentsResponse, Student, StudentFilterParams, StudentStatistics,
    UpdateStudentDto,
};

/// Shared filter clause for the student listing; `s` is the students table.
/// $1 status, $2 class, $3 year, $4 search. The class and year filters match
/// through active enrollments and are skipped entirely when both are absent.
const STUDENT_FILTER_WHERE: &str = r#"
    ($1::text IS NULL OR s.status = $1)
    AND (($2::uuid IS NULL AND $3::uuid IS NULL) OR EXISTS (
        SELECT 1 FROM enrollments e
        WHERE e.student_id = s.id
          AND e.status = 'active'
          AND ($2::uuid IS NULL OR e.class_id = $2)
          AND ($3::uuid IS NULL OR e.academic_year_id = $3)))
    AND ($4::text IS NULL
         OR s.first_name ILIKE '%' || $4 || '%'
         OR s.last_name ILIKE '%' || $4 || '%'
         OR s.student_code ILIKE '%' || $4 || '%')"#;

/// Escapes LIKE metacharacters so a search term matches literally.
fn escape_like(term: &str) -> String {
    term.replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_")
}

pub struct StudentService;

impl StudentService {
    /// Register a new student. Student codes are unique system-wide.
    #[instrument(skip(db))]
    pub async fn create_student(db: &PgPool, dto: CreateStudentDto) -> Result<Student, AppError> {
        dto.validate().map_err(AppError::validation)?;

        let student = sqlx::query_as::<_, Student>(
            r#"INSERT INTO students (student_code, first_name, last_name, date_of_birth)
               VALUES ($1, $2, $3, $4)
               RETURNING id, student_code, first_name, last_name, date_of_birth, status, created_at, updated_at"#,
        )
        .bind(&dto.student_code)
        .bind(&dto.first_name)
        .bind(&dto.last_name)
        .bind(dto.date_of_birth)
        .fetch_one(db)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                return AppError::conflict(anyhow::anyhow!(
                    "A student with this student code already exists"
                ));
            }
            AppError::from(e)
        })?;

        Ok(student)
    }

    /// Get a student by ID.
    #[instrument(skip(db))]
    pub async fn get_student(db: &PgPool, student_id: StudentId) -> Result<Student, AppError> {
        let student = sqlx::query_as::<_, Student>(
            r#"SELECT id, student_code, first_name, last_name, date_of_birth, status, created_at, updated_at
               FROM students WHERE id = $1"#,
        )
        .bind(student_id)
        .fetch_optional(db)
        .await?
        .ok_or_else(|| AppError::not_found(anyhow::anyhow!("Student not found")))?;

        Ok(student)
    }

    /// Update a student's personal details or status.
    #[instrument(skip(db))]
    pub async fn update_student(
        db: &PgPool,
        student_id: StudentId,
        dto: UpdateStudentDto,
    ) -> Result<Student, AppError> {
        dto.validate().map_err(AppError::validation)?;

        let existing = Self::get_student(db, student_id).await?;

        let first_name = dto.first_name.unwrap_or(existing.first_name);
        let last_name = dto.last_name.unwrap_or(existing.last_name);
        let date_of_birth = dto.date_of_birth.unwrap_or(existing.date_of_birth);
        let status = dto.status.unwrap_or(existing.status);

        let student = sqlx::query_as::<_, Student>(
            r#"UPDATE students
               SET first_name = $1, last_name = $2, date_of_birth = $3, status = $4, updated_at = NOW()
               WHERE id = $5
               RETURNING id, student_code, first_name, last_name, date_of_birth, status, created_at, updated_at"#,
        )
        .bind(&first_name)
        .bind(&last_name)
        .bind(date_of_birth)
        .bind(status)
        .bind(student_id)
        .fetch_one(db)
        .await?;

        Ok(student)
    }

    /// Get a paginated page of students matching the filters.
    #[instrument(skip(db))]
    pub async fn list_students(
        db: &PgPool,
        filters: StudentFilterParams,
        pagination: PaginationParams,
    ) -> Result<PaginatedStudentsResponse, AppError> {
        let limit = pagination.limit();
        let offset = pagination.offset();
        let search = filters.search.as_deref().map(escape_like);

        let count_query = format!(
            "SELECT COUNT(*) FROM students s WHERE {}",
            STUDENT_FILTER_WHERE
        );
        let total = sqlx::query_scalar::<_, i64>(&count_query)
            .bind(filters.status)
            .bind(filters.class_id)
            .bind(filters.academic_year_id)
            .bind(&search)
            .fetch_one(db)
            .await?;

        let data_query = format!(
            r#"SELECT s.id, s.student_code, s.first_name, s.last_name, s.date_of_birth,
                      s.status, s.created_at, s.updated_at
               FROM students s
               WHERE {}
               ORDER BY s.last_name, s.first_name
               LIMIT {} OFFSET {}"#,
            STUDENT_FILTER_WHERE, limit, offset
        );
        let students = sqlx::query_as::<_, Student>(&data_query)
            .bind(filters.status)
            .bind(filters.class_id)
            .bind(filters.academic_year_id)
            .bind(&search)
            .fetch_all(db)
            .await?;

        let has_more = offset + limit < total;

        Ok(PaginatedStudentsResponse {
            data: students,
            meta: PaginationMeta {
                total,
                limit,
                offset: Some(offset),
                page: pagination.page(),
                has_more,
            },
        })
    }

    /// Move a student to another class.
    ///
    /// Withdraws the student's active enrollment in the target class's
    /// academic year and opens a new active enrollment in the target class,
    /// in one transaction. The full enrollment history is preserved.
    #[instrument(skip(db))]
    pub async fn transfer_student(
        db: &PgPool,
        student_id: StudentId,
        new_class_id: ClassRoomId,
    ) -> Result<Enrollment, AppError> {
        let year_id = sqlx::query_scalar::<_, rollbook_models::ids::AcademicYearId>(
            "SELECT academic_year_id FROM classes WHERE id = $1",
        )
        .bind(new_class_id)
        .fetch_optional(db)
        .await?
        .ok_or_else(|| AppError::not_found(anyhow::anyhow!("Class not found")))?;

        let mut tx = db.begin().await?;

        sqlx::query(
            r#"UPDATE enrollments
               SET status = 'withdrawn', updated_at = NOW()
               WHERE student_id = $1 AND academic_year_id = $2 AND status = 'active'"#,
        )
        .bind(student_id)
        .bind(year_id)
        .execute(&mut *tx)
        .await?;

        let enrollment = sqlx::query_as::<_, Enrollment>(
            r#"INSERT INTO enrollments (student_id, class_id, academic_year_id, enrollment_date)
               VALUES ($1, $2, $3, $4)
               RETURNING id, student_id, class_id, academic_year_id, enrollment_date, status, created_at, updated_at"#,
        )
        .bind(student_id)
        .bind(new_class_id)
        .bind(year_id)
        .bind(Utc::now().date_naive())
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| {
            if is_foreign_key_violation(&e) {
                return AppError::not_found(anyhow::anyhow!("Student not found"));
            }
            AppError::from(e)
        })?;

        tx.commit().await?;

        Ok(enrollment)
    }

    /// Delete a student.
    ///
    /// Refused while the student has an active enrollment; withdraw first.
    #[instrument(skip(db))]
    pub async fn delete_student(db: &PgPool, student_id: StudentId) -> Result<(), AppError> {
        let active = sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS(SELECT 1 FROM enrollments WHERE student_id = $1 AND status = 'active')",
        )
        .bind(student_id)
        .fetch_one(db)
        .await?;

        if active {
            return Err(AppError::has_dependents(anyhow::anyhow!(
                "Cannot delete student with an active enrollment"
            )));
        }

        let result = sqlx::query("DELETE FROM students WHERE id = $1")
            .bind(student_id)
            .execute(db)
            .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::not_found(anyhow::anyhow!("Student not found")));
        }

        Ok(())
    }

    /// Headcount statistics across the student body.
    ///
    /// `enrolled_this_year` counts distinct students with an active
    /// enrollment in the current academic year, 0 when no year is current.
    #[instrument(skip(db))]
    pub async fn student_statistics(db: &PgPool) -> Result<StudentStatistics, AppError> {
        let (total, active, graduated, transferred) = sqlx::query_as::<_, (i64, i64, i64, i64)>(
            r#"SELECT COUNT(*),
                      COUNT(*) FILTER (WHERE status = 'active'),
                      COUNT(*) FILTER (WHERE status = 'graduated'),
                      COUNT(*) FILTER (WHERE status = 'transferred')
               FROM students"#,
        )
        .fetch_one(db)
        .await?;

        let enrolled_this_year = sqlx::query_scalar::<_, i64>(
            r#"SELECT COUNT(DISTINCT e.student_id)
               FROM enrollments e
               JOIN academic_years y ON y.id = e.academic_year_id
               WHERE e.status = 'active' AND y.is_current = TRUE"#,
        )
        .fetch_one(db)
        .await?;

        Ok(StudentStatistics {
            total_students: total,
            active_students: active,
            graduated_students: graduated,
            transferred_students: transferred,
            enrolled_this_year,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use rollbook_core::ErrorKind;
    use rollbook_models::enrollments::EnrollmentStatus;
    use rollbook_models::students::StudentStatus;

    use crate::modules::academic_years::AcademicYearService;
    use crate::modules::classes::ClassService;
    use crate::modules::enrollments::EnrollmentService;
    use rollbook_models::academic_years::CreateAcademicYearDto;
    use rollbook_models::classes::CreateClassRoomDto;
    use rollbook_models::enrollments::CreateEnrollmentDto;

    fn student_dto(code: &str, first: &str, last: &str) -> CreateStudentDto {
        CreateStudentDto {
            student_code: code.to_string(),
            first_name: first.to_string(),
            last_name: last.to_string(),
            date_of_birth: NaiveDate::from_ymd_opt(2012, 4, 17).unwrap(),
        }
    }

    async fn seed_class(pool: &PgPool, class_name: &str) -> (rollbook_models::ids::AcademicYearId, ClassRoomId) {
        let year = AcademicYearService::create_academic_year(
            pool,
            CreateAcademicYearDto {
                name: format!("Year for {}", class_name),
                start_date: NaiveDate::from_ymd_opt(2024, 9, 1).unwrap(),
                end_date: NaiveDate::from_ymd_opt(2025, 6, 30).unwrap(),
            },
        )
        .await
        .unwrap();
        let class = ClassService::create_class(
            pool,
            CreateClassRoomDto {
                name: class_name.to_string(),
                academic_year_id: year.id,
                grade_level: 7,
                capacity: 30,
            },
        )
        .await
        .unwrap();
        (year.id, class.id)
    }

    #[sqlx::test(migrations = "./migrations")]
    async fn test_create_student_duplicate_code(pool: PgPool) {
        StudentService::create_student(&pool, student_dto("STU-1", "Amina", "Diallo"))
            .await
            .unwrap();

        let err = StudentService::create_student(&pool, student_dto("STU-1", "Kofi", "Mensah"))
            .await
            .unwrap_err();
        assert_eq!(err.kind, ErrorKind::Conflict);
    }

    #[sqlx::test(migrations = "./migrations")]
    async fn test_update_student_partial(pool: PgPool) {
        let student = StudentService::create_student(&pool, student_dto("STU-1", "Amina", "Diallo"))
            .await
            .unwrap();

        let updated = StudentService::update_student(
            &pool,
            student.id,
            UpdateStudentDto {
                last_name: Some("Traore".to_string()),
                ..Default::default()
            },
        )
        .await
        .unwrap();

        assert_eq!(updated.first_name, "Amina");
        assert_eq!(updated.last_name, "Traore");
    }

    #[sqlx::test(migrations = "./migrations")]
    async fn test_list_students_search_and_pagination(pool: PgPool) {
        for i in 0..15 {
            StudentService::create_student(
                &pool,
                student_dto(&format!("STU-{}", i), "Amina", &format!("Family{:02}", i)),
            )
            .await
            .unwrap();
        }

        let page = StudentService::list_students(
            &pool,
            StudentFilterParams::default(),
            PaginationParams {
                limit: Some(10),
                offset: Some(0),
                page: None,
            },
        )
        .await
        .unwrap();
        assert_eq!(page.data.len(), 10);
        assert_eq!(page.meta.total, 15);
        assert!(page.meta.has_more);

        let hits = StudentService::list_students(
            &pool,
            StudentFilterParams {
                search: Some("family03".to_string()),
                ..Default::default()
            },
            PaginationParams::default(),
        )
        .await
        .unwrap();
        assert_eq!(hits.data.len(), 1);
        assert_eq!(hits.data[0].last_name, "Family03");
    }

    #[sqlx::test(migrations = "./migrations")]
    async fn test_search_treats_wildcards_literally(pool: PgPool) {
        StudentService::create_student(&pool, student_dto("STU-1", "Amina", "Scored100"))
            .await
            .unwrap();
        StudentService::create_student(&pool, student_dto("STU-2", "Kofi", "Gave100%"))
            .await
            .unwrap();

        let hits = StudentService::list_students(
            &pool,
            StudentFilterParams {
                search: Some("100%".to_string()),
                ..Default::default()
            },
            PaginationParams::default(),
        )
        .await
        .unwrap();
        assert_eq!(hits.data.len(), 1);
        assert_eq!(hits.data[0].last_name, "Gave100%");

        // An underscore must not act as a single-character wildcard.
        let hits = StudentService::list_students(
            &pool,
            StudentFilterParams {
                search: Some("STU_".to_string()),
                ..Default::default()
            },
            PaginationParams::default(),
        )
        .await
        .unwrap();
        assert!(hits.data.is_empty());
    }

    #[sqlx::test(migrations = "./migrations")]
    async fn test_transfer_student_preserves_history(pool: PgPool) {
        let (year_id, class_a) = seed_class(&pool, "Grade 7A").await;
        let class_b = ClassService::create_class(
            &pool,
            CreateClassRoomDto {
                name: "Grade 7B".to_string(),
                academic_year_id: year_id,
                grade_level: 7,
                capacity: 30,
            },
        )
        .await
        .unwrap();

        let student = StudentService::create_student(&pool, student_dto("STU-1", "Amina", "Diallo"))
            .await
            .unwrap();
        EnrollmentService::create_enrollment(
            &pool,
            CreateEnrollmentDto {
                student_id: student.id,
                class_id: class_a,
                academic_year_id: year_id,
                enrollment_date: None,
            },
        )
        .await
        .unwrap();

        let new_enrollment = StudentService::transfer_student(&pool, student.id, class_b.id)
            .await
            .unwrap();
        assert_eq!(new_enrollment.class_id, class_b.id);
        assert_eq!(new_enrollment.status, EnrollmentStatus::Active);

        // The old enrollment is withdrawn, not deleted.
        let rows = sqlx::query_as::<_, Enrollment>(
            r#"SELECT id, student_id, class_id, academic_year_id, enrollment_date, status, created_at, updated_at
               FROM enrollments WHERE student_id = $1 ORDER BY created_at"#,
        )
        .bind(student.id)
        .fetch_all(&pool)
        .await
        .unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].status, EnrollmentStatus::Withdrawn);
        assert_eq!(rows[1].status, EnrollmentStatus::Active);
    }

    #[sqlx::test(migrations = "./migrations")]
    async fn test_delete_student_with_active_enrollment(pool: PgPool) {
        let (year_id, class_id) = seed_class(&pool, "Grade 7A").await;
        let student = StudentService::create_student(&pool, student_dto("STU-1", "Amina", "Diallo"))
            .await
            .unwrap();
        EnrollmentService::create_enrollment(
            &pool,
            CreateEnrollmentDto {
                student_id: student.id,
                class_id,
                academic_year_id: year_id,
                enrollment_date: None,
            },
        )
        .await
        .unwrap();

        let err = StudentService::delete_student(&pool, student.id)
            .await
            .unwrap_err();
        assert_eq!(err.kind, ErrorKind::HasDependents);
    }

    #[sqlx::test(migrations = "./migrations")]
    async fn test_student_statistics(pool: PgPool) {
        let (year_id, class_id) = seed_class(&pool, "Grade 7A").await;
        AcademicYearService::set_current_academic_year(&pool, year_id)
            .await
            .unwrap();

        let s1 = StudentService::create_student(&pool, student_dto("STU-1", "Amina", "Diallo"))
            .await
            .unwrap();
        let s2 = StudentService::create_student(&pool, student_dto("STU-2", "Kofi", "Mensah"))
            .await
            .unwrap();
        StudentService::update_student(
            &pool,
            s2.id,
            UpdateStudentDto {
                status: Some(StudentStatus::Graduated),
                ..Default::default()
            },
        )
        .await
        .unwrap();
        EnrollmentService::create_enrollment(
            &pool,
            CreateEnrollmentDto {
                student_id: s1.id,
                class_id,
                academic_year_id: year_id,
                enrollment_date: None,
            },
        )
        .await
        .unwrap();

        let stats = StudentService::student_statistics(&pool).await.unwrap();
        assert_eq!(
            stats,
            StudentStatistics {
                total_students: 2,
                active_students: 1,
                graduated_students: 1,
                transferred_students: 0,
                enrolled_this_year: 1,
            }
        );
    }
}
