mod common;

use common::{create_school_year, create_test_student};
use sqlx::PgPool;

use rollbook::modules::academic_years::AcademicYearService;
use rollbook::modules::enrollments::EnrollmentService;
use rollbook::modules::grades::GradeService;
use rollbook::modules::teachers::TeacherService;
use rollbook_core::ErrorKind;
use rollbook_models::enrollments::CreateEnrollmentDto;
use rollbook_models::exams::{CreateExamDto, ExamType};
use rollbook_models::grades::CreateGradeDto;
use rollbook_models::teachers::CreateClassAssignmentDto;

use rollbook::modules::exams::ExamService;

#[sqlx::test(migrations = "./migrations")]
async fn concurrent_enrollments_admit_exactly_one(pool: PgPool) {
    let school = create_school_year(&pool, "2024-2025", 2024).await;
    let student_id = create_test_student(&pool, "STU-1", "Diallo").await;

    let dto = || CreateEnrollmentDto {
        student_id,
        class_id: school.class_id,
        academic_year_id: school.year_id,
        enrollment_date: None,
    };

    let (a, b) = tokio::join!(
        EnrollmentService::create_enrollment(&pool, dto()),
        EnrollmentService::create_enrollment(&pool, dto()),
    );

    // Whichever write loses the race hits the partial unique index and gets
    // the same typed error as the precondition check.
    assert_eq!(a.is_ok() as u8 + b.is_ok() as u8, 1);
    let err = if a.is_err() { a.unwrap_err() } else { b.unwrap_err() };
    assert_eq!(err.kind, ErrorKind::DuplicateActiveEnrollment);

    let active = sqlx::query_scalar::<_, i64>(
        "SELECT COUNT(*) FROM enrollments WHERE student_id = $1 AND status = 'active'",
    )
    .bind(student_id)
    .fetch_one(&pool)
    .await
    .unwrap();
    assert_eq!(active, 1);
}

#[sqlx::test(migrations = "./migrations")]
async fn concurrent_assignments_admit_exactly_one(pool: PgPool) {
    let school = create_school_year(&pool, "2024-2025", 2024).await;

    let dto = || CreateClassAssignmentDto {
        teacher_id: school.teacher_id,
        class_id: school.class_id,
        subject_id: Some(school.subject_id),
        academic_year_id: school.year_id,
        is_primary: false,
    };

    let (a, b) = tokio::join!(
        TeacherService::create_assignment(&pool, dto()),
        TeacherService::create_assignment(&pool, dto()),
    );

    assert_eq!(a.is_ok() as u8 + b.is_ok() as u8, 1);
    let err = if a.is_err() { a.unwrap_err() } else { b.unwrap_err() };
    assert_eq!(err.kind, ErrorKind::DuplicateAssignment);
}

#[sqlx::test(migrations = "./migrations")]
async fn concurrent_grades_admit_exactly_one(pool: PgPool) {
    let school = create_school_year(&pool, "2024-2025", 2024).await;
    let student_id = create_test_student(&pool, "STU-1", "Diallo").await;
    let exam = ExamService::create_exam(
        &pool,
        CreateExamDto {
            name: "Quiz".to_string(),
            exam_type: ExamType::Quiz,
            class_id: school.class_id,
            subject_id: school.subject_id,
            academic_year_id: school.year_id,
            total_marks: 20.0,
            passing_marks: 10.0,
            exam_date: chrono::NaiveDate::from_ymd_opt(2025, 3, 10).unwrap(),
        },
    )
    .await
    .unwrap();

    let dto = |marks: f64| CreateGradeDto {
        student_id,
        exam_id: exam.id,
        obtained_marks: marks,
        remarks: None,
        created_by: None,
    };

    let (a, b) = tokio::join!(
        GradeService::create_grade(&pool, dto(15.0)),
        GradeService::create_grade(&pool, dto(16.0)),
    );

    assert_eq!(a.is_ok() as u8 + b.is_ok() as u8, 1);
    let err = if a.is_err() { a.unwrap_err() } else { b.unwrap_err() };
    assert_eq!(err.kind, ErrorKind::DuplicateGrade);

    let count = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM grades")
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(count, 1);
}

#[sqlx::test(migrations = "./migrations")]
async fn concurrent_promotions_leave_one_current_year(pool: PgPool) {
    let first = create_school_year(&pool, "2024-2025", 2024).await;
    let second = create_school_year(&pool, "2025-2026", 2025).await;

    let (a, b) = tokio::join!(
        AcademicYearService::set_current_academic_year(&pool, first.year_id),
        AcademicYearService::set_current_academic_year(&pool, second.year_id),
    );

    // Promotions may serialize (both succeed) or collide on the partial
    // unique index; a collision surfaces as a typed conflict, never a bare
    // database error.
    for result in [a, b] {
        if let Err(err) = result {
            assert_eq!(err.kind, ErrorKind::Conflict);
        }
    }

    let current = sqlx::query_scalar::<_, i64>(
        "SELECT COUNT(*) FROM academic_years WHERE is_current = TRUE",
    )
    .fetch_one(&pool)
    .await
    .unwrap();
    assert_eq!(current, 1);
}
