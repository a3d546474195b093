use chrono::NaiveDate;
use sqlx::PgPool;

use rollbook::modules::academic_years::AcademicYearService;
use rollbook::modules::classes::ClassService;
use rollbook::modules::students::StudentService;
use rollbook::modules::subjects::SubjectService;
use rollbook::modules::teachers::TeacherService;
use rollbook_models::academic_years::CreateAcademicYearDto;
use rollbook_models::classes::CreateClassRoomDto;
use rollbook_models::ids::{AcademicYearId, ClassRoomId, StudentId, SubjectId, TeacherId};
use rollbook_models::students::CreateStudentDto;
use rollbook_models::subjects::CreateSubjectDto;
use rollbook_models::teachers::CreateTeacherDto;

/// A school year with one class, one subject, and one teacher, ready for
/// enrollment and marking.
#[allow(dead_code)]
pub struct TestSchoolYear {
    pub year_id: AcademicYearId,
    pub class_id: ClassRoomId,
    pub subject_id: SubjectId,
    pub teacher_id: TeacherId,
}

#[allow(dead_code)]
pub async fn create_school_year(pool: &PgPool, name: &str, start_year: i32) -> TestSchoolYear {
    let year = AcademicYearService::create_academic_year(
        pool,
        CreateAcademicYearDto {
            name: name.to_string(),
            start_date: NaiveDate::from_ymd_opt(start_year, 9, 1).unwrap(),
            end_date: NaiveDate::from_ymd_opt(start_year + 1, 6, 30).unwrap(),
        },
    )
    .await
    .unwrap();

    let class = ClassService::create_class(
        pool,
        CreateClassRoomDto {
            name: format!("Grade 7A {}", name),
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
            name: format!("Mathematics {}", name),
            code: format!("MATH-{}", start_year),
        },
    )
    .await
    .unwrap();

    let teacher = TeacherService::create_teacher(
        pool,
        CreateTeacherDto {
            employee_code: format!("EMP-{}", start_year),
            first_name: "Fatou".to_string(),
            last_name: "Sow".to_string(),
            hire_date: NaiveDate::from_ymd_opt(2020, 8, 15).unwrap(),
        },
    )
    .await
    .unwrap();

    TestSchoolYear {
        year_id: year.id,
        class_id: class.id,
        subject_id: subject.id,
        teacher_id: teacher.id,
    }
}

#[allow(dead_code)]
pub async fn create_test_student(pool: &PgPool, code: &str, last_name: &str) -> StudentId {
    StudentService::create_student(
        pool,
        CreateStudentDto {
            student_code: code.to_string(),
            first_name: "Amina".to_string(),
            last_name: last_name.to_string(),
            date_of_birth: NaiveDate::from_ymd_opt(2012, 4, 17).unwrap(),
        },
    )
    .await
    .unwrap()
    .id
}
