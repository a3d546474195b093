//! # Rollbook Models
//!
//! Domain models and DTOs for the rollbook school records core: database
//! entities, create/update DTOs with validation rules, query filter
//! parameters, and the statistics shapes produced by the aggregators.
//!
//! # Modules
//!
//! - [`ids`]: strongly-typed UUID newtypes for every entity
//! - [`academic_years`], [`classes`], [`subjects`]: the academic scaffolding
//! - [`students`], [`enrollments`]: students and their class membership
//! - [`teachers`]: teachers and class assignments
//! - [`exams`], [`grades`]: assessments and the letter-grade derivation
//! - [`attendance`]: attendance records and report shapes
//! - [`parents`], [`fees`]: guardians and fee tracking

pub mod academic_years;
pub mod attendance;
pub mod classes;
pub mod enrollments;
pub mod exams;
pub mod fees;
pub mod grades;
pub mod ids;
pub mod parents;
pub mod students;
pub mod subjects;
pub mod teachers;

// Re-export commonly used types at crate root for convenience
pub use academic_years::{AcademicYear, CreateAcademicYearDto, UpdateAcademicYearDto};

pub use classes::{ClassRoom, ClassRoomFilterParams, CreateClassRoomDto};

pub use subjects::{CreateSubjectDto, Subject};

pub use students::{
    CreateStudentDto, Student, StudentFilterParams, StudentStatistics, StudentStatus,
    UpdateStudentDto,
};

pub use enrollments::{
    CreateEnrollmentDto, Enrollment, EnrollmentFilterParams, EnrollmentStatus,
};

pub use teachers::{
    ClassAssignment, ClassAssignmentFilterParams, CreateClassAssignmentDto, CreateTeacherDto,
    Teacher, TeacherStatus,
};

pub use exams::{CreateExamDto, Exam, ExamFilterParams, ExamStatistics, ExamType};

pub use grades::{
    BulkCreateGradesResult, BulkGradeEntry, ClassGradeReport, ClassGradeStatistics,
    CreateGradeDto, Grade, GradeFilterParams, GradeReportFilters, GradeWithExam,
    StudentGradeReport, StudentGradeStatistics, grade_letter, is_passing, percentage, round2,
};

pub use attendance::{
    Attendance, AttendanceFilterParams, AttendanceStatus, ClassAttendanceEntry,
    ClassAttendanceStats, ClassDaySummary, CreateAttendanceDto, DailyClassReport,
    MonthlyAttendanceReport, PeriodType, StudentAttendanceStats, UpdateAttendanceDto,
};

pub use parents::{
    CreateParentDto, CreateStudentParentLinkDto, Parent, StudentParentLink,
    UpdateStudentParentLinkDto,
};

pub use fees::{CreateFeeDto, Fee, FeePayment, StudentFee, StudentFeeStatus};
