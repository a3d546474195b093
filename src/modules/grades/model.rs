pub use rollbook_models::grades::{
    BulkCreateGradesResult, BulkGradeEntry, ClassGradeReport, ClassGradeStatistics,
    CreateGradeDto, Grade, GradeFilterParams, GradeReportFilters, GradeWithExam,
    StudentGradeReport, StudentGradeStatistics, grade_letter, is_passing, percentage, round2,
};
pub use rollbook_models::ids::GradeId;
