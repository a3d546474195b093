pub use rollbook_models::exams::{
    CreateExamDto, Exam, ExamFilterParams, ExamStatistics, ExamType,
};
pub use rollbook_models::ids::ExamId;
