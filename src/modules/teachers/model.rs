pub use rollbook_models::ids::{ClassAssignmentId, TeacherId};
pub use rollbook_models::teachers::{
    ClassAssignment, ClassAssignmentFilterParams, CreateClassAssignmentDto, CreateTeacherDto,
    Teacher, TeacherStatus,
};
