pub use rollbook_models::enrollments::{
    CreateEnrollmentDto, Enrollment, EnrollmentFilterParams, EnrollmentStatus,
};
pub use rollbook_models::ids::EnrollmentId;
