use serde::Serialize;

use rollbook_core::PaginationMeta;

pub use rollbook_models::ids::StudentId;
pub use rollbook_models::students::{
    CreateStudentDto, Student, StudentFilterParams, StudentStatistics, StudentStatus,
    UpdateStudentDto,
};

/// One page of the student listing.
#[derive(Serialize, Debug)]
pub struct PaginatedStudentsResponse {
    pub data: Vec<Student>,
    pub meta: PaginationMeta,
}
