pub use rollbook_models::ids::{ParentId, StudentParentLinkId};
pub use rollbook_models::parents::{
    CreateParentDto, CreateStudentParentLinkDto, Parent, StudentParentLink,
    UpdateStudentParentLinkDto,
};
