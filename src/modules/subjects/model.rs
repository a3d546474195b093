pub use rollbook_models::ids::SubjectId;
pub use rollbook_models::subjects::{CreateSubjectDto, Subject};
