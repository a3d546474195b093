pub use rollbook_models::classes::{ClassRoom, ClassRoomFilterParams, CreateClassRoomDto};
pub use rollbook_models::ids::ClassRoomId;
