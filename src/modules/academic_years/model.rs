pub use rollbook_models::academic_years::{AcademicYear, CreateAcademicYearDto, UpdateAcademicYearDto};
pub use rollbook_models::ids::AcademicYearId;
