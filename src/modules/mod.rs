pub mod academic_years;
pub mod attendance;
pub mod classes;
pub mod enrollments;
pub mod exams;
pub mod fees;
pub mod grades;
pub mod parents;
pub mod students;
pub mod subjects;
pub mod teachers;
