//! Grade models, DTOs, and the letter-grade derivation.
//!
//! Percentage, letter, and pass/fail are pure functions of the obtained
//! marks and the exam's mark bounds. The stored `grade_letter` column is a
//! cache recomputed on every write; it is never treated as ground truth.

use std::collections::HashMap;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use validator::Validate;

use crate::ids::{AcademicYearId, ExamId, GradeId, StudentId, SubjectId, TeacherId};

/// Rounds to two decimal places.
#[inline]
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Percentage score for `obtained` marks out of `total`, rounded to two
/// decimals. Zero when the total is not positive.
pub fn percentage(obtained: f64, total: f64) -> f64 {
    if total > 0.0 {
        round2(obtained / total * 100.0)
    } else {
        0.0
    }
}

/// Letter grade for a percentage score.
///
/// Thresholds are inclusive lower bounds evaluated top-down; the first match
/// wins.
pub fn grade_letter(percentage: f64) -> &'static str {
    if percentage >= 97.0 {
        "A+"
    } else if percentage >= 93.0 {
        "A"
    } else if percentage >= 90.0 {
        "A-"
    } else if percentage >= 87.0 {
        "B+"
    } else if percentage >= 83.0 {
        "B"
    } else if percentage >= 80.0 {
        "B-"
    } else if percentage >= 77.0 {
        "C+"
    } else if percentage >= 73.0 {
        "C"
    } else if percentage >= 70.0 {
        "C-"
    } else if percentage >= 67.0 {
        "D+"
    } else if percentage >= 63.0 {
        "D"
    } else if percentage >= 60.0 {
        "D-"
    } else {
        "F"
    }
}

/// Whether `obtained` marks clear the exam's passing bar.
#[inline]
pub fn is_passing(obtained: f64, passing_marks: f64) -> bool {
    obtained >= passing_marks
}

/// A student's graded result for one exam.
#[derive(Serialize, FromRow, Debug, Clone)]
pub struct Grade {
    pub id: GradeId,
    pub student_id: StudentId,
    pub exam_id: ExamId,
    pub obtained_marks: f64,
    /// Cached derivation of [`grade_letter`]; recomputed on every write.
    pub grade_letter: String,
    pub remarks: Option<String>,
    /// Teacher who recorded the grade.
    pub created_by: Option<TeacherId>,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub updated_at: chrono::DateTime<chrono::Utc>,
}

/// A grade joined with the exam fields the derivations need.
#[derive(Serialize, FromRow, Debug, Clone)]
pub struct GradeWithExam {
    pub id: GradeId,
    pub student_id: StudentId,
    pub exam_id: ExamId,
    pub obtained_marks: f64,
    pub grade_letter: String,
    pub remarks: Option<String>,
    pub exam_name: String,
    pub exam_date: NaiveDate,
    pub subject_id: SubjectId,
    pub total_marks: f64,
    pub passing_marks: f64,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

impl GradeWithExam {
    /// Percentage score for this grade.
    pub fn percentage(&self) -> f64 {
        percentage(self.obtained_marks, self.total_marks)
    }

    /// Whether this grade clears the exam's passing bar.
    pub fn is_passing(&self) -> bool {
        is_passing(self.obtained_marks, self.passing_marks)
    }
}

/// DTO for recording a grade.
#[derive(Deserialize, Debug, Validate)]
pub struct CreateGradeDto {
    pub student_id: StudentId,
    pub exam_id: ExamId,
    pub obtained_marks: f64,
    #[validate(length(max = 500))]
    pub remarks: Option<String>,
    pub created_by: Option<TeacherId>,
}

/// One entry of a bulk grade submission for a single exam.
#[derive(Deserialize, Debug)]
pub struct BulkGradeEntry {
    pub student_id: StudentId,
    pub obtained_marks: f64,
    pub remarks: Option<String>,
}

/// Result of a bulk grade submission.
///
/// Entries whose (student, exam) pair already held a grade are skipped, not
/// failed; the skipped student ids are reported so callers can see the drop.
#[derive(Serialize, Debug)]
pub struct BulkCreateGradesResult {
    pub created: Vec<Grade>,
    pub skipped_student_ids: Vec<StudentId>,
}

/// Query filters for listing grades. All filters are conjunctive; class,
/// subject, and academic-year filters match through the exam.
#[derive(Deserialize, Debug, Default)]
pub struct GradeFilterParams {
    pub student_id: Option<StudentId>,
    pub exam_id: Option<ExamId>,
    pub class_id: Option<crate::ids::ClassRoomId>,
    pub subject_id: Option<SubjectId>,
    pub academic_year_id: Option<AcademicYearId>,
    /// When set, keep only passing (true) or failing (false) grades.
    pub passing: Option<bool>,
}

/// Filters for the per-student and per-class report endpoints.
#[derive(Deserialize, Debug, Default)]
pub struct GradeReportFilters {
    pub academic_year_id: Option<AcademicYearId>,
    pub subject_id: Option<SubjectId>,
}

/// Statistics block of a student report card.
#[derive(Serialize, Debug)]
pub struct StudentGradeStatistics {
    pub total_exams: i64,
    pub average_percentage: f64,
    /// Letter of the best percentage; `None` when the student has no grades.
    pub highest_grade: Option<String>,
    /// Letter of the worst percentage; `None` when the student has no grades.
    pub lowest_grade: Option<String>,
    pub passing_exams: i64,
    pub failing_exams: i64,
}

/// A student's report card: every grade plus the derived statistics.
#[derive(Serialize, Debug)]
pub struct StudentGradeReport {
    pub student_id: StudentId,
    pub grades: Vec<GradeWithExam>,
    pub statistics: StudentGradeStatistics,
}

/// Statistics block of a class grade report.
#[derive(Serialize, Debug)]
pub struct ClassGradeStatistics {
    pub total_grades: i64,
    pub average_percentage: f64,
    pub passing_percentage: f64,
    /// Letter grade -> number of grades carrying it.
    pub grade_distribution: HashMap<String, i64>,
}

/// Grade distribution for one class, across every exam held in it.
#[derive(Serialize, Debug)]
pub struct ClassGradeReport {
    pub class_id: crate::ids::ClassRoomId,
    pub grades: Vec<GradeWithExam>,
    pub statistics: ClassGradeStatistics,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_letter_thresholds_are_inclusive() {
        assert_eq!(grade_letter(97.0), "A+");
        assert_eq!(grade_letter(96.99), "A");
        assert_eq!(grade_letter(93.0), "A");
        assert_eq!(grade_letter(90.0), "A-");
        assert_eq!(grade_letter(87.0), "B+");
        assert_eq!(grade_letter(83.0), "B");
        assert_eq!(grade_letter(80.0), "B-");
        assert_eq!(grade_letter(77.0), "C+");
        assert_eq!(grade_letter(73.0), "C");
        assert_eq!(grade_letter(70.0), "C-");
        assert_eq!(grade_letter(67.0), "D+");
        assert_eq!(grade_letter(63.0), "D");
        assert_eq!(grade_letter(60.0), "D-");
        assert_eq!(grade_letter(59.99), "F");
        assert_eq!(grade_letter(0.0), "F");
    }

    #[test]
    fn test_percentage_rounds_to_two_decimals() {
        assert_eq!(percentage(1.0, 3.0), 33.33);
        assert_eq!(percentage(2.0, 3.0), 66.67);
        assert_eq!(percentage(85.0, 100.0), 85.0);
    }

    #[test]
    fn test_percentage_zero_total_is_zero() {
        assert_eq!(percentage(10.0, 0.0), 0.0);
    }

    #[test]
    fn test_is_passing_boundary() {
        assert!(is_passing(40.0, 40.0));
        assert!(!is_passing(39.99, 40.0));
    }
}
