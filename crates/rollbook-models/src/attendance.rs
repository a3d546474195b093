//! Attendance models, DTOs, and report shapes.
//!
//! One attendance row covers one student for one period of one day: a full
//! day, a half day, or a single subject period. The schema's unique index
//! keeps at most one row per (student, class, date, subject, period).

use std::collections::{BTreeMap, HashMap};

use chrono::{NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use validator::Validate;

use crate::ids::{AcademicYearId, AttendanceId, ClassRoomId, StudentId, SubjectId, TeacherId};

/// Recorded presence state for one period.
#[derive(Serialize, Deserialize, sqlx::Type, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
#[sqlx(type_name = "TEXT", rename_all = "snake_case")]
pub enum AttendanceStatus {
    Present,
    Absent,
    Late,
    Excused,
    Partial,
}

impl AttendanceStatus {
    /// Whether this status counts towards present-day totals.
    ///
    /// Late and partial students were in the room; excused and absent were
    /// not.
    pub fn counts_as_present(self) -> bool {
        matches!(self, Self::Present | Self::Late | Self::Partial)
    }
}

/// Granularity of one attendance record.
#[derive(Serialize, Deserialize, sqlx::Type, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
#[sqlx(type_name = "TEXT", rename_all = "snake_case")]
pub enum PeriodType {
    FullDay,
    Morning,
    Afternoon,
    SubjectWise,
}

/// One student's attendance for one period of one day.
#[derive(Serialize, FromRow, Debug, Clone)]
pub struct Attendance {
    pub id: AttendanceId,
    pub student_id: StudentId,
    pub class_id: ClassRoomId,
    pub subject_id: Option<SubjectId>,
    pub teacher_id: TeacherId,
    pub academic_year_id: AcademicYearId,
    pub attendance_date: NaiveDate,
    pub status: AttendanceStatus,
    pub period_type: PeriodType,
    /// Set for subject-wise attendance only.
    pub period_number: Option<i32>,
    pub check_in_time: Option<NaiveTime>,
    pub check_out_time: Option<NaiveTime>,
    pub remarks: Option<String>,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub updated_at: chrono::DateTime<chrono::Utc>,
}

/// DTO for recording one attendance row.
#[derive(Deserialize, Debug, Clone, Validate)]
pub struct CreateAttendanceDto {
    pub student_id: StudentId,
    pub class_id: ClassRoomId,
    pub subject_id: Option<SubjectId>,
    pub teacher_id: TeacherId,
    pub academic_year_id: AcademicYearId,
    /// Defaults to today when omitted.
    pub attendance_date: Option<NaiveDate>,
    /// Defaults to present when omitted.
    pub status: Option<AttendanceStatus>,
    /// Defaults to full-day when omitted.
    pub period_type: Option<PeriodType>,
    #[validate(range(min = 1, max = 12))]
    pub period_number: Option<i32>,
    pub check_in_time: Option<NaiveTime>,
    #[validate(length(max = 500))]
    pub remarks: Option<String>,
}

/// DTO for correcting an existing attendance row.
#[derive(Deserialize, Debug, Default, Validate)]
pub struct UpdateAttendanceDto {
    pub status: Option<AttendanceStatus>,
    pub check_in_time: Option<NaiveTime>,
    pub check_out_time: Option<NaiveTime>,
    #[validate(length(max = 500))]
    pub remarks: Option<String>,
}

/// One entry of a whole-class marking sweep.
#[derive(Deserialize, Debug, Clone)]
pub struct ClassAttendanceEntry {
    pub student_id: StudentId,
    pub teacher_id: TeacherId,
    pub academic_year_id: AcademicYearId,
    pub status: Option<AttendanceStatus>,
    pub subject_id: Option<SubjectId>,
    pub period_type: Option<PeriodType>,
    pub period_number: Option<i32>,
    pub remarks: Option<String>,
}

/// Query filters for listing attendance. All filters are conjunctive; the
/// result is ordered newest attendance date first.
#[derive(Deserialize, Debug, Default)]
pub struct AttendanceFilterParams {
    pub student_id: Option<StudentId>,
    pub class_id: Option<ClassRoomId>,
    pub subject_id: Option<SubjectId>,
    pub status: Option<AttendanceStatus>,
    pub date: Option<NaiveDate>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub academic_year_id: Option<AcademicYearId>,
}

/// Per-student attendance totals over a year or the student's whole history.
#[derive(Serialize, Debug, PartialEq)]
pub struct StudentAttendanceStats {
    pub total_days: i64,
    /// Days with status present, late, or partial.
    pub present_days: i64,
    pub absent_days: i64,
    pub late_days: i64,
    pub excused_days: i64,
    /// present / total * 100, rounded to two decimals; 0 when no records.
    pub attendance_percentage: f64,
}

/// Per-class attendance totals for one date.
///
/// Totals count recorded rows only: students with no row that day do not
/// appear in any bucket.
#[derive(Serialize, Debug, PartialEq)]
pub struct ClassAttendanceStats {
    pub date: NaiveDate,
    pub total_students: i64,
    pub present_count: i64,
    pub absent_count: i64,
    pub late_count: i64,
    pub attendance_percentage: f64,
}

/// Day summary for one class inside the daily and monthly reports.
#[derive(Serialize, FromRow, Debug, Clone, PartialEq)]
pub struct ClassDaySummary {
    pub class_id: ClassRoomId,
    pub attendance_date: NaiveDate,
    pub total_students: i64,
    pub present_count: i64,
    pub absent_count: i64,
    pub attendance_percentage: f64,
}

/// One class's block of the daily report: the summary plus the day's rows.
#[derive(Serialize, Debug)]
pub struct DailyClassReport {
    pub class_id: ClassRoomId,
    pub class_name: String,
    pub total_students: i64,
    pub present_count: i64,
    pub absent_count: i64,
    pub attendance_percentage: f64,
    pub student_records: Vec<Attendance>,
}

/// Monthly report: class -> date -> day summary.
pub type MonthlyAttendanceReport = HashMap<ClassRoomId, BTreeMap<NaiveDate, ClassDaySummary>>;
