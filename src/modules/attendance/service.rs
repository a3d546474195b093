use std::collections::{BTreeMap, HashMap};

use chrono::{NaiveDate, Utc};
use sqlx::{PgConnection, PgPool};
use tracing::instrument;
use validator::Validate;

use rollbook_core::{AppError, is_foreign_key_violation, is_unique_violation};
use rollbook_models::grades::round2;
use rollbook_models::ids::{AcademicYearId, AttendanceId, ClassRoomId, StudentId};

use crate::modules::attendance::model::{
    Attendance, AttendanceFilterParams, AttendanceStatus, ClassAttendanceEntry,
    ClassAttendanceStats, ClassDaySummary, CreateAttendanceDto, DailyClassReport,
    MonthlyAttendanceReport, PeriodType, StudentAttendanceStats, UpdateAttendanceDto,
};

const ATTENDANCE_SELECT: &str = r#"
    SELECT id, student_id, class_id, subject_id, teacher_id, academic_year_id,
           attendance_date, status, period_type, period_number,
           check_in_time, check_out_time, remarks, created_at, updated_at
    FROM attendances"#;

pub struct AttendanceService;

impl AttendanceService {
    /// Record one attendance row.
    ///
    /// Date defaults to today, status to present, period to full-day. A
    /// present student with no check-in time gets stamped with the current
    /// time.
    #[instrument(skip(db))]
    pub async fn record_attendance(
        db: &PgPool,
        dto: CreateAttendanceDto,
    ) -> Result<Attendance, AppError> {
        let mut conn = db.acquire().await?;
        Self::insert_row(&mut conn, dto).await
    }

    /// Record attendance rows for many students in a single transaction.
    ///
    /// Any failing row (duplicate period, unknown reference) aborts the
    /// whole batch.
    #[instrument(skip(db, records), fields(records = records.len()))]
    pub async fn bulk_mark_attendance(
        db: &PgPool,
        records: Vec<CreateAttendanceDto>,
    ) -> Result<Vec<Attendance>, AppError> {
        let mut tx = db.begin().await?;

        let mut marked = Vec::with_capacity(records.len());
        for dto in records {
            marked.push(Self::insert_row(&mut tx, dto).await?);
        }

        tx.commit().await?;

        Ok(marked)
    }

    /// Mark a whole class for one date in a single transaction.
    #[instrument(skip(db, entries), fields(entries = entries.len()))]
    pub async fn mark_class_attendance(
        db: &PgPool,
        class_id: ClassRoomId,
        date: NaiveDate,
        entries: Vec<ClassAttendanceEntry>,
    ) -> Result<Vec<Attendance>, AppError> {
        let records = entries
            .into_iter()
            .map(|entry| CreateAttendanceDto {
                student_id: entry.student_id,
                class_id,
                subject_id: entry.subject_id,
                teacher_id: entry.teacher_id,
                academic_year_id: entry.academic_year_id,
                attendance_date: Some(date),
                status: entry.status,
                period_type: entry.period_type,
                period_number: entry.period_number,
                check_in_time: None,
                remarks: entry.remarks,
            })
            .collect();

        Self::bulk_mark_attendance(db, records).await
    }

    async fn insert_row(
        conn: &mut PgConnection,
        dto: CreateAttendanceDto,
    ) -> Result<Attendance, AppError> {
        dto.validate().map_err(AppError::validation)?;

        let date = dto.attendance_date.unwrap_or_else(|| Utc::now().date_naive());
        let status = dto.status.unwrap_or(AttendanceStatus::Present);
        let period_type = dto.period_type.unwrap_or(PeriodType::FullDay);
        let check_in_time = match (status, dto.check_in_time) {
            (AttendanceStatus::Present, None) => Some(Utc::now().time()),
            (_, explicit) => explicit,
        };

        let attendance = sqlx::query_as::<_, Attendance>(
            r#"INSERT INTO attendances (student_id, class_id, subject_id, teacher_id, academic_year_id,
                                        attendance_date, status, period_type, period_number,
                                        check_in_time, remarks)
               VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
               RETURNING id, student_id, class_id, subject_id, teacher_id, academic_year_id,
                         attendance_date, status, period_type, period_number,
                         check_in_time, check_out_time, remarks, created_at, updated_at"#,
        )
        .bind(dto.student_id)
        .bind(dto.class_id)
        .bind(dto.subject_id)
        .bind(dto.teacher_id)
        .bind(dto.academic_year_id)
        .bind(date)
        .bind(status)
        .bind(period_type)
        .bind(dto.period_number)
        .bind(check_in_time)
        .bind(&dto.remarks)
        .fetch_one(conn)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                return AppError::conflict(anyhow::anyhow!(
                    "Attendance already recorded for this student and period"
                ));
            }
            if is_foreign_key_violation(&e) {
                return AppError::not_found(anyhow::anyhow!(
                    "Student, class, subject, teacher, or academic year not found"
                ));
            }
            AppError::from(e)
        })?;

        Ok(attendance)
    }

    /// Correct an existing attendance row.
    ///
    /// A row corrected to present gets a check-out stamp if it has none.
    #[instrument(skip(db))]
    pub async fn update_attendance(
        db: &PgPool,
        attendance_id: AttendanceId,
        dto: UpdateAttendanceDto,
    ) -> Result<Attendance, AppError> {
        dto.validate().map_err(AppError::validation)?;

        let existing = Self::get_attendance(db, attendance_id).await?;

        let status = dto.status.unwrap_or(existing.status);
        let check_in_time = dto.check_in_time.or(existing.check_in_time);
        let check_out_time = match (status, dto.check_out_time.or(existing.check_out_time)) {
            (AttendanceStatus::Present, None) => Some(Utc::now().time()),
            (_, time) => time,
        };
        let remarks = dto.remarks.or(existing.remarks);

        let attendance = sqlx::query_as::<_, Attendance>(
            r#"UPDATE attendances
               SET status = $1, check_in_time = $2, check_out_time = $3, remarks = $4, updated_at = NOW()
               WHERE id = $5
               RETURNING id, student_id, class_id, subject_id, teacher_id, academic_year_id,
                         attendance_date, status, period_type, period_number,
                         check_in_time, check_out_time, remarks, created_at, updated_at"#,
        )
        .bind(status)
        .bind(check_in_time)
        .bind(check_out_time)
        .bind(&remarks)
        .bind(attendance_id)
        .fetch_one(db)
        .await?;

        Ok(attendance)
    }

    /// Get one attendance row by ID.
    #[instrument(skip(db))]
    pub async fn get_attendance(
        db: &PgPool,
        attendance_id: AttendanceId,
    ) -> Result<Attendance, AppError> {
        let query = format!("{} WHERE id = $1", ATTENDANCE_SELECT);
        let attendance = sqlx::query_as::<_, Attendance>(&query)
            .bind(attendance_id)
            .fetch_optional(db)
            .await?
            .ok_or_else(|| AppError::not_found(anyhow::anyhow!("Attendance record not found")))?;

        Ok(attendance)
    }

    /// List attendance rows matching the filters, newest date first.
    #[instrument(skip(db))]
    pub async fn list_attendance(
        db: &PgPool,
        filters: AttendanceFilterParams,
    ) -> Result<Vec<Attendance>, AppError> {
        let query = format!(
            r#"{}
               WHERE ($1::uuid IS NULL OR student_id = $1)
                 AND ($2::uuid IS NULL OR class_id = $2)
                 AND ($3::uuid IS NULL OR subject_id = $3)
                 AND ($4::text IS NULL OR status = $4)
                 AND ($5::date IS NULL OR attendance_date = $5)
                 AND ($6::date IS NULL OR attendance_date >= $6)
                 AND ($7::date IS NULL OR attendance_date <= $7)
                 AND ($8::uuid IS NULL OR academic_year_id = $8)
               ORDER BY attendance_date DESC, created_at DESC"#,
            ATTENDANCE_SELECT
        );

        let rows = sqlx::query_as::<_, Attendance>(&query)
            .bind(filters.student_id)
            .bind(filters.class_id)
            .bind(filters.subject_id)
            .bind(filters.status)
            .bind(filters.date)
            .bind(filters.start_date)
            .bind(filters.end_date)
            .bind(filters.academic_year_id)
            .fetch_all(db)
            .await?;

        Ok(rows)
    }

    /// A student's attendance totals, over one academic year or their whole
    /// history.
    #[instrument(skip(db))]
    pub async fn student_attendance_stats(
        db: &PgPool,
        student_id: StudentId,
        academic_year_id: Option<AcademicYearId>,
    ) -> Result<StudentAttendanceStats, AppError> {
        let (total, present, absent, late, excused) =
            sqlx::query_as::<_, (i64, i64, i64, i64, i64)>(
                r#"SELECT COUNT(*),
                          COUNT(*) FILTER (WHERE status IN ('present', 'late', 'partial')),
                          COUNT(*) FILTER (WHERE status = 'absent'),
                          COUNT(*) FILTER (WHERE status = 'late'),
                          COUNT(*) FILTER (WHERE status = 'excused')
                   FROM attendances
                   WHERE student_id = $1
                     AND ($2::uuid IS NULL OR academic_year_id = $2)"#,
            )
            .bind(student_id)
            .bind(academic_year_id)
            .fetch_one(db)
            .await?;

        Ok(StudentAttendanceStats {
            total_days: total,
            present_days: present,
            absent_days: absent,
            late_days: late,
            excused_days: excused,
            attendance_percentage: Self::percent(present, total),
        })
    }

    /// One class's attendance totals for one date. Only recorded rows
    /// count; unmarked students appear in no bucket.
    #[instrument(skip(db))]
    pub async fn class_attendance_stats(
        db: &PgPool,
        class_id: ClassRoomId,
        date: NaiveDate,
    ) -> Result<ClassAttendanceStats, AppError> {
        let (total, present, absent, late) = sqlx::query_as::<_, (i64, i64, i64, i64)>(
            r#"SELECT COUNT(*),
                      COUNT(*) FILTER (WHERE status IN ('present', 'late', 'partial')),
                      COUNT(*) FILTER (WHERE status = 'absent'),
                      COUNT(*) FILTER (WHERE status = 'late')
               FROM attendances
               WHERE class_id = $1 AND attendance_date = $2"#,
        )
        .bind(class_id)
        .bind(date)
        .fetch_one(db)
        .await?;

        Ok(ClassAttendanceStats {
            date,
            total_students: total,
            present_count: present,
            absent_count: absent,
            late_count: late,
            attendance_percentage: Self::percent(present, total),
        })
    }

    /// Per-class attendance summaries for one date, each with the day's
    /// rows, ordered by class name.
    #[instrument(skip(db))]
    pub async fn daily_report(
        db: &PgPool,
        date: NaiveDate,
    ) -> Result<Vec<DailyClassReport>, AppError> {
        let query = format!(
            "{} WHERE attendance_date = $1 ORDER BY class_id, created_at",
            ATTENDANCE_SELECT
        );
        let rows = sqlx::query_as::<_, Attendance>(&query)
            .bind(date)
            .fetch_all(db)
            .await?;

        let mut by_class: HashMap<ClassRoomId, Vec<Attendance>> = HashMap::new();
        for row in rows {
            by_class.entry(row.class_id).or_default().push(row);
        }

        let class_ids: Vec<ClassRoomId> = by_class.keys().copied().collect();
        let names = sqlx::query_as::<_, (ClassRoomId, String)>(
            "SELECT id, name FROM classes WHERE id = ANY($1)",
        )
        .bind(&class_ids)
        .fetch_all(db)
        .await?;
        let names: HashMap<ClassRoomId, String> = names.into_iter().collect();

        let mut reports: Vec<DailyClassReport> = by_class
            .into_iter()
            .map(|(class_id, records)| {
                let total = records.len() as i64;
                let present = records
                    .iter()
                    .filter(|r| r.status.counts_as_present())
                    .count() as i64;
                let absent = records
                    .iter()
                    .filter(|r| r.status == AttendanceStatus::Absent)
                    .count() as i64;
                DailyClassReport {
                    class_id,
                    class_name: names.get(&class_id).cloned().unwrap_or_default(),
                    total_students: total,
                    present_count: present,
                    absent_count: absent,
                    attendance_percentage: Self::percent(present, total),
                    student_records: records,
                }
            })
            .collect();
        reports.sort_by(|a, b| a.class_name.cmp(&b.class_name));

        Ok(reports)
    }

    /// Day-by-day summaries for every class over one calendar month,
    /// grouped per class then ordered by date.
    #[instrument(skip(db))]
    pub async fn monthly_report(
        db: &PgPool,
        year: i32,
        month: u32,
    ) -> Result<MonthlyAttendanceReport, AppError> {
        if !(1..=12).contains(&month) {
            return Err(AppError::out_of_range(anyhow::anyhow!(
                "Month must be between 1 and 12"
            )));
        }

        let summaries = sqlx::query_as::<_, ClassDaySummary>(
            r#"SELECT class_id,
                      attendance_date,
                      COUNT(*) AS total_students,
                      COUNT(*) FILTER (WHERE status IN ('present', 'late', 'partial')) AS present_count,
                      COUNT(*) FILTER (WHERE status = 'absent') AS absent_count,
                      COALESCE(ROUND(
                          100.0 * COUNT(*) FILTER (WHERE status IN ('present', 'late', 'partial'))
                              / NULLIF(COUNT(*), 0), 2), 0)::double precision AS attendance_percentage
               FROM attendances
               WHERE attendance_date >= make_date($1, $2, 1)
                 AND attendance_date < make_date($1, $2, 1) + INTERVAL '1 month'
               GROUP BY class_id, attendance_date"#,
        )
        .bind(year)
        .bind(month as i32)
        .fetch_all(db)
        .await?;

        let mut report: MonthlyAttendanceReport = HashMap::new();
        for summary in summaries {
            report
                .entry(summary.class_id)
                .or_insert_with(BTreeMap::new)
                .insert(summary.attendance_date, summary);
        }

        Ok(report)
    }

    /// A student's attendance percentage over a date range, rounded to two
    /// decimals; 0 when the range holds no records.
    #[instrument(skip(db))]
    pub async fn attendance_percentage(
        db: &PgPool,
        student_id: StudentId,
        start_date: NaiveDate,
        end_date: NaiveDate,
    ) -> Result<f64, AppError> {
        let (total, present) = sqlx::query_as::<_, (i64, i64)>(
            r#"SELECT COUNT(*),
                      COUNT(*) FILTER (WHERE status IN ('present', 'late', 'partial'))
               FROM attendances
               WHERE student_id = $1 AND attendance_date BETWEEN $2 AND $3"#,
        )
        .bind(student_id)
        .bind(start_date)
        .bind(end_date)
        .fetch_one(db)
        .await?;

        Ok(Self::percent(present, total))
    }

    fn percent(present: i64, total: i64) -> f64 {
        if total > 0 {
            round2(present as f64 / total as f64 * 100.0)
        } else {
            0.0
        }
    }
}
