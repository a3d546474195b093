pub use rollbook_models::attendance::{
    Attendance, AttendanceFilterParams, AttendanceStatus, ClassAttendanceEntry,
    ClassAttendanceStats, ClassDaySummary, CreateAttendanceDto, DailyClassReport,
    MonthlyAttendanceReport, PeriodType, StudentAttendanceStats, UpdateAttendanceDto,
};
pub use rollbook_models::ids::AttendanceId;
