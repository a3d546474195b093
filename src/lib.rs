//! # Rollbook
//!
//! The transactional core of a school records system, built with Rust, SQLx,
//! and PostgreSQL. Rollbook is a library: it has no transport of its own and
//! is embedded by an outer layer (an HTTP API, a CLI, a batch job) that maps
//! its typed inputs and errors onto a wire format.
//!
//! ## What it does
//!
//! - **Entity store**: students, teachers, classes, subjects, academic
//!   years, enrollments, class assignments, exams, grades, attendance,
//!   parents, fees, persisted in PostgreSQL with the domain's uniqueness
//!   rules enforced as unique indexes.
//! - **Consistency guard**: every mutation goes through a service that
//!   validates invariants before writing and runs multi-step writes inside
//!   one transaction (set-current-year, transfer-student, contact-flag
//!   reassignment, bulk marking).
//! - **Aggregators**: read-only attendance and grade statistics, per
//!   student, per class, per exam, daily and monthly reports, report cards.
//! - **Query façade**: optional conjunctive filter parameters composed into
//!   SQL for an embedding transport layer.
//!
//! ## Architecture
//!
//! ```text
//! src/
//! ├── logging.rs        # console tracing setup
//! └── modules/          # feature modules
//!     ├── academic_years/  # the current-year singleton guard
//!     ├── classes/         # classrooms
//!     ├── subjects/        # taught subjects
//!     ├── students/        # students, transfer, headcounts
//!     ├── enrollments/     # one-active-enrollment-per-year guard
//!     ├── teachers/        # teachers and class assignments
//!     ├── exams/           # exams and their delete guard
//!     ├── grades/          # grade guard + grade aggregation
//!     ├── attendance/      # attendance guard + attendance aggregation
//!     ├── parents/         # guardians and contact-flag invariants
//!     └── fees/            # fee assignment and payments
//! ```
//!
//! Each feature module follows a consistent structure:
//!
//! - `mod.rs`: module exports
//! - `model.rs`: re-exports of the shared models plus module-local types
//! - `service.rs`: business logic over a [`sqlx::PgPool`]
//!
//! ## Quick start
//!
//! ```ignore
//! use rollbook::modules::attendance::service::AttendanceService;
//! use rollbook_db::init_db_pool;
//!
//! let pool = init_db_pool().await;
//! let stats = AttendanceService::student_attendance_stats(&pool, student_id, None).await?;
//! println!("{} days, {}%", stats.total_days, stats.attendance_percentage);
//! ```

pub mod logging;
pub mod modules;

// Re-export workspace crates for convenience
pub use rollbook_core;
pub use rollbook_db;
pub use rollbook_models;
