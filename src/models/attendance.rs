// src/models/attendance.rs
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// A row of `attendance`. Created only by a successful scan; never updated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, FromRow)]
pub struct AttendanceRecord {
    pub id: i64,
    pub teacher_id: i64,
    pub class_id: i64,
    pub period_index: i64,
    pub scanned_at: String, // UTC RFC3339
    pub scan_date: String,  // school-local YYYY-MM-DD
}

/// Body of `POST /api/attendance/scan`. The teacher comes from the session.
#[derive(Debug, Clone, Deserialize)]
pub struct ScanRequest {
    #[serde(alias = "qrToken")]
    pub qr_token: String,
    #[serde(alias = "periodIndex")]
    pub period_index: i64,
}

/// A teacher's own history, joined with the class.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct TeacherAttendanceRow {
    pub id: i64,
    pub class_id: i64,
    pub class_name: String,
    pub grade: String,
    pub major: Option<String>,
    pub period_index: i64,
    pub scanned_at: String,
    pub scan_date: String,
}

/// One line of the admin report.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct AttendanceReportRow {
    pub id: i64,
    pub teacher_id: i64,
    pub teacher_name: String,
    pub national_id: Option<String>,
    pub class_id: i64,
    pub class_name: String,
    pub grade: String,
    pub major: Option<String>,
    pub period_index: i64,
    pub scanned_at: String,
    pub scan_date: String,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReportFormat {
    #[default]
    Json,
    Csv,
    Pdf,
}

/// Query string of `GET /api/reports/attendance`. All filters optional.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ReportFilter {
    pub date: Option<String>,
    pub teacher_id: Option<i64>,
    pub class_id: Option<i64>,
    pub period_index: Option<i64>,
    #[serde(default)]
    pub format: ReportFormat,
}
