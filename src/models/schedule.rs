// src/models/schedule.rs
use crate::clock::parse_hhmm;
use chrono::NaiveTime;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// One recurring weekly lesson: (teacher, class, weekday, period).
/// Times are stored as `HH:MM` text, weekday as the canonical lowercase name.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct ScheduleSlot {
    pub id: i64,
    pub teacher_id: i64,
    pub class_id: i64,
    pub weekday: String,
    pub period_index: i64,
    pub start_time: String,
    pub end_time: String,
    pub subject: String,
    pub created_at: String,
}

impl ScheduleSlot {
    pub fn window(&self) -> Option<LessonWindow> {
        LessonWindow::parse(&self.start_time, &self.end_time)
    }
}

/// Inclusive `[start, end]` scan window of a lesson.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LessonWindow {
    pub start: NaiveTime,
    pub end: NaiveTime,
}

impl LessonWindow {
    pub fn parse(start: &str, end: &str) -> Option<Self> {
        Some(Self {
            start: parse_hhmm(start)?,
            end: parse_hhmm(end)?,
        })
    }

    /// Both the start and end minute are inside the window.
    pub fn contains(&self, at: NaiveTime) -> bool {
        self.start <= at && at <= self.end
    }
}

/// Slot joined with teacher and class names, for listings.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct ScheduleDetail {
    pub id: i64,
    pub teacher_id: i64,
    pub teacher_name: String,
    pub national_id: Option<String>,
    pub class_id: i64,
    pub class_name: String,
    pub grade: String,
    pub major: Option<String>,
    pub weekday: String,
    pub period_index: i64,
    pub start_time: String,
    pub end_time: String,
    pub subject: String,
}

#[derive(Debug, Deserialize)]
pub struct CreateSchedulePayload {
    pub teacher_id: i64,
    pub class_id: i64,
    pub weekday: String,
    pub period_index: i64,
    pub start_time: String,
    pub end_time: String,
    pub subject: String,
}
