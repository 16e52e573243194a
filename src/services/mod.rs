// src/services/mod.rs
pub mod attendance_service;
pub mod audit_service;
pub mod auth_service;
pub mod class_service;
pub mod report_service;
pub mod schedule_service;
pub mod teacher_service;
pub mod user_service;
