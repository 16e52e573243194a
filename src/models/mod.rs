// src/models/mod.rs
pub mod attendance;
pub mod audit;
pub mod class;
pub mod schedule;
pub mod teacher;
pub mod user;
