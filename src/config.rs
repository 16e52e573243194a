// src/config.rs
use crate::error::{AppError, AppResult};
use chrono::FixedOffset;
use std::env;

#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub secure_cookie: bool,
    pub inactivity_days: i64,
}

#[derive(Debug, Clone)]
pub struct BootstrapAdmin {
    pub username: String,
    pub password: String,
}

/// Everything read from the environment at startup. Built once and handed
/// to `AppState`; nothing below reads env vars directly.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub host: String,
    pub port: u16,
    /// School-local time zone used for weekday, time-of-day and day boundaries.
    pub utc_offset: FixedOffset,
    pub session: SessionConfig,
    pub bootstrap_admin: Option<BootstrapAdmin>,
}

impl AppConfig {
    pub fn from_env() -> AppResult<Self> {
        dotenvy::dotenv().ok();

        let database_url = env::var("DATABASE_URL")
            .map_err(|_| AppError::Config("DATABASE_URL is not set".into()))?;
        let host = env::var("APP_HOST").unwrap_or_else(|_| "0.0.0.0".into());
        let port = parse_var("APP_PORT", 3000u16)?;

        let offset_minutes = parse_var("SCHOOL_UTC_OFFSET_MINUTES", 7 * 60i32)?;
        let utc_offset = offset_from_minutes(offset_minutes)?;

        let session = SessionConfig {
            secure_cookie: parse_var("SESSION_SECURE_COOKIE", false)?,
            inactivity_days: parse_var("SESSION_INACTIVITY_DAYS", 1i64)?,
        };

        let bootstrap_admin = match (
            env::var("BOOTSTRAP_ADMIN_USERNAME"),
            env::var("BOOTSTRAP_ADMIN_PASSWORD"),
        ) {
            (Ok(username), Ok(password)) if !username.trim().is_empty() && !password.is_empty() => {
                Some(BootstrapAdmin { username, password })
            }
            _ => None,
        };

        Ok(Self {
            database_url,
            host,
            port,
            utc_offset,
            session,
            bootstrap_admin,
        })
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

pub fn offset_from_minutes(minutes: i32) -> AppResult<FixedOffset> {
    minutes
        .checked_mul(60)
        .and_then(FixedOffset::east_opt)
        .ok_or_else(|| AppError::Config(format!("UTC offset of {} minutes is out of range", minutes)))
}

fn parse_var<T: std::str::FromStr>(name: &str, default: T) -> AppResult<T> {
    match env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse::<T>()
            .map_err(|_| AppError::Config(format!("{} has an invalid value: {:?}", name, raw))),
        Err(_) => Ok(default),
    }
}

#[cfg(test)]
mod config_tests {
    use super::*;

    #[test]
    fn offset_from_minutes_accepts_school_offsets() {
        let wib = offset_from_minutes(420).expect("UTC+7 is valid");
        assert_eq!(wib.local_minus_utc(), 7 * 3600);
        let west = offset_from_minutes(-300).expect("UTC-5 is valid");
        assert_eq!(west.local_minus_utc(), -5 * 3600);
    }

    #[test]
    fn offset_from_minutes_rejects_nonsense() {
        assert!(matches!(offset_from_minutes(24 * 60), Err(AppError::Config(_))));
        assert!(matches!(offset_from_minutes(i32::MAX), Err(AppError::Config(_))));
        assert!(matches!(offset_from_minutes(i32::MIN), Err(AppError::Config(_))));
    }
}
