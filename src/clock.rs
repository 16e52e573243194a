// src/clock.rs
use chrono::{
    DateTime, Datelike, Duration, FixedOffset, NaiveDate, NaiveTime, SecondsFormat, TimeZone,
    Timelike, Utc, Weekday,
};

/// Source of "now" in the school's local time zone.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<FixedOffset>;
}

#[derive(Debug, Clone, Copy)]
pub struct SystemClock {
    offset: FixedOffset,
}

impl SystemClock {
    pub fn new(offset: FixedOffset) -> Self {
        Self { offset }
    }
}

impl Clock for SystemClock {
    fn now(&self) -> DateTime<FixedOffset> {
        Utc::now().with_timezone(&self.offset)
    }
}

/// Always returns the same instant.
#[cfg(test)]
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub DateTime<FixedOffset>);

#[cfg(test)]
impl Clock for FixedClock {
    fn now(&self) -> DateTime<FixedOffset> {
        self.0
    }
}

/// Canonical weekday key, used both when storing schedules and when looking them up.
pub fn weekday_key(day: Weekday) -> &'static str {
    match day {
        Weekday::Mon => "monday",
        Weekday::Tue => "tuesday",
        Weekday::Wed => "wednesday",
        Weekday::Thu => "thursday",
        Weekday::Fri => "friday",
        Weekday::Sat => "saturday",
        Weekday::Sun => "sunday",
    }
}

/// Accepts any English weekday spelling chrono understands ("Mon", "monday", ...)
/// and returns the canonical key.
pub fn parse_weekday(raw: &str) -> Option<&'static str> {
    raw.trim().parse::<Weekday>().ok().map(weekday_key)
}

/// Local time of day at minute granularity.
pub fn time_of_day(now: &DateTime<FixedOffset>) -> NaiveTime {
    let t = now.time();
    // hour/minute come from a valid time, so this cannot fail
    NaiveTime::from_hms_opt(t.hour(), t.minute(), 0).unwrap_or(t)
}

/// Parses an `HH:MM` (or `HH:MM:SS`) lesson boundary. Seconds are dropped,
/// matching the minute granularity of `time_of_day` and of stored slots.
pub fn parse_hhmm(raw: &str) -> Option<NaiveTime> {
    let raw = raw.trim();
    let t = NaiveTime::parse_from_str(raw, "%H:%M")
        .or_else(|_| NaiveTime::parse_from_str(raw, "%H:%M:%S"))
        .ok()?;
    NaiveTime::from_hms_opt(t.hour(), t.minute(), 0)
}

/// Stored form of an instant: UTC, RFC3339, whole seconds. Lexicographic order
/// of these strings matches chronological order.
pub fn to_storage_timestamp<Tz: TimeZone>(instant: &DateTime<Tz>) -> String {
    instant
        .with_timezone(&Utc)
        .to_rfc3339_opts(SecondsFormat::Secs, true)
}

/// One local calendar day, `00:00:00` through `23:59:59` inclusive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DayRange {
    pub date: NaiveDate,
    pub start: DateTime<FixedOffset>,
    pub end: DateTime<FixedOffset>,
}

impl DayRange {
    pub fn containing(now: &DateTime<FixedOffset>) -> Self {
        let date = now.date_naive();
        let offset = *now.offset();
        let start = date
            .and_hms_opt(0, 0, 0)
            .and_then(|midnight| offset.from_local_datetime(&midnight).single())
            .unwrap_or(*now);
        let end = start + Duration::days(1) - Duration::seconds(1);
        Self { date, start, end }
    }

    /// `YYYY-MM-DD` of the local day.
    pub fn date_key(&self) -> String {
        self.date.format("%Y-%m-%d").to_string()
    }

    /// Inclusive bounds in storage form.
    pub fn storage_bounds(&self) -> (String, String) {
        (to_storage_timestamp(&self.start), to_storage_timestamp(&self.end))
    }

    pub fn weekday_key(&self) -> &'static str {
        weekday_key(self.date.weekday())
    }
}

#[cfg(test)]
pub(crate) fn local(offset_minutes: i32, y: i32, m: u32, d: u32, hh: u32, mm: u32) -> DateTime<FixedOffset> {
    FixedOffset::east_opt(offset_minutes * 60)
        .and_then(|o| o.with_ymd_and_hms(y, m, d, hh, mm, 0).single())
        .expect("valid test instant")
}
