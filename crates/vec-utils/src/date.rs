use chrono::Local;

/// A moment in time as stored by commits and reflog lines: seconds since
/// the Unix epoch plus a timezone offset in minutes from UTC.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timestamp {
    /// Seconds since Unix epoch.
    pub seconds: i64,
    /// Timezone offset in minutes from UTC (e.g., -300 for EST).
    pub tz_offset: i32,
}

impl Timestamp {
    /// Create from an epoch second count and an offset in minutes.
    pub fn new(seconds: i64, tz_offset_minutes: i32) -> Self {
        Self {
            seconds,
            tz_offset: tz_offset_minutes,
        }
    }

    /// The current wall-clock time with the local timezone.
    pub fn now() -> Self {
        let now = Local::now();
        Self {
            seconds: now.timestamp(),
            tz_offset: now.offset().local_minus_utc() / 60,
        }
    }

    /// Format the offset as `+HHMM` / `-HHMM` for reflog lines.
    pub fn tz_string(&self) -> String {
        let sign = if self.tz_offset < 0 { '-' } else { '+' };
        let abs = self.tz_offset.unsigned_abs();
        format!("{}{:02}{:02}", sign, abs / 60, abs % 60)
    }
}
