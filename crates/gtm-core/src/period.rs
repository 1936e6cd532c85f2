//! Report period computation
//!
//! Status queries look back a fixed length from the end of the reporting
//! service's current data window.

use chrono::{DateTime, Duration, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

/// Look-back length used when none (or an unparsable one) is given
pub const DEFAULT_PERIOD_LEN: &str = "15m";

/// Half-open `[start, end)` range a traffic report is computed over
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportPeriod {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl ReportPeriod {
    /// Period of the given length ending at `end`
    ///
    /// `period_len` accepts `<n>s`, `<n>m`, `<n>h` or `<n>d`. Anything else,
    /// including a length reaching before the earliest representable time,
    /// falls back to [`DEFAULT_PERIOD_LEN`].
    pub fn ending_at(end: DateTime<Utc>, period_len: &str) -> Self {
        let start = parse_period_len(period_len)
            .and_then(|len| end.checked_sub_signed(len))
            .or_else(|| end.checked_sub_signed(default_period()))
            .unwrap_or(end);
        Self { start, end }
    }

    /// RFC 3339 start, as the reporting API expects it
    pub fn start_param(&self) -> String {
        self.start.to_rfc3339_opts(SecondsFormat::Secs, true)
    }

    /// RFC 3339 end, as the reporting API expects it
    pub fn end_param(&self) -> String {
        self.end.to_rfc3339_opts(SecondsFormat::Secs, true)
    }
}

/// Parse a look-back length such as `15m` or `2h`
pub fn parse_period_len(value: &str) -> Option<Duration> {
    let value = value.trim();
    let unit = value.chars().last()?;
    let amount: i64 = value[..value.len() - unit.len_utf8()].parse().ok()?;
    if amount <= 0 {
        return None;
    }

    match unit {
        's' => Duration::try_seconds(amount),
        'm' => Duration::try_minutes(amount),
        'h' => Duration::try_hours(amount),
        'd' => Duration::try_days(amount),
        _ => None,
    }
}

fn default_period() -> Duration {
    Duration::minutes(15)
}
