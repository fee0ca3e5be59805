//! Daily accounting window.
//!
//! Usage totals are accumulated per "day", but a day starts at a fixed
//! clock hour rather than at midnight. With the default reset hour of
//! 05:00, late-night usage at 01:30 is charged to the previous day's
//! budget.

use chrono::{DateTime, Duration, NaiveTime, Offset, TimeZone, Timelike};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{DomainError, DomainResult};

/// Hour of the local day (0-23) at which a new accounting window begins.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "u32", into = "u32")]
pub struct ResetHour(u32);

/// Default reset hour: 05:00 local time.
pub const DEFAULT_RESET_HOUR: ResetHour = ResetHour(5);

impl ResetHour {
    /// Creates a reset hour, rejecting values outside 0-23.
    pub fn new(hour: u32) -> DomainResult<Self> {
        if hour > 23 {
            return Err(DomainError::InvalidResetHour { hour });
        }
        Ok(Self(hour))
    }

    /// Returns the hour value.
    pub fn get(self) -> u32 {
        self.0
    }
}

impl Default for ResetHour {
    fn default() -> Self {
        DEFAULT_RESET_HOUR
    }
}

impl TryFrom<u32> for ResetHour {
    type Error = DomainError;

    fn try_from(hour: u32) -> Result<Self, Self::Error> {
        Self::new(hour)
    }
}

impl From<ResetHour> for u32 {
    fn from(hour: ResetHour) -> Self {
        hour.0
    }
}

impl fmt::Display for ResetHour {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}:00", self.0)
    }
}

/// Returns the start instant of the accounting window containing `now`.
///
/// If the local time of day is at or after `reset_hour:00:00.000` the
/// window started today at that hour, otherwise yesterday at that hour.
///
/// Local times that do not exist (a daylight-saving gap) are resolved
/// with the UTC offset currently in effect at `now`; ambiguous local
/// times resolve to the earlier instant.
pub fn start_of_current_window<Tz: TimeZone>(now: &DateTime<Tz>, reset_hour: ResetHour) -> DateTime<Tz> {
    let today = now.date_naive();
    let day = if now.hour() >= reset_hour.get() {
        today
    } else {
        today.pred_opt().unwrap_or(today)
    };

    let reset_time = NaiveTime::from_hms_opt(reset_hour.get(), 0, 0).unwrap_or(NaiveTime::MIN);
    let naive_start = day.and_time(reset_time);

    let tz = now.timezone();
    match tz.from_local_datetime(&naive_start).earliest() {
        Some(start) => start,
        None => {
            let offset_secs = i64::from(now.offset().fix().local_minus_utc());
            tz.from_utc_datetime(&(naive_start - Duration::seconds(offset_secs)))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Datelike, FixedOffset, Utc};

    fn hour(h: u32) -> ResetHour {
        ResetHour::new(h).unwrap()
    }

    #[test]
    fn test_reset_hour_validation() {
        assert!(ResetHour::new(0).is_ok());
        assert!(ResetHour::new(23).is_ok());
        assert_eq!(
            ResetHour::new(24),
            Err(DomainError::InvalidResetHour { hour: 24 })
        );
    }

    #[test]
    fn test_default_reset_hour_is_five() {
        assert_eq!(ResetHour::default().get(), 5);
        assert_eq!(DEFAULT_RESET_HOUR.to_string(), "05:00");
    }

    #[test]
    fn test_after_reset_hour_is_same_day() {
        let now = Utc.with_ymd_and_hms(2024, 6, 15, 14, 30, 12).unwrap();
        let start = start_of_current_window(&now, hour(5));
        assert_eq!(start, Utc.with_ymd_and_hms(2024, 6, 15, 5, 0, 0).unwrap());
    }

    #[test]
    fn test_before_reset_hour_is_previous_day() {
        let now = Utc.with_ymd_and_hms(2024, 6, 15, 4, 0, 0).unwrap();
        let start = start_of_current_window(&now, hour(5));
        assert_eq!(start, Utc.with_ymd_and_hms(2024, 6, 14, 5, 0, 0).unwrap());
    }

    #[test]
    fn test_exactly_at_reset_returns_now() {
        let now = Utc.with_ymd_and_hms(2024, 6, 15, 5, 0, 0).unwrap();
        assert_eq!(start_of_current_window(&now, hour(5)), now);
    }

    #[test]
    fn test_one_millisecond_before_reset_is_previous_day() {
        let now = Utc.with_ymd_and_hms(2024, 6, 15, 4, 59, 59).unwrap()
            + Duration::milliseconds(999);
        let start = start_of_current_window(&now, hour(5));
        assert_eq!(start.day(), 14);
        assert_eq!(start.hour(), 5);
    }

    #[test]
    fn test_previous_day_crosses_month_boundary() {
        let now = Utc.with_ymd_and_hms(2024, 3, 1, 1, 0, 0).unwrap();
        let start = start_of_current_window(&now, hour(5));
        assert_eq!(start, Utc.with_ymd_and_hms(2024, 2, 29, 5, 0, 0).unwrap());
    }

    #[test]
    fn test_midnight_reset_is_start_of_today() {
        let now = Utc.with_ymd_and_hms(2024, 6, 15, 0, 0, 1).unwrap();
        let start = start_of_current_window(&now, hour(0));
        assert_eq!(start, Utc.with_ymd_and_hms(2024, 6, 15, 0, 0, 0).unwrap());
    }

    #[test]
    fn test_window_uses_local_time_of_day() {
        // 23:30 UTC is 04:30 the next day at +05:00, still before a 05:00 reset.
        let tz = FixedOffset::east_opt(5 * 3600).unwrap();
        let now = Utc
            .with_ymd_and_hms(2024, 6, 15, 23, 30, 0)
            .unwrap()
            .with_timezone(&tz);
        let start = start_of_current_window(&now, hour(5));
        assert_eq!(start, tz.with_ymd_and_hms(2024, 6, 15, 5, 0, 0).unwrap());
    }

    #[test]
    fn test_every_hour_of_the_day() {
        let reset = hour(5);
        for h in 0..24 {
            let now = Utc.with_ymd_and_hms(2024, 6, 15, h, 17, 0).unwrap();
            let start = start_of_current_window(&now, reset);
            let expected_day = if h >= 5 { 15 } else { 14 };
            assert_eq!(start.day(), expected_day, "hour {h}");
            assert_eq!((start.hour(), start.minute(), start.second()), (5, 0, 0));
            assert!(start <= now);
        }
    }
}
