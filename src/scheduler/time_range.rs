use chrono::{DateTime, Duration, NaiveDateTime, Utc};

use crate::predict::PredictError;

const COMPACT_TIME_FORMAT: &str = "%Y%m%d.%H%M%S";

/// Partially specified prediction window, completed against "now"
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TimeRangeArgs {
    pub start: Option<DateTime<Utc>>,
    pub end: Option<DateTime<Utc>>,
    pub hours_back: Option<Duration>,
    pub hours_to_check: Option<Duration>,
}

impl TimeRangeArgs {
    pub fn between(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Self {
            start: Some(start),
            end: Some(end),
            ..Default::default()
        }
    }

    /// Relative offsets win over explicit times. Without anything the
    /// window is the day before `now`.
    pub fn resolve(&self, now: DateTime<Utc>) -> Result<(DateTime<Utc>, DateTime<Utc>), PredictError> {
        let (start, end) = match (self.hours_back, self.hours_to_check) {
            (Some(back), None) | (None, Some(back)) => (now - back, now),
            (Some(back), Some(check)) => (now - back, now - back + check),
            (None, None) => match (self.start, self.end) {
                (None, None) => (now - Duration::days(1), now),
                (None, Some(end)) => (end - Duration::days(1), end),
                (Some(start), None) => (start, (start + Duration::days(1)).min(now)),
                (Some(start), Some(end)) => (start, end),
            },
        };

        if end < start {
            return Err(PredictError::InvalidWindow { start, end });
        }
        log::info!("Start time: {}", start);
        log::info!("End time:   {}", end);
        Ok((start, end))
    }
}

/// Accepts `20160110.000000` or RFC 3339
pub fn parse_time(s: &str) -> Result<DateTime<Utc>, String> {
    let s = s.trim();
    if let Ok(dt) = NaiveDateTime::parse_from_str(s, COMPACT_TIME_FORMAT) {
        return Ok(dt.and_utc());
    }
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| format!("'{}' is neither YYYYMMDD.HHMMSS nor RFC 3339: {}", s, e))
}

pub fn parse_duration(s: &str) -> Result<Duration, String> {
    humantime::parse_duration(s.trim())
        .map_err(|e| e.to_string())
        .and_then(|d| Duration::from_std(d).map_err(|e| e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2016, 1, 10, 12, 0, 0).unwrap()
    }

    #[test]
    fn defaults_to_previous_day() {
        let (start, end) = TimeRangeArgs::default().resolve(now()).unwrap();
        assert_eq!(end, now());
        assert_eq!(start, now() - Duration::days(1));
    }

    #[test]
    fn relative_hours_win() {
        let args = TimeRangeArgs {
            start: Some(now() - Duration::days(30)),
            hours_back: Some(Duration::hours(6)),
            ..Default::default()
        };
        assert_eq!(args.resolve(now()).unwrap(), (now() - Duration::hours(6), now()));

        let args = TimeRangeArgs {
            hours_back: Some(Duration::hours(6)),
            hours_to_check: Some(Duration::hours(2)),
            ..Default::default()
        };
        assert_eq!(
            args.resolve(now()).unwrap(),
            (now() - Duration::hours(6), now() - Duration::hours(4))
        );

        let args = TimeRangeArgs {
            hours_to_check: Some(Duration::hours(3)),
            ..Default::default()
        };
        assert_eq!(args.resolve(now()).unwrap(), (now() - Duration::hours(3), now()));
    }

    #[test]
    fn open_ended_ranges() {
        let end = now() - Duration::days(3);
        let args = TimeRangeArgs {
            end: Some(end),
            ..Default::default()
        };
        assert_eq!(args.resolve(now()).unwrap(), (end - Duration::days(1), end));

        // start close to now is clamped to now
        let start = now() - Duration::hours(2);
        let args = TimeRangeArgs {
            start: Some(start),
            ..Default::default()
        };
        assert_eq!(args.resolve(now()).unwrap(), (start, now()));
    }

    #[test]
    fn inverted_range_is_rejected() {
        let args = TimeRangeArgs::between(now(), now() - Duration::hours(1));
        assert!(matches!(
            args.resolve(now()),
            Err(PredictError::InvalidWindow { .. })
        ));
    }

    #[test]
    fn parses_both_time_formats() {
        let expected = Utc.with_ymd_and_hms(2016, 1, 10, 6, 30, 0).unwrap();
        assert_eq!(parse_time("20160110.063000").unwrap(), expected);
        assert_eq!(parse_time("2016-01-10T06:30:00Z").unwrap(), expected);
        assert!(parse_time("yesterday").is_err());
        assert_eq!(parse_duration("6h").unwrap(), Duration::hours(6));
    }
}
