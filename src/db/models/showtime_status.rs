use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

/// Display status of a showtime. Always derived from the wall clock; the
/// value stored in the `showtimes.status` column is only a cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ShowtimeStatus {
    Upcoming,
    Ongoing,
    Ended,
}

impl ShowtimeStatus {
    /// Status of a showing spanning `[start_time, end_time]` as seen at `now`.
    /// Both bounds count as `Ongoing`.
    pub fn at(start_time: NaiveDateTime, end_time: NaiveDateTime, now: NaiveDateTime) -> Self {
        if now < start_time {
            ShowtimeStatus::Upcoming
        } else if now <= end_time {
            ShowtimeStatus::Ongoing
        } else {
            ShowtimeStatus::Ended
        }
    }

    /// Convert from string (case-insensitive)
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "upcoming" => Some(ShowtimeStatus::Upcoming),
            "ongoing" => Some(ShowtimeStatus::Ongoing),
            "ended" => Some(ShowtimeStatus::Ended),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ShowtimeStatus::Upcoming => "upcoming",
            ShowtimeStatus::Ongoing => "ongoing",
            ShowtimeStatus::Ended => "ended",
        }
    }
}

impl From<ShowtimeStatus> for String {
    fn from(status: ShowtimeStatus) -> Self {
        status.as_str().to_string()
    }
}

impl TryFrom<&str> for ShowtimeStatus {
    type Error = String;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        Self::from_str(value).ok_or_else(|| format!("Invalid showtime status: {}", value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn at(h: u32, m: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2099, 3, 14)
            .and_then(|d| d.and_hms_opt(h, m, 0))
            .unwrap()
    }

    #[test]
    fn status_follows_the_clock() {
        let (start, end) = (at(14, 0), at(16, 15));
        assert_eq!(ShowtimeStatus::at(start, end, at(13, 59)), ShowtimeStatus::Upcoming);
        assert_eq!(ShowtimeStatus::at(start, end, at(15, 0)), ShowtimeStatus::Ongoing);
        assert_eq!(ShowtimeStatus::at(start, end, at(16, 16)), ShowtimeStatus::Ended);
    }

    #[test]
    fn bounds_are_ongoing() {
        let (start, end) = (at(14, 0), at(16, 15));
        assert_eq!(ShowtimeStatus::at(start, end, start), ShowtimeStatus::Ongoing);
        assert_eq!(ShowtimeStatus::at(start, end, end), ShowtimeStatus::Ongoing);
    }

    #[test]
    fn parses_case_insensitively() {
        assert_eq!(ShowtimeStatus::from_str("Ongoing"), Some(ShowtimeStatus::Ongoing));
        assert!(ShowtimeStatus::try_from("cancelled").is_err());
    }
}
