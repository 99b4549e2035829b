use chrono::{DateTime, Local, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

use super::{PriceList, ShowtimeStatus};
use crate::error::{AppError, AppResult};

// ============================================================================
// Showtime
// ============================================================================

/// A scheduled screening of a movie on one screen of a cinema.
///
/// Times are cinema-local wall-clock values. `end_time` already includes the
/// cleaning buffer and is fixed at scheduling time; later edits to the
/// movie's runtime do not move it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Showtime {
    pub id: String,
    pub movie_id: String,
    pub cinema_id: String,
    pub screen_id: String,
    pub date: NaiveDate,
    pub start_time: NaiveDateTime,
    pub end_time: NaiveDateTime,
    pub price: PriceList,
    pub available_seats: i64,
    /// Seat ids held or sold by the booking service.
    pub booked_seats: Vec<String>,
    pub status: ShowtimeStatus,
    pub is_active: bool,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

impl Showtime {
    /// Half-open interval intersection against `[start_time, end_time)`.
    pub fn overlaps(&self, start_time: NaiveDateTime, end_time: NaiveDateTime) -> bool {
        self.start_time < end_time && self.end_time > start_time
    }

    pub fn has_bookings(&self) -> bool {
        !self.booked_seats.is_empty()
    }

    /// Recompute `status` for `now`. Returns `true` when the cached value changed.
    pub fn refresh_status(&mut self, now: NaiveDateTime) -> bool {
        let status = ShowtimeStatus::at(self.start_time, self.end_time, now);
        let changed = status != self.status;
        self.status = status;
        changed
    }
}

/// Fully derived record handed to the repository for insertion.
#[derive(Debug, Clone)]
pub struct NewShowtime {
    pub movie_id: String,
    pub cinema_id: String,
    pub screen_id: String,
    pub date: NaiveDate,
    pub start_time: NaiveDateTime,
    pub end_time: NaiveDateTime,
    pub price: PriceList,
    pub available_seats: i64,
    pub status: ShowtimeStatus,
}

/// Replacement values for the mutable columns of an existing showtime.
#[derive(Debug, Clone)]
pub struct ShowtimeChanges {
    pub movie_id: String,
    pub screen_id: String,
    pub date: NaiveDate,
    pub start_time: NaiveDateTime,
    pub end_time: NaiveDateTime,
    pub price: PriceList,
    pub available_seats: i64,
    pub status: ShowtimeStatus,
    /// Whether the write must be guarded by the overlap check.
    pub check_overlap: bool,
}

/// Listing filter. Day bounds and the future-only default are resolved by
/// the scheduler before the filter reaches the repository.
#[derive(Debug, Clone, Default)]
pub struct ShowtimeFilter {
    pub movie_id: Option<String>,
    pub cinema_id: Option<String>,
    pub starts_from: Option<NaiveDateTime>,
    pub starts_until: Option<NaiveDateTime>,
    pub include_inactive: bool,
    pub limit: i64,
    pub offset: i64,
}

impl ShowtimeFilter {
    pub fn matches(&self, showtime: &Showtime) -> bool {
        (self.include_inactive || showtime.is_active)
            && self
                .movie_id
                .as_deref()
                .map_or(true, |id| showtime.movie_id == id)
            && self
                .cinema_id
                .as_deref()
                .map_or(true, |id| showtime.cinema_id == id)
            && self.starts_from.map_or(true, |t| showtime.start_time >= t)
            && self.starts_until.map_or(true, |t| showtime.start_time <= t)
    }
}

// ============================================================================
// Request payloads
// ============================================================================

#[derive(Debug, Clone, Deserialize)]
pub struct CreateShowtimeRequest {
    #[serde(alias = "movieId")]
    pub movie_id: String,
    #[serde(alias = "cinemaId")]
    pub cinema_id: String,
    #[serde(alias = "screenId")]
    pub screen_id: String,
    #[serde(alias = "startTime")]
    pub start_time: String,
    pub date: Option<String>,
    pub price: Option<PriceList>,
}

/// Validated input for `ShowtimeScheduler::create`.
#[derive(Debug, Clone)]
pub struct CreateShowtime {
    pub movie_id: String,
    pub cinema_id: String,
    pub screen_id: String,
    pub start_time: NaiveDateTime,
    pub date: NaiveDate,
    pub price: Option<PriceList>,
}

impl CreateShowtimeRequest {
    pub fn validate(self) -> AppResult<CreateShowtime> {
        let movie_id = require_id(self.movie_id, "movie_id")?;
        let cinema_id = require_id(self.cinema_id, "cinema_id")?;
        let screen_id = require_id(self.screen_id, "screen_id")?;
        let start_time = parse_local_datetime(&self.start_time)?;

        let date = match self.date.as_deref() {
            Some(raw) => {
                let date = parse_date(raw)?;
                if date != start_time.date() {
                    return Err(AppError::Validation(format!(
                        "date {} does not match start_time {}",
                        date, start_time
                    )));
                }
                date
            }
            None => start_time.date(),
        };

        if let Some(price) = &self.price {
            validate_price(price)?;
        }

        Ok(CreateShowtime {
            movie_id,
            cinema_id,
            screen_id,
            start_time,
            date,
            price: self.price,
        })
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateShowtimeRequest {
    #[serde(alias = "movieId")]
    pub movie_id: Option<String>,
    #[serde(alias = "screenId")]
    pub screen_id: Option<String>,
    #[serde(alias = "startTime")]
    pub start_time: Option<String>,
    pub date: Option<String>,
    pub price: Option<PriceList>,
    #[serde(alias = "isActive")]
    pub is_active: Option<bool>,
}

/// Validated input for `ShowtimeScheduler::update`. `None` leaves a field as is.
#[derive(Debug, Clone, Default)]
pub struct ShowtimePatch {
    pub movie_id: Option<String>,
    pub screen_id: Option<String>,
    pub start_time: Option<NaiveDateTime>,
    /// Without `start_time`, moves the showing to this day at the same wall-clock time.
    pub date: Option<NaiveDate>,
    pub price: Option<PriceList>,
    pub is_active: Option<bool>,
}

impl ShowtimePatch {
    pub fn moves_slot(&self) -> bool {
        self.movie_id.is_some()
            || self.screen_id.is_some()
            || self.start_time.is_some()
            || self.date.is_some()
    }
}

impl UpdateShowtimeRequest {
    pub fn validate(self) -> AppResult<ShowtimePatch> {
        let patch = ShowtimePatch {
            movie_id: self
                .movie_id
                .map(|id| require_id(id, "movie_id"))
                .transpose()?,
            screen_id: self
                .screen_id
                .map(|id| require_id(id, "screen_id"))
                .transpose()?,
            start_time: self
                .start_time
                .as_deref()
                .map(parse_local_datetime)
                .transpose()?,
            date: self.date.as_deref().map(parse_date).transpose()?,
            price: self.price,
            is_active: self.is_active,
        };

        if let (Some(start_time), Some(date)) = (patch.start_time, patch.date) {
            if start_time.date() != date {
                return Err(AppError::Validation(format!(
                    "date {} does not match start_time {}",
                    date, start_time
                )));
            }
        }

        if let Some(price) = &patch.price {
            validate_price(price)?;
        }

        if !patch.moves_slot() && patch.price.is_none() && patch.is_active.is_none() {
            return Err(AppError::Validation(
                "Update must contain at least one field".to_string(),
            ));
        }

        Ok(patch)
    }
}

// ============================================================================
// Seat map
// ============================================================================

#[derive(Debug, Clone, Serialize)]
pub struct SeatMap {
    pub showtime_id: String,
    pub screen_id: String,
    pub total_seats: i64,
    pub available_seats: i64,
    pub rows: Vec<SeatRow>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SeatRow {
    pub label: String,
    pub seats: Vec<Seat>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Seat {
    pub id: String,
    pub booked: bool,
}

/// Row labels run `A`..`Z`, then `AA`, `AB`, ...
pub fn row_label(mut index: usize) -> String {
    let mut label = Vec::new();
    loop {
        label.push(b'A' + (index % 26) as u8);
        if index < 26 {
            break;
        }
        index = index / 26 - 1;
    }
    label.reverse();
    String::from_utf8_lossy(&label).into_owned()
}

// ============================================================================
// Parsing helpers
// ============================================================================

fn require_id(id: String, field: &str) -> AppResult<String> {
    let trimmed = id.trim();
    if trimmed.is_empty() {
        return Err(AppError::Validation(format!("{} is required", field)));
    }
    Ok(trimmed.to_string())
}

fn validate_price(price: &PriceList) -> AppResult<()> {
    if !price.is_valid() {
        return Err(AppError::Validation(
            "price components must be non-negative".to_string(),
        ));
    }
    Ok(())
}

/// Parse a cinema-local timestamp. Values carrying an offset (RFC 3339) are
/// converted to the server's local zone.
pub fn parse_local_datetime(raw: &str) -> AppResult<NaiveDateTime> {
    const FORMATS: [&str; 4] = [
        "%Y-%m-%dT%H:%M:%S%.f",
        "%Y-%m-%dT%H:%M",
        "%Y-%m-%d %H:%M:%S%.f",
        "%Y-%m-%d %H:%M",
    ];

    let raw = raw.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Ok(dt.with_timezone(&Local).naive_local());
    }
    FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
        .ok_or_else(|| AppError::Validation(format!("Invalid start_time: {}", raw)))
}

pub fn parse_date(raw: &str) -> AppResult<NaiveDate> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d")
        .map_err(|_| AppError::Validation(format!("Invalid date (expected YYYY-MM-DD): {}", raw)))
}
