use async_trait::async_trait;
use chrono::NaiveDateTime;

use crate::db::models::{
    Cinema, Movie, NewShowtime, Screen, Showtime, ShowtimeChanges, ShowtimeFilter, ShowtimeStatus,
};
use crate::error::AppResult;

pub mod catalog;
#[cfg(test)]
pub mod memory;
pub mod showtime;

pub use catalog::SqliteCatalogRepository;
pub use showtime::SqliteShowtimeRepository;

/// Persistence contract for showtimes.
///
/// `insert` and `update` re-check the overlap rule in the same atomic step as
/// the write and fail with `AppError::Conflict` when another active showtime
/// holds the screen. Callers may still run `find_overlapping` first to report
/// the clashing record, but must not rely on it alone.
#[async_trait]
pub trait ShowtimeRepository: Send + Sync {
    /// Fetch a showtime regardless of `is_active`.
    async fn find_by_id(&self, id: &str) -> AppResult<Option<Showtime>>;

    /// Active showtimes on the screen whose `[start, end)` intersects the given interval.
    async fn find_overlapping(
        &self,
        cinema_id: &str,
        screen_id: &str,
        start_time: NaiveDateTime,
        end_time: NaiveDateTime,
        exclude_id: Option<&str>,
    ) -> AppResult<Vec<Showtime>>;

    async fn insert(&self, showtime: NewShowtime) -> AppResult<Showtime>;

    /// Replace the mutable fields of an active showtime. With
    /// `require_no_bookings` the write is refused while seats are booked.
    async fn update(
        &self,
        id: &str,
        changes: ShowtimeChanges,
        require_no_bookings: bool,
    ) -> AppResult<Showtime>;

    /// Mark an active showtime inactive. Refused with `Conflict` while seats are booked.
    async fn soft_delete(&self, id: &str) -> AppResult<()>;

    /// Best-effort write-back of the derived display status.
    async fn cache_status(&self, id: &str, status: ShowtimeStatus) -> AppResult<()>;

    /// One page of matching showtimes ordered by `start_time`, plus the total match count.
    async fn list(&self, filter: &ShowtimeFilter) -> AppResult<(Vec<Showtime>, i64)>;
}

/// Lookups into the catalog (movies, cinemas, screens). Inactive movies and
/// cinemas do not resolve.
#[async_trait]
pub trait CatalogRepository: Send + Sync {
    async fn find_movie(&self, id: &str) -> AppResult<Option<Movie>>;
    async fn find_cinema(&self, id: &str) -> AppResult<Option<Cinema>>;
    async fn find_screen(&self, cinema_id: &str, screen_id: &str) -> AppResult<Option<Screen>>;
}
