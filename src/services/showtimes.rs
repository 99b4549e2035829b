//! Showtime scheduling: slot derivation, overlap enforcement, display status
//! and soft-delete lifecycle. Stateless; everything lives in the repositories.

use std::sync::Arc;

use chrono::{Duration, Local, NaiveDate, NaiveDateTime, NaiveTime};
use serde::Serialize;

use crate::config::{SchedulingConfig, MAX_CLEANING_BUFFER_MINUTES};
use crate::db::models::{
    row_label, CreateShowtime, Movie, NewShowtime, Seat, SeatMap, SeatRow, Showtime,
    ShowtimeChanges, ShowtimeFilter, ShowtimePatch, ShowtimeStatus,
};
use crate::db::repository::{CatalogRepository, ShowtimeRepository};
use crate::error::{AppError, AppResult};

pub type Clock = Arc<dyn Fn() -> NaiveDateTime + Send + Sync>;

/// Filters accepted by the listing endpoints.
#[derive(Debug, Clone, Default)]
pub struct ShowtimeQuery {
    pub movie_id: Option<String>,
    pub cinema_id: Option<String>,
    pub date: Option<NaiveDate>,
    pub page: Option<i64>,
    pub limit: Option<i64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ShowtimePage {
    pub showtimes: Vec<Showtime>,
    pub total: i64,
    pub page: i64,
    pub limit: i64,
    pub total_pages: i64,
}

pub struct ShowtimeScheduler {
    showtimes: Arc<dyn ShowtimeRepository>,
    catalog: Arc<dyn CatalogRepository>,
    cleaning_buffer: Duration,
    default_page_size: i64,
    max_page_size: i64,
    clock: Clock,
}

impl ShowtimeScheduler {
    pub fn new(
        showtimes: Arc<dyn ShowtimeRepository>,
        catalog: Arc<dyn CatalogRepository>,
        config: &SchedulingConfig,
    ) -> Self {
        Self {
            showtimes,
            catalog,
            cleaning_buffer: Duration::try_minutes(
                config
                    .cleaning_buffer_minutes
                    .clamp(0, MAX_CLEANING_BUFFER_MINUTES),
            )
            .unwrap_or_else(Duration::zero),
            default_page_size: config.default_page_size.max(1),
            max_page_size: config.max_page_size.max(1),
            clock: Arc::new(|| Local::now().naive_local()),
        }
    }

    /// Replace the wall clock, e.g. to pin "now" in tests.
    pub fn with_clock(mut self, clock: impl Fn() -> NaiveDateTime + Send + Sync + 'static) -> Self {
        self.clock = Arc::new(clock);
        self
    }

    fn now(&self) -> NaiveDateTime {
        (self.clock)()
    }

    /// `start + runtime + cleaning buffer`.
    pub fn end_time_for(&self, start_time: NaiveDateTime, movie: &Movie) -> AppResult<NaiveDateTime> {
        if movie.duration_minutes <= 0 {
            return Err(AppError::Validation(format!(
                "Movie {} has no valid duration",
                movie.title
            )));
        }
        Duration::try_minutes(movie.duration_minutes)
            .and_then(|runtime| start_time.checked_add_signed(runtime))
            .and_then(|t| t.checked_add_signed(self.cleaning_buffer))
            .ok_or_else(|| AppError::Validation("start_time is out of range".to_string()))
    }

    async fn schedulable_movie(&self, movie_id: &str) -> AppResult<Movie> {
        let movie = self
            .catalog
            .find_movie(movie_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Movie {} not found", movie_id)))?;

        if !movie.is_schedulable() {
            return Err(AppError::Validation(format!(
                "Movie {} is no longer showing",
                movie.title
            )));
        }
        Ok(movie)
    }

    fn ensure_future(&self, start_time: NaiveDateTime) -> AppResult<()> {
        if start_time < self.now() {
            return Err(AppError::Validation(
                "start_time must not be in the past".to_string(),
            ));
        }
        Ok(())
    }

    /// Fails with `Conflict` naming the first clashing showtime, if any.
    async fn ensure_slot_free(
        &self,
        cinema_id: &str,
        screen_id: &str,
        start_time: NaiveDateTime,
        end_time: NaiveDateTime,
        exclude_id: Option<&str>,
    ) -> AppResult<()> {
        let clashes = self
            .showtimes
            .find_overlapping(cinema_id, screen_id, start_time, end_time, exclude_id)
            .await?;

        if let Some(clash) = clashes.first() {
            tracing::warn!(
                "Rejected slot {} - {} on screen {}: overlaps showtime {}",
                start_time,
                end_time,
                screen_id,
                clash.id
            );
            return Err(AppError::Conflict(format!(
                "Screen {} is already booked from {} to {}",
                screen_id,
                clash.start_time.format("%Y-%m-%d %H:%M"),
                clash.end_time.format("%Y-%m-%d %H:%M")
            )));
        }
        Ok(())
    }

    pub async fn create(&self, input: CreateShowtime) -> AppResult<Showtime> {
        let movie = self.schedulable_movie(&input.movie_id).await?;
        let cinema = self
            .catalog
            .find_cinema(&input.cinema_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Cinema {} not found", input.cinema_id)))?;
        let screen = self
            .catalog
            .find_screen(&cinema.id, &input.screen_id)
            .await?
            .ok_or_else(|| {
                AppError::NotFound(format!(
                    "Screen {} not found in cinema {}",
                    input.screen_id, cinema.id
                ))
            })?;

        self.ensure_future(input.start_time)?;
        let end_time = self.end_time_for(input.start_time, &movie)?;
        self.ensure_slot_free(&cinema.id, &screen.id, input.start_time, end_time, None)
            .await?;

        let new = NewShowtime {
            movie_id: movie.id,
            cinema_id: cinema.id,
            screen_id: screen.id,
            date: input.date,
            start_time: input.start_time,
            end_time,
            price: input.price.unwrap_or(cinema.default_price),
            available_seats: screen.total_seats,
            status: ShowtimeStatus::at(input.start_time, end_time, self.now()),
        };

        // The repository re-checks the overlap atomically with the insert.
        let showtime = self.showtimes.insert(new).await?;
        tracing::info!(
            "Created showtime {} on screen {} ({} - {})",
            showtime.id,
            showtime.screen_id,
            showtime.start_time,
            showtime.end_time
        );
        Ok(showtime)
    }

    /// Refresh the derived status and write it back when it changed. The
    /// write-back is a cache; failures are logged, never surfaced.
    async fn refresh(&self, showtime: &mut Showtime, now: NaiveDateTime) {
        if showtime.refresh_status(now) {
            tracing::debug!(
                "Showtime {} status is now {}",
                showtime.id,
                showtime.status.as_str()
            );
            if let Err(e) = self.showtimes.cache_status(&showtime.id, showtime.status).await {
                tracing::warn!("Failed to cache status for showtime {}: {:?}", showtime.id, e);
            }
        }
    }

    async fn find_active(&self, id: &str) -> AppResult<Showtime> {
        self.showtimes
            .find_by_id(id)
            .await?
            .filter(|s| s.is_active)
            .ok_or_else(|| AppError::NotFound(format!("Showtime {} not found", id)))
    }

    pub async fn get(&self, id: &str) -> AppResult<Showtime> {
        let mut showtime = self.find_active(id).await?;
        self.refresh(&mut showtime, self.now()).await;
        Ok(showtime)
    }

    pub async fn update(&self, id: &str, patch: ShowtimePatch) -> AppResult<Showtime> {
        let existing = self.find_active(id).await?;

        if patch.is_active == Some(false) {
            if patch.moves_slot() || patch.price.is_some() {
                return Err(AppError::Validation(
                    "is_active=false cannot be combined with other changes".to_string(),
                ));
            }
            self.delete(id).await?;
            return self
                .showtimes
                .find_by_id(id)
                .await?
                .ok_or_else(|| AppError::NotFound(format!("Showtime {} not found", id)));
        }

        let movie_changed = patch
            .movie_id
            .as_deref()
            .is_some_and(|m| m != existing.movie_id);
        let screen_changed = patch
            .screen_id
            .as_deref()
            .is_some_and(|s| s != existing.screen_id);

        let start_time = match (patch.start_time, patch.date) {
            (Some(start_time), _) => start_time,
            (None, Some(date)) => date.and_time(existing.start_time.time()),
            (None, None) => existing.start_time,
        };
        let start_changed = start_time != existing.start_time;

        let mut available_seats = existing.available_seats;
        let mut screen_id = existing.screen_id.clone();
        if screen_changed {
            if existing.has_bookings() {
                return Err(AppError::Conflict(
                    "Cannot move a showtime with existing bookings to another screen".to_string(),
                ));
            }
            let new_screen = patch.screen_id.as_deref().unwrap_or(&existing.screen_id);
            let screen = self
                .catalog
                .find_screen(&existing.cinema_id, new_screen)
                .await?
                .ok_or_else(|| {
                    AppError::NotFound(format!(
                        "Screen {} not found in cinema {}",
                        new_screen, existing.cinema_id
                    ))
                })?;
            available_seats = screen.total_seats;
            screen_id = screen.id;
        }

        let mut movie_id = existing.movie_id.clone();
        let mut end_time = existing.end_time;
        if movie_changed || start_changed {
            let target = patch.movie_id.as_deref().unwrap_or(&existing.movie_id);
            let movie = self.schedulable_movie(target).await?;
            if start_changed {
                self.ensure_future(start_time)?;
            }
            end_time = self.end_time_for(start_time, &movie)?;
            movie_id = movie.id;
        }

        let check_overlap =
            screen_changed || start_changed || end_time != existing.end_time;
        if check_overlap {
            self.ensure_slot_free(&existing.cinema_id, &screen_id, start_time, end_time, Some(id))
                .await?;
        }

        let changes = ShowtimeChanges {
            movie_id,
            screen_id,
            date: start_time.date(),
            start_time,
            end_time,
            price: patch.price.unwrap_or(existing.price),
            available_seats,
            status: ShowtimeStatus::at(start_time, end_time, self.now()),
            check_overlap,
        };

        let updated = self.showtimes.update(id, changes, screen_changed).await?;
        tracing::info!("Updated showtime {}", updated.id);
        Ok(updated)
    }

    pub async fn delete(&self, id: &str) -> AppResult<()> {
        let existing = self.find_active(id).await?;
        if existing.has_bookings() {
            return Err(AppError::Conflict(format!(
                "Cannot delete showtime {}: it has existing bookings",
                id
            )));
        }

        // Guarded again in the store in case a booking landed in between.
        self.showtimes.soft_delete(id).await?;
        tracing::info!("Soft-deleted showtime {}", id);
        Ok(())
    }

    /// Resolve `(page, limit, offset)`; a page whose offset cannot be
    /// represented is a validation error.
    fn page_window(&self, query: &ShowtimeQuery) -> AppResult<(i64, i64, i64)> {
        let page = query.page.unwrap_or(1).max(1);
        let limit = query
            .limit
            .unwrap_or(self.default_page_size)
            .clamp(1, self.max_page_size);
        let offset = (page - 1)
            .checked_mul(limit)
            .ok_or_else(|| AppError::Validation(format!("page {} is out of range", page)))?;
        Ok((page, limit, offset))
    }

    /// Public listing: active showtimes only; without a `date`, only those
    /// starting from now on.
    pub async fn list(&self, query: ShowtimeQuery) -> AppResult<ShowtimePage> {
        let now = self.now();
        let (starts_from, starts_until) = match query.date {
            Some(day) => {
                let (from, until) = day_bounds(day);
                (Some(from), Some(until))
            }
            None => (Some(now), None),
        };
        self.fetch_page(query, starts_from, starts_until, false, now)
            .await
    }

    /// Administrative listing that also returns soft-deleted and past showtimes.
    pub async fn list_history(
        &self,
        query: ShowtimeQuery,
        include_inactive: bool,
    ) -> AppResult<ShowtimePage> {
        let (starts_from, starts_until) = match query.date.map(day_bounds) {
            Some((from, until)) => (Some(from), Some(until)),
            None => (None, None),
        };
        self.fetch_page(query, starts_from, starts_until, include_inactive, self.now())
            .await
    }

    async fn fetch_page(
        &self,
        query: ShowtimeQuery,
        starts_from: Option<NaiveDateTime>,
        starts_until: Option<NaiveDateTime>,
        include_inactive: bool,
        now: NaiveDateTime,
    ) -> AppResult<ShowtimePage> {
        let (page, limit, offset) = self.page_window(&query)?;
        let filter = ShowtimeFilter {
            movie_id: query.movie_id,
            cinema_id: query.cinema_id,
            starts_from,
            starts_until,
            include_inactive,
            limit,
            offset,
        };

        let (mut showtimes, total) = self.showtimes.list(&filter).await?;
        for showtime in showtimes.iter_mut() {
            self.refresh(showtime, now).await;
        }

        Ok(ShowtimePage {
            showtimes,
            total,
            page,
            limit,
            total_pages: (total + limit - 1) / limit,
        })
    }

    pub async fn seat_map(&self, id: &str) -> AppResult<SeatMap> {
        let showtime = self.find_active(id).await?;
        let screen = self
            .catalog
            .find_screen(&showtime.cinema_id, &showtime.screen_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Screen {} not found", showtime.screen_id)))?;

        let rows = (0..screen.row_count.max(0) as usize)
            .map(|r| {
                let label = row_label(r);
                let seats = (1..=screen.seats_per_row.max(0))
                    .map(|n| {
                        let id = format!("{}{}", label, n);
                        let booked = showtime.booked_seats.contains(&id);
                        Seat { id, booked }
                    })
                    .collect();
                SeatRow { label, seats }
            })
            .collect();

        Ok(SeatMap {
            showtime_id: showtime.id,
            screen_id: screen.id,
            total_seats: screen.total_seats,
            available_seats: showtime.available_seats,
            rows,
        })
    }
}

/// `[00:00:00.000, 23:59:59.999]` of the given local day.
pub fn day_bounds(day: NaiveDate) -> (NaiveDateTime, NaiveDateTime) {
    let start = day.and_time(NaiveTime::MIN);
    (start, start + Duration::days(1) - Duration::milliseconds(1))
}
