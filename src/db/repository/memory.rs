//! In-memory repositories for exercising the scheduler without SQLite.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{Local, NaiveDateTime};
use uuid::Uuid;

use super::{CatalogRepository, ShowtimeRepository};
use crate::db::models::{
    Cinema, Movie, NewShowtime, Screen, Showtime, ShowtimeChanges, ShowtimeFilter, ShowtimeStatus,
};
use crate::error::{AppError, AppResult};

#[derive(Default)]
pub struct InMemoryShowtimeRepository {
    rows: Mutex<HashMap<String, Showtime>>,
}

impl InMemoryShowtimeRepository {
    /// Stand-in for the booking service appending seats to a showtime.
    pub fn book_seats(&self, id: &str, seats: &[&str]) {
        let mut rows = self.rows.lock().unwrap();
        if let Some(showtime) = rows.get_mut(id) {
            showtime
                .booked_seats
                .extend(seats.iter().map(|s| s.to_string()));
            showtime.available_seats -= seats.len() as i64;
        }
    }

    pub fn active(&self) -> Vec<Showtime> {
        self.rows
            .lock()
            .unwrap()
            .values()
            .filter(|s| s.is_active)
            .cloned()
            .collect()
    }

    fn clashes(
        rows: &HashMap<String, Showtime>,
        cinema_id: &str,
        screen_id: &str,
        start_time: NaiveDateTime,
        end_time: NaiveDateTime,
        exclude_id: Option<&str>,
    ) -> Vec<Showtime> {
        let mut found: Vec<Showtime> = rows
            .values()
            .filter(|s| s.is_active && s.cinema_id == cinema_id && s.screen_id == screen_id)
            .filter(|s| exclude_id.map_or(true, |id| s.id != id))
            .filter(|s| s.overlaps(start_time, end_time))
            .cloned()
            .collect();
        found.sort_by_key(|s| s.start_time);
        found
    }
}

#[async_trait]
impl ShowtimeRepository for InMemoryShowtimeRepository {
    async fn find_by_id(&self, id: &str) -> AppResult<Option<Showtime>> {
        Ok(self.rows.lock().unwrap().get(id).cloned())
    }

    async fn find_overlapping(
        &self,
        cinema_id: &str,
        screen_id: &str,
        start_time: NaiveDateTime,
        end_time: NaiveDateTime,
        exclude_id: Option<&str>,
    ) -> AppResult<Vec<Showtime>> {
        let rows = self.rows.lock().unwrap();
        Ok(Self::clashes(
            &rows, cinema_id, screen_id, start_time, end_time, exclude_id,
        ))
    }

    async fn insert(&self, showtime: NewShowtime) -> AppResult<Showtime> {
        let mut rows = self.rows.lock().unwrap();
        if !Self::clashes(
            &rows,
            &showtime.cinema_id,
            &showtime.screen_id,
            showtime.start_time,
            showtime.end_time,
            None,
        )
        .is_empty()
        {
            return Err(AppError::Conflict("Time slot taken".to_string()));
        }

        let now = Local::now().naive_local();
        let record = Showtime {
            id: Uuid::new_v4().to_string(),
            movie_id: showtime.movie_id,
            cinema_id: showtime.cinema_id,
            screen_id: showtime.screen_id,
            date: showtime.date,
            start_time: showtime.start_time,
            end_time: showtime.end_time,
            price: showtime.price,
            available_seats: showtime.available_seats,
            booked_seats: Vec::new(),
            status: showtime.status,
            is_active: true,
            created_at: now,
            updated_at: now,
        };
        rows.insert(record.id.clone(), record.clone());
        Ok(record)
    }

    async fn update(
        &self,
        id: &str,
        changes: ShowtimeChanges,
        require_no_bookings: bool,
    ) -> AppResult<Showtime> {
        let mut rows = self.rows.lock().unwrap();
        let cinema_id = match rows.get(id) {
            Some(existing) if existing.is_active => existing.cinema_id.clone(),
            _ => return Err(AppError::NotFound(format!("Showtime {} not found", id))),
        };
        if changes.check_overlap
            && !Self::clashes(
                &rows,
                &cinema_id,
                &changes.screen_id,
                changes.start_time,
                changes.end_time,
                Some(id),
            )
            .is_empty()
        {
            return Err(AppError::Conflict("Time slot taken".to_string()));
        }

        let existing = rows
            .get_mut(id)
            .ok_or_else(|| AppError::NotFound(format!("Showtime {} not found", id)))?;
        if require_no_bookings && existing.has_bookings() {
            return Err(AppError::Conflict(
                "Showtime has existing bookings".to_string(),
            ));
        }
        existing.movie_id = changes.movie_id;
        existing.screen_id = changes.screen_id;
        existing.date = changes.date;
        existing.start_time = changes.start_time;
        existing.end_time = changes.end_time;
        existing.price = changes.price;
        existing.available_seats = changes.available_seats;
        existing.status = changes.status;
        existing.updated_at = Local::now().naive_local();
        Ok(existing.clone())
    }

    async fn soft_delete(&self, id: &str) -> AppResult<()> {
        let mut rows = self.rows.lock().unwrap();
        match rows.get_mut(id) {
            Some(existing) if existing.is_active => {
                if existing.has_bookings() {
                    return Err(AppError::Conflict(
                        "Showtime has existing bookings".to_string(),
                    ));
                }
                existing.is_active = false;
                Ok(())
            }
            _ => Err(AppError::NotFound(format!("Showtime {} not found", id))),
        }
    }

    async fn cache_status(&self, id: &str, status: ShowtimeStatus) -> AppResult<()> {
        if let Some(existing) = self.rows.lock().unwrap().get_mut(id) {
            existing.status = status;
        }
        Ok(())
    }

    async fn list(&self, filter: &ShowtimeFilter) -> AppResult<(Vec<Showtime>, i64)> {
        let rows = self.rows.lock().unwrap();
        let mut matching: Vec<Showtime> =
            rows.values().filter(|s| filter.matches(s)).cloned().collect();
        matching.sort_by(|a, b| a.start_time.cmp(&b.start_time).then(a.id.cmp(&b.id)));

        let total = matching.len() as i64;
        let page = matching
            .into_iter()
            .skip(filter.offset.max(0) as usize)
            .take(filter.limit.max(0) as usize)
            .collect();
        Ok((page, total))
    }
}

#[derive(Default)]
pub struct InMemoryCatalog {
    pub movies: HashMap<String, Movie>,
    pub cinemas: HashMap<String, Cinema>,
    pub screens: HashMap<String, Screen>,
}

#[async_trait]
impl CatalogRepository for InMemoryCatalog {
    async fn find_movie(&self, id: &str) -> AppResult<Option<Movie>> {
        Ok(self.movies.get(id).filter(|m| m.is_active).cloned())
    }

    async fn find_cinema(&self, id: &str) -> AppResult<Option<Cinema>> {
        Ok(self.cinemas.get(id).filter(|c| c.is_active).cloned())
    }

    async fn find_screen(&self, cinema_id: &str, screen_id: &str) -> AppResult<Option<Screen>> {
        Ok(self
            .screens
            .get(screen_id)
            .filter(|s| s.cinema_id == cinema_id)
            .cloned())
    }
}
