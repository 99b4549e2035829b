use async_trait::async_trait;
use chrono::{Local, NaiveDate, NaiveDateTime};
use sqlx::{FromRow, SqlitePool};
use uuid::Uuid;

use super::ShowtimeRepository;
use crate::db::models::{
    NewShowtime, PriceList, Showtime, ShowtimeChanges, ShowtimeFilter, ShowtimeStatus,
};
use crate::error::{AppError, AppResult};

const SHOWTIME_COLUMNS: &str = r#"
    id, movie_id, cinema_id, screen_id, date, start_time, end_time,
    price_standard, price_vip, price_couple,
    available_seats, booked_seats, status, is_active, created_at, updated_at
"#;

/// Raw `showtimes` row. `booked_seats` is a JSON array kept by the booking service.
#[derive(Debug, FromRow)]
struct ShowtimeRow {
    id: String,
    movie_id: String,
    cinema_id: String,
    screen_id: String,
    date: NaiveDate,
    start_time: NaiveDateTime,
    end_time: NaiveDateTime,
    #[sqlx(flatten)]
    price: PriceList,
    available_seats: i64,
    booked_seats: String,
    status: String,
    is_active: bool,
    created_at: NaiveDateTime,
    updated_at: NaiveDateTime,
}

impl TryFrom<ShowtimeRow> for Showtime {
    type Error = AppError;

    fn try_from(row: ShowtimeRow) -> Result<Self, Self::Error> {
        let booked_seats: Vec<String> = serde_json::from_str(&row.booked_seats).map_err(|e| {
            AppError::Internal(anyhow::anyhow!(
                "Corrupt booked_seats for showtime {}: {}",
                row.id,
                e
            ))
        })?;

        // The stored status is a cache; an unknown value is replaced on the next read.
        let status = ShowtimeStatus::from_str(&row.status).unwrap_or(ShowtimeStatus::Upcoming);

        Ok(Showtime {
            id: row.id,
            movie_id: row.movie_id,
            cinema_id: row.cinema_id,
            screen_id: row.screen_id,
            date: row.date,
            start_time: row.start_time,
            end_time: row.end_time,
            price: row.price,
            available_seats: row.available_seats,
            booked_seats,
            status,
            is_active: row.is_active,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

fn into_showtimes(rows: Vec<ShowtimeRow>) -> AppResult<Vec<Showtime>> {
    rows.into_iter().map(Showtime::try_from).collect()
}

/// Repository for the `showtimes` table.
///
/// Writes that must respect the no-overlap rule are single conditional
/// statements (`INSERT ... SELECT ... WHERE NOT EXISTS`, `UPDATE ... WHERE
/// NOT EXISTS`). SQLite serializes writers, so the overlap check and the
/// write cannot interleave with a concurrent scheduler call.
#[derive(Clone)]
pub struct SqliteShowtimeRepository {
    pool: SqlitePool,
}

impl SqliteShowtimeRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Explain why a guarded write touched no rows.
    async fn rejection_for(&self, id: &str, bookings_guarded: bool) -> AppResult<AppError> {
        match self.find_by_id(id).await? {
            Some(existing) if existing.is_active => {
                if bookings_guarded && existing.has_bookings() {
                    Ok(AppError::Conflict(
                        "Showtime has existing bookings".to_string(),
                    ))
                } else {
                    Ok(AppError::Conflict(
                        "Time slot conflicts with another showtime on this screen".to_string(),
                    ))
                }
            }
            _ => Ok(AppError::NotFound(format!("Showtime {} not found", id))),
        }
    }
}

#[async_trait]
impl ShowtimeRepository for SqliteShowtimeRepository {
    async fn find_by_id(&self, id: &str) -> AppResult<Option<Showtime>> {
        let row = sqlx::query_as::<_, ShowtimeRow>(&format!(
            "SELECT {} FROM showtimes WHERE id = ?",
            SHOWTIME_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(AppError::Database)?;

        row.map(Showtime::try_from).transpose()
    }

    async fn find_overlapping(
        &self,
        cinema_id: &str,
        screen_id: &str,
        start_time: NaiveDateTime,
        end_time: NaiveDateTime,
        exclude_id: Option<&str>,
    ) -> AppResult<Vec<Showtime>> {
        let rows = sqlx::query_as::<_, ShowtimeRow>(&format!(
            r#"
            SELECT {}
            FROM showtimes
            WHERE cinema_id = ?
            AND screen_id = ?
            AND is_active = 1
            AND start_time < ?
            AND end_time > ?
            AND (? IS NULL OR id != ?)
            ORDER BY start_time ASC
            "#,
            SHOWTIME_COLUMNS
        ))
        .bind(cinema_id)
        .bind(screen_id)
        .bind(end_time)
        .bind(start_time)
        .bind(exclude_id)
        .bind(exclude_id)
        .fetch_all(&self.pool)
        .await
        .map_err(AppError::Database)?;

        into_showtimes(rows)
    }

    async fn insert(&self, showtime: NewShowtime) -> AppResult<Showtime> {
        let id = Uuid::new_v4().to_string();
        let now = Local::now().naive_local();

        let row = sqlx::query_as::<_, ShowtimeRow>(&format!(
            r#"
            INSERT INTO showtimes (
                id, movie_id, cinema_id, screen_id, date, start_time, end_time,
                price_standard, price_vip, price_couple,
                available_seats, booked_seats, status, is_active, created_at, updated_at
            )
            SELECT ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, '[]', ?, 1, ?, ?
            WHERE NOT EXISTS (
                SELECT 1 FROM showtimes
                WHERE cinema_id = ?
                AND screen_id = ?
                AND is_active = 1
                AND start_time < ?
                AND end_time > ?
            )
            RETURNING {}
            "#,
            SHOWTIME_COLUMNS
        ))
        .bind(&id)
        .bind(&showtime.movie_id)
        .bind(&showtime.cinema_id)
        .bind(&showtime.screen_id)
        .bind(showtime.date)
        .bind(showtime.start_time)
        .bind(showtime.end_time)
        .bind(showtime.price.standard)
        .bind(showtime.price.vip)
        .bind(showtime.price.couple)
        .bind(showtime.available_seats)
        .bind(showtime.status.as_str())
        .bind(now)
        .bind(now)
        .bind(&showtime.cinema_id)
        .bind(&showtime.screen_id)
        .bind(showtime.end_time)
        .bind(showtime.start_time)
        .fetch_optional(&self.pool)
        .await
        .map_err(AppError::Database)?;

        match row {
            Some(row) => Showtime::try_from(row),
            None => Err(AppError::Conflict(
                "Time slot conflicts with another showtime on this screen".to_string(),
            )),
        }
    }

    async fn update(
        &self,
        id: &str,
        changes: ShowtimeChanges,
        require_no_bookings: bool,
    ) -> AppResult<Showtime> {
        let now = Local::now().naive_local();

        let row = sqlx::query_as::<_, ShowtimeRow>(&format!(
            r#"
            UPDATE showtimes
            SET movie_id = ?,
                screen_id = ?,
                date = ?,
                start_time = ?,
                end_time = ?,
                price_standard = ?,
                price_vip = ?,
                price_couple = ?,
                available_seats = ?,
                status = ?,
                updated_at = ?
            WHERE id = ?
            AND is_active = 1
            AND (? = 0 OR json_array_length(booked_seats) = 0)
            AND (? = 0 OR NOT EXISTS (
                SELECT 1 FROM showtimes AS other
                WHERE other.id != showtimes.id
                AND other.cinema_id = showtimes.cinema_id
                AND other.screen_id = ?
                AND other.is_active = 1
                AND other.start_time < ?
                AND other.end_time > ?
            ))
            RETURNING {}
            "#,
            SHOWTIME_COLUMNS
        ))
        .bind(&changes.movie_id)
        .bind(&changes.screen_id)
        .bind(changes.date)
        .bind(changes.start_time)
        .bind(changes.end_time)
        .bind(changes.price.standard)
        .bind(changes.price.vip)
        .bind(changes.price.couple)
        .bind(changes.available_seats)
        .bind(changes.status.as_str())
        .bind(now)
        .bind(id)
        .bind(require_no_bookings)
        .bind(changes.check_overlap)
        .bind(&changes.screen_id)
        .bind(changes.end_time)
        .bind(changes.start_time)
        .fetch_optional(&self.pool)
        .await
        .map_err(AppError::Database)?;

        match row {
            Some(row) => Showtime::try_from(row),
            None => Err(self.rejection_for(id, require_no_bookings).await?),
        }
    }

    async fn soft_delete(&self, id: &str) -> AppResult<()> {
        let now = Local::now().naive_local();

        let result = sqlx::query(
            r#"
            UPDATE showtimes
            SET is_active = 0, updated_at = ?
            WHERE id = ?
            AND is_active = 1
            AND json_array_length(booked_seats) = 0
            "#,
        )
        .bind(now)
        .bind(id)
        .execute(&self.pool)
        .await
        .map_err(AppError::Database)?;

        if result.rows_affected() == 0 {
            return Err(self.rejection_for(id, true).await?);
        }
        Ok(())
    }

    async fn cache_status(&self, id: &str, status: ShowtimeStatus) -> AppResult<()> {
        sqlx::query("UPDATE showtimes SET status = ? WHERE id = ?")
            .bind(status.as_str())
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(AppError::Database)?;
        Ok(())
    }

    async fn list(&self, filter: &ShowtimeFilter) -> AppResult<(Vec<Showtime>, i64)> {
        let rows = sqlx::query_as::<_, ShowtimeRow>(&format!(
            r#"
            SELECT {}
            FROM showtimes
            WHERE (? = 1 OR is_active = 1)
            AND (? IS NULL OR movie_id = ?)
            AND (? IS NULL OR cinema_id = ?)
            AND (? IS NULL OR start_time >= ?)
            AND (? IS NULL OR start_time <= ?)
            ORDER BY start_time ASC, id ASC
            LIMIT ?
            OFFSET ?
            "#,
            SHOWTIME_COLUMNS
        ))
        .bind(filter.include_inactive)
        .bind(filter.movie_id.as_deref())
        .bind(filter.movie_id.as_deref())
        .bind(filter.cinema_id.as_deref())
        .bind(filter.cinema_id.as_deref())
        .bind(filter.starts_from)
        .bind(filter.starts_from)
        .bind(filter.starts_until)
        .bind(filter.starts_until)
        .bind(filter.limit)
        .bind(filter.offset)
        .fetch_all(&self.pool)
        .await
        .map_err(AppError::Database)?;

        let total: i64 = sqlx::query_scalar(
            r#"
            SELECT COUNT(*)
            FROM showtimes
            WHERE (? = 1 OR is_active = 1)
            AND (? IS NULL OR movie_id = ?)
            AND (? IS NULL OR cinema_id = ?)
            AND (? IS NULL OR start_time >= ?)
            AND (? IS NULL OR start_time <= ?)
            "#,
        )
        .bind(filter.include_inactive)
        .bind(filter.movie_id.as_deref())
        .bind(filter.movie_id.as_deref())
        .bind(filter.cinema_id.as_deref())
        .bind(filter.cinema_id.as_deref())
        .bind(filter.starts_from)
        .bind(filter.starts_from)
        .bind(filter.starts_until)
        .bind(filter.starts_until)
        .fetch_one(&self.pool)
        .await
        .map_err(AppError::Database)?;

        Ok((into_showtimes(rows)?, total))
    }
}
