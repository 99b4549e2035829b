use async_trait::async_trait;
use sqlx::SqlitePool;

use super::CatalogRepository;
use crate::db::models::{Cinema, Movie, Screen};
use crate::error::{AppError, AppResult};

/// Read-only view over the catalog tables (`movies`, `cinemas`, `screens`).
#[derive(Clone)]
pub struct SqliteCatalogRepository {
    pool: SqlitePool,
}

impl SqliteCatalogRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl CatalogRepository for SqliteCatalogRepository {
    async fn find_movie(&self, id: &str) -> AppResult<Option<Movie>> {
        sqlx::query_as::<_, Movie>(
            r#"
            SELECT id, title, duration_minutes, status, is_active
            FROM movies
            WHERE id = ? AND is_active = 1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(AppError::Database)
    }

    async fn find_cinema(&self, id: &str) -> AppResult<Option<Cinema>> {
        sqlx::query_as::<_, Cinema>(
            r#"
            SELECT id, name, city, address, price_standard, price_vip, price_couple, is_active
            FROM cinemas
            WHERE id = ? AND is_active = 1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(AppError::Database)
    }

    async fn find_screen(&self, cinema_id: &str, screen_id: &str) -> AppResult<Option<Screen>> {
        sqlx::query_as::<_, Screen>(
            r#"
            SELECT id, cinema_id, name, screen_type, row_count, seats_per_row, total_seats
            FROM screens
            WHERE id = ? AND cinema_id = ?
            "#,
        )
        .bind(screen_id)
        .bind(cinema_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(AppError::Database)
    }
}
