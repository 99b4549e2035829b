use std::sync::Arc;

use axum::{
    extract::State,
    http::StatusCode,
    routing::get,
    Json, Router,
};
use serde::Deserialize;
use serde_json::json;

use crate::db::models::{parse_date, CreateShowtimeRequest, UpdateShowtimeRequest};
use crate::error::AppResult;
use crate::routes::auth::AdminUser;
use crate::routes::extract::{AppJson, AppPath, AppQuery};
use crate::services::showtimes::{ShowtimePage, ShowtimeQuery};
use crate::AppState;

/// Public reads plus admin-only writes under `/api/showtimes`.
pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", get(list_showtimes).post(create_showtime))
        .route(
            "/:id",
            get(get_showtime)
                .put(update_showtime)
                .delete(delete_showtime),
        )
        .route("/:id/seats", get(get_seat_map))
        .route("/movie/:movie_id", get(list_by_movie))
        .route("/cinema/:cinema_id", get(list_by_cinema))
}

/// Administrative history under `/api/admin/showtimes`.
pub fn admin_router() -> Router<Arc<AppState>> {
    Router::new().route("/", get(list_history))
}

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Debug, Default, Deserialize)]
pub struct ListShowtimesQuery {
    #[serde(alias = "movieId")]
    pub movie_id: Option<String>,
    #[serde(alias = "cinemaId")]
    pub cinema_id: Option<String>,
    pub date: Option<String>,
    pub page: Option<i64>,
    pub limit: Option<i64>,
    #[serde(alias = "includeInactive")]
    pub include_inactive: Option<bool>,
}

impl ListShowtimesQuery {
    fn into_query(self) -> AppResult<ShowtimeQuery> {
        let non_empty = |v: Option<String>| v.map(|s| s.trim().to_string()).filter(|s| !s.is_empty());

        Ok(ShowtimeQuery {
            movie_id: non_empty(self.movie_id),
            cinema_id: non_empty(self.cinema_id),
            date: non_empty(self.date).as_deref().map(parse_date).transpose()?,
            page: self.page,
            limit: self.limit,
        })
    }
}

fn page_response(page: ShowtimePage) -> Json<serde_json::Value> {
    Json(json!({
        "success": true,
        "count": page.showtimes.len(),
        "total": page.total,
        "total_pages": page.total_pages,
        "current_page": page.page,
        "limit": page.limit,
        "showtimes": page.showtimes,
    }))
}

// ============================================================================
// Handlers
// ============================================================================

/// List upcoming showtimes (or those of one day), filtered by movie/cinema.
async fn list_showtimes(
    State(state): State<Arc<AppState>>,
    AppQuery(query): AppQuery<ListShowtimesQuery>,
) -> AppResult<Json<serde_json::Value>> {
    let page = state.scheduler.list(query.into_query()?).await?;
    Ok(page_response(page))
}

async fn list_by_movie(
    State(state): State<Arc<AppState>>,
    AppPath(movie_id): AppPath<String>,
    AppQuery(query): AppQuery<ListShowtimesQuery>,
) -> AppResult<Json<serde_json::Value>> {
    let mut query = query.into_query()?;
    query.movie_id = Some(movie_id);
    let page = state.scheduler.list(query).await?;
    Ok(page_response(page))
}

async fn list_by_cinema(
    State(state): State<Arc<AppState>>,
    AppPath(cinema_id): AppPath<String>,
    AppQuery(query): AppQuery<ListShowtimesQuery>,
) -> AppResult<Json<serde_json::Value>> {
    let mut query = query.into_query()?;
    query.cinema_id = Some(cinema_id);
    let page = state.scheduler.list(query).await?;
    Ok(page_response(page))
}

/// Fetch one showtime; the display status is recomputed on the way out.
async fn get_showtime(
    State(state): State<Arc<AppState>>,
    AppPath(id): AppPath<String>,
) -> AppResult<Json<serde_json::Value>> {
    let showtime = state.scheduler.get(&id).await?;
    Ok(Json(json!({ "success": true, "showtime": showtime })))
}

async fn get_seat_map(
    State(state): State<Arc<AppState>>,
    AppPath(id): AppPath<String>,
) -> AppResult<Json<serde_json::Value>> {
    let seat_map = state.scheduler.seat_map(&id).await?;
    Ok(Json(json!({ "success": true, "seat_map": seat_map })))
}

async fn create_showtime(
    State(state): State<Arc<AppState>>,
    AdminUser(admin): AdminUser,
    AppJson(payload): AppJson<CreateShowtimeRequest>,
) -> AppResult<(StatusCode, Json<serde_json::Value>)> {
    let input = payload.validate()?;
    let showtime = state.scheduler.create(input).await?;
    tracing::debug!("Showtime {} created by {}", showtime.id, admin.sub);

    Ok((
        StatusCode::CREATED,
        Json(json!({ "success": true, "showtime": showtime })),
    ))
}

async fn update_showtime(
    State(state): State<Arc<AppState>>,
    AdminUser(admin): AdminUser,
    AppPath(id): AppPath<String>,
    AppJson(payload): AppJson<UpdateShowtimeRequest>,
) -> AppResult<Json<serde_json::Value>> {
    let patch = payload.validate()?;
    let showtime = state.scheduler.update(&id, patch).await?;
    tracing::debug!("Showtime {} updated by {}", showtime.id, admin.sub);

    Ok(Json(json!({ "success": true, "showtime": showtime })))
}

async fn delete_showtime(
    State(state): State<Arc<AppState>>,
    AdminUser(admin): AdminUser,
    AppPath(id): AppPath<String>,
) -> AppResult<Json<serde_json::Value>> {
    state.scheduler.delete(&id).await?;
    tracing::debug!("Showtime {} deleted by {}", id, admin.sub);

    Ok(Json(json!({
        "success": true,
        "message": "Showtime deleted successfully"
    })))
}

/// Admin listing including soft-deleted and past showtimes.
async fn list_history(
    State(state): State<Arc<AppState>>,
    AdminUser(_admin): AdminUser,
    AppQuery(query): AppQuery<ListShowtimesQuery>,
) -> AppResult<Json<serde_json::Value>> {
    let include_inactive = query.include_inactive.unwrap_or(true);
    let page = state
        .scheduler
        .list_history(query.into_query()?, include_inactive)
        .await?;
    Ok(page_response(page))
}
