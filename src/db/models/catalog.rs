use serde::{Deserialize, Serialize};
use sqlx::FromRow;

// ============================================================================
// Catalog models (owned by the catalog service, read-only here)
// ============================================================================

/// Ticket prices per seat class, in whole currency units.
#[derive(Debug, Clone, Copy, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct PriceList {
    #[sqlx(rename = "price_standard")]
    pub standard: i64,
    #[sqlx(rename = "price_vip")]
    pub vip: i64,
    #[sqlx(rename = "price_couple")]
    pub couple: i64,
}

impl PriceList {
    pub fn is_valid(&self) -> bool {
        self.standard >= 0 && self.vip >= 0 && self.couple >= 0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MovieStatus {
    ComingSoon,
    NowShowing,
    Ended,
}

impl MovieStatus {
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "coming_soon" => Some(MovieStatus::ComingSoon),
            "now_showing" => Some(MovieStatus::NowShowing),
            "ended" => Some(MovieStatus::Ended),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Movie {
    pub id: String,
    pub title: String,
    pub duration_minutes: i64,
    /// One of `coming_soon`, `now_showing`, `ended`.
    pub status: String,
    pub is_active: bool,
}

impl Movie {
    /// Unknown status strings are treated as schedulable.
    pub fn is_schedulable(&self) -> bool {
        MovieStatus::from_str(&self.status) != Some(MovieStatus::Ended)
    }
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Cinema {
    pub id: String,
    pub name: String,
    pub city: String,
    pub address: String,
    #[sqlx(flatten)]
    pub default_price: PriceList,
    pub is_active: bool,
}

/// An auditorium inside a cinema.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Screen {
    pub id: String,
    pub cinema_id: String,
    pub name: String,
    /// `2d`, `3d`, `imax` or `4dx`
    pub screen_type: String,
    pub row_count: i64,
    pub seats_per_row: i64,
    pub total_seats: i64,
}
