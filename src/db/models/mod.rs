//! Database models split into separate files and re-exported at
//! `crate::db::models`.

pub mod catalog;
pub mod showtime;
pub mod showtime_status;

pub use self::catalog::*;
pub use self::showtime::*;
pub use self::showtime_status::*;
