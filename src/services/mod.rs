pub mod init;
pub mod showtimes;
