pub mod adapters;
pub mod chapter;
pub mod config;
pub mod error;
pub mod session;
pub mod uploads;
