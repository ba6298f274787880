pub mod auth;
pub mod client;
pub mod events;
pub mod fake;
pub mod rest;
pub mod storage;

pub use client::SupabaseClient;
pub use events::AuthEventHub;
pub use fake::FakeBackend;
