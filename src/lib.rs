//! Client-side session and link synchronisation for a hosted URL shortener.
//!
//! The backend owns everything durable (short codes, hit counters, expiry,
//! accounts). This crate keeps a signed-in identity, two link collections
//! and a liveness indicator consistent with it.

pub mod api;
pub mod config;
pub mod error;
pub mod health;
pub mod links;
pub mod models;
pub mod notify;
pub mod session;
pub mod storage;

#[cfg(test)]
mod testing;

pub use api::ApiClient;
pub use config::ClientConfig;
pub use error::ApiError;
pub use health::{HealthHandle, HealthMonitor};
pub use links::{CollectionView, DeleteOutcome, FetchState, LinkSynchronizer};
pub use session::SessionManager;
