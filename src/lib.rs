pub mod accounts;
pub mod api;
pub mod config;
pub mod db;
pub mod error;
pub mod export;
pub mod feed;
pub mod filters;
pub mod geocoding;
pub mod models;
pub mod session;
pub mod storage;
pub mod store;
pub mod transitions;
pub mod utils;

pub use error::{AppError, Result};
pub use store::{Persistence, Source, Sourced};
