pub mod api;
pub mod config;
pub mod models;
pub mod postgres_storage;
pub mod sqlite_storage;
pub mod stats;
pub mod storage;
