pub mod config;
pub mod redis;
pub mod sqlite;
pub mod store;
pub mod suite;
pub mod types;
