//! DineLoop Storage - Persistence layer for the campaign engine
//!
//! Models, repository traits, the PostgreSQL implementations and an
//! in-memory backend used by tests and local development.

pub mod db;
pub mod models;
pub mod repository;

pub use db::DatabasePool;
pub use models::*;
pub use repository::*;
