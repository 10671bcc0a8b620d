pub mod config;
pub mod postgres_filter_repo;
pub mod repository;

pub use config::*;
pub use postgres_filter_repo::*;
pub use repository::*;
