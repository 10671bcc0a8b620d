//! Matchgate
//!
//! Subscription tier gate for dating match filters, daily matches and
//! conversation allowances.
//!
//! The rules live in [`domain`] as pure functions with no I/O:
//! ```rust
//! use matchgate::domain::{can_select_status, limits_for, SubscriptionTier};
//!
//! assert_eq!(limits_for(SubscriptionTier::Elite).daily_matches, 15);
//! assert!(!can_select_status(&["a", "b", "c", "d", "e"], &"f", SubscriptionTier::Basic));
//! ```
//!
//! ## Standalone
//!
//! Run the binary:
//! ```bash
//! matchgate-server
//! ```
//!
//! ## Embedded (Axum)
//!
//! When the `server` feature is enabled, this crate can be embedded into a larger Axum app:
//! ```rust,ignore
//! use axum::Router;
//! use matchgate::infrastructure::AppConfig;
//! use matchgate::server::{build_state_with_pool, router};
//! use sqlx::PgPool;
//!
//! let cfg = AppConfig::from_env()?;
//! let pool = PgPool::connect(&cfg.database_url).await?;
//! let state = build_state_with_pool(cfg, pool, true).await?;
//! let app = Router::new().nest("/matchgate", router(state));
//! ```

pub mod application;
pub mod domain;
pub mod infrastructure;

// Standalone + embedded HTTP server support (Axum).
// Enabled behind the `server` feature so the core library can be used without Axum.
#[cfg(feature = "server")]
pub mod server;

pub use application::*;
pub use domain::*;
pub use infrastructure::*;

#[cfg(feature = "server")]
pub use server::*;
