//! Shared infrastructure for the AdMela backend
//!
//! Small crate holding the pieces both binaries (api, worker) need:
//! database pool construction and migration running.

mod db;

pub use db::{create_migration_pool, create_pool, run_migrations};
