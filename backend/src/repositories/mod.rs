//! Data access layer.
//!
//! Repositories wrap the SQL for one table each and return `anyhow::Result`
//! so the service layer decides how failures surface.

pub mod user_repository;
