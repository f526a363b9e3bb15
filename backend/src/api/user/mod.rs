//! Module for user management API endpoints.
//!
//! Lookup, role assignment and deactivation of accounts by privileged users.

pub mod handlers;
pub mod routes;
