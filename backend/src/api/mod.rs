//! Central module for organizing the application's main API endpoints.
//!
//! This module acts as a top-level container for the non-authentication API
//! surface: user administration, health reporting, request-level middleware
//! and the shared response envelope. Core authentication routes are handled separately in `auth`.

pub mod common;
pub mod health;
pub mod middleware;
pub mod user;
