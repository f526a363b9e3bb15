//! Module for core business logic services.
//!
//! This module encapsulates services that perform specific business operations
//! and orchestrate interactions between different parts of the application,
//! such as issuing tokens, checking one-time codes or managing users.

pub mod credential_service;
pub mod email_service;
pub mod otp_service;
pub mod rate_limit_service;
pub mod revocation_service;
pub mod token_service;
pub mod user_service;
