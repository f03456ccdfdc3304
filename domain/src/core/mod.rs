//! Core domain concepts shared across all subdomains.
//!
//! - [`error::DomainError`]: domain-level errors
//! - [`clock::Clock`]: injectable time source for TTLs and windows
//! - [`string`]: small text helpers
//! - [`validation`]: structured configuration issues

pub mod clock;
pub mod error;
pub mod string;
pub mod validation;
