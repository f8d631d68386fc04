//! Medico Core - Shared types library.
//!
//! This crate provides the domain types used across all Medico components:
//! - `medico-server` - REST API for citizens, doctors, pharmacies, moderators and admins
//! - `medico-cli` - Command-line tools for migrations, admin accounts and demo data
//!
//! # Architecture
//!
//! The core crate contains only types and validation rules - no I/O, no
//! database access, no HTTP. With the `postgres` feature the types also
//! implement the `sqlx` encode/decode traits.
//!
//! # Modules
//!
//! - [`types`] - Type-safe IDs, emails, password policy, civil codes, roles

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod types;

pub use types::*;
