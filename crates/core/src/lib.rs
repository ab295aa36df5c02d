//! Stride Core - Shared types library.
//!
//! This crate provides common types used across all Stride components:
//! - `server` - Goal-tracking API server and digest batch jobs
//! - `integration-tests` - End-to-end tests against HTTP stubs
//!
//! # Architecture
//!
//! The core crate contains only types - no I/O, no database access,
//! no HTTP clients. This keeps it lightweight and allows it to be used anywhere.
//!
//! # Modules
//!
//! - [`types`] - Newtype wrappers for type-safe IDs and email addresses

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod types;

pub use types::*;
