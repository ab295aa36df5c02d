//! Stride server library.
//!
//! Backend core for the Stride goal tracker: OAuth login exchange,
//! weekly progress digest generation, batched digest dispatch, and
//! transactional email with durable logging.
//!
//! Exposed as a library so the route handlers, services and repositories
//! can be exercised from integration tests.

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod config;
pub mod db;
pub mod error;
pub mod jobs;
pub mod models;
pub mod routes;
pub mod services;
pub mod state;
