//! # fizzbuzz-core
//!
//! Core engine of the FizzBuzz service: request parameters and their
//! validation, sequence generation, and the request-frequency statistics
//! that back the `/statistics` endpoint.
//!
//! The HTTP server lives in the `fizzbuzz-server` crate; everything here is
//! transport-agnostic.

pub mod config;
pub mod error;
mod generator;
pub mod query;
pub mod service;
pub mod stats;

pub use config::Config;
pub use error::{IndexError, Result, ServiceError};
pub use query::FizzBuzzQuery;
pub use service::FizzBuzzService;
