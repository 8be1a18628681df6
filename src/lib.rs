//! # fizzbuzz-server
//!
//! HTTP front end for the FizzBuzz service. Serves configurable FizzBuzz
//! sequences and reports which request shape has been asked for most often.
//!
//! The engine lives in [`fizzbuzz_core`] and is re-exported here so the
//! binary and integration tests only need this crate.

pub use fizzbuzz_core::config;
pub use fizzbuzz_core::error;
pub use fizzbuzz_core::query;
pub use fizzbuzz_core::service;
pub use fizzbuzz_core::stats;

pub use fizzbuzz_core::Config;
pub use fizzbuzz_core::{IndexError, Result, ServiceError};

pub mod server;
