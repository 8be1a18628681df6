//! Server module
//!
//! This module implements the HTTP listener and the request gateway.

mod gateway;
mod listener;

pub use gateway::{serve_request, GatewayError, GatewayState};
pub use listener::{Server, ServerDependencies};
