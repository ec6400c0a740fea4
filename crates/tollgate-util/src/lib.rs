//! Shared utilities for tollgate
//!
//! This crate provides:
//! - ID types (TokenId, UserId, ClientId)
//! - Clock helpers (epoch seconds, mock time for development)
//! - Rate limiting helpers
//! - Default paths for the socket, config file and data directory

mod ids;
mod paths;
mod rate_limit;
mod time;

pub use ids::*;
pub use paths::*;
pub use rate_limit::*;
pub use time::*;
