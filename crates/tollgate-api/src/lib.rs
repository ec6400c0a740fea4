//! Protocol types for tollgated IPC
//!
//! This crate defines the stable API between tollgated and clients:
//! - The persisted token record and its status codes
//! - Derived views (expiration state, daily window, credit/usage summaries)
//! - Commands (requests from clients) and responses
//! - Events (service -> clients)
//! - Versioning

mod commands;
mod events;
mod token;
mod types;
mod view;

pub use commands::*;
pub use events::*;
pub use token::*;
pub use types::*;
pub use view::*;

/// Current API version
pub const API_VERSION: u32 = 1;
