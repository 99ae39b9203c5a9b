//! Load-Simulation Server Library
//!
//! This module exports the server components for use in the `loadsim` and
//! `greeter` binaries and in integration tests.

pub mod config;
pub mod greeting;
pub mod load;
pub mod protocol;
pub mod server;
pub mod telemetry;

// Re-export commonly used types
pub use config::Config;
pub use greeting::greeting_routes;
pub use load::{LoadError, LoadSimulator};
pub use protocol::{LoadRequest, LoadType, WsReply};
pub use server::{AppState, load_routes};
