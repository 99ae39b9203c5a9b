//! Wire formats shared by the WebSocket and HTTP endpoints

pub mod messages;

pub use messages::*;
