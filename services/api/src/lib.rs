//! Voxlink API Library Crate
//!
//! This library contains all the core logic for the Voxlink relay service:
//! the application state, configuration, routing, and the WebSocket relay
//! that bridges a caller to the realtime conversation service. The `api`
//! binary is a thin wrapper around this library.

pub mod config;
pub mod router;
pub mod state;
pub mod ws;
