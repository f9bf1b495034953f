//! Shared Application State
//!
//! This module defines the `AppState` struct, which holds all shared,
//! clonable resources like the tool providers and loaded configuration.

use crate::config::Config;
use std::sync::Arc;
use voxlink_core::{search::SearchProvider, sms::SmsProvider};

/// The shared application state, created once at startup and passed to all handlers.
/// All fields are public to be accessible from other modules.
#[derive(Clone)]
pub struct AppState {
    pub search: Arc<dyn SearchProvider>,
    pub sms: Arc<dyn SmsProvider>,
    pub config: Arc<Config>,
}
