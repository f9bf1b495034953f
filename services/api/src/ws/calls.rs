//! Correlation of asynchronous tool calls by their opaque call identifier.
//!
//! The service announces a function call (name + call id) and later delivers
//! its terminal argument payload in a separate event; other events interleave
//! freely between the two. The table keeps the in-flight entries so the
//! terminal event can be attached to the right invocation.
//!
//! Only the relay's receive loop touches this table, so it needs no lock.

use std::collections::HashMap;
use std::time::Instant;
use tracing::warn;

/// One in-flight tool invocation.
#[derive(Debug, Clone)]
pub struct PendingCall {
    /// Function name, once the service has announced it.
    pub name: Option<String>,
    /// Raw argument payload, unparsed until dispatch.
    pub arguments: Option<String>,
    pub created_at: Instant,
}

#[derive(Debug, Default)]
pub struct CallTable {
    calls: HashMap<String, PendingCall>,
}

impl CallTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert-on-first-sight. A duplicate identifier is treated as the
    /// service retrying the same logical call: the entry is overwritten and
    /// the collision logged.
    pub fn observe(&mut self, call_id: &str, name: Option<String>) {
        let pending = PendingCall {
            name,
            arguments: None,
            created_at: Instant::now(),
        };
        if self.calls.insert(call_id.to_string(), pending).is_some() {
            warn!(%call_id, "duplicate call identifier, overwriting pending call");
        }
    }

    /// Attaches the terminal argument payload, creating the entry if the
    /// stream delivered the terminal event before any announcement.
    pub fn record_arguments(&mut self, call_id: &str, name: Option<String>, arguments: &str) {
        let entry = self
            .calls
            .entry(call_id.to_string())
            .or_insert_with(|| PendingCall {
                name: None,
                arguments: None,
                created_at: Instant::now(),
            });
        if name.is_some() {
            entry.name = name;
        }
        entry.arguments = Some(arguments.to_string());
    }

    /// The function name recorded for a call, from whichever event carried it.
    pub fn function_name(&self, call_id: &str) -> Option<&str> {
        self.calls.get(call_id)?.name.as_deref()
    }

    /// Removes an entry once its result or error has been sent back into the
    /// session.
    pub fn complete(&mut self, call_id: &str) -> Option<PendingCall> {
        self.calls.remove(call_id)
    }

    /// Drops every outstanding entry. Called on teardown; abandoned
    /// identifiers get no cleanup callback.
    pub fn clear(&mut self) {
        self.calls.clear();
    }

    pub fn len(&self) -> usize {
        self.calls.len()
    }

    pub fn is_empty(&self) -> bool {
        self.calls.is_empty()
    }
}
