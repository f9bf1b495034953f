//! Provider contracts for the Voxlink relay.
//!
//! The relay itself lives in the `voxlink-api` service; this crate holds the
//! two external side-effect providers it drives mid-conversation:
//!
//! - `search`: web search lookup, returning an ordered list of result URLs.
//! - `sms`: SMS delivery with independent per-recipient outcomes.
//!
//! Both are expressed as traits so the relay can be tested against mocks,
//! with one HTTP-backed implementation each.

pub mod search;
pub mod sms;
