//! eWeLink LAN mode: mDNS discovery and direct device calls.

pub mod api;
pub mod discovery;

pub use api::{LanApi, LanEvent};
