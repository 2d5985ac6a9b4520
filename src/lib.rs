//! # Rusonoff
//!
//! Asynchronous eWeLink protocol layer for Sonoff devices: cloud REST and
//! sockets clients, LAN discovery and zeroconf calls, and the UIID catalog
//! that normalizes device parameters.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use rusonoff::{CloudApi, CloudConfig};
//!
//! # async fn run() -> rusonoff::Result<()> {
//! let api = CloudApi::new(CloudConfig::from_env()?);
//! let family = api.get_family().await?;
//! if let Some(home) = family.current() {
//!     let things = api.get_family_things(&home.id).await?;
//!     println!("{} devices", things.devices.len());
//! }
//! # Ok(())
//! # }
//! ```
//!
//! The [`blocking`] module offers the same operations for synchronous callers.
#[macro_use]
mod macros;
pub mod blocking;
pub mod cloud;
pub mod config;
pub mod crypto;
pub mod error;
pub mod lan;
pub mod manager;
pub mod messages;
pub mod runtime;
pub mod transform;
pub mod types;
pub mod uiid;

pub use cloud::{CloudApi, CloudWs, WsEvent};
pub use config::CloudConfig;
pub use error::{Result, SonoffError};
pub use lan::{LanApi, LanEvent};
pub use manager::{ConnectionEvent, Connections, WriteTarget};
pub use types::{ChannelGroup, ClientMode, ItemType, Parameter, Region};
pub use uiid::States;

pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub fn version() -> &'static str {
    VERSION
}
