//! eWeLink cloud transports: REST API and sockets.

pub mod api;
pub mod ws;

pub use api::{CloudApi, ConnectionState};
pub use ws::{CloudWs, WsEvent, WsStatus};
