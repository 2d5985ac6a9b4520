//! Cloud WebSocket frames: outgoing requests and incoming events.

use crate::uiid::States;
use crate::error::Result;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

pub const ACTION_USER_ONLINE: &str = "userOnline";
pub const ACTION_UPDATE: &str = "update";
pub const ACTION_QUERY: &str = "query";
pub const ACTION_SYSMSG: &str = "sysmsg";

pub const USER_AGENT: &str = "app";
pub const PROTOCOL_VERSION: u32 = 8;
pub const DEFAULT_HEARTBEAT_INTERVAL: u64 = 90;

// ----------------------------------------------------------------------------
// Outgoing
// ----------------------------------------------------------------------------

/// Application level handshake sent right after the socket opens.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UserOnline {
    pub action: &'static str,
    pub at: String,
    pub apikey: String,
    pub appid: String,
    pub nonce: String,
    pub ts: u64,
    #[serde(rename = "userAgent")]
    pub user_agent: &'static str,
    pub sequence: String,
    pub version: u32,
}

impl UserOnline {
    pub fn new(access_token: &str, api_key: &str, app_id: &str, ts: u64, sequence: String) -> Self {
        Self {
            action: ACTION_USER_ONLINE,
            at: access_token.to_string(),
            apikey: api_key.to_string(),
            appid: app_id.to_string(),
            nonce: (ts / 100).to_string(),
            ts,
            user_agent: USER_AGENT,
            sequence,
            version: PROTOCOL_VERSION,
        }
    }
}

/// `update` or `query` command addressed to one device.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DeviceCommand {
    pub action: &'static str,
    /// Device api key
    pub apikey: String,
    /// Logged-in user api key
    #[serde(rename = "selfApikey")]
    pub self_apikey: String,
    pub deviceid: String,
    #[serde(rename = "userAgent")]
    pub user_agent: &'static str,
    pub sequence: String,
    pub params: Value,
}

// ----------------------------------------------------------------------------
// Incoming
// ----------------------------------------------------------------------------

/// Dispatch service answer naming the WebSocket host.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ApplicationLogin {
    #[serde(rename = "IP")]
    pub ip_address: Option<String>,
    pub port: u16,
    pub domain: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ApplicationConfig {
    /// Sent as `1`, `true` or `"1"` depending on the server build
    #[serde(default, deserialize_with = "truthy")]
    pub hb: bool,
    #[serde(rename = "hbInterval", default = "default_heartbeat_interval")]
    pub hb_interval: u64,
}

fn default_heartbeat_interval() -> u64 {
    DEFAULT_HEARTBEAT_INTERVAL
}

fn truthy<'de, D: Deserializer<'de>>(deserializer: D) -> std::result::Result<bool, D::Error> {
    Ok(match Value::deserialize(deserializer)? {
        Value::Bool(b) => b,
        Value::Number(n) => n.as_f64().is_some_and(|n| n != 0.0),
        Value::String(s) => !matches!(s.trim(), "" | "0" | "false"),
        Value::Array(items) => !items.is_empty(),
        Value::Object(_) => true,
        Value::Null => false,
    })
}

impl ApplicationConfig {
    pub fn heartbeat_enabled(&self) -> bool {
        self.hb
    }
}

/// Reply to [`UserOnline`].
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ApplicationHandshake {
    #[serde(rename = "apikey")]
    pub api_key: String,
    pub config: Option<ApplicationConfig>,
}

/// Device status carried by an `update` push or a command reply.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviceStateEvent {
    #[serde(rename = "apikey")]
    pub api_key: Option<String>,
    #[serde(rename = "deviceid")]
    pub device_id: String,
    #[serde(default)]
    pub params: Value,
    pub sequence: Option<String>,
}

impl DeviceStateEvent {
    pub fn to_states(&self, uiid: u32) -> Result<Option<States>> {
        crate::uiid::project(uiid, &self.params)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ConnectionStateParams {
    pub online: bool,
}

/// `sysmsg` push announcing a device going online or offline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviceConnectionStateEvent {
    #[serde(rename = "apikey")]
    pub api_key: Option<String>,
    #[serde(rename = "deviceid")]
    pub device_id: String,
    pub params: ConnectionStateParams,
}

/// Decoded inbound frame.
#[derive(Debug, Clone, PartialEq)]
pub enum SocketMessage {
    Handshake(ApplicationHandshake),
    DeviceState(DeviceStateEvent),
    DeviceConnectionState(DeviceConnectionStateEvent),
}
