//! Synchronous API.
//!
//! Thin wrappers that drive the async clients on the shared runtime. Every call
//! blocks the current thread and must not be made from inside an async context.

use crate::cloud;
use crate::config::CloudConfig;
use crate::error::Result;
use crate::lan;
use crate::manager::{self, ConnectionEvent, WriteTarget};
use crate::messages::cloud::{DeviceState, Family, Thing, Things, ThirdPartyDevice, UserLogin};
use crate::messages::lan::{DeviceInfo, StateWritten};
use crate::runtime;
use crate::types::{ChannelGroup, ClientMode, ItemType, Parameter};
use futures_util::{Stream, StreamExt};
use serde_json::Value;
use std::sync::mpsc;
use std::time::Duration;

/// Forwards `stream` into a channel the caller can iterate without a runtime.
fn into_receiver<S, T>(stream: S) -> Result<mpsc::Receiver<T>>
where
    S: Stream<Item = T> + Send + 'static,
    T: Send + 'static,
{
    let (tx, rx) = mpsc::channel();
    runtime::handle()?.spawn(async move {
        tokio::pin!(stream);
        while let Some(item) = stream.next().await {
            if tx.send(item).is_err() {
                break;
            }
        }
    });
    Ok(rx)
}

// -------------------------------------------------------------------------
// Cloud
// -------------------------------------------------------------------------

/// Blocking cloud REST client.
#[derive(Clone)]
pub struct CloudApi {
    inner: cloud::CloudApi,
}

impl CloudApi {
    pub fn new(config: CloudConfig) -> Self {
        Self {
            inner: cloud::CloudApi::new(config),
        }
    }

    pub fn with_timeout(self, timeout: Duration) -> Self {
        Self {
            inner: self.inner.with_timeout(timeout),
        }
    }

    /// The async client sharing this client's session.
    pub fn as_async(&self) -> &cloud::CloudApi {
        &self.inner
    }

    pub fn is_connected(&self) -> bool {
        self.inner.is_connected()
    }

    pub fn connect(&self) -> Result<()> {
        runtime::block_on(self.inner.connect())
    }

    pub fn disconnect(&self) {
        self.inner.disconnect()
    }

    pub fn login(&self) -> Result<UserLogin> {
        runtime::block_on(self.inner.login())
    }

    pub fn refresh_tokens(&self) -> Result<()> {
        runtime::block_on(self.inner.refresh_tokens())
    }

    pub fn get_family(&self) -> Result<Family> {
        runtime::block_on(self.inner.get_family())
    }

    pub fn get_family_things(&self, family_id: &str) -> Result<Things> {
        runtime::block_on(self.inner.get_family_things(family_id))
    }

    pub fn get_thing(&self, id: &str, item_type: ItemType) -> Result<Thing> {
        runtime::block_on(self.inner.get_thing(id, item_type))
    }

    pub fn get_thing_state(&self, id: &str, item_type: ItemType) -> Result<DeviceState> {
        runtime::block_on(self.inner.get_thing_state(id, item_type))
    }

    pub fn set_thing_state(
        &self,
        id: &str,
        parameter: Parameter,
        value: Value,
        group: Option<ChannelGroup>,
        outlet: Option<u32>,
        item_type: ItemType,
    ) -> Result<()> {
        runtime::block_on(
            self.inner
                .set_thing_state(id, parameter, value, group, outlet, item_type),
        )
    }

    pub fn add_third_party_device(&self, id: &str) -> Result<ThirdPartyDevice> {
        runtime::block_on(self.inner.add_third_party_device(id))
    }
}

// -------------------------------------------------------------------------
// LAN
// -------------------------------------------------------------------------

/// Blocking LAN client.
#[derive(Clone, Default)]
pub struct LanApi {
    inner: lan::LanApi,
}

impl LanApi {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_timeout(self, timeout: Duration) -> Self {
        Self {
            inner: self.inner.with_timeout(timeout),
        }
    }

    pub fn as_async(&self) -> &lan::LanApi {
        &self.inner
    }

    pub fn register_device_key<I: Into<String>, K: Into<String>>(&self, device_id: I, key: K) {
        self.inner.register_device_key(device_id, key)
    }

    /// Starts discovery; the listener keeps running on the shared runtime.
    pub fn connect(&self) -> Result<()> {
        runtime::block_on(self.inner.connect())
    }

    pub fn disconnect(&self) {
        self.inner.disconnect()
    }

    /// Receiver of discovery and write events.
    pub fn events(&self) -> Result<mpsc::Receiver<lan::LanEvent>> {
        into_receiver(self.inner.stream())
    }

    pub fn get_device_info(
        &self,
        id: &str,
        key: Option<&str>,
        ip_address: &str,
        port: u16,
    ) -> Result<DeviceInfo> {
        runtime::block_on(self.inner.get_device_info(id, key, ip_address, port))
    }

    #[allow(clippy::too_many_arguments)]
    pub fn set_device_status(
        &self,
        id: &str,
        key: Option<&str>,
        ip_address: &str,
        port: u16,
        parameter: Parameter,
        value: Value,
        group: Option<ChannelGroup>,
        outlet: Option<u32>,
    ) -> Result<StateWritten> {
        runtime::block_on(self.inner.set_device_status(
            id, key, ip_address, port, parameter, value, group, outlet,
        ))
    }
}

// -------------------------------------------------------------------------
// Connections
// -------------------------------------------------------------------------

/// Blocking view of a [`manager::Connections`] context.
#[derive(Clone, Default)]
pub struct Connections {
    inner: manager::Connections,
}

impl From<manager::Connections> for Connections {
    fn from(inner: manager::Connections) -> Self {
        Self { inner }
    }
}

impl Connections {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_cloud(config: CloudConfig) -> Self {
        manager::Connections::with_cloud(config).into()
    }

    pub fn as_async(&self) -> &manager::Connections {
        &self.inner
    }

    pub fn lan(&self) -> Result<LanApi> {
        Ok(LanApi {
            inner: self.inner.lan()?,
        })
    }

    pub fn cloud_api(&self) -> Result<CloudApi> {
        Ok(CloudApi {
            inner: self.inner.cloud_api()?,
        })
    }

    /// Creates the sockets client and connects it.
    pub fn connect_cloud_ws(&self) -> Result<()> {
        let ws = self.inner.cloud_ws()?;
        runtime::block_on(async move { ws.connect().await })
    }

    pub fn events(&self) -> Result<mpsc::Receiver<ConnectionEvent>> {
        into_receiver(self.inner.stream())
    }

    pub fn write_state(
        &self,
        target: &WriteTarget,
        parameter: Parameter,
        value: Value,
        group: Option<ChannelGroup>,
        outlet: Option<u32>,
    ) -> Result<ClientMode> {
        runtime::block_on(self.inner.write_state(target, parameter, value, group, outlet))
    }

    pub fn shutdown(&self) {
        self.inner.shutdown()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SonoffError;

    #[test]
    fn lan_write_without_address_fails_fast() {
        let connections = Connections::new();
        let target = WriteTarget::device("1000a").with_mode(ClientMode::Lan);
        let err = connections
            .write_state(&target, Parameter::Switch, Value::from("on"), None, None)
            .unwrap_err();
        assert!(matches!(err, SonoffError::InvalidArgument(_)));
    }

    #[test]
    fn shares_clients_with_the_async_context() {
        let connections = Connections::new();
        let lan = connections.lan().unwrap();
        lan.register_device_key("1000a", "key");
        let same = connections.as_async().lan().unwrap();
        assert_eq!(same.device_key("1000a").as_deref(), Some("key"));
    }
}
