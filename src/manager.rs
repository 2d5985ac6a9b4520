//! Connection context shared by everything that talks to devices.
//! Lazily creates one LAN client and one cloud REST/sockets client pair and routes writes.

use crate::cloud::{CloudApi, CloudWs, WsEvent};
use crate::config::CloudConfig;
use crate::error::{Result, SonoffError};
use crate::lan::discovery::DEFAULT_DEVICE_PORT;
use crate::lan::{LanApi, LanEvent};
use crate::runtime;
use crate::types::{ChannelGroup, ClientMode, ItemType, Parameter};
use futures_util::{Stream, StreamExt};
use log::{debug, info, warn};
use parking_lot::Mutex;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;

const EVENT_CHANNEL_CAPACITY: usize = 64;

/// Event from any client owned by a [`Connections`] context.
#[derive(Debug, Clone)]
pub enum ConnectionEvent {
    Lan(LanEvent),
    Cloud(WsEvent),
}

/// Where and how to deliver a state write.
#[derive(Debug, Clone)]
pub struct WriteTarget {
    pub id: String,
    pub item_type: ItemType,
    pub mode: ClientMode,
    /// LAN address; required for [`ClientMode::Lan`]
    pub ip_address: Option<String>,
    pub port: u16,
    pub device_key: Option<String>,
}

impl WriteTarget {
    pub fn device<I: Into<String>>(id: I) -> Self {
        Self {
            id: id.into(),
            item_type: ItemType::Device,
            mode: ClientMode::Auto,
            ip_address: None,
            port: DEFAULT_DEVICE_PORT,
            device_key: None,
        }
    }

    pub fn with_lan<A: Into<String>>(mut self, ip_address: A, port: u16) -> Self {
        self.ip_address = Some(ip_address.into());
        self.port = port;
        self
    }

    pub fn with_key<K: Into<String>>(mut self, device_key: K) -> Self {
        self.device_key = Some(device_key.into());
        self
    }

    pub fn with_mode(mut self, mode: ClientMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_item_type(mut self, item_type: ItemType) -> Self {
        self.item_type = item_type;
        self
    }
}

/// Explicit connection context.
///
/// Clones share the same clients. Each client is created on first use and kept
/// until [`Connections::shutdown`].
#[derive(Clone)]
pub struct Connections {
    inner: Arc<ConnectionsInner>,
}

struct ConnectionsInner {
    config: Option<CloudConfig>,
    timeout: Option<Duration>,
    lan: Mutex<Option<LanApi>>,
    cloud_api: Mutex<Option<CloudApi>>,
    cloud_ws: Mutex<Option<CloudWs>>,
    event_tx: broadcast::Sender<ConnectionEvent>,
    cancel_token: CancellationToken,
}

impl Default for Connections {
    fn default() -> Self {
        Self::new()
    }
}

impl Connections {
    /// Context without cloud credentials; only the LAN client is available.
    pub fn new() -> Self {
        Self::build(None, None)
    }

    pub fn with_cloud(config: CloudConfig) -> Self {
        Self::build(Some(config), None)
    }

    /// Connect timeout applied to every client this context creates.
    pub fn with_timeout(self, timeout: Duration) -> Self {
        Self::build(self.inner.config.clone(), Some(timeout))
    }

    fn build(config: Option<CloudConfig>, timeout: Option<Duration>) -> Self {
        let (event_tx, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            inner: Arc::new(ConnectionsInner {
                config,
                timeout,
                lan: Mutex::new(None),
                cloud_api: Mutex::new(None),
                cloud_ws: Mutex::new(None),
                event_tx,
                cancel_token: CancellationToken::new(),
            }),
        }
    }

    pub fn has_lan(&self) -> bool {
        self.inner.lan.lock().is_some()
    }

    pub fn has_cloud_api(&self) -> bool {
        self.inner.cloud_api.lock().is_some()
    }

    pub fn has_cloud_ws(&self) -> bool {
        self.inner.cloud_ws.lock().is_some()
    }

    /// The LAN client, created on first call.
    pub fn lan(&self) -> Result<LanApi> {
        let mut guard = self.inner.lan.lock();
        if let Some(lan) = guard.as_ref() {
            return Ok(lan.clone());
        }
        let mut lan = LanApi::new();
        if let Some(timeout) = self.inner.timeout {
            lan = lan.with_timeout(timeout);
        }
        self.forward(lan.stream(), ConnectionEvent::Lan)?;
        info!("LAN client created");
        *guard = Some(lan.clone());
        Ok(lan)
    }

    /// The cloud REST client, created on first call. Needs cloud credentials.
    pub fn cloud_api(&self) -> Result<CloudApi> {
        let mut guard = self.inner.cloud_api.lock();
        if let Some(api) = guard.as_ref() {
            return Ok(api.clone());
        }
        let config = self.inner.config.clone().ok_or_else(|| {
            SonoffError::InvalidState("No cloud credentials configured".into())
        })?;
        let mut api = CloudApi::new(config);
        if let Some(timeout) = self.inner.timeout {
            api = api.with_timeout(timeout);
        }
        info!("Cloud API client created");
        *guard = Some(api.clone());
        Ok(api)
    }

    /// The cloud sockets client, created on first call.
    ///
    /// The REST client must already hold an access token.
    pub fn cloud_ws(&self) -> Result<CloudWs> {
        let mut guard = self.inner.cloud_ws.lock();
        if let Some(ws) = guard.as_ref() {
            return Ok(ws.clone());
        }
        let api = self.inner.cloud_api.lock().clone().ok_or_else(|| {
            SonoffError::InvalidState("Cloud API client is not created".into())
        })?;
        let mut ws = CloudWs::from_api(&api)?;
        if let Some(timeout) = self.inner.timeout {
            ws = ws.with_timeout(timeout);
        }
        self.forward(ws.stream(), ConnectionEvent::Cloud)?;
        info!("Cloud sockets client created");
        *guard = Some(ws.clone());
        Ok(ws)
    }

    /// Unified stream of LAN and cloud socket events.
    pub fn stream(&self) -> impl Stream<Item = ConnectionEvent> + Send + 'static {
        let mut rx = self.inner.event_tx.subscribe();
        async_stream::stream! {
            loop {
                match rx.recv().await {
                    Ok(event) => yield event,
                    Err(broadcast::error::RecvError::Closed) => break,
                    Err(broadcast::error::RecvError::Lagged(_)) => continue,
                }
            }
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ConnectionEvent> {
        self.inner.event_tx.subscribe()
    }

    fn forward<S, T, F>(&self, stream: S, wrap: F) -> Result<()>
    where
        S: Stream<Item = T> + Send + 'static,
        T: Send + 'static,
        F: Fn(T) -> ConnectionEvent + Send + 'static,
    {
        let event_tx = self.inner.event_tx.clone();
        let token = self.inner.cancel_token.child_token();
        runtime::handle()?.spawn(async move {
            tokio::pin!(stream);
            loop {
                tokio::select! {
                    _ = token.cancelled() => break,
                    item = stream.next() => match item {
                        Some(item) => {
                            let _ = event_tx.send(wrap(item));
                        }
                        None => break,
                    }
                }
            }
        });
        Ok(())
    }

    /// Writes one parameter through the transport selected by `target.mode`.
    ///
    /// Returns the mode that carried the write. `Auto` uses LAN when an address is
    /// known and falls back to the cloud when the LAN call fails.
    pub async fn write_state(
        &self,
        target: &WriteTarget,
        parameter: Parameter,
        value: Value,
        group: Option<ChannelGroup>,
        outlet: Option<u32>,
    ) -> Result<ClientMode> {
        match target.mode {
            ClientMode::Lan => {
                self.write_lan(target, parameter, value, group, outlet).await?;
                Ok(ClientMode::Lan)
            }
            ClientMode::Cloud => {
                self.write_cloud(target, parameter, value, group, outlet).await?;
                Ok(ClientMode::Cloud)
            }
            ClientMode::Auto => {
                if target.ip_address.is_some() {
                    match self
                        .write_lan(target, parameter, value.clone(), group, outlet)
                        .await
                    {
                        Ok(()) => return Ok(ClientMode::Lan),
                        Err(e) => warn!(
                            "LAN write to {} failed, falling back to cloud: {}",
                            target.id, e
                        ),
                    }
                }
                self.write_cloud(target, parameter, value, group, outlet).await?;
                Ok(ClientMode::Cloud)
            }
        }
    }

    async fn write_lan(
        &self,
        target: &WriteTarget,
        parameter: Parameter,
        value: Value,
        group: Option<ChannelGroup>,
        outlet: Option<u32>,
    ) -> Result<()> {
        let ip_address = target.ip_address.as_deref().ok_or_else(|| {
            SonoffError::InvalidArgument(format!("Device {} has no LAN address", target.id))
        })?;
        debug!("Writing {} of {} over LAN", parameter, target.id);
        self.lan()?
            .set_device_status(
                &target.id,
                target.device_key.as_deref(),
                ip_address,
                target.port,
                parameter,
                value,
                group,
                outlet,
            )
            .await
            .map(|_| ())
    }

    async fn write_cloud(
        &self,
        target: &WriteTarget,
        parameter: Parameter,
        value: Value,
        group: Option<ChannelGroup>,
        outlet: Option<u32>,
    ) -> Result<()> {
        debug!("Writing {} of {} through cloud", parameter, target.id);
        self.cloud_api()?
            .set_thing_state(&target.id, parameter, value, group, outlet, target.item_type)
            .await
    }

    /// Disconnects and drops every client that was created.
    pub fn shutdown(&self) {
        if let Some(ws) = self.inner.cloud_ws.lock().take() {
            ws.shutdown();
        }
        if let Some(api) = self.inner.cloud_api.lock().take() {
            api.disconnect();
        }
        if let Some(lan) = self.inner.lan.lock().take() {
            lan.shutdown();
        }
        info!("Connections shut down");
    }
}

impl Drop for ConnectionsInner {
    fn drop(&mut self) {
        self.cancel_token.cancel();
        if let Some(ws) = self.cloud_ws.get_mut().take() {
            ws.shutdown();
        }
        if let Some(lan) = self.lan.get_mut().take() {
            lan.shutdown();
        }
    }
}
