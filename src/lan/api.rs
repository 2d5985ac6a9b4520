//! Local network client: mDNS discovery and the device `/zeroconf` HTTP API.

use crate::crypto;
use crate::error::{CallContext, ERR_SUCCESS, Result, SonoffError};
use crate::lan::discovery::{self, Announcement, SERVICE_TYPE};
use crate::messages::lan::{DeviceEvent, DeviceInfo, LAN_SELF_API_KEY, LanRequest, StateWritten};
use crate::messages::{self, error_of, next_sequence, schema};
use crate::types::{ChannelGroup, Parameter};
use futures_core::Stream;
use log::{debug, info, warn};
use mdns_sd::{ServiceDaemon, ServiceEvent};
use parking_lot::{Mutex, RwLock};
use serde_json::{Value, json};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;

pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

const EVENT_CHANNEL_CAPACITY: usize = 64;

/// Events published on [`LanApi::stream`].
#[derive(Debug, Clone)]
pub enum LanEvent {
    /// A device announced itself over mDNS
    Discovered(DeviceEvent),
    /// A LAN write succeeded
    StateWritten(StateWritten),
}

/// LAN client handle. Clones share keys, listener and event channel.
#[derive(Clone)]
pub struct LanApi {
    http: reqwest::Client,
    keys: Arc<RwLock<HashMap<String, String>>>,
    events: broadcast::Sender<LanEvent>,
    listener: Arc<Mutex<Option<CancellationToken>>>,
    cancel_token: CancellationToken,
}

impl Default for LanApi {
    fn default() -> Self {
        Self::new()
    }
}

impl LanApi {
    pub fn new() -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            http: build_http(DEFAULT_CONNECT_TIMEOUT),
            keys: Arc::new(RwLock::new(HashMap::new())),
            events,
            listener: Arc::new(Mutex::new(None)),
            cancel_token: CancellationToken::new(),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.http = build_http(timeout);
        self
    }

    /// Key used to decrypt announcements of `device_id` and to encrypt calls to it.
    pub fn register_device_key<I: Into<String>, K: Into<String>>(&self, device_id: I, key: K) {
        self.keys.write().insert(device_id.into(), key.into());
    }

    pub fn device_key(&self, device_id: &str) -> Option<String> {
        self.keys.read().get(device_id).cloned()
    }

    pub fn is_connected(&self) -> bool {
        self.listener.lock().is_some()
    }

    // -------------------------------------------------------------------------
    // Discovery
    // -------------------------------------------------------------------------

    /// Starts browsing `_ewelink._tcp.local.` and emitting discovery events.
    pub async fn connect(&self) -> Result<()> {
        if self.is_connected() {
            return Ok(());
        }
        let daemon = ServiceDaemon::new()
            .map_err(|e| SonoffError::lan_api(format!("Could not start mDNS daemon: {}", e)))?;
        let receiver = match daemon.browse(SERVICE_TYPE) {
            Ok(receiver) => receiver,
            Err(e) => {
                let _ = daemon.shutdown();
                return Err(SonoffError::lan_api(format!(
                    "Could not browse {}: {}",
                    SERVICE_TYPE, e
                )));
            }
        };

        let token = self.cancel_token.child_token();
        *self.listener.lock() = Some(token.clone());
        info!("Browsing for eWeLink devices ({})", SERVICE_TYPE);

        let lan = self.clone();
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = token.cancelled() => break,
                    res = receiver.recv_async() => match res {
                        Ok(ServiceEvent::ServiceResolved(info)) => {
                            lan.handle_service(&Announcement::from(&*info));
                        }
                        Ok(ServiceEvent::SearchStopped(_)) => break,
                        Ok(_) => {}
                        Err(flume::RecvError::Disconnected) => {
                            warn!("mDNS browser closed");
                            break;
                        }
                    }
                }
            }
            if let Err(e) = daemon.stop_browse(SERVICE_TYPE) {
                debug!("Stopping mDNS browse failed: {}", e);
            }
            let _ = daemon.shutdown();
            lan.listener.lock().take();
            debug!("mDNS browser stopped");
        });
        Ok(())
    }

    /// Stops the mDNS listener.
    pub fn disconnect(&self) {
        if let Some(token) = self.listener.lock().take() {
            token.cancel();
            info!("Stopped listening for eWeLink devices");
        }
    }

    /// Stops the listener and every task spawned by this client.
    pub fn shutdown(&self) {
        self.disconnect();
        self.cancel_token.cancel();
    }

    pub fn subscribe(&self) -> broadcast::Receiver<LanEvent> {
        self.events.subscribe()
    }

    /// Stream of discovery and write events, in arrival order.
    pub fn stream(&self) -> impl Stream<Item = LanEvent> + Send + 'static {
        let mut rx = self.events.subscribe();
        async_stream::stream! {
            loop {
                match rx.recv().await {
                    Ok(event) => yield event,
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        warn!("LAN event stream lagged, {} events skipped", skipped);
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        }
    }

    fn handle_service(&self, announcement: &Announcement) {
        let parsed = {
            let keys = self.keys.read();
            discovery::parse_announcement(announcement, &keys)
        };
        match parsed {
            Ok(Some(event)) => {
                debug!("Device {} announced at {}:{}", event.id, event.ip_address, event.port);
                let _ = self.events.send(LanEvent::Discovered(event));
            }
            Ok(None) => {}
            Err(e) => debug!("Dropped announcement of {}: {}", announcement.fullname, e),
        }
    }

    // -------------------------------------------------------------------------
    // Device API
    // -------------------------------------------------------------------------

    /// Reads `/zeroconf/info`. `key` falls back to the registered device key.
    pub async fn get_device_info(
        &self,
        id: &str,
        key: Option<&str>,
        ip_address: &str,
        port: u16,
    ) -> Result<DeviceInfo> {
        const FAILED: &str = "Reading device info failed";
        let key = self.resolve_key(id, key);
        let (body, ctx) = self
            .post(id, key.as_deref(), ip_address, port, "info", json!({}), false)
            .await?;
        check_error(&body, &ctx, FAILED)?;
        schema(messages::LAN_INFO)?
            .check(&body)
            .map_err(|e| wrap(FAILED, e, &ctx))?;

        let data = match (&body["data"], key.as_deref()) {
            (Value::String(ciphertext), Some(key)) => {
                let iv = body.get("iv").and_then(Value::as_str).unwrap_or_default();
                let plain = crypto::decrypt_message(ciphertext, key, iv)
                    .map_err(|e| wrap(FAILED, e, &ctx))?;
                serde_json::from_slice(&plain).map_err(|e| wrap(FAILED, e.into(), &ctx))?
            }
            (Value::String(_), None) => {
                return Err(SonoffError::lan_api(format!(
                    "{}: encrypted response and no device key",
                    FAILED
                ))
                .with_context(ctx));
            }
            (data, _) => data.clone(),
        };
        DeviceInfo::from_value(&data).map_err(|e| wrap(FAILED, e, &ctx))
    }

    /// Writes one parameter to `/zeroconf/{group or parameter}` and emits the written state.
    #[allow(clippy::too_many_arguments)]
    pub async fn set_device_status(
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
        const FAILED: &str = "Setting device state failed";
        let key = self.resolve_key(id, key);
        let endpoint = group.map_or(parameter.as_str(), |g| g.as_str());
        let params = messages::state_params(parameter, value, group, outlet);
        let (body, ctx) = self
            .post(id, key.as_deref(), ip_address, port, endpoint, params.clone(), true)
            .await?;
        check_error(&body, &ctx, FAILED)?;
        schema(messages::LAN_SET_STATE)?
            .check(&body)
            .map_err(|e| wrap(FAILED, e, &ctx))?;

        let written = StateWritten {
            id: id.to_string(),
            ip_address: ip_address.to_string(),
            port,
            params,
        };
        let _ = self.events.send(LanEvent::StateWritten(written.clone()));
        Ok(written)
    }

    fn resolve_key(&self, id: &str, key: Option<&str>) -> Option<String> {
        key.map(str::to_string).or_else(|| self.device_key(id))
    }

    #[allow(clippy::too_many_arguments)]
    async fn post(
        &self,
        id: &str,
        key: Option<&str>,
        ip_address: &str,
        port: u16,
        endpoint: &str,
        data: Value,
        close: bool,
    ) -> Result<(Value, CallContext)> {
        let mut request = LanRequest {
            sequence: next_sequence(),
            deviceid: id.to_string(),
            self_apikey: LAN_SELF_API_KEY,
            encrypt: None,
            data,
            iv: None,
        };
        if let Some(key) = key {
            let iv = crypto::encode_iv(&crypto::generate_iv());
            let ciphertext = crypto::encrypt_message(request.data.to_string().as_bytes(), key, &iv)
                .map_err(|_| SonoffError::lan_api("Could not encode data for request"))?;
            request.encrypt = Some(true);
            request.data = Value::String(ciphertext);
            request.iv = Some(iv);
        }
        let payload = serde_json::to_string(&request)
            .map_err(|_| SonoffError::lan_api("Could not prepare data for request"))?;

        let url = format!("http://{}:{}/zeroconf/{}", ip_address, port, endpoint);
        let ctx = CallContext::new("POST", url.as_str()).with_request_body(payload.clone());
        debug!("POST {}", url);

        let mut builder = self
            .http
            .post(url.as_str())
            .header(reqwest::header::CONTENT_TYPE, "application/json");
        if close {
            builder = builder.header(reqwest::header::CONNECTION, "close");
        }
        let response = builder.body(payload).send().await.map_err(|e| {
            SonoffError::lan_api(format!("Calling device endpoint failed: {}", e))
                .with_context(ctx.clone())
        })?;
        let status = response.status();
        let text = response.text().await.map_err(|e| {
            SonoffError::lan_api(format!("Could not get content from response body: {}", e))
                .with_context(ctx.clone())
        })?;
        let ctx = ctx.with_response(status.as_u16(), text.clone());

        if !status.is_success() {
            warn!("{}", ctx.summary());
            return Err(SonoffError::lan_api(format!("Unexpected HTTP status {}", status))
                .with_code(i64::from(status.as_u16()))
                .with_context(ctx));
        }
        match serde_json::from_str(&text) {
            Ok(body) => Ok((body, ctx)),
            Err(e) => Err(SonoffError::lan_api(format!("Could not decode response body: {}", e))
                .with_context(ctx)),
        }
    }
}

fn build_http(connect_timeout: Duration) -> reqwest::Client {
    reqwest::Client::builder()
        .connect_timeout(connect_timeout)
        .build()
        .unwrap_or_default()
}

fn check_error(body: &Value, ctx: &CallContext, failed: &str) -> Result<()> {
    let (code, message) = error_of(body);
    if code == ERR_SUCCESS {
        return Ok(());
    }
    warn!("{}", ctx.summary());
    Err(SonoffError::lan_api(format!("{}: {}", failed, message.unwrap_or_default()))
        .with_code(code)
        .with_context(ctx.clone()))
}

fn wrap(failed: &str, err: SonoffError, ctx: &CallContext) -> SonoffError {
    match err {
        e @ SonoffError::LanApiCall { .. } => e,
        e => SonoffError::lan_api(format!("{}: {}", failed, e)).with_context(ctx.clone()),
    }
}
