//! eWeLink cloud WebSocket client.
//! Dispatch login, `userOnline` handshake, heartbeat pings and sequence-correlated commands.

use crate::cloud::api::CloudApi;
use crate::error::{ERR_SUCCESS, Result, SonoffError};
use crate::messages::sockets::{
    ACTION_QUERY, ACTION_SYSMSG, ACTION_UPDATE, ACTION_USER_ONLINE, ApplicationHandshake,
    ApplicationLogin, DeviceCommand, DeviceConnectionStateEvent, DeviceStateEvent, SocketMessage,
    USER_AGENT, UserOnline,
};
use crate::messages::{self, epoch_millis, error_of, next_sequence, schema};
use crate::types::{ChannelGroup, Parameter, Region};
use futures_core::Stream;
use futures_util::{SinkExt, StreamExt};
use log::{debug, error, info, warn};
use parking_lot::{Mutex, RwLock};
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, SystemTime};
use tokio::sync::{broadcast, mpsc, oneshot};
use tokio_tungstenite::tungstenite::Message;
use tokio_util::sync::CancellationToken;
use url::Url;

pub const PATH_DISPATCH: &str = "/dispatch/app";
pub const DEFAULT_REPLY_TIMEOUT: Duration = Duration::from_secs(15);

const EVENT_CHANNEL_CAPACITY: usize = 64;

/// Connection lifecycle of the sockets client.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WsStatus {
    Idle,
    Connecting,
    Connected,
    Lost,
    Disconnected,
}

/// Events published on [`CloudWs::stream`].
#[derive(Debug, Clone)]
pub enum WsEvent {
    /// Transport opened
    Connected,
    /// Closed by either side
    Disconnected,
    /// Transport failed
    Lost,
    /// Unsolicited device update or `sysmsg`
    Message(SocketMessage),
    Error(SonoffError),
}

struct Pending {
    action: &'static str,
    params: Value,
    responder: oneshot::Sender<Result<SocketMessage>>,
}

/// Removes a pending entry when the waiting call finishes or is dropped.
struct PendingGuard {
    pending: Arc<Mutex<HashMap<String, Pending>>>,
    sequence: String,
}

impl Drop for PendingGuard {
    fn drop(&mut self) {
        self.pending.lock().remove(&self.sequence);
    }
}

struct WsState {
    status: WsStatus,
    last_connect_attempt: Option<SystemTime>,
    disconnected_at: Option<SystemTime>,
    lost_at: Option<SystemTime>,
    outbound: Option<mpsc::UnboundedSender<Message>>,
    connection: Option<CancellationToken>,
}

/// Sockets client handle. Clones share one connection.
#[derive(Clone)]
pub struct CloudWs {
    access_token: String,
    api_key: String,
    app_id: String,
    region: Region,
    http: reqwest::Client,
    dispatch_url: Option<Url>,
    reply_timeout: Duration,
    state: Arc<RwLock<WsState>>,
    pending: Arc<Mutex<HashMap<String, Pending>>>,
    events: broadcast::Sender<WsEvent>,
    cancel_token: CancellationToken,
}

impl CloudWs {
    /// `api_key` is the logged-in user's api key.
    pub fn new<T, K, A>(access_token: T, api_key: K, app_id: A, region: Region) -> Self
    where
        T: Into<String>,
        K: Into<String>,
        A: Into<String>,
    {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            access_token: access_token.into(),
            api_key: api_key.into(),
            app_id: app_id.into(),
            region,
            http: reqwest::Client::new(),
            dispatch_url: None,
            reply_timeout: DEFAULT_REPLY_TIMEOUT,
            state: Arc::new(RwLock::new(WsState {
                status: WsStatus::Idle,
                last_connect_attempt: None,
                disconnected_at: None,
                lost_at: None,
                outbound: None,
                connection: None,
            })),
            pending: Arc::new(Mutex::new(HashMap::new())),
            events,
            cancel_token: CancellationToken::new(),
        }
    }

    /// Builds a client from a logged-in REST session.
    pub fn from_api(api: &CloudApi) -> Result<Self> {
        let token = api.access_token().ok_or_else(|| {
            SonoffError::InvalidState("Cloud API must be logged in before opening sockets".into())
        })?;
        let user = api
            .user()
            .ok_or_else(|| SonoffError::InvalidState("Cloud API session has no user".into()))?;
        Ok(Self::new(token, user.api_key, api.config().app_id.clone(), api.region()))
    }

    pub fn with_dispatch_url(mut self, url: Url) -> Self {
        self.dispatch_url = Some(url);
        self
    }

    pub fn with_reply_timeout(mut self, timeout: Duration) -> Self {
        self.reply_timeout = timeout;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.http = reqwest::Client::builder()
            .connect_timeout(timeout)
            .build()
            .unwrap_or_default();
        self
    }

    pub fn status(&self) -> WsStatus {
        self.with_state(|s| s.status)
    }

    pub fn is_connected(&self) -> bool {
        self.status() == WsStatus::Connected
    }

    pub fn is_connecting(&self) -> bool {
        self.status() == WsStatus::Connecting
    }

    pub fn last_connect_attempt(&self) -> Option<SystemTime> {
        self.with_state(|s| s.last_connect_attempt)
    }

    pub fn disconnected_at(&self) -> Option<SystemTime> {
        self.with_state(|s| s.disconnected_at)
    }

    pub fn lost_at(&self) -> Option<SystemTime> {
        self.with_state(|s| s.lost_at)
    }

    /// Number of commands still waiting for a reply.
    pub fn pending_count(&self) -> usize {
        self.pending.lock().len()
    }

    // -------------------------------------------------------------------------
    // Connection
    // -------------------------------------------------------------------------

    /// Resolves the sockets host, opens the socket and completes the handshake.
    pub async fn connect(&self) -> Result<()> {
        if self.with_state(|s| s.connection.is_some()) {
            self.teardown(WsStatus::Disconnected);
        }
        self.with_state_mut(|s| {
            s.status = WsStatus::Connecting;
            s.last_connect_attempt = Some(SystemTime::now());
            s.lost_at = None;
            s.disconnected_at = None;
        });

        let login = match self.dispatch().await {
            Ok(login) => login,
            Err(e) => {
                self.with_state_mut(|s| s.status = WsStatus::Disconnected);
                return Err(e);
            }
        };
        let url = format!("wss://{}:{}/api/ws", login.domain, login.port);
        info!("Connecting to sockets server {}", url);

        let (socket, _) = match tokio_tungstenite::connect_async(url.as_str()).await {
            Ok(socket) => socket,
            Err(e) => {
                self.with_state_mut(|s| s.status = WsStatus::Disconnected);
                let err = SonoffError::cloud_ws(format!("Connection to sockets server failed: {}", e));
                self.emit(WsEvent::Error(err.clone()));
                return Err(err);
            }
        };
        let (mut sink, mut source) = socket.split();
        let connection = self.cancel_token.child_token();
        let (tx, mut rx) = mpsc::unbounded_channel::<Message>();
        self.with_state_mut(|s| {
            s.outbound = Some(tx);
            s.connection = Some(connection.clone());
        });

        let writer_token = connection.clone();
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = writer_token.cancelled() => {
                        let _ = sink.send(Message::Close(None)).await;
                        break;
                    }
                    msg = rx.recv() => match msg {
                        Some(msg) => {
                            if let Err(e) = sink.send(msg).await {
                                warn!("Sockets write failed: {}", e);
                                break;
                            }
                        }
                        None => break,
                    }
                }
            }
            debug!("Sockets writer task stopped");
        });

        let reader = self.clone();
        let reader_token = connection.clone();
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = reader_token.cancelled() => break,
                    frame = source.next() => match frame {
                        Some(Ok(Message::Text(text))) => reader.handle_text(text.as_str()),
                        Some(Ok(Message::Close(frame))) => {
                            debug!("Sockets server closed the connection: {:?}", frame);
                            reader.closed();
                            break;
                        }
                        Some(Ok(_)) => {}
                        Some(Err(e)) => {
                            reader.lost(e.to_string());
                            break;
                        }
                        None => {
                            reader.closed();
                            break;
                        }
                    }
                }
            }
            debug!("Sockets reader task stopped");
        });

        self.emit(WsEvent::Connected);

        match self.handshake().await {
            Ok(handshake) => {
                self.with_state_mut(|s| s.status = WsStatus::Connected);
                info!("Connected to sockets server");
                if let Some(config) = handshake.config.filter(|c| c.heartbeat_enabled()) {
                    self.arm_heartbeat(Duration::from_secs(config.hb_interval.max(1)), connection);
                }
                Ok(())
            }
            Err(e) => {
                error!("Handshake with sockets server failed: {}", e);
                let mut err = SonoffError::cloud_ws(format!("Handshake with sockets server failed: {}", e));
                if let Some(code) = e.code() {
                    err = err.with_code(code);
                }
                self.emit(WsEvent::Error(err.clone()));
                self.teardown(WsStatus::Disconnected);
                Err(err)
            }
        }
    }

    /// Closes the socket and fails every pending command.
    pub fn disconnect(&self) {
        let was_open = self.with_state(|s| s.connection.is_some());
        self.teardown(WsStatus::Disconnected);
        if was_open {
            info!("Disconnected from sockets server");
            self.emit(WsEvent::Disconnected);
        }
    }

    /// Disconnects and stops all background tasks for good.
    pub fn shutdown(&self) {
        self.disconnect();
        self.cancel_token.cancel();
    }

    pub fn subscribe(&self) -> broadcast::Receiver<WsEvent> {
        self.events.subscribe()
    }

    /// Stream of connection events and unsolicited device messages.
    pub fn stream(&self) -> impl Stream<Item = WsEvent> + Send + 'static {
        let mut rx = self.events.subscribe();
        async_stream::stream! {
            loop {
                match rx.recv().await {
                    Ok(event) => yield event,
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        warn!("Sockets event stream lagged, {} events skipped", skipped);
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        }
    }

    // -------------------------------------------------------------------------
    // Commands
    // -------------------------------------------------------------------------

    /// Queries the full state of a device.
    pub async fn read_states(&self, id: &str, device_api_key: &str) -> Result<DeviceStateEvent> {
        let sequence = next_sequence();
        let command = self.command(ACTION_QUERY, id, device_api_key, sequence.clone(), json!([]));
        self.device_state(ACTION_QUERY, sequence, serde_json::to_value(&command)?, Value::Null)
            .await
    }

    /// Writes one parameter. The reply carries the written params.
    pub async fn write_state(
        &self,
        id: &str,
        device_api_key: &str,
        parameter: Parameter,
        value: Value,
        group: Option<ChannelGroup>,
        outlet: Option<u32>,
    ) -> Result<DeviceStateEvent> {
        let sequence = next_sequence();
        let params = messages::state_params(parameter, value, group, outlet);
        let command = self.command(ACTION_UPDATE, id, device_api_key, sequence.clone(), params.clone());
        self.device_state(ACTION_UPDATE, sequence, serde_json::to_value(&command)?, params)
            .await
    }

    fn command(
        &self,
        action: &'static str,
        id: &str,
        device_api_key: &str,
        sequence: String,
        params: Value,
    ) -> DeviceCommand {
        DeviceCommand {
            action,
            apikey: device_api_key.to_string(),
            self_apikey: self.api_key.clone(),
            deviceid: id.to_string(),
            user_agent: USER_AGENT,
            sequence,
            params,
        }
    }

    async fn device_state(
        &self,
        action: &'static str,
        sequence: String,
        frame: Value,
        params: Value,
    ) -> Result<DeviceStateEvent> {
        match self.request(action, sequence, frame, params).await? {
            SocketMessage::DeviceState(event) => Ok(event),
            other => Err(SonoffError::cloud_ws(format!("Unexpected reply: {:?}", other))),
        }
    }

    async fn handshake(&self) -> Result<ApplicationHandshake> {
        let sequence = next_sequence();
        let frame = UserOnline::new(
            &self.access_token,
            &self.api_key,
            &self.app_id,
            epoch_millis() / 1000,
            sequence.clone(),
        );
        match self
            .request(ACTION_USER_ONLINE, sequence, serde_json::to_value(&frame)?, Value::Null)
            .await?
        {
            SocketMessage::Handshake(handshake) => Ok(handshake),
            other => Err(SonoffError::cloud_ws(format!("Unexpected reply: {:?}", other))),
        }
    }

    /// Registers a pending entry, sends `frame` and waits for the correlated reply.
    async fn request(
        &self,
        action: &'static str,
        sequence: String,
        frame: Value,
        params: Value,
    ) -> Result<SocketMessage> {
        let outbound = self.with_state(|s| s.outbound.clone()).ok_or_else(|| {
            SonoffError::InvalidState("Connection with sockets server is not established".into())
        })?;
        let (responder, reply) = oneshot::channel();
        self.pending.lock().insert(
            sequence.clone(),
            Pending {
                action,
                params,
                responder,
            },
        );
        let _guard = PendingGuard {
            pending: self.pending.clone(),
            sequence: sequence.clone(),
        };

        debug!("Sockets {} request, sequence {}", action, sequence);
        outbound
            .send(Message::Text(frame.to_string().into()))
            .map_err(|_| SonoffError::cloud_ws("Message could not be sent to sockets server"))?;

        match tokio::time::timeout(self.reply_timeout, reply).await {
            Ok(Ok(result)) => result,
            Ok(Err(_)) => Err(SonoffError::cloud_ws(
                "Connection to sockets server closed before a reply arrived",
            )),
            Err(_) => {
                warn!("Sockets {} request {} timed out", action, sequence);
                Err(SonoffError::Timeout)
            }
        }
    }

    // -------------------------------------------------------------------------
    // Inbound
    // -------------------------------------------------------------------------

    fn handle_text(&self, text: &str) {
        let payload: Value = match serde_json::from_str(text) {
            Ok(payload) => payload,
            Err(e) => {
                debug!("Sockets message could not be parsed: {}", e);
                self.emit(WsEvent::Error(e.into()));
                return;
            }
        };
        if !payload.is_object() {
            return;
        }
        let (code, _) = error_of(&payload);
        let action = payload.get("action").and_then(Value::as_str);

        if action == Some(ACTION_SYSMSG) {
            match decode::<DeviceConnectionStateEvent>(messages::SOCKETS_SYSMSG, &payload) {
                Ok(event) => self.emit(WsEvent::Message(SocketMessage::DeviceConnectionState(event))),
                Err(e) => debug!("Dropped system message: {}", e),
            }
        }

        let sequence = match payload.get("sequence") {
            Some(Value::String(s)) => Some(s.clone()),
            Some(Value::Number(n)) => Some(n.to_string()),
            _ => None,
        };
        let pending_action = sequence
            .as_deref()
            .and_then(|s| self.pending.lock().get(s).map(|p| p.action));

        if code != ERR_SUCCESS {
            match sequence.as_deref().and_then(|s| self.take_pending(s)) {
                Some(pending) => pending.respond(Err(SonoffError::cloud_ws(
                    "An error was received from sockets server",
                )
                .with_code(code))),
                None => debug!("Sockets error {} without a matching request", code),
            }
            return;
        }

        if pending_action == Some(ACTION_USER_ONLINE) {
            if let Some(pending) = sequence.as_deref().and_then(|s| self.take_pending(s)) {
                pending.respond(
                    decode::<ApplicationHandshake>(messages::SOCKETS_HANDSHAKE, &payload)
                        .map(SocketMessage::Handshake),
                );
            }
            return;
        }

        let kind = match (action, pending_action) {
            (Some(ACTION_UPDATE), _) | (_, Some(ACTION_UPDATE)) => ACTION_UPDATE,
            (Some(ACTION_QUERY), _) | (_, Some(ACTION_QUERY)) => ACTION_QUERY,
            _ => return,
        };
        let pending = sequence.as_deref().and_then(|s| self.take_pending(s));
        let result = if kind == ACTION_UPDATE {
            let mut merged = payload;
            if let Some(p) = pending.as_ref().filter(|p| !p.params.is_null()) {
                merged["params"] = p.params.clone();
            }
            decode::<DeviceStateEvent>(messages::SOCKETS_UPDATE, &merged)
        } else {
            decode::<DeviceStateEvent>(messages::SOCKETS_QUERY, &payload)
        };

        match (pending, result) {
            (Some(pending), result) => pending.respond(result.map(SocketMessage::DeviceState)),
            (None, Ok(event)) => self.emit(WsEvent::Message(SocketMessage::DeviceState(event))),
            (None, Err(e)) => debug!("Dropped {} message: {}", kind, e),
        }
    }

    fn take_pending(&self, sequence: &str) -> Option<Pending> {
        self.pending.lock().remove(sequence)
    }

    fn arm_heartbeat(&self, period: Duration, connection: CancellationToken) {
        let Some(outbound) = self.with_state(|s| s.outbound.clone()) else {
            return;
        };
        debug!("Sockets heartbeat every {:?}", period);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval_at(tokio::time::Instant::now() + period, period);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            loop {
                tokio::select! {
                    _ = connection.cancelled() => break,
                    _ = ticker.tick() => {
                        if outbound.send(Message::Ping(Default::default())).is_err() {
                            break;
                        }
                    }
                }
            }
        });
    }

    fn lost(&self, reason: String) {
        warn!("Sockets connection lost: {}", reason);
        self.with_state_mut(|s| s.lost_at = Some(SystemTime::now()));
        self.emit(WsEvent::Lost);
        self.emit(WsEvent::Error(SonoffError::cloud_ws(format!(
            "An error occurred on sockets server connection: {}",
            reason
        ))));
        self.teardown(WsStatus::Lost);
    }

    fn closed(&self) {
        self.teardown(WsStatus::Disconnected);
        self.emit(WsEvent::Disconnected);
    }

    fn teardown(&self, status: WsStatus) {
        let connection = self.with_state_mut(|s| {
            s.status = status;
            s.disconnected_at = Some(SystemTime::now());
            s.outbound = None;
            s.connection.take()
        });
        if let Some(token) = connection {
            token.cancel();
        }
        let drained: Vec<Pending> = self.pending.lock().drain().map(|(_, p)| p).collect();
        for pending in drained {
            pending.respond(Err(SonoffError::cloud_ws(
                "Connection to sockets server was closed",
            )));
        }
    }

    // -------------------------------------------------------------------------
    // Dispatch
    // -------------------------------------------------------------------------

    async fn dispatch(&self) -> Result<ApplicationLogin> {
        let base = match &self.dispatch_url {
            Some(url) => url.clone(),
            None => Url::parse(self.region.sockets_endpoint())
                .map_err(|e| SonoffError::InvalidArgument(e.to_string()))?,
        };
        let url = base
            .join(PATH_DISPATCH)
            .map_err(|e| SonoffError::InvalidArgument(e.to_string()))?;
        debug!("GET {}", url);

        let response = self
            .http
            .get(url)
            .bearer_auth(&self.access_token)
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .send()
            .await
            .map_err(|e| SonoffError::cloud_ws(format!("Calling api endpoint failed: {}", e)))?;
        let status = response.status();
        if !status.is_success() {
            return Err(SonoffError::cloud_ws(format!("Unexpected HTTP status {}", status))
                .with_code(i64::from(status.as_u16())));
        }
        let body: Value = response
            .json()
            .await
            .map_err(|e| SonoffError::cloud_ws(format!("Could not decode response body: {}", e)))?;

        let (code, message) = error_of(&body);
        if code != ERR_SUCCESS {
            return Err(SonoffError::cloud_ws(format!(
                "User authentication failed: {}",
                message.unwrap_or_default()
            ))
            .with_code(code));
        }
        let pointer = if body.get("data").is_some_and(Value::is_object) {
            "/data"
        } else {
            ""
        };
        schema(messages::DISPATCH_LOGIN)?
            .decode(&body, pointer)
            .map_err(|e| SonoffError::cloud_ws(format!("Could not validate received payload: {}", e)))
    }

    fn emit(&self, event: WsEvent) {
        let _ = self.events.send(event);
    }

    fn with_state<R>(&self, f: impl FnOnce(&WsState) -> R) -> R {
        f(&self.state.read())
    }

    fn with_state_mut<R>(&self, f: impl FnOnce(&mut WsState) -> R) -> R {
        f(&mut self.state.write())
    }
}

impl Pending {
    fn respond(self, result: Result<SocketMessage>) {
        let _ = self.responder.send(result);
    }
}

fn decode<T: DeserializeOwned>(name: &str, body: &Value) -> Result<T> {
    schema(name)?
        .decode(body, "")
        .map_err(|e| SonoffError::cloud_ws(format!("Could not validate received payload: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn attached() -> (CloudWs, mpsc::UnboundedReceiver<Message>) {
        let ws = CloudWs::new("token", "user-key", "app", Region::Europe);
        let (tx, rx) = mpsc::unbounded_channel();
        ws.with_state_mut(|s| {
            s.outbound = Some(tx);
            s.status = WsStatus::Connected;
        });
        (ws, rx)
    }

    async fn sent_frame(rx: &mut mpsc::UnboundedReceiver<Message>) -> Value {
        match rx.recv().await {
            Some(Message::Text(text)) => serde_json::from_str(text.as_str()).unwrap(),
            other => panic!("unexpected frame {other:?}"),
        }
    }

    #[tokio::test]
    async fn error_reply_rejects_and_forgets_request() {
        let (ws, mut rx) = attached();
        let mut events = ws.subscribe();
        let task = {
            let ws = ws.clone();
            tokio::spawn(async move { ws.read_states("1000a", "device-key").await })
        };
        let frame = sent_frame(&mut rx).await;
        assert_eq!(frame["action"], "query");
        assert_eq!(frame["selfApikey"], "user-key");
        assert_eq!(frame["apikey"], "device-key");
        let seq = frame["sequence"].as_str().unwrap().to_string();
        assert_eq!(ws.pending_count(), 1);

        ws.handle_text(&json!({"sequence": seq, "error": 5}).to_string());
        let err = task.await.unwrap().unwrap_err();
        assert_eq!(err.code(), Some(5));
        assert_eq!(ws.pending_count(), 0);

        ws.handle_text(&json!({"sequence": seq, "deviceid": "1000a"}).to_string());
        assert!(events.try_recv().is_err());
    }

    #[tokio::test]
    async fn update_reply_carries_written_params() {
        let (ws, mut rx) = attached();
        let task = {
            let ws = ws.clone();
            tokio::spawn(async move {
                ws.write_state(
                    "1000a",
                    "device-key",
                    Parameter::Switch,
                    json!("on"),
                    Some(ChannelGroup::Switches),
                    Some(1),
                )
                .await
            })
        };
        let frame = sent_frame(&mut rx).await;
        assert_eq!(frame["params"], json!({"switches": [{"switch": "on", "outlet": 1}]}));
        let seq = frame["sequence"].as_str().unwrap().to_string();

        ws.handle_text(
            &json!({"error": 0, "deviceid": "1000a", "apikey": "device-key", "sequence": seq}).to_string(),
        );
        let event = task.await.unwrap().unwrap();
        assert_eq!(event.device_id, "1000a");
        assert_eq!(event.params, json!({"switches": [{"switch": "on", "outlet": 1}]}));
    }

    #[tokio::test]
    async fn unsolicited_messages_become_events() {
        let (ws, _rx) = attached();
        let mut events = ws.subscribe();

        ws.handle_text(
            &json!({"action": "update", "deviceid": "1000a", "apikey": "k", "params": {"switch": "off"}})
                .to_string(),
        );
        match events.try_recv().unwrap() {
            WsEvent::Message(SocketMessage::DeviceState(event)) => {
                assert_eq!(event.params["switch"], "off");
            }
            other => panic!("unexpected event {other:?}"),
        }

        ws.handle_text(
            &json!({"action": "sysmsg", "deviceid": "1000a", "apikey": "k", "params": {"online": false}})
                .to_string(),
        );
        match events.try_recv().unwrap() {
            WsEvent::Message(SocketMessage::DeviceConnectionState(event)) => {
                assert!(!event.params.online);
            }
            other => panic!("unexpected event {other:?}"),
        }

        ws.handle_text("not json");
        assert!(matches!(events.try_recv().unwrap(), WsEvent::Error(_)));
    }

    #[tokio::test(start_paused = true)]
    async fn unanswered_request_times_out() {
        let (ws, _rx) = attached();
        let err = ws.read_states("1000a", "device-key").await.unwrap_err();
        assert!(err.is_timeout());
        assert_eq!(ws.pending_count(), 0);
    }

    #[tokio::test]
    async fn disconnect_fails_pending_requests() {
        let (ws, mut rx) = attached();
        ws.with_state_mut(|s| s.connection = Some(CancellationToken::new()));
        let task = {
            let ws = ws.clone();
            tokio::spawn(async move { ws.read_states("1000a", "device-key").await })
        };
        sent_frame(&mut rx).await;
        ws.disconnect();
        assert!(task.await.unwrap().is_err());
        assert_eq!(ws.status(), WsStatus::Disconnected);
        assert!(ws.disconnected_at().is_some());
    }

    #[tokio::test]
    async fn requests_need_a_connection() {
        let ws = CloudWs::new("token", "user-key", "app", Region::Europe);
        assert!(matches!(
            ws.read_states("1000a", "k").await,
            Err(SonoffError::InvalidState(_))
        ));
    }

    #[tokio::test]
    async fn dispatch_reads_host_and_port() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(PATH_DISPATCH))
            .and(header("Authorization", "Bearer token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "error": 0,
                "data": {"IP": "1.2.3.4", "port": 8080, "domain": "eu-pconnect3.coolkit.cc"}
            })))
            .mount(&server)
            .await;
        let ws = CloudWs::new("token", "user-key", "app", Region::Europe)
            .with_dispatch_url(Url::parse(&server.uri()).unwrap());
        let login = ws.dispatch().await.unwrap();
        assert_eq!(login.domain, "eu-pconnect3.coolkit.cc");
        assert_eq!(login.port, 8080);
        assert_eq!(login.ip_address.as_deref(), Some("1.2.3.4"));
    }

    #[tokio::test]
    async fn dispatch_error_is_authentication_failure() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(PATH_DISPATCH))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({"error": 401, "msg": "token expired"})),
            )
            .mount(&server)
            .await;
        let ws = CloudWs::new("token", "user-key", "app", Region::Europe)
            .with_dispatch_url(Url::parse(&server.uri()).unwrap());
        let err = ws.dispatch().await.unwrap_err();
        assert_eq!(err.code(), Some(401));
        assert!(err.to_string().contains("User authentication failed: token expired"));
    }
}
