//! eWeLink cloud REST client.
//! Handles signed login with region redirect, token refresh and the family/thing endpoints.

use crate::config::CloudConfig;
use crate::error::{CallContext, ERR_CLOUD_WRONG_REGION, ERR_SUCCESS, Result, SonoffError};
use crate::messages::cloud::{
    DeviceState, Family, ThirdPartyDevice, Thing, Things, User, UserLogin, UserRefresh,
};
use crate::messages::{self, error_of, schema};
use crate::types::{ChannelGroup, ItemType, Parameter, Region};
use base64::{Engine as _, engine::general_purpose};
use hmac::{Hmac, Mac};
use log::{debug, info, warn};
use parking_lot::RwLock;
use reqwest::Method;
use serde_json::{Value, json};
use sha2::Sha256;
use std::sync::Arc;
use std::time::{Duration, SystemTime};
use url::Url;

pub const PATH_LOGIN: &str = "/v2/user/login";
pub const PATH_REFRESH: &str = "/v2/user/refresh";
pub const PATH_FAMILY: &str = "/v2/family";
pub const PATH_THING: &str = "/v2/device/thing";
pub const PATH_THING_STATUS: &str = "/v2/device/thing/status";
pub const PATH_ADD_PARTNER_DEVICE: &str = "/v2/device/inherit/add-partner-device";

/// Access tokens are valid for 30 days.
pub const TOKEN_VALIDITY: Duration = Duration::from_secs(30 * 24 * 60 * 60);
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

const HEADER_APP_ID: &str = "X-CK-Appid";
const COUNTRY_CODE: &str = "+86";
const PARTNER_DEVICE_TYPE: i64 = 23;

/// Lifecycle of the REST session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
}

#[derive(Debug, Clone)]
struct Session {
    access_token: String,
    refresh_token: String,
    user: User,
    acquired_at: SystemTime,
}

struct ApiState {
    region: Region,
    connecting: bool,
    session: Option<Session>,
}

/// How a request is authorized.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Auth {
    /// HMAC signature of the body with the app secret
    Signed,
    Bearer,
    BearerWithAppId,
}

/// Cloud REST API handle. Cheap to clone; clones share the session.
#[derive(Clone)]
pub struct CloudApi {
    config: Arc<CloudConfig>,
    http: reqwest::Client,
    base_url: Option<Url>,
    state: Arc<RwLock<ApiState>>,
    connect_lock: Arc<tokio::sync::Mutex<()>>,
}

impl CloudApi {
    pub fn new(config: CloudConfig) -> Self {
        let region = config.region;
        Self {
            config: Arc::new(config),
            http: build_http(DEFAULT_CONNECT_TIMEOUT),
            base_url: None,
            state: Arc::new(RwLock::new(ApiState {
                region,
                connecting: false,
                session: None,
            })),
            connect_lock: Arc::new(tokio::sync::Mutex::new(())),
        }
    }

    /// Sets the transport connect timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.http = build_http(timeout);
        self
    }

    /// Sends every request to `base_url` instead of the region host.
    pub fn with_base_url(mut self, base_url: Url) -> Self {
        self.base_url = Some(base_url);
        self
    }

    pub fn config(&self) -> &CloudConfig {
        &self.config
    }

    pub fn region(&self) -> Region {
        self.with_state(|s| s.region)
    }

    pub fn connection_state(&self) -> ConnectionState {
        self.with_state(|s| match (&s.session, s.connecting) {
            (Some(_), _) => ConnectionState::Connected,
            (None, true) => ConnectionState::Connecting,
            (None, false) => ConnectionState::Disconnected,
        })
    }

    pub fn is_connected(&self) -> bool {
        self.connection_state() == ConnectionState::Connected
    }

    pub fn access_token(&self) -> Option<String> {
        self.with_state(|s| s.session.as_ref().map(|x| x.access_token.clone()))
    }

    pub fn user(&self) -> Option<User> {
        self.with_state(|s| s.session.as_ref().map(|x| x.user.clone()))
    }

    /// When the current tokens were acquired.
    pub fn tokens_acquired_at(&self) -> Option<SystemTime> {
        self.with_state(|s| s.session.as_ref().map(|x| x.acquired_at))
    }

    // -------------------------------------------------------------------------
    // Session
    // -------------------------------------------------------------------------

    /// Logs in and stores the session.
    pub async fn connect(&self) -> Result<()> {
        let _guard = self.connect_lock.lock().await;
        self.with_state_mut(|s| s.connecting = true);
        let result = self.login().await;
        self.with_state_mut(|s| s.connecting = false);
        result.map(|_| ())
    }

    /// Drops the session. The next call logs in again.
    pub fn disconnect(&self) {
        if self.with_state_mut(|s| s.session.take()).is_some() {
            info!("Cloud API session closed");
        }
    }

    /// Signed login. A wrong-region answer is retried once against the region it names.
    pub async fn login(&self) -> Result<UserLogin> {
        let body = self.login_body();
        let mut redirected = false;
        loop {
            let (response, ctx) = self
                .call(Method::POST, PATH_LOGIN, &[], Some(&body), Auth::Signed)
                .await?;
            let (code, message) = error_of(&response);

            if code == ERR_CLOUD_WRONG_REGION {
                if redirected {
                    return Err(SonoffError::cloud_api("Could not login to user region")
                        .with_code(code)
                        .with_context(ctx));
                }
                let region = response
                    .pointer("/data/region")
                    .and_then(Value::as_str)
                    .and_then(Region::from_wire)
                    .ok_or_else(|| {
                        SonoffError::cloud_api("Could not login to user region")
                            .with_code(code)
                            .with_context(ctx.clone())
                    })?;
                info!("Account belongs to region {}, retrying login", region);
                self.with_state_mut(|s| s.region = region);
                redirected = true;
                continue;
            }

            if code != ERR_SUCCESS {
                return Err(SonoffError::cloud_api(format!(
                    "User authentication failed: {}",
                    message.unwrap_or_default()
                ))
                .with_code(code)
                .with_context(ctx));
            }

            let login: UserLogin = schema(messages::USER_LOGIN)?
                .decode(&response, "/data")
                .map_err(|e| wrap("User authentication failed", e, &ctx))?;
            self.with_state_mut(|s| {
                s.region = login.region;
                s.session = Some(Session {
                    access_token: login.at.clone(),
                    refresh_token: login.rt.clone(),
                    user: login.user.clone(),
                    acquired_at: SystemTime::now(),
                });
            });
            info!("Logged in to eWeLink cloud, region {}", login.region);
            return Ok(login);
        }
    }

    /// Exchanges the refresh token for a new token pair.
    pub async fn refresh_tokens(&self) -> Result<()> {
        let refresh_token = self
            .with_state(|s| s.session.as_ref().map(|x| x.refresh_token.clone()))
            .ok_or_else(|| SonoffError::InvalidState("Cloud API is not connected".into()))?;
        let body = json!({ "rt": refresh_token });
        let (response, ctx) = self
            .call(Method::POST, PATH_REFRESH, &[], Some(&body), Auth::BearerWithAppId)
            .await?;
        expect_success(&response, &ctx, "Refreshing user access token failed")?;
        let tokens: UserRefresh = schema(messages::USER_REFRESH)?
            .decode(&response, "/data")
            .map_err(|e| wrap("Refreshing user access token failed", e, &ctx))?;
        self.with_state_mut(|s| {
            if let Some(session) = s.session.as_mut() {
                session.access_token = tokens.at;
                session.refresh_token = tokens.rt;
                session.acquired_at = SystemTime::now();
            }
        });
        info!("Cloud access token refreshed");
        Ok(())
    }

    // -------------------------------------------------------------------------
    // Endpoints
    // -------------------------------------------------------------------------

    pub async fn get_family(&self) -> Result<Family> {
        const FAILED: &str = "Load family detail failed";
        let (response, ctx) = self.authorized_call(Method::GET, PATH_FAMILY, &[], None).await?;
        expect_success(&response, &ctx, FAILED)?;
        schema(messages::FAMILY)?
            .decode(&response, "/data")
            .map_err(|e| wrap(FAILED, e, &ctx))
    }

    pub async fn get_family_things(&self, family_id: &str) -> Result<Things> {
        const FAILED: &str = "Load family things failed";
        let query = [("num", "0".to_string()), ("familyId", family_id.to_string())];
        let (response, ctx) = self.authorized_call(Method::GET, PATH_THING, &query, None).await?;
        expect_success(&response, &ctx, FAILED)?;
        schema(messages::THINGS)?
            .check(&response)
            .and_then(|_| Things::classify(&response["data"]["thingList"]))
            .map_err(|e| wrap(FAILED, e, &ctx))
    }

    /// Loads one device or group by id.
    pub async fn get_thing(&self, id: &str, item_type: ItemType) -> Result<Thing> {
        const FAILED: &str = "Load family specified thing failed";
        let body = json!({ "thingList": [{ "itemType": item_type.value(), "id": id }] });
        let (response, ctx) = self.authorized_call(Method::POST, PATH_THING, &[], Some(&body)).await?;
        expect_success(&response, &ctx, FAILED)?;
        schema(messages::THINGS)?
            .check(&response)
            .and_then(|_| Things::classify(&response["data"]["thingList"]))
            .and_then(Things::into_single)
            .map_err(|e| wrap(FAILED, e, &ctx))
    }

    pub async fn get_thing_state(&self, id: &str, item_type: ItemType) -> Result<DeviceState> {
        const FAILED: &str = "Load family specified thing state failed";
        let query = [("type", item_type.value().to_string()), ("id", id.to_string())];
        let (response, ctx) = self
            .authorized_call(Method::GET, PATH_THING_STATUS, &query, None)
            .await?;
        expect_success(&response, &ctx, FAILED)?;
        let params: Value = schema(messages::THING_STATE)?
            .decode(&response, "/data/params")
            .map_err(|e| wrap(FAILED, e, &ctx))?;
        Ok(DeviceState {
            device_id: id.to_string(),
            params,
        })
    }

    /// Writes one parameter; `group` + `outlet` address a single outlet.
    pub async fn set_thing_state(
        &self,
        id: &str,
        parameter: Parameter,
        value: Value,
        group: Option<ChannelGroup>,
        outlet: Option<u32>,
        item_type: ItemType,
    ) -> Result<()> {
        const FAILED: &str = "Set thing state failed";
        let params = messages::state_params(parameter, value, group, outlet);
        let body = json!({ "type": item_type.value(), "id": id, "params": params });
        let (response, ctx) = self
            .authorized_call(Method::POST, PATH_THING_STATUS, &[], Some(&body))
            .await?;
        expect_success(&response, &ctx, FAILED)?;
        schema(messages::SET_THING_STATE)?
            .check(&response)
            .map_err(|e| wrap(FAILED, e, &ctx))
    }

    /// Links a third party device to the account.
    pub async fn add_third_party_device(&self, id: &str) -> Result<ThirdPartyDevice> {
        const FAILED: &str = "Add third party device failed";
        let body = json!({ "type": PARTNER_DEVICE_TYPE, "partnerDevice": [{ "uniqueID": id }] });
        self.authorized().await?;
        let (response, ctx) = self
            .call(
                Method::POST,
                PATH_ADD_PARTNER_DEVICE,
                &[],
                Some(&body),
                Auth::BearerWithAppId,
            )
            .await?;
        expect_success(&response, &ctx, FAILED)?;
        schema(messages::THIRD_PARTY_DEVICE)?
            .check(&response)
            .and_then(|_| Things::classify(&response["data"]["thingList"]))
            .and_then(|things| match things.into_single()? {
                Thing::Device(device) => Ok(ThirdPartyDevice {
                    name: device.name,
                    device_id: device.device_id,
                    api_key: device.api_key,
                    device_key: device.device_key.unwrap_or_default(),
                }),
                Thing::Group(_) => Err(SonoffError::InvalidState(
                    "Specified device could not be decoded from response".into(),
                )),
            })
            .map_err(|e| wrap(FAILED, e, &ctx))
    }

    // -------------------------------------------------------------------------
    // Transport
    // -------------------------------------------------------------------------

    /// Connects when needed and refreshes tokens older than [`TOKEN_VALIDITY`].
    /// Login and refresh run under `connect_lock`, so concurrent callers share one exchange.
    async fn authorized(&self) -> Result<()> {
        if self.is_connected() && !self.session_expired() {
            return Ok(());
        }
        let _guard = self.connect_lock.lock().await;
        if !self.is_connected() {
            self.with_state_mut(|s| s.connecting = true);
            let result = self.login().await;
            self.with_state_mut(|s| s.connecting = false);
            result?;
        }
        if self.session_expired() {
            info!("Cloud access token expired, refreshing");
            self.refresh_tokens().await?;
        }
        Ok(())
    }

    fn session_expired(&self) -> bool {
        self.tokens_acquired_at()
            .is_some_and(|at| tokens_expired(at, SystemTime::now()))
    }

    async fn authorized_call(
        &self,
        method: Method,
        path: &str,
        query: &[(&str, String)],
        body: Option<&Value>,
    ) -> Result<(Value, CallContext)> {
        self.authorized().await?;
        self.call(method, path, query, body, Auth::Bearer).await
    }

    fn endpoint(&self, path: &str) -> Result<Url> {
        let base = match &self.base_url {
            Some(url) => url.clone(),
            None => Url::parse(self.region().api_endpoint())
                .map_err(|e| SonoffError::InvalidArgument(e.to_string()))?,
        };
        base.join(path)
            .map_err(|e| SonoffError::InvalidArgument(format!("Invalid endpoint {}: {}", path, e)))
    }

    fn login_body(&self) -> Value {
        let username = &self.config.username;
        if username.contains('@') {
            json!({
                "password": self.config.password,
                "countryCode": COUNTRY_CODE,
                "email": username,
            })
        } else {
            let phone = if username.starts_with('+') {
                username.clone()
            } else {
                format!("+{}", username)
            };
            json!({
                "password": self.config.password,
                "countryCode": COUNTRY_CODE,
                "phoneNumber": phone,
            })
        }
    }

    fn sign(&self, body: &str) -> Result<String> {
        let mut mac = Hmac::<Sha256>::new_from_slice(self.config.app_secret.as_bytes())
            .map_err(|e| SonoffError::InvalidArgument(e.to_string()))?;
        mac.update(body.as_bytes());
        Ok(general_purpose::STANDARD.encode(mac.finalize().into_bytes()))
    }

    /// Issues a request and returns the decoded JSON body with its call context.
    /// Transport failures and non-2xx statuses become `CloudApiCall` errors.
    async fn call(
        &self,
        method: Method,
        path: &str,
        query: &[(&str, String)],
        body: Option<&Value>,
        auth: Auth,
    ) -> Result<(Value, CallContext)> {
        let mut url = self.endpoint(path)?;
        if !query.is_empty() {
            url.query_pairs_mut()
                .extend_pairs(query.iter().map(|(k, v)| (*k, v.as_str())));
        }
        let payload = body.map(serde_json::to_string).transpose()?;
        let mut ctx = CallContext::new(method.as_str(), url.as_str());
        if let Some(payload) = &payload {
            ctx = ctx.with_request_body(payload.clone());
        }
        debug!("{} {}", method, url);

        let mut request = self
            .http
            .request(method, url)
            .header(reqwest::header::CONTENT_TYPE, "application/json");
        request = match auth {
            Auth::Signed => request
                .header(
                    reqwest::header::AUTHORIZATION,
                    format!("Sign {}", self.sign(payload.as_deref().unwrap_or_default())?),
                )
                .header(HEADER_APP_ID, &self.config.app_id),
            Auth::Bearer | Auth::BearerWithAppId => {
                let token = self
                    .access_token()
                    .ok_or_else(|| SonoffError::InvalidState("Cloud API is not connected".into()))?;
                let request = request.bearer_auth(token);
                if auth == Auth::BearerWithAppId {
                    request.header(HEADER_APP_ID, &self.config.app_id)
                } else {
                    request
                }
            }
        };
        if let Some(payload) = payload {
            request = request.body(payload);
        }

        let response = match request.send().await {
            Ok(response) => response,
            Err(e) => {
                warn!("{} failed: {}", ctx.summary(), e);
                self.disconnect();
                return Err(SonoffError::cloud_api(format!("Request failed: {}", e)).with_context(ctx));
            }
        };
        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| SonoffError::cloud_api(e.to_string()).with_context(ctx.clone()))?;
        let ctx = ctx.with_response(status.as_u16(), text.clone());

        if !status.is_success() {
            warn!("{}", ctx.summary());
            return Err(SonoffError::cloud_api(format!("Unexpected HTTP status {}", status))
                .with_code(i64::from(status.as_u16()))
                .with_context(ctx));
        }
        match serde_json::from_str(&text) {
            Ok(value) => Ok((value, ctx)),
            Err(e) => {
                warn!("{}", ctx.summary());
                Err(SonoffError::cloud_api(format!("Could not decode response body: {}", e))
                    .with_context(ctx))
            }
        }
    }

    fn with_state<R>(&self, f: impl FnOnce(&ApiState) -> R) -> R {
        f(&self.state.read())
    }

    fn with_state_mut<R>(&self, f: impl FnOnce(&mut ApiState) -> R) -> R {
        f(&mut self.state.write())
    }
}

fn build_http(connect_timeout: Duration) -> reqwest::Client {
    reqwest::Client::builder()
        .connect_timeout(connect_timeout)
        .build()
        .unwrap_or_default()
}

/// True once `acquired_at` is at least [`TOKEN_VALIDITY`] in the past.
pub fn tokens_expired(acquired_at: SystemTime, now: SystemTime) -> bool {
    now.duration_since(acquired_at)
        .is_ok_and(|elapsed| elapsed >= TOKEN_VALIDITY)
}

fn expect_success(body: &Value, ctx: &CallContext, failed: &str) -> Result<()> {
    let (code, message) = error_of(body);
    if code == ERR_SUCCESS {
        return Ok(());
    }
    warn!("{}", ctx.summary());
    Err(SonoffError::cloud_api(format!("{}: {}", failed, message.unwrap_or_default()))
        .with_code(code)
        .with_context(ctx.clone()))
}

/// Turns schema and decoding failures into a `CloudApiCall` carrying the call context.
fn wrap(failed: &str, err: SonoffError, ctx: &CallContext) -> SonoffError {
    match err {
        e @ SonoffError::CloudApiCall { .. } => e,
        e => SonoffError::cloud_api(format!("{}: {}", failed, e)).with_context(ctx.clone()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn login_ok() -> Value {
        json!({
            "error": 0,
            "data": {
                "at": "access-1",
                "rt": "refresh-1",
                "region": "eu",
                "user": {"apikey": "user-key", "email": "user@example.com"},
            }
        })
    }

    #[test]
    fn expiry_uses_total_elapsed_time() {
        let now = SystemTime::now();
        assert!(!tokens_expired(now - Duration::from_secs(59), now));
        assert!(!tokens_expired(now - TOKEN_VALIDITY + Duration::from_secs(1), now));
        assert!(tokens_expired(now - TOKEN_VALIDITY, now));
        assert!(!tokens_expired(now + Duration::from_secs(5), now));
    }

    #[test]
    fn signature_is_base64_hmac() {
        let api = CloudApi::new(CloudConfig::new("u@x.io", "p", "app", "secret"));
        let mut mac = Hmac::<Sha256>::new_from_slice(b"secret").unwrap();
        mac.update(b"{}");
        let expected = general_purpose::STANDARD.encode(mac.finalize().into_bytes());
        assert_eq!(api.sign("{}").unwrap(), expected);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn concurrent_calls_share_one_refresh() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(PATH_LOGIN))
            .respond_with(ResponseTemplate::new(200).set_body_json(login_ok()))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path(PATH_REFRESH))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({"error": 0, "data": {"at": "access-2", "rt": "refresh-2"}}))
                    .set_delay(Duration::from_millis(100)),
            )
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path(PATH_FAMILY))
            .and(header("Authorization", "Bearer access-2"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "error": 0,
                "data": {"familyList": [], "currentFamilyId": null}
            })))
            .expect(2)
            .mount(&server)
            .await;

        let api = CloudApi::new(CloudConfig::new("u@x.io", "p", "app", "secret"))
            .with_base_url(Url::parse(&server.uri()).unwrap());
        api.connect().await.unwrap();
        api.with_state_mut(|s| {
            if let Some(session) = s.session.as_mut() {
                session.acquired_at = SystemTime::now() - TOKEN_VALIDITY - Duration::from_secs(1);
            }
        });

        let (first, second) = tokio::join!(api.get_family(), api.get_family());
        first.unwrap();
        second.unwrap();

        let refreshes: Vec<Value> = server
            .received_requests()
            .await
            .unwrap()
            .iter()
            .filter(|r| r.url.path() == PATH_REFRESH)
            .map(|r| serde_json::from_slice(&r.body).unwrap())
            .collect();
        assert_eq!(refreshes, vec![json!({"rt": "refresh-1"})]);
    }

    #[tokio::test]
    async fn stale_tokens_are_refreshed_before_calls() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(PATH_LOGIN))
            .respond_with(ResponseTemplate::new(200).set_body_json(login_ok()))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path(PATH_REFRESH))
            .and(header("Authorization", "Bearer access-1"))
            .and(header(HEADER_APP_ID, "app"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "error": 0,
                "data": {"at": "access-2", "rt": "refresh-2"}
            })))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path(PATH_FAMILY))
            .and(header("Authorization", "Bearer access-2"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "error": 0,
                "data": {"familyList": [], "currentFamilyId": null}
            })))
            .expect(1)
            .mount(&server)
            .await;

        let api = CloudApi::new(CloudConfig::new("u@x.io", "p", "app", "secret"))
            .with_base_url(Url::parse(&server.uri()).unwrap());
        api.connect().await.unwrap();
        api.with_state_mut(|s| {
            if let Some(session) = s.session.as_mut() {
                session.acquired_at = SystemTime::now() - TOKEN_VALIDITY - Duration::from_secs(1);
            }
        });

        api.get_family().await.unwrap();
        assert_eq!(api.access_token().as_deref(), Some("access-2"));
        let age = SystemTime::now()
            .duration_since(api.tokens_acquired_at().unwrap())
            .unwrap();
        assert!(age < Duration::from_secs(60));
    }
}
