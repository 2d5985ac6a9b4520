use rusonoff::cloud::api::{
    PATH_ADD_PARTNER_DEVICE, PATH_FAMILY, PATH_LOGIN, PATH_THING, PATH_THING_STATUS,
};
use rusonoff::messages::cloud::Thing;
use rusonoff::{ChannelGroup, CloudApi, CloudConfig, ItemType, Parameter, Region, SonoffError};
use serde_json::{Value, json};
use url::Url;
use wiremock::matchers::{body_json, body_partial_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn login_ok(region: &str) -> Value {
    json!({
        "error": 0,
        "data": {
            "at": "access-1",
            "rt": "refresh-1",
            "region": region,
            "user": {"apikey": "user-key", "email": "user@example.com"},
        }
    })
}

fn device(id: &str, uiid: u32) -> Value {
    json!({
        "name": format!("Device {}", id),
        "deviceid": id,
        "apikey": "owner-key",
        "devicekey": "device-secret",
        "extra": {"uiid": uiid},
        "online": true,
        "params": {"switch": "on", "fwVersion": "3.5.0"},
    })
}

fn client(server: &MockServer, username: &str) -> CloudApi {
    let config = CloudConfig::new(username, "secret", "app-id", "app-secret");
    CloudApi::new(config).with_base_url(Url::parse(&server.uri()).unwrap())
}

async fn mount_login(server: &MockServer) {
    Mock::given(method("POST"))
        .and(path(PATH_LOGIN))
        .respond_with(ResponseTemplate::new(200).set_body_json(login_ok("eu")))
        .mount(server)
        .await;
}

#[tokio::test]
async fn email_login_is_signed() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(PATH_LOGIN))
        .and(header("X-CK-Appid", "app-id"))
        .and(body_json(json!({
            "password": "secret",
            "countryCode": "+86",
            "email": "user@example.com",
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(login_ok("us")))
        .expect(1)
        .mount(&server)
        .await;

    let api = client(&server, "user@example.com");
    let login = api.login().await.unwrap();
    assert_eq!(login.user.api_key, "user-key");
    assert_eq!(api.region(), Region::America);
    assert_eq!(api.access_token().as_deref(), Some("access-1"));

    let requests = server.received_requests().await.unwrap();
    let auth = requests[0].headers.get("Authorization").unwrap().to_str().unwrap();
    assert!(auth.starts_with("Sign "));
}

#[tokio::test]
async fn phone_login_gets_a_plus_prefix() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(PATH_LOGIN))
        .and(body_partial_json(json!({"phoneNumber": "+8613800000000"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(login_ok("cn")))
        .expect(1)
        .mount(&server)
        .await;

    let api = client(&server, "8613800000000");
    api.connect().await.unwrap();
    assert!(api.is_connected());
    assert_eq!(api.region(), Region::China);
}

#[tokio::test]
async fn wrong_region_is_retried_once() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(PATH_LOGIN))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "error": 10004,
            "msg": "wrong region",
            "data": {"region": "as"},
        })))
        .up_to_n_times(1)
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path(PATH_LOGIN))
        .respond_with(ResponseTemplate::new(200).set_body_json(login_ok("as")))
        .expect(1)
        .mount(&server)
        .await;

    let api = client(&server, "user@example.com");
    api.login().await.unwrap();
    assert_eq!(api.region(), Region::Asia);
}

#[tokio::test]
async fn second_wrong_region_fails() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(PATH_LOGIN))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "error": 10004,
            "msg": "wrong region",
            "data": {"region": "as"},
        })))
        .expect(2)
        .mount(&server)
        .await;

    let api = client(&server, "user@example.com");
    let err = api.login().await.unwrap_err();
    assert_eq!(err.code(), Some(10004));
    assert!(err.to_string().contains("Could not login to user region"));
    assert!(!api.is_connected());
}

#[tokio::test]
async fn rejected_credentials_carry_the_server_message() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(PATH_LOGIN))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({"error": 10001, "msg": "bad password"})),
        )
        .mount(&server)
        .await;

    let err = client(&server, "user@example.com").login().await.unwrap_err();
    assert!(matches!(err, SonoffError::CloudApiCall { .. }));
    assert_eq!(err.code(), Some(10001));
    assert!(err.to_string().contains("User authentication failed: bad password"));
    assert!(err.context().is_some());
}

#[tokio::test]
async fn family_things_are_classified() {
    let server = MockServer::start().await;
    mount_login(&server).await;
    Mock::given(method("GET"))
        .and(path(PATH_FAMILY))
        .and(header("Authorization", "Bearer access-1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "error": 0,
            "data": {
                "familyList": [
                    {"id": "home-1", "name": "Home", "index": 0, "roomList": []},
                    {"id": "home-2", "name": "Cabin", "index": 1},
                ],
                "currentFamilyId": "home-2",
            }
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(PATH_THING))
        .and(query_param("familyId", "home-2"))
        .and(query_param("num", "0"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "error": 0,
            "data": {
                "thingList": [
                    {"itemType": 1, "itemData": device("1000aa", 1)},
                    {"itemType": 2, "itemData": device("1000bb", 6)},
                    {"itemType": 3, "itemData": {
                        "id": "group-1",
                        "name": "Lights",
                        "mainDeviceId": "1000aa",
                        "uiid": 1,
                        "params": {"switch": "off"},
                    }},
                ],
                "total": 3,
            }
        })))
        .expect(1)
        .mount(&server)
        .await;

    let api = client(&server, "user@example.com");
    let family = api.get_family().await.unwrap();
    let home = family.current().unwrap();
    assert_eq!(home.name, "Cabin");

    let things = api.get_family_things(&home.id).await.unwrap();
    assert_eq!(things.devices.len(), 2);
    assert_eq!(things.groups.len(), 1);
    assert_eq!(things.devices[1].uiid(), 6);
    assert!(things.devices[0].to_states().unwrap().is_some());
}

#[tokio::test]
async fn single_thing_lookup() {
    let server = MockServer::start().await;
    mount_login(&server).await;
    Mock::given(method("POST"))
        .and(path(PATH_THING))
        .and(body_json(json!({"thingList": [{"itemType": 1, "id": "1000aa"}]})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "error": 0,
            "data": {"thingList": [{"itemType": 1, "itemData": device("1000aa", 1)}]}
        })))
        .mount(&server)
        .await;

    let thing = client(&server, "user@example.com")
        .get_thing("1000aa", ItemType::Device)
        .await
        .unwrap();
    assert!(matches!(thing, Thing::Device(d) if d.device_id == "1000aa"));
}

#[tokio::test]
async fn thing_state_is_read_and_written() {
    let server = MockServer::start().await;
    mount_login(&server).await;
    Mock::given(method("GET"))
        .and(path(PATH_THING_STATUS))
        .and(query_param("type", "1"))
        .and(query_param("id", "1000aa"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "error": 0,
            "data": {"params": {"switches": [{"switch": "on", "outlet": 0}]}}
        })))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path(PATH_THING_STATUS))
        .and(body_json(json!({
            "type": 1,
            "id": "1000aa",
            "params": {"switches": [{"switch": "off", "outlet": 1}]},
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"error": 0, "data": {}})))
        .expect(1)
        .mount(&server)
        .await;

    let api = client(&server, "user@example.com");
    let state = api.get_thing_state("1000aa", ItemType::Device).await.unwrap();
    assert_eq!(state.device_id, "1000aa");
    assert_eq!(state.params["switches"][0]["switch"], "on");

    api.set_thing_state(
        "1000aa",
        Parameter::Switch,
        Value::from("off"),
        Some(ChannelGroup::Switches),
        Some(1),
        ItemType::Device,
    )
    .await
    .unwrap();
}

#[tokio::test]
async fn failed_write_reports_the_server_error() {
    let server = MockServer::start().await;
    mount_login(&server).await;
    Mock::given(method("POST"))
        .and(path(PATH_THING_STATUS))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({"error": 4002, "msg": "device offline"})),
        )
        .mount(&server)
        .await;

    let err = client(&server, "user@example.com")
        .set_thing_state("1000aa", Parameter::Switch, Value::from("on"), None, None, ItemType::Device)
        .await
        .unwrap_err();
    assert_eq!(err.code(), Some(4002));
    assert!(err.to_string().contains("Set thing state failed: device offline"));
}

#[tokio::test]
async fn http_errors_keep_status_and_context() {
    let server = MockServer::start().await;
    mount_login(&server).await;
    Mock::given(method("GET"))
        .and(path(PATH_FAMILY))
        .respond_with(ResponseTemplate::new(502).set_body_string("bad gateway"))
        .mount(&server)
        .await;

    let err = client(&server, "user@example.com").get_family().await.unwrap_err();
    assert_eq!(err.code(), Some(502));
    let ctx = err.context().unwrap();
    assert_eq!(ctx.status, Some(502));
    assert_eq!(ctx.response_body.as_deref(), Some("bad gateway"));
}

#[tokio::test]
async fn partner_device_is_linked() {
    let server = MockServer::start().await;
    mount_login(&server).await;
    Mock::given(method("POST"))
        .and(path(PATH_ADD_PARTNER_DEVICE))
        .and(header("X-CK-Appid", "app-id"))
        .and(header("Authorization", "Bearer access-1"))
        .and(body_json(json!({"type": 23, "partnerDevice": [{"uniqueID": "1000cc"}]})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "error": 0,
            "data": {"thingList": [{"itemType": 1, "itemData": device("1000cc", 1)}]}
        })))
        .expect(1)
        .mount(&server)
        .await;

    let linked = client(&server, "user@example.com")
        .add_third_party_device("1000cc")
        .await
        .unwrap();
    assert_eq!(linked.device_id, "1000cc");
    assert_eq!(linked.device_key, "device-secret");
}
