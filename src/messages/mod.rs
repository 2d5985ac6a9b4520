//! Typed protocol records and response schema checks.
//! Every response body is checked against a named schema before any field is trusted.

pub mod cloud;
pub mod lan;
pub mod sockets;

use crate::error::{Result, SonoffError};
use crate::transform;
use crate::types::{ChannelGroup, Parameter};
use serde::de::DeserializeOwned;
use serde_json::{Map, Value, json};
use std::collections::HashMap;
use std::sync::OnceLock;

pub const USER_LOGIN: &str = "user_login";
pub const USER_REFRESH: &str = "user_refresh";
pub const FAMILY: &str = "family";
pub const THINGS: &str = "things";
pub const THING_STATE: &str = "thing_state";
pub const SET_THING_STATE: &str = "set_thing_state";
pub const THIRD_PARTY_DEVICE: &str = "third_party_device";
pub const DISPATCH_LOGIN: &str = "dispatch_login";
pub const SOCKETS_HANDSHAKE: &str = "sockets_handshake";
pub const SOCKETS_UPDATE: &str = "sockets_update";
pub const SOCKETS_QUERY: &str = "sockets_query";
pub const SOCKETS_SYSMSG: &str = "sockets_sysmsg";
pub const LAN_INFO: &str = "lan_info";
pub const LAN_SET_STATE: &str = "lan_set_state";

const REGISTRY: &[(&str, &[&str])] = &[
    (USER_LOGIN, &["/data/at", "/data/rt", "/data/user/apikey", "/data/region"]),
    (USER_REFRESH, &["/data/at", "/data/rt"]),
    (FAMILY, &["/data/familyList"]),
    (THINGS, &["/data/thingList"]),
    (THING_STATE, &["/data/params"]),
    (SET_THING_STATE, &[]),
    (THIRD_PARTY_DEVICE, &["/data/thingList"]),
    (DISPATCH_LOGIN, &[]),
    (SOCKETS_HANDSHAKE, &["/apikey"]),
    (SOCKETS_UPDATE, &["/deviceid"]),
    (SOCKETS_QUERY, &["/deviceid"]),
    (SOCKETS_SYSMSG, &["/deviceid", "/params"]),
    (LAN_INFO, &["/data"]),
    (LAN_SET_STATE, &[]),
];

/// Named set of JSON pointers a response body must carry.
#[derive(Debug)]
pub struct ResponseSchema {
    pub name: &'static str,
    required: &'static [&'static str],
}

impl ResponseSchema {
    pub fn check(&self, body: &Value) -> Result<()> {
        if !body.is_object() {
            return Err(self.mismatch("body is not a JSON object".to_string()));
        }
        match self
            .required
            .iter()
            .find(|pointer| body.pointer(pointer).is_none_or(Value::is_null))
        {
            Some(pointer) => Err(self.mismatch(format!("missing {}", pointer))),
            None => Ok(()),
        }
    }

    /// Checks `body` and deserializes the value found at `pointer` (`""` for the whole body).
    pub fn decode<T: DeserializeOwned>(&self, body: &Value, pointer: &str) -> Result<T> {
        self.check(body)?;
        let value = body
            .pointer(pointer)
            .cloned()
            .ok_or_else(|| self.mismatch(format!("missing {}", pointer)))?;
        serde_json::from_value(value).map_err(|e| self.mismatch(e.to_string()))
    }

    fn mismatch(&self, reason: String) -> SonoffError {
        SonoffError::Schema {
            schema: self.name,
            reason,
        }
    }
}

fn registry() -> &'static HashMap<&'static str, ResponseSchema> {
    static SCHEMAS: OnceLock<HashMap<&'static str, ResponseSchema>> = OnceLock::new();
    SCHEMAS.get_or_init(|| {
        REGISTRY
            .iter()
            .map(|&(name, required)| (name, ResponseSchema { name, required }))
            .collect()
    })
}

/// Looks up a registered response schema.
pub fn schema(name: &str) -> Result<&'static ResponseSchema> {
    registry()
        .get(name)
        .ok_or_else(|| SonoffError::InvalidArgument(format!("Unknown response schema: {}", name)))
}

/// Server `error` code and message of a response body. A missing code counts as success.
pub fn error_of(body: &Value) -> (i64, Option<String>) {
    let code = body.get("error").and_then(Value::as_i64).unwrap_or(0);
    let message = ["msg", "message", "reason"]
        .iter()
        .find_map(|key| body.get(*key).and_then(Value::as_str))
        .map(str::to_string);
    (code, message)
}

/// Parameters object of a state write.
///
/// With both `group` and `outlet` the value addresses one outlet:
/// `{"switches": [{"switch": "on", "outlet": 1}]}`. Otherwise `{"switch": "on"}`.
pub fn state_params(
    parameter: Parameter,
    value: Value,
    group: Option<ChannelGroup>,
    outlet: Option<u32>,
) -> Value {
    let mut entry = Map::new();
    entry.insert(parameter.as_str().to_string(), value);
    match (group, outlet) {
        (Some(group), Some(outlet)) => {
            entry.insert(transform::OUTLET.to_string(), json!(outlet));
            let mut params = Map::new();
            params.insert(group.as_str().to_string(), json!([entry]));
            Value::Object(params)
        }
        _ => Value::Object(entry),
    }
}

/// Current time in milliseconds since the Unix epoch.
pub(crate) fn epoch_millis() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or_default()
}

/// Process-wide strictly increasing sequence id (epoch milliseconds, as a string).
pub fn next_sequence() -> String {
    use std::sync::atomic::{AtomicU64, Ordering};
    static LAST: AtomicU64 = AtomicU64::new(0);
    let now = epoch_millis();
    let mut last = LAST.load(Ordering::Relaxed);
    loop {
        let next = now.max(last + 1);
        match LAST.compare_exchange_weak(last, next, Ordering::SeqCst, Ordering::Relaxed) {
            Ok(_) => return next.to_string(),
            Err(current) => last = current,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn registry_is_shared() {
        let a = schema(USER_LOGIN).unwrap();
        let b = schema(USER_LOGIN).unwrap();
        assert!(std::ptr::eq(a, b));
        assert!(schema("nope").is_err());
    }

    #[test]
    fn missing_pointer_is_schema_error() {
        let err = schema(USER_REFRESH)
            .unwrap()
            .check(&json!({"error": 0, "data": {"at": "a"}}))
            .unwrap_err();
        match err {
            SonoffError::Schema { schema, reason } => {
                assert_eq!(schema, USER_REFRESH);
                assert_eq!(reason, "missing /data/rt");
            }
            other => panic!("unexpected error {other}"),
        }
    }

    #[test]
    fn error_code_and_message() {
        assert_eq!(error_of(&json!({"error": 0})), (0, None));
        assert_eq!(
            error_of(&json!({"error": 406, "msg": "auth"})),
            (406, Some("auth".to_string()))
        );
        assert_eq!(error_of(&json!({"data": {}})).0, 0);
    }

    #[test]
    fn outlet_addressed_params() {
        assert_eq!(
            state_params(Parameter::Switch, json!("on"), Some(ChannelGroup::Switches), Some(2)),
            json!({"switches": [{"switch": "on", "outlet": 2}]})
        );
        assert_eq!(
            state_params(Parameter::Switch, json!("off"), Some(ChannelGroup::Switches), None),
            json!({"switch": "off"})
        );
    }

    #[test]
    fn sequences_strictly_increase() {
        let ids: Vec<u64> = (0..50).map(|_| next_sequence().parse().unwrap()).collect();
        assert!(ids.windows(2).all(|w| w[0] < w[1]));
    }
}
