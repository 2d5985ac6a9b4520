//! Turns resolved `_ewelink._tcp.local` services into device events.

use crate::crypto;
use crate::error::Result;
use crate::messages::lan::{DeviceEvent, DeviceEventData};
use log::debug;
use mdns_sd::ResolvedService;
use serde_json::Value;
use std::collections::HashMap;
use std::net::Ipv4Addr;

/// Browse type, fully qualified as the mDNS daemon expects it.
pub const SERVICE_TYPE: &str = "_ewelink._tcp.local.";
pub const DEFAULT_DEVICE_PORT: u16 = 8081;

const SERVICE_SUFFIX: &str = "._ewelink._tcp.local";
const DOMAIN_SUFFIX: &str = ".local";
const DATA_FRAGMENTS: [&str; 4] = ["data1", "data2", "data3", "data4"];

/// A resolved service announcement, detached from the mDNS daemon.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Announcement {
    pub fullname: String,
    pub hostname: String,
    pub port: u16,
    pub addresses: Vec<String>,
    /// TXT properties; `None` for keys without a value
    pub properties: HashMap<String, Option<String>>,
}

impl From<&ResolvedService> for Announcement {
    fn from(info: &ResolvedService) -> Self {
        let properties = info
            .get_properties()
            .iter()
            .map(|p| {
                let value = p.val().map(|v| String::from_utf8_lossy(v).into_owned());
                (p.key().to_string(), value)
            })
            .collect();
        Self {
            fullname: info.get_fullname().to_string(),
            hostname: info.get_hostname().to_string(),
            port: info.get_port(),
            addresses: info.get_addresses().iter().map(|a| a.to_string()).collect(),
            properties,
        }
    }
}

impl Announcement {
    fn property(&self, key: &str) -> Option<&str> {
        self.properties.get(key).and_then(Option::as_deref)
    }

    /// First IPv4 address, the devices do not answer on v6.
    fn ipv4_address(&self) -> Option<String> {
        self.addresses
            .iter()
            .find_map(|a| a.parse::<Ipv4Addr>().ok())
            .map(|ip| ip.to_string())
    }
}

/// Device id of a `<prefix>_<id>` label, e.g. `eWeLink_1000abcdef`.
fn instance_id(label: &str) -> Option<&str> {
    let (prefix, id) = label.split_once('_')?;
    let valid = !prefix.is_empty()
        && prefix.chars().all(|c| c.is_ascii_alphabetic())
        && !id.is_empty()
        && id.chars().all(|c| c.is_ascii_alphanumeric());
    valid.then_some(id)
}

/// Matches `<prefix>_<id>._ewelink._tcp.local`, with or without the root dot.
pub fn service_instance_id(name: &str) -> Option<&str> {
    name.trim_end_matches('.')
        .strip_suffix(SERVICE_SUFFIX)
        .and_then(instance_id)
}

/// Matches `<prefix>_<id>.local`, with or without the root dot.
pub fn host_id(name: &str) -> Option<&str> {
    name.trim_end_matches('.')
        .strip_suffix(DOMAIN_SUFFIX)
        .and_then(instance_id)
}

/// TXT `encrypt` flag. Only `"1"` and `"true"` enable it.
pub fn encrypt_flag(value: Option<&str>) -> bool {
    matches!(value.map(str::trim), Some("1") | Some("true"))
}

/// Builds the device event of one resolved service.
///
/// `Ok(None)` when the service is not a complete eWeLink announcement: a
/// foreign instance name or host, no IPv4 address, or any of `id`, `type`,
/// `seq` and `data1` missing. `Err` when the payload does not decrypt or
/// decode. `keys` maps device ids to device keys.
pub fn parse_announcement(
    announcement: &Announcement,
    keys: &HashMap<String, String>,
) -> Result<Option<DeviceEvent>> {
    if service_instance_id(&announcement.fullname).is_none()
        || host_id(&announcement.hostname).is_none()
    {
        return Ok(None);
    }
    let field = |key: &str| announcement.property(key);
    let (Some(ip_address), Some(id), Some(kind), Some(seq), Some(_)) = (
        announcement.ipv4_address(),
        field("id"),
        field("type"),
        field("seq"),
        field("data1"),
    ) else {
        return Ok(None);
    };

    let encrypt = encrypt_flag(field("encrypt"));
    let iv = field("iv").map(str::to_string);
    let data_fragments: Vec<String> = DATA_FRAGMENTS
        .iter()
        .filter_map(|key| field(key).map(str::to_string))
        .collect();
    let joined = data_fragments.concat();

    let payload = match (encrypt, keys.get(id)) {
        (false, _) => Some(joined.into_bytes()),
        (true, Some(key)) => Some(crypto::decrypt_message(
            &joined,
            key,
            iv.as_deref().unwrap_or_default(),
        )?),
        (true, None) => None,
    };
    let data = match payload {
        Some(bytes) => {
            let value: Value = serde_json::from_slice(&bytes)?;
            Some(DeviceEventData::from_value(&value)?)
        }
        None => {
            debug!("No key registered for encrypted device {}", id);
            None
        }
    };

    let port = match announcement.port {
        0 => DEFAULT_DEVICE_PORT,
        port => port,
    };
    Ok(Some(DeviceEvent {
        id: id.to_string(),
        ip_address,
        domain: announcement.hostname.trim_end_matches('.').to_string(),
        port,
        kind: kind.to_string(),
        seq: seq.to_string(),
        iv,
        encrypt,
        data_fragments,
        data,
    }))
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::messages::lan::DeviceEventData;

    const NAME: &str = "eWeLink_1000abcdef._ewelink._tcp.local.";
    const HOST: &str = "eWeLink_1000abcdef.local.";

    pub(crate) fn announcement(entries: &[&str]) -> Announcement {
        let properties = entries
            .iter()
            .map(|entry| match entry.split_once('=') {
                Some((key, value)) => (key.to_string(), Some(value.to_string())),
                None => (entry.to_string(), None),
            })
            .collect();
        Announcement {
            fullname: NAME.to_string(),
            hostname: HOST.to_string(),
            port: 8081,
            addresses: vec!["fe80::1%eth0".to_string(), "192.168.1.20".to_string()],
            properties,
        }
    }

    #[test]
    fn name_patterns() {
        assert_eq!(service_instance_id(NAME), Some("1000abcdef"));
        assert_eq!(service_instance_id("eWeLink_1000abcdef._ewelink._tcp.local"), Some("1000abcdef"));
        assert_eq!(host_id(HOST), Some("1000abcdef"));
        assert_eq!(service_instance_id("_1000._ewelink._tcp.local."), None);
        assert_eq!(service_instance_id("eWeLink_10-00._ewelink._tcp.local."), None);
        assert_eq!(host_id("printer.local."), None);
    }

    #[test]
    fn encrypt_flag_values() {
        assert!(encrypt_flag(Some("true")));
        assert!(encrypt_flag(Some("1")));
        assert!(!encrypt_flag(Some("0")));
        assert!(!encrypt_flag(Some("false")));
        assert!(!encrypt_flag(None));
    }

    #[test]
    fn plain_announcement() {
        let service = announcement(&[
            "txtvers=1",
            "id=1000abcdef",
            "type=plug",
            "apivers=1",
            "seq=12",
            "encrypt=false",
            r#"data1={"switch":"on","startup":"stay"}"#,
        ]);
        let event = parse_announcement(&service, &HashMap::new()).unwrap().unwrap();
        assert_eq!(event.id, "1000abcdef");
        assert_eq!(event.ip_address, "192.168.1.20");
        assert_eq!(event.domain, "eWeLink_1000abcdef.local");
        assert_eq!(event.port, 8081);
        assert_eq!(event.kind, "plug");
        assert_eq!(event.seq, "12");
        assert!(!event.encrypt);
        assert_eq!(event.data_fragments.len(), 1);
        let data = event.data.unwrap();
        assert_eq!(data.relay.switch.as_deref(), Some("on"));
    }

    #[test]
    fn partial_txt_is_ignored() {
        let service = announcement(&["id=1000abcdef", "type=plug", "seq=12"]);
        assert!(parse_announcement(&service, &HashMap::new()).unwrap().is_none());
    }

    #[test]
    fn foreign_services_and_v6_only_hosts_are_ignored() {
        let entries = ["id=1000abcdef", "type=plug", "seq=1", r#"data1={"switch":"on"}"#];

        let mut service = announcement(&entries);
        service.fullname = "Living Room._ewelink._tcp.local.".to_string();
        assert!(parse_announcement(&service, &HashMap::new()).unwrap().is_none());

        let mut service = announcement(&entries);
        service.addresses = vec!["fe80::1%eth0".to_string()];
        assert!(parse_announcement(&service, &HashMap::new()).unwrap().is_none());
    }

    #[test]
    fn undecodable_payload_is_an_error() {
        let service = announcement(&["id=1000abcdef", "type=plug", "seq=1", "data1={not json"]);
        assert!(parse_announcement(&service, &HashMap::new()).is_err());
    }

    #[test]
    fn encrypted_payload_needs_a_key() {
        let iv = crypto::encode_iv(&[7u8; 16]);
        let ciphertext =
            crypto::encrypt_message(br#"{"switch":"off","fwVersion":"3.5.0"}"#, "device-key", &iv).unwrap();
        let (first, second) = ciphertext.split_at(ciphertext.len() / 2);
        let data1 = format!("data1={}", first);
        let data2 = format!("data2={}", second);
        let iv_entry = format!("iv={}", iv);
        let service = announcement(&[
            "id=1000abcdef",
            "type=plug",
            "seq=3",
            "encrypt=true",
            &iv_entry,
            &data1,
            &data2,
        ]);

        let event = parse_announcement(&service, &HashMap::new()).unwrap().unwrap();
        assert!(event.encrypt);
        assert!(event.data.is_none());
        assert_eq!(event.data_fragments.len(), 2);

        let keys = HashMap::from([("1000abcdef".to_string(), "device-key".to_string())]);
        let event = parse_announcement(&service, &keys).unwrap().unwrap();
        let data: DeviceEventData = event.data.unwrap();
        assert_eq!(data.firmware_version.as_deref(), Some("3.5.0"));
        assert_eq!(data.relay.switch.as_deref(), Some("off"));
    }
}
