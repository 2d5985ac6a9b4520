//! Cloud REST response records.

use crate::error::{Result, SonoffError};
use crate::types::{ItemType, Region};
use crate::uiid::{States, UiidParams};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Account profile returned by login.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    #[serde(rename = "apikey")]
    pub api_key: String,
    pub email: Option<String>,
    pub phone_number: Option<String>,
    pub country_code: Option<String>,
    pub account_level: Option<i64>,
    pub ip_country: Option<String>,
    pub app_version: Option<String>,
}

/// `data` of a successful `/v2/user/login`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct UserLogin {
    pub at: String,
    pub rt: String,
    pub user: User,
    pub region: Region,
}

/// `data` of a successful `/v2/user/refresh`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct UserRefresh {
    pub at: String,
    pub rt: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Room {
    pub id: String,
    pub name: String,
    pub index: Option<i64>,
}

/// A user home ("family").
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Home {
    pub id: String,
    #[serde(rename = "apikey")]
    pub api_key: Option<String>,
    pub name: String,
    pub index: Option<i64>,
    #[serde(rename = "roomList", default)]
    pub rooms: Vec<Room>,
}

/// `data` of `/v2/family`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Family {
    #[serde(rename = "familyList")]
    pub homes: Vec<Home>,
    #[serde(rename = "currentFamilyId")]
    pub current_family_id: Option<String>,
}

impl Family {
    pub fn current(&self) -> Option<&Home> {
        self.current_family_id
            .as_deref()
            .and_then(|id| self.homes.iter().find(|h| h.id == id))
            .or_else(|| self.homes.first())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceExtra {
    pub model: Option<String>,
    pub ui: Option<String>,
    pub uiid: u32,
    pub description: Option<String>,
    pub manufacturer: Option<String>,
    pub mac: Option<String>,
    pub apmac: Option<String>,
    pub model_info: Option<String>,
    pub brand_id: Option<String>,
    #[serde(rename = "chipid")]
    pub chip_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceConfiguration {
    pub p2p_server_name: Option<String>,
    #[serde(rename = "p2pAccout")]
    pub p2p_account: Option<String>,
    pub p2p_license: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceSettings {
    pub ops_notify: Option<i64>,
    pub ops_history: Option<i64>,
    pub alarm_notify: Option<i64>,
}

/// A device "thing" (itemType 1 or 2).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Device {
    pub name: String,
    #[serde(rename = "deviceid")]
    pub device_id: String,
    #[serde(rename = "apikey")]
    pub api_key: String,
    pub extra: DeviceExtra,
    pub brand_name: Option<String>,
    pub brand_logo: Option<String>,
    #[serde(default)]
    pub show_brand: bool,
    pub product_model: Option<String>,
    #[serde(rename = "devicekey")]
    pub device_key: Option<String>,
    #[serde(default)]
    pub online: bool,
    #[serde(rename = "devConfig")]
    pub configuration: Option<DeviceConfiguration>,
    pub settings: Option<DeviceSettings>,
    #[serde(default)]
    pub deny_features: Vec<String>,
    /// Raw status parameters, interpreted through the UIID catalog
    #[serde(default)]
    pub params: Value,
}

impl Device {
    pub fn uiid(&self) -> u32 {
        self.extra.uiid
    }

    /// Parsed status. `Ok(None)` when the UIID has no catalog entry.
    pub fn state(&self) -> Result<Option<UiidParams>> {
        if self.params.is_null() {
            return Ok(None);
        }
        UiidParams::parse(self.uiid(), &self.params)
    }

    pub fn to_states(&self) -> Result<Option<States>> {
        Ok(self.state()?.map(|s| s.to_states()))
    }
}

/// A device group "thing" (itemType 3).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Group {
    pub id: String,
    pub name: String,
    pub main_device_id: String,
    pub uiid: Option<u32>,
    #[serde(default)]
    pub deny_features: Vec<String>,
    #[serde(default)]
    pub params: Value,
}

impl Group {
    pub fn state(&self) -> Result<Option<UiidParams>> {
        match self.uiid {
            Some(uiid) if !self.params.is_null() => UiidParams::parse(uiid, &self.params),
            _ => Ok(None),
        }
    }
}

/// Devices and groups of a thing listing, split by `itemType`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Things {
    pub devices: Vec<Device>,
    pub groups: Vec<Group>,
}

#[derive(Debug, Deserialize)]
struct RawThing {
    #[serde(rename = "itemType")]
    item_type: i64,
    #[serde(rename = "itemData")]
    item_data: Value,
}

impl Things {
    /// Splits a raw `thingList` into devices and groups.
    pub fn classify(thing_list: &Value) -> Result<Self> {
        let raw: Vec<RawThing> = serde_json::from_value(thing_list.clone())?;
        let mut things = Things::default();
        for thing in raw {
            match ItemType::try_from(thing.item_type)? {
                t if t.is_device() => things.devices.push(serde_json::from_value(thing.item_data)?),
                _ => things.groups.push(serde_json::from_value(thing.item_data)?),
            }
        }
        Ok(things)
    }

    pub fn is_empty(&self) -> bool {
        self.devices.is_empty() && self.groups.is_empty()
    }

    /// The single device or group of a by-id lookup.
    ///
    /// Fails when both kinds are present, none is present, or more than one
    /// thing of a kind came back.
    pub fn into_single(self) -> Result<Thing> {
        let Things {
            mut devices,
            mut groups,
        } = self;
        match (devices.len(), groups.len()) {
            (1, 0) => devices.pop().map(Thing::Device),
            (0, 1) => groups.pop().map(Thing::Group),
            _ => None,
        }
        .ok_or_else(|| {
            SonoffError::InvalidState(format!(
                "Expected exactly one thing, got {} devices and {} groups",
                devices.len(),
                groups.len()
            ))
        })
    }
}

/// A single cloud thing.
#[derive(Debug, Clone, PartialEq)]
pub enum Thing {
    Device(Device),
    Group(Group),
}

impl Thing {
    pub fn id(&self) -> &str {
        match self {
            Thing::Device(d) => &d.device_id,
            Thing::Group(g) => &g.id,
        }
    }

    pub fn as_device(&self) -> Option<&Device> {
        match self {
            Thing::Device(d) => Some(d),
            Thing::Group(_) => None,
        }
    }
}

/// Status of one thing as read from `/v2/device/thing/status`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviceState {
    #[serde(rename = "deviceId")]
    pub device_id: String,
    pub params: Value,
}

impl DeviceState {
    pub fn to_states(&self, uiid: u32) -> Result<Option<States>> {
        crate::uiid::project(uiid, &self.params)
    }
}

/// Device linked through add-partner-device.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThirdPartyDevice {
    pub name: String,
    #[serde(rename = "deviceid")]
    pub device_id: String,
    #[serde(rename = "apikey")]
    pub api_key: String,
    #[serde(rename = "devicekey")]
    pub device_key: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn device(id: &str, uiid: u32) -> Value {
        json!({
            "name": "Lamp",
            "deviceid": id,
            "apikey": "k",
            "extra": {"uiid": uiid, "model": "PSF-B01-GL"},
            "online": true,
            "params": {"switch": "on", "rssi": -50},
        })
    }

    #[test]
    fn classify_devices_and_groups() {
        let list = json!([
            {"itemType": 1, "itemData": device("1000a", 1)},
            {"itemType": 2, "itemData": device("1000b", 6)},
            {"itemType": 3, "itemData": {"id": "g1", "name": "All", "mainDeviceId": "1000a"}},
        ]);
        let things = Things::classify(&list).unwrap();
        assert_eq!(things.devices.len(), 2);
        assert_eq!(things.groups.len(), 1);
        assert!(things.into_single().is_err());
    }

    #[test]
    fn single_thing() {
        let list = json!([{"itemType": 1, "itemData": device("1000a", 1)}]);
        let thing = Things::classify(&list).unwrap().into_single().unwrap();
        assert_eq!(thing.id(), "1000a");
        let states = thing.as_device().unwrap().to_states().unwrap().unwrap();
        assert_eq!(states.channel.len(), 1);

        assert!(Things::classify(&json!([])).unwrap().into_single().is_err());
    }

    #[test]
    fn unknown_item_type_fails() {
        let list = json!([{"itemType": 9, "itemData": {}}]);
        assert!(Things::classify(&list).is_err());
    }

    #[test]
    fn current_home_falls_back_to_first() {
        let family: Family = serde_json::from_value(json!({
            "familyList": [{"id": "h1", "name": "Home"}, {"id": "h2", "name": "Cabin"}],
            "currentFamilyId": "h2",
        }))
        .unwrap();
        assert_eq!(family.current().unwrap().name, "Cabin");
        let family = Family {
            current_family_id: None,
            ..family
        };
        assert_eq!(family.current().unwrap().id, "h1");
    }
}
