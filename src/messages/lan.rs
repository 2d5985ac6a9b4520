//! LAN records: discovery announcements, `/zeroconf/info` replies and request bodies.

use crate::error::Result;
use crate::types::{Parameter, ParameterGroup};
use crate::uiid::common::{OUTLETS_FIELDS, Outlets, SWITCH_FIELDS, SwitchState};
use crate::uiid::schema::{self, FieldSpec, ON_OFF};
use crate::uiid::States;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Fixed `selfApikey` the devices expect on local calls.
pub const LAN_SELF_API_KEY: &str = "123";

const LAN_DEVICE_FIELDS: &[FieldSpec] = &[
    FieldSpec::text("deviceid"),
    FieldSpec::text("ssid"),
    FieldSpec::boolean("otaUnlock"),
    FieldSpec::text("fwVersion"),
    FieldSpec::text("bssid"),
    FieldSpec::any_int("signalStrength"),
    FieldSpec::any_int("rssi"),
    FieldSpec::one_of("sledOnline", ON_OFF),
    FieldSpec::text("subDevId"),
];

const LAN_DIMMER_FIELDS: &[FieldSpec] = &[
    FieldSpec::int("brightness", 0, 100),
    FieldSpec::int("mode", 0, 255),
    FieldSpec::int("brightmin", 0, 254),
    FieldSpec::int("brightmax", 1, 255),
];

const LAN_TABLES: &[&[FieldSpec]] =
    &[LAN_DEVICE_FIELDS, SWITCH_FIELDS, LAN_DIMMER_FIELDS, OUTLETS_FIELDS];

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct LanDimmer {
    pub brightness: Option<i64>,
    pub mode: Option<i64>,
    #[serde(rename = "brightmin")]
    pub bright_min: Option<i64>,
    #[serde(rename = "brightmax")]
    pub bright_max: Option<i64>,
}

impl LanDimmer {
    fn project(&self, states: &mut States) {
        let light = ParameterGroup::Light;
        states
            .in_group(light, Parameter::Brightness2, self.brightness)
            .in_group(light, Parameter::Mode, self.mode)
            .in_group(light, Parameter::MinimumBrightness, self.bright_min)
            .in_group(light, Parameter::MaximumBrightness, self.bright_max);
    }
}

fn project_relays(relay: &SwitchState, outlets: &Outlets, states: &mut States) {
    relay.project(states, ParameterGroup::Switch);
    outlets.project(states);
}

/// Status fields carried by a discovery announcement.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct DeviceEventData {
    #[serde(rename = "fwVersion")]
    pub firmware_version: Option<String>,
    pub ssid: Option<String>,
    pub rssi: Option<i64>,
    pub bssid: Option<String>,
    #[serde(rename = "signalStrength")]
    pub signal_strength: Option<i64>,
    #[serde(rename = "sledOnline")]
    pub status_led: Option<String>,
    #[serde(rename = "subDevId")]
    pub sub_device_id: Option<String>,
    #[serde(flatten)]
    pub relay: SwitchState,
    #[serde(flatten)]
    pub dimmer: LanDimmer,
    #[serde(flatten)]
    pub outlets: Outlets,
}

impl DeviceEventData {
    pub fn from_value(value: &Value) -> Result<Self> {
        let normalized = schema::validate(value, LAN_TABLES)?;
        Ok(serde_json::from_value(normalized)?)
    }

    pub fn to_states(&self) -> States {
        let mut states = States::new();
        states
            .device(Parameter::StatusLed, self.status_led.as_deref())
            .device(Parameter::FirmwareVersion, self.firmware_version.as_deref())
            .device(Parameter::Ssid, self.ssid.as_deref())
            .device(Parameter::Bssid, self.bssid.as_deref())
            .device(Parameter::Rssi, self.rssi.or(self.signal_strength));
        project_relays(&self.relay, &self.outlets, &mut states);
        self.dimmer.project(&mut states);
        states
    }
}

/// A device announced over mDNS.
#[derive(Debug, Clone, PartialEq)]
pub struct DeviceEvent {
    pub id: String,
    pub ip_address: String,
    pub domain: String,
    pub port: u16,
    /// Device type advertised in TXT (e.g. `plug`, `strip`, `diy_plug`)
    pub kind: String,
    pub seq: String,
    pub iv: Option<String>,
    pub encrypt: bool,
    /// Raw `data1`..`data4` TXT values, absent ones skipped
    pub data_fragments: Vec<String>,
    /// `None` when the payload is encrypted and no key is registered
    pub data: Option<DeviceEventData>,
}

/// `data` of a `/zeroconf/info` reply.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct DeviceInfo {
    #[serde(rename = "deviceid")]
    pub id: Option<String>,
    pub ssid: Option<String>,
    #[serde(rename = "otaUnlock")]
    pub ota_enabled: Option<bool>,
    #[serde(rename = "fwVersion")]
    pub firmware_version: Option<String>,
    pub bssid: Option<String>,
    #[serde(rename = "signalStrength")]
    pub rssi: Option<i64>,
    #[serde(rename = "sledOnline")]
    pub status_led: Option<String>,
    #[serde(flatten)]
    pub relay: SwitchState,
    #[serde(flatten)]
    pub dimmer: LanDimmer,
    #[serde(flatten)]
    pub outlets: Outlets,
}

impl DeviceInfo {
    pub fn from_value(value: &Value) -> Result<Self> {
        let normalized = schema::validate(value, LAN_TABLES)?;
        Ok(serde_json::from_value(normalized)?)
    }

    pub fn is_switch(&self) -> bool {
        self.relay.switch.is_some()
    }

    pub fn is_switches(&self) -> bool {
        !self.outlets.switches.is_empty()
    }

    pub fn is_light(&self) -> bool {
        self.dimmer.brightness.is_some()
    }

    pub fn to_states(&self) -> States {
        let mut states = States::new();
        states
            .device(Parameter::StatusLed, self.status_led.as_deref())
            .device(Parameter::FirmwareVersion, self.firmware_version.as_deref())
            .device(Parameter::Ssid, self.ssid.as_deref())
            .device(Parameter::Bssid, self.bssid.as_deref())
            .device(Parameter::Rssi, self.rssi);
        project_relays(&self.relay, &self.outlets, &mut states);
        self.dimmer.project(&mut states);
        states
    }
}

/// Synthesized after a successful LAN write; devices do not echo their state.
#[derive(Debug, Clone, PartialEq)]
pub struct StateWritten {
    pub id: String,
    pub ip_address: String,
    pub port: u16,
    /// The `data` object that was written
    pub params: Value,
}

impl StateWritten {
    pub fn to_states(&self) -> Result<States> {
        Ok(DeviceEventData::from_value(&self.params)?.to_states())
    }
}

/// Body of a `/zeroconf/*` request. `data` is either a JSON object or base64 ciphertext.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LanRequest {
    pub sequence: String,
    pub deviceid: String,
    #[serde(rename = "selfApikey")]
    pub self_apikey: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub encrypt: Option<bool>,
    pub data: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub iv: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn info_of_multi_channel_device() {
        let info = DeviceInfo::from_value(&json!({
            "deviceid": "1000abcdef",
            "ssid": "home",
            "otaUnlock": false,
            "fwVersion": "3.6.0",
            "bssid": "aa:bb:cc:dd:ee:ff",
            "signalStrength": -61,
            "switches": [{"switch": "on", "outlet": 0}, {"switch": "off", "outlet": 1}],
            "configure": [{"startup": "stay", "outlet": 0}],
            "pulses": [{"pulse": "off", "switch": "off", "width": 500, "outlet": 0}],
        }))
        .unwrap();
        assert!(info.is_switches());
        assert!(!info.is_switch());
        assert!(!info.is_light());
        let states = info.to_states();
        assert_eq!(states.device_value(Parameter::Rssi), Some(&json!(-61)));
        assert_eq!(states.device_value(Parameter::Bssid), Some(&json!("aa:bb:cc:dd:ee:ff")));
        assert_eq!(states.channel_value(Parameter::Switch, "switch_1"), Some(&json!("off")));
    }

    #[test]
    fn event_data_dimmer() {
        let data = DeviceEventData::from_value(&json!({
            "switch": "on",
            "brightness": "35",
            "brightmin": 5,
            "subDevId": "abc",
        }))
        .unwrap();
        assert_eq!(data.sub_device_id.as_deref(), Some("abc"));
        let states = data.to_states();
        assert_eq!(states.channel_value(Parameter::Switch, "switch"), Some(&json!("on")));
        assert_eq!(states.channel_value(Parameter::Brightness2, "light"), Some(&json!(35)));
        assert!(DeviceEventData::from_value(&json!({"brightness": 101})).is_err());
    }

    #[test]
    fn event_data_tolerates_null_outlets() {
        let data = DeviceEventData::from_value(&json!({
            "switches": null,
            "configure": [{"startup": "on"}],
            "pulses": [{"pulse": null, "outlet": 0}],
            "fwVersion": "3.5.0",
        }))
        .unwrap();
        let states = data.to_states();
        assert_eq!(states.device_value(Parameter::FirmwareVersion), Some(&json!("3.5.0")));
        assert!(states.channel.is_empty());
    }

    #[test]
    fn written_outlet_projects_into_its_group() {
        let written = StateWritten {
            id: "1000abcdef".into(),
            ip_address: "192.168.1.20".into(),
            port: 8081,
            params: json!({"switches": [{"switch": "on", "outlet": 2}]}),
        };
        let states = written.to_states().unwrap();
        assert_eq!(states.channel_value(Parameter::Switch, "switch_2"), Some(&json!("on")));
        assert!(states.device.is_empty());
    }

    #[test]
    fn plain_request_body() {
        let body = LanRequest {
            sequence: "1".into(),
            deviceid: "1000abcdef".into(),
            self_apikey: LAN_SELF_API_KEY,
            encrypt: None,
            data: json!({"switch": "on"}),
            iv: None,
        };
        assert_eq!(
            serde_json::to_value(&body).unwrap(),
            json!({"sequence": "1", "deviceid": "1000abcdef", "selfApikey": "123", "data": {"switch": "on"}})
        );
    }
}
