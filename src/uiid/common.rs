//! Field groups shared by several device models and their state projections.

use super::schema::{FieldSpec, ON_OFF, ON_OFF_STAY};
use super::states::States;
use crate::types::{Parameter, ParameterGroup};
use serde::{Deserialize, Deserializer};

// ----------------------------------------------------------------------------
// Device health
// ----------------------------------------------------------------------------

pub const DEVICE_HEALTH_FIELDS: &[FieldSpec] = &[
    FieldSpec::one_of("sledOnline", ON_OFF),
    FieldSpec::text("fwVersion"),
    FieldSpec::text("chipid"),
    FieldSpec::text("ssid"),
    FieldSpec::any_int("rssi"),
];

/// Connectivity and firmware fields reported by Wi-Fi devices.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct DeviceHealth {
    #[serde(rename = "sledOnline")]
    pub status_led: Option<String>,
    #[serde(rename = "fwVersion")]
    pub firmware_version: Option<String>,
    #[serde(rename = "chipid")]
    pub chip_id: Option<String>,
    pub ssid: Option<String>,
    pub rssi: Option<i64>,
}

impl DeviceHealth {
    pub fn project(&self, states: &mut States) {
        states
            .device(Parameter::StatusLed, self.status_led.as_deref())
            .device(Parameter::FirmwareVersion, self.firmware_version.as_deref())
            .device(Parameter::Ssid, self.ssid.as_deref())
            .device(Parameter::Rssi, self.rssi);
    }
}

// ----------------------------------------------------------------------------
// Single relay
// ----------------------------------------------------------------------------

pub const SWITCH_FIELDS: &[FieldSpec] = &[
    FieldSpec::one_of("switch", ON_OFF),
    FieldSpec::one_of("startup", ON_OFF_STAY),
    FieldSpec::one_of("pulse", ON_OFF),
    FieldSpec::int("pulseWidth", 500, 3_600_000),
];

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct SwitchState {
    pub switch: Option<String>,
    pub startup: Option<String>,
    pub pulse: Option<String>,
    #[serde(rename = "pulseWidth")]
    pub pulse_width: Option<i64>,
}

impl SwitchState {
    pub fn project(&self, states: &mut States, group: ParameterGroup) {
        states
            .in_group(group, Parameter::Switch, self.switch.as_deref())
            .in_group(group, Parameter::Startup, self.startup.as_deref())
            .in_group(group, Parameter::Pulse, self.pulse.as_deref())
            .in_group(group, Parameter::PulseWidth, self.pulse_width);
    }
}

// ----------------------------------------------------------------------------
// Multi-outlet relays
// ----------------------------------------------------------------------------

const OUTLET_SWITCH_FIELDS: &[FieldSpec] = &[
    FieldSpec::one_of("switch", ON_OFF),
    FieldSpec::int("outlet", 0, 10),
];

const OUTLET_STARTUP_FIELDS: &[FieldSpec] = &[
    FieldSpec::one_of("startup", ON_OFF_STAY),
    FieldSpec::int("outlet", 0, 10),
];

const OUTLET_PULSE_FIELDS: &[FieldSpec] = &[
    FieldSpec::one_of("pulse", ON_OFF),
    FieldSpec::int("width", 500, 3_600_000),
    FieldSpec::int("outlet", 0, 10),
];

pub const OUTLETS_FIELDS: &[FieldSpec] = &[
    FieldSpec::list("switches", OUTLET_SWITCH_FIELDS),
    FieldSpec::list("configure", OUTLET_STARTUP_FIELDS),
    FieldSpec::list("pulses", OUTLET_PULSE_FIELDS),
];

/// One entry of `switches`. Items without an `outlet` address no channel and are skipped.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct OutletSwitch {
    pub switch: Option<String>,
    pub outlet: Option<u32>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct OutletStartup {
    pub startup: Option<String>,
    pub outlet: Option<u32>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct OutletPulse {
    pub pulse: Option<String>,
    pub width: Option<i64>,
    pub outlet: Option<u32>,
}

/// Per-outlet arrays of a multi-gang relay. `null` arrays read as empty.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct Outlets {
    #[serde(default, deserialize_with = "null_as_empty")]
    pub switches: Vec<OutletSwitch>,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub configure: Vec<OutletStartup>,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub pulses: Vec<OutletPulse>,
}

fn null_as_empty<'de, D, T>(deserializer: D) -> std::result::Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Ok(Option::<Vec<T>>::deserialize(deserializer)?.unwrap_or_default())
}

impl Outlets {
    pub fn project(&self, states: &mut States) {
        let group = |outlet: u32| ParameterGroup::Switch.outlet(outlet);
        for s in &self.switches {
            if let Some(outlet) = s.outlet {
                states.channel(Parameter::Switch, s.switch.as_deref(), group(outlet));
            }
        }
        for c in &self.configure {
            if let Some(outlet) = c.outlet {
                states.channel(Parameter::Startup, c.startup.as_deref(), group(outlet));
            }
        }
        for p in &self.pulses {
            if let Some(outlet) = p.outlet {
                states
                    .channel(Parameter::Pulse, p.pulse.as_deref(), group(outlet))
                    .channel(Parameter::PulseWidth, p.width, group(outlet));
            }
        }
    }
}

// ----------------------------------------------------------------------------
// Scene light presets
// ----------------------------------------------------------------------------

pub const WHITE_SCENE_FIELDS: &[FieldSpec] =
    &[FieldSpec::int("br", 1, 100), FieldSpec::int("ct", 0, 255)];

pub const COLOR_SCENE_FIELDS: &[FieldSpec] = &[
    FieldSpec::int("br", 1, 100),
    FieldSpec::int("r", 0, 255),
    FieldSpec::int("g", 0, 255),
    FieldSpec::int("b", 0, 255),
];

pub const MODE_SCENE_FIELDS: &[FieldSpec] = &[
    FieldSpec::int("br", 1, 100),
    FieldSpec::int("ct", 0, 255),
    FieldSpec::int("r", 0, 255),
    FieldSpec::int("g", 0, 255),
    FieldSpec::int("b", 0, 255),
    FieldSpec::text("name"),
    FieldSpec::int("tf", 1, 4),
    FieldSpec::int("sp", 1, 100),
];

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct WhiteScene {
    pub br: Option<i64>,
    pub ct: Option<i64>,
}

impl WhiteScene {
    pub fn project(&self, states: &mut States, group: ParameterGroup) {
        states
            .in_group(group, Parameter::SceneBrightness, self.br)
            .in_group(group, Parameter::SceneColorTemperature, self.ct);
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct ColorScene {
    pub br: Option<i64>,
    pub r: Option<i64>,
    pub g: Option<i64>,
    pub b: Option<i64>,
}

impl ColorScene {
    pub fn project(&self, states: &mut States, group: ParameterGroup) {
        states
            .in_group(group, Parameter::SceneBrightness, self.br)
            .in_group(group, Parameter::SceneColorRed, self.r)
            .in_group(group, Parameter::SceneColorGreen, self.g)
            .in_group(group, Parameter::SceneColorBlue, self.b);
    }
}

/// Animated preset: color or white plus transition settings.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct ModeScene {
    pub br: Option<i64>,
    pub ct: Option<i64>,
    pub r: Option<i64>,
    pub g: Option<i64>,
    pub b: Option<i64>,
    pub name: Option<String>,
    /// Color transition mode
    pub tf: Option<i64>,
    /// Transition speed
    pub sp: Option<i64>,
}

impl ModeScene {
    pub fn project(&self, states: &mut States, group: ParameterGroup) {
        states
            .in_group(group, Parameter::SceneBrightness, self.br)
            .in_group(group, Parameter::SceneColorTemperature, self.ct)
            .in_group(group, Parameter::SceneColorRed, self.r)
            .in_group(group, Parameter::SceneColorGreen, self.g)
            .in_group(group, Parameter::SceneColorBlue, self.b)
            .in_group(group, Parameter::SceneName, self.name.as_deref())
            .in_group(group, Parameter::SceneColorMode, self.tf)
            .in_group(group, Parameter::SceneSpeedChange, self.sp);
    }
}
