//! Standalone sensors: air monitor, door contact, thermostat panel and Zigbee climate sensors.

use super::UiidModel;
use super::common::{DEVICE_HEALTH_FIELDS, DeviceHealth};
use super::schema::{FieldSpec, ON_OFF};
use super::states::States;
use crate::types::{Parameter, ParameterGroup};
use serde::Deserialize;

const SENSOR: ParameterGroup = ParameterGroup::Sensor;

const AIR_MONITOR_FIELDS: &[FieldSpec] = &[
    FieldSpec::int("dusty", 1, 10),
    FieldSpec::int("noise", 1, 10),
    FieldSpec::int("light", 1, 10),
    FieldSpec::float("temperature"),
    FieldSpec::int("humidity", 1, 100),
];

/// Indoor air quality monitor (SC).
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct AirMonitor {
    #[serde(flatten)]
    pub health: DeviceHealth,
    pub dusty: Option<i64>,
    pub noise: Option<i64>,
    pub light: Option<i64>,
    pub temperature: Option<f64>,
    pub humidity: Option<i64>,
}

impl UiidModel for AirMonitor {
    const FIELDS: &'static [&'static [FieldSpec]] = &[DEVICE_HEALTH_FIELDS, AIR_MONITOR_FIELDS];

    fn to_states(&self) -> States {
        let mut states = States::new();
        self.health.project(&mut states);
        states
            .in_group(SENSOR, Parameter::Dusty, self.dusty)
            .in_group(SENSOR, Parameter::Noise, self.noise)
            .in_group(SENSOR, Parameter::Light, self.light)
            .in_group(SENSOR, Parameter::Temperature, self.temperature)
            .in_group(SENSOR, Parameter::Humidity, self.humidity);
        states
    }
}

const DOOR_SENSOR_FIELDS: &[FieldSpec] = &[
    FieldSpec::one_of("switch", ON_OFF),
    FieldSpec::int("battery", 0, 100),
    FieldSpec::int("type", 1, 5),
    FieldSpec::text("lastUpdateTime"),
    FieldSpec::text("actionTime"),
];

/// Wi-Fi door/window contact (DW2).
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct DoorSensor {
    #[serde(flatten)]
    pub health: DeviceHealth,
    /// `on` when open
    pub switch: Option<String>,
    pub battery: Option<i64>,
    #[serde(rename = "type")]
    pub kind: Option<i64>,
    #[serde(rename = "lastUpdateTime")]
    pub last_update_time: Option<String>,
    #[serde(rename = "actionTime")]
    pub action_time: Option<String>,
}

impl UiidModel for DoorSensor {
    const FIELDS: &'static [&'static [FieldSpec]] = &[DEVICE_HEALTH_FIELDS, DOOR_SENSOR_FIELDS];

    fn to_states(&self) -> States {
        let mut states = States::new();
        self.health.project(&mut states);
        states.device(Parameter::Battery, self.battery);
        states
            .in_group(SENSOR, Parameter::Switch, self.switch.as_deref())
            .in_group(SENSOR, Parameter::Type, self.kind)
            .in_group(SENSOR, Parameter::LastUpdateTime, self.last_update_time.as_deref())
            .in_group(SENSOR, Parameter::ActionTime, self.action_time.as_deref());
        states
    }
}

const PANEL_FIELDS: &[FieldSpec] = &[FieldSpec::text("fwVersion"), FieldSpec::float("temperature")];

/// Wall panel reporting ambient temperature (NSPanel).
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct PanelSensor {
    #[serde(rename = "fwVersion")]
    pub firmware_version: Option<String>,
    pub temperature: Option<f64>,
}

impl UiidModel for PanelSensor {
    const FIELDS: &'static [&'static [FieldSpec]] = &[PANEL_FIELDS];

    fn to_states(&self) -> States {
        let mut states = States::new();
        states.device(Parameter::FirmwareVersion, self.firmware_version.as_deref());
        states.in_group(SENSOR, Parameter::Temperature, self.temperature);
        states
    }
}

const CLIMATE_FIELDS: &[FieldSpec] = &[
    FieldSpec::any_int("temperature"),
    FieldSpec::int("humidity", 0, 10_000),
    FieldSpec::int("battery", 0, 100),
];

/// Zigbee temperature/humidity sensor; readings are hundredths of a unit.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct ClimateSensor {
    pub temperature: Option<i64>,
    pub humidity: Option<i64>,
    pub battery: Option<i64>,
}

impl UiidModel for ClimateSensor {
    const FIELDS: &'static [&'static [FieldSpec]] = &[CLIMATE_FIELDS];

    fn to_states(&self) -> States {
        let mut states = States::new();
        states
            .in_group(SENSOR, Parameter::Temperature, self.temperature)
            .in_group(SENSOR, Parameter::Humidity, self.humidity)
            .in_group(SENSOR, Parameter::Battery, self.battery);
        states
    }
}
