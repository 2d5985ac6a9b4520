//! Climate appliances, fans, diffusers and the RF bridge.

use super::UiidModel;
use super::common::{DEVICE_HEALTH_FIELDS, DeviceHealth, SWITCH_FIELDS, SwitchState};
use super::schema::{FieldSpec, ON_OFF};
use super::states::States;
use crate::types::{Parameter, ParameterGroup};
use serde::Deserialize;

const THERMOSTAT_FIELDS: &[FieldSpec] = &[
    FieldSpec::one_of("mainSwitch", ON_OFF),
    FieldSpec::one_of("deviceType", &["normal", "temperature", "humidity"]),
    FieldSpec::one_of("sensorType", &["DHT11", "DS18B20", "AM2301", "MS01", "errorType"]),
    FieldSpec::float("currentHumidity"),
    FieldSpec::float("currentTemperature"),
];

/// Relay with an attached temperature/humidity probe (TH10/TH16).
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct Thermostat {
    #[serde(flatten)]
    pub health: DeviceHealth,
    #[serde(flatten)]
    pub relay: SwitchState,
    #[serde(rename = "mainSwitch")]
    pub main_switch: Option<String>,
    #[serde(rename = "deviceType")]
    pub device_type: Option<String>,
    #[serde(rename = "sensorType")]
    pub sensor_type: Option<String>,
    #[serde(rename = "currentHumidity")]
    pub current_humidity: Option<f64>,
    #[serde(rename = "currentTemperature")]
    pub current_temperature: Option<f64>,
}

impl UiidModel for Thermostat {
    const FIELDS: &'static [&'static [FieldSpec]] =
        &[DEVICE_HEALTH_FIELDS, SWITCH_FIELDS, THERMOSTAT_FIELDS];

    fn to_states(&self) -> States {
        let mut states = States::new();
        self.health.project(&mut states);
        self.relay.project(&mut states, ParameterGroup::Switch);
        let group = ParameterGroup::Thermostat;
        states
            .in_group(group, Parameter::MainSwitch, self.main_switch.as_deref())
            .in_group(group, Parameter::DeviceType, self.device_type.as_deref())
            .in_group(group, Parameter::SensorType, self.sensor_type.as_deref())
            .in_group(group, Parameter::CurrentHumidity, self.current_humidity)
            .in_group(group, Parameter::CurrentTemperature, self.current_temperature);
        states
    }
}

const FAN_FIELDS: &[FieldSpec] = &[
    FieldSpec::one_of("fan", ON_OFF),
    FieldSpec::one_of("speed", &["slow", "moderate", "fast"]),
    FieldSpec::one_of("mode", &["normal", "natural", "sleep"]),
    FieldSpec::one_of("shake", ON_OFF),
];

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct Fan {
    #[serde(flatten)]
    pub health: DeviceHealth,
    pub fan: Option<String>,
    pub speed: Option<String>,
    pub mode: Option<String>,
    pub shake: Option<String>,
}

impl UiidModel for Fan {
    const FIELDS: &'static [&'static [FieldSpec]] = &[DEVICE_HEALTH_FIELDS, FAN_FIELDS];

    fn to_states(&self) -> States {
        let mut states = States::new();
        self.health.project(&mut states);
        let group = ParameterGroup::Fan;
        states
            .in_group(group, Parameter::Fan, self.fan.as_deref())
            .in_group(group, Parameter::Speed, self.speed.as_deref())
            .in_group(group, Parameter::Mode, self.mode.as_deref())
            .in_group(group, Parameter::Shake, self.shake.as_deref());
        states
    }
}

const HUMIDIFIER_FIELDS: &[FieldSpec] = &[
    FieldSpec::one_of("switch", ON_OFF),
    FieldSpec::one_of("mode", &["normal"]),
    FieldSpec::int("state", 1, 3),
    FieldSpec::boolean("water"),
    FieldSpec::int("temperature", 0, 50),
    FieldSpec::int("humidity", 20, 90),
];

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct Humidifier {
    #[serde(flatten)]
    pub health: DeviceHealth,
    pub switch: Option<String>,
    pub mode: Option<String>,
    /// Mist level
    pub state: Option<i64>,
    /// Water tank empty
    pub water: Option<bool>,
    pub temperature: Option<i64>,
    pub humidity: Option<i64>,
}

impl UiidModel for Humidifier {
    const FIELDS: &'static [&'static [FieldSpec]] = &[DEVICE_HEALTH_FIELDS, HUMIDIFIER_FIELDS];

    fn to_states(&self) -> States {
        let mut states = States::new();
        self.health.project(&mut states);
        let group = ParameterGroup::Humidifier;
        states
            .in_group(group, Parameter::Switch, self.switch.as_deref())
            .in_group(group, Parameter::Mode, self.mode.as_deref())
            .in_group(group, Parameter::State, self.state)
            .in_group(group, Parameter::Water, self.water)
            .in_group(group, Parameter::Temperature, self.temperature)
            .in_group(group, Parameter::Humidity, self.humidity);
        states
    }
}

const DIFFUSER_FIELDS: &[FieldSpec] = &[
    FieldSpec::one_of("switch", ON_OFF),
    FieldSpec::int("state", 1, 2),
    FieldSpec::boolean("water"),
    FieldSpec::boolean("lightswitch"),
    FieldSpec::int("lightmode", 1, 3),
    FieldSpec::int("lightRcolor", 0, 255),
    FieldSpec::int("lightGcolor", 0, 255),
    FieldSpec::int("lightBcolor", 0, 255),
    FieldSpec::int("lightbright", 0, 100),
];

/// Aroma diffuser with a mood light.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct Diffuser {
    #[serde(flatten)]
    pub health: DeviceHealth,
    pub switch: Option<String>,
    pub state: Option<i64>,
    pub water: Option<bool>,
    #[serde(rename = "lightswitch")]
    pub light_switch: Option<bool>,
    #[serde(rename = "lightmode")]
    pub light_mode: Option<i64>,
    #[serde(rename = "lightRcolor")]
    pub light_red: Option<i64>,
    #[serde(rename = "lightGcolor")]
    pub light_green: Option<i64>,
    #[serde(rename = "lightBcolor")]
    pub light_blue: Option<i64>,
    #[serde(rename = "lightbright")]
    pub light_brightness: Option<i64>,
}

impl UiidModel for Diffuser {
    const FIELDS: &'static [&'static [FieldSpec]] = &[DEVICE_HEALTH_FIELDS, DIFFUSER_FIELDS];

    fn to_states(&self) -> States {
        let mut states = States::new();
        self.health.project(&mut states);
        let other = ParameterGroup::Other;
        let light = ParameterGroup::Light;
        states
            .in_group(other, Parameter::Switch, self.switch.as_deref())
            .in_group(other, Parameter::State, self.state)
            .in_group(other, Parameter::Water, self.water)
            .in_group(light, Parameter::LightSwitch, self.light_switch)
            .in_group(light, Parameter::LightMode, self.light_mode)
            .in_group(light, Parameter::LightRedColor, self.light_red)
            .in_group(light, Parameter::LightGreenColor, self.light_green)
            .in_group(light, Parameter::LightBlueColor, self.light_blue)
            .in_group(light, Parameter::LightBrightness, self.light_brightness);
        states
    }
}

const RF_BRIDGE_FIELDS: &[FieldSpec] = &[
    FieldSpec::int("remote_type", 1, 6),
    FieldSpec::one_of(
        "cmd",
        &["capture", "captureCancel", "edit", "transmit", "trigger"],
    ),
    FieldSpec::any_int("rfChl"),
];

/// 433 MHz RF bridge.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct RfBridge {
    #[serde(flatten)]
    pub health: DeviceHealth,
    pub remote_type: Option<i64>,
    #[serde(rename = "cmd")]
    pub command: Option<String>,
    #[serde(rename = "rfChl")]
    pub rf_channel: Option<i64>,
}

impl UiidModel for RfBridge {
    const FIELDS: &'static [&'static [FieldSpec]] = &[DEVICE_HEALTH_FIELDS, RF_BRIDGE_FIELDS];

    fn to_states(&self) -> States {
        let mut states = States::new();
        self.health.project(&mut states);
        let group = ParameterGroup::Bridge;
        states
            .in_group(group, Parameter::RemoteType, self.remote_type)
            .in_group(group, Parameter::Command, self.command.as_deref())
            .in_group(group, Parameter::RfChannel, self.rf_channel);
        states
    }
}
