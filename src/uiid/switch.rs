//! Relay devices: single channel, multi-gang and power metering switches.

use super::UiidModel;
use super::common::{
    DEVICE_HEALTH_FIELDS, DeviceHealth, OUTLETS_FIELDS, Outlets, SWITCH_FIELDS, SwitchState,
};
use super::schema::FieldSpec;
use super::states::States;
use crate::types::{Parameter, ParameterGroup};
use serde::Deserialize;

/// Single relay (BASIC, RF, MINI and similar).
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct SingleSwitch {
    #[serde(flatten)]
    pub health: DeviceHealth,
    #[serde(flatten)]
    pub relay: SwitchState,
}

impl UiidModel for SingleSwitch {
    const FIELDS: &'static [&'static [FieldSpec]] = &[DEVICE_HEALTH_FIELDS, SWITCH_FIELDS];

    fn to_states(&self) -> States {
        let mut states = States::new();
        self.health.project(&mut states);
        self.relay.project(&mut states, ParameterGroup::Switch);
        states
    }
}

/// Multi-gang relay addressed per outlet (DUAL, 4CH, T1/T2/T3 wall switches, iFan).
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct MultiSwitch {
    #[serde(flatten)]
    pub health: DeviceHealth,
    #[serde(flatten)]
    pub outlets: Outlets,
}

impl UiidModel for MultiSwitch {
    const FIELDS: &'static [&'static [FieldSpec]] = &[DEVICE_HEALTH_FIELDS, OUTLETS_FIELDS];

    fn to_states(&self) -> States {
        let mut states = States::new();
        self.health.project(&mut states);
        self.outlets.project(&mut states);
        states
    }
}

const POWER_FIELDS: &[FieldSpec] = &[
    FieldSpec::float("power"),
    FieldSpec::float("voltage"),
    FieldSpec::float("current"),
    FieldSpec::one_of("oneKwh", &["start", "stop", "get"]),
    FieldSpec::any_text("startTime"),
    FieldSpec::any_text("endTime"),
    FieldSpec::float("oneKwhData"),
];

/// Relay with power metering (POW, POWR2).
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct PowerMeter {
    #[serde(flatten)]
    pub health: DeviceHealth,
    #[serde(flatten)]
    pub relay: SwitchState,
    pub power: Option<f64>,
    pub voltage: Option<f64>,
    pub current: Option<f64>,
    #[serde(rename = "oneKwh")]
    pub consumption: Option<String>,
    #[serde(rename = "startTime")]
    pub start_time: Option<String>,
    #[serde(rename = "endTime")]
    pub end_time: Option<String>,
    #[serde(rename = "oneKwhData")]
    pub consumption_data: Option<f64>,
}

impl UiidModel for PowerMeter {
    const FIELDS: &'static [&'static [FieldSpec]] =
        &[DEVICE_HEALTH_FIELDS, SWITCH_FIELDS, POWER_FIELDS];

    fn to_states(&self) -> States {
        let mut states = States::new();
        self.health.project(&mut states);
        self.relay.project(&mut states, ParameterGroup::Switch);
        let group = ParameterGroup::Switch;
        states
            .in_group(group, Parameter::Power, self.power)
            .in_group(group, Parameter::Voltage, self.voltage)
            .in_group(group, Parameter::Current, self.current)
            .in_group(group, Parameter::Consumption, self.consumption.as_deref())
            .in_group(group, Parameter::StartTime, self.start_time.as_deref())
            .in_group(group, Parameter::EndTime, self.end_time.as_deref())
            .in_group(group, Parameter::ConsumptionData, self.consumption_data);
        states
    }
}
