//! Catalog of device status schemas keyed by UIID.
//! Each model validates a raw `params` object and projects it into [`States`].

pub mod appliance;
pub mod common;
pub mod light;
pub mod schema;
pub mod sensor;
pub mod states;
pub mod switch;

use crate::error::Result;
use log::debug;
use schema::FieldSpec;
use serde::de::DeserializeOwned;
use serde_json::Value;

pub use appliance::{Diffuser, Fan, Humidifier, RfBridge, Thermostat};
pub use light::{
    CctLight, ColorSceneLight, Dimmer, DualWhiteLight, LedStrip, MusicLedStrip, RangeDimmer,
    RgbLight, WhiteSceneLight,
};
pub use sensor::{AirMonitor, ClimateSensor, DoorSensor, PanelSensor};
pub use states::{StateEntry, States};
pub use switch::{MultiSwitch, PowerMeter, SingleSwitch};

/// A device model status schema.
pub trait UiidModel: DeserializeOwned {
    /// Constraint tables checked, in order, before deserialization.
    const FIELDS: &'static [&'static [FieldSpec]];

    fn to_states(&self) -> States;

    fn from_params(params: &Value) -> Result<Self> {
        let normalized = schema::validate(params, Self::FIELDS)?;
        Ok(serde_json::from_value(normalized)?)
    }
}

macro_rules! uiid_catalog {
    ($($variant:ident($model:ty) = $($uiid:literal)|+;)*) => {
        /// Parsed status payload, one variant per device model.
        #[derive(Debug, Clone, PartialEq)]
        pub enum UiidParams {
            $($variant($model),)*
        }

        /// Every UIID with a catalog entry.
        pub const KNOWN_UIIDS: &[u32] = &[$($($uiid,)+)*];

        impl UiidParams {
            /// Parses `params` with the model registered for `uiid`.
            ///
            /// Returns `Ok(None)` for a UIID without a catalog entry: the device
            /// exists but its state cannot be interpreted.
            pub fn parse(uiid: u32, params: &Value) -> Result<Option<Self>> {
                match uiid {
                    $($($uiid)|+ => <$model>::from_params(params).map(|m| Some(UiidParams::$variant(m))),)*
                    _ => {
                        debug!("No status schema for UIID {}", uiid);
                        Ok(None)
                    }
                }
            }

            pub fn to_states(&self) -> States {
                match self {
                    $(UiidParams::$variant(m) => m.to_states(),)*
                }
            }
        }
    };
}

uiid_catalog! {
    Switch(SingleSwitch) = 1 | 6 | 14 | 24 | 27;
    Switches(MultiSwitch) = 2 | 3 | 4 | 7 | 8 | 9 | 29 | 30 | 31 | 34 | 77 | 78 | 81 | 82 | 83 | 84 | 107;
    PowerMeter(PowerMeter) = 5 | 32;
    Thermostat(Thermostat) = 15;
    DualWhiteLight(DualWhiteLight) = 16;
    Fan(Fan) = 17;
    AirMonitor(AirMonitor) = 18;
    Humidifier(Humidifier) = 19;
    RgbLight(RgbLight) = 22;
    Diffuser(Diffuser) = 25;
    RfBridge(RfBridge) = 28;
    LedStrip(LedStrip) = 33;
    Dimmer(Dimmer) = 36;
    RangeDimmer(RangeDimmer) = 44;
    CctLight(CctLight) = 52 | 57;
    MusicLedStrip(MusicLedStrip) = 59;
    DoorSensor(DoorSensor) = 102;
    WhiteSceneLight(WhiteSceneLight) = 103;
    ColorSceneLight(ColorSceneLight) = 104;
    PanelSensor(PanelSensor) = 195;
    ClimateSensor(ClimateSensor) = 1770 | 1771;
}

pub fn is_known(uiid: u32) -> bool {
    KNOWN_UIIDS.contains(&uiid)
}

/// Parses and projects in one step. `Ok(None)` for an unknown UIID.
pub fn project(uiid: u32, params: &Value) -> Result<Option<States>> {
    Ok(UiidParams::parse(uiid, params)?.map(|p| p.to_states()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn dispatch_by_uiid() {
        let parsed = UiidParams::parse(7, &json!({"switches": []})).unwrap();
        assert!(matches!(parsed, Some(UiidParams::Switches(_))));
        let parsed = UiidParams::parse(57, &json!({"state": "on"})).unwrap();
        assert!(matches!(parsed, Some(UiidParams::CctLight(_))));
    }

    #[test]
    fn unknown_uiid_is_none() {
        assert!(UiidParams::parse(9999, &json!({"switch": "on"})).unwrap().is_none());
        assert!(!is_known(9999));
        assert!(is_known(1771));
    }

    #[test]
    fn known_uiids_are_unique() {
        let mut seen = std::collections::HashSet::new();
        assert!(KNOWN_UIIDS.iter().all(|u| seen.insert(*u)));
        assert_eq!(KNOWN_UIIDS.len(), 44);
    }
}
