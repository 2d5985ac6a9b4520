//! Lights, dimmers and LED strips.

use super::UiidModel;
use super::common::{
    COLOR_SCENE_FIELDS, ColorScene, DEVICE_HEALTH_FIELDS, DeviceHealth, MODE_SCENE_FIELDS,
    ModeScene, WHITE_SCENE_FIELDS, WhiteScene,
};
use super::schema::{FieldSpec, ON_OFF};
use super::states::States;
use crate::types::{Parameter, ParameterGroup};
use serde::Deserialize;

const LIGHT: ParameterGroup = ParameterGroup::Light;
const WHITE_TONES: &[&str] = &["middle", "warm", "cold"];

// ----------------------------------------------------------------------------
// Channel driven lights
// ----------------------------------------------------------------------------

const DUAL_WHITE_FIELDS: &[FieldSpec] = &[
    FieldSpec::one_of("state", ON_OFF),
    FieldSpec::int("channel0", 25, 255),
    FieldSpec::int("channel1", 25, 255),
    FieldSpec::one_of("type", WHITE_TONES),
];

/// Two channel white light.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct DualWhiteLight {
    #[serde(flatten)]
    pub health: DeviceHealth,
    pub state: Option<String>,
    pub channel0: Option<i64>,
    pub channel1: Option<i64>,
    #[serde(rename = "type")]
    pub tone: Option<String>,
}

impl UiidModel for DualWhiteLight {
    const FIELDS: &'static [&'static [FieldSpec]] = &[DEVICE_HEALTH_FIELDS, DUAL_WHITE_FIELDS];

    fn to_states(&self) -> States {
        let mut states = States::new();
        self.health.project(&mut states);
        states
            .in_group(LIGHT, Parameter::State, self.state.as_deref())
            .in_group(LIGHT, Parameter::Channel0, self.channel0)
            .in_group(LIGHT, Parameter::Channel1, self.channel1)
            .in_group(LIGHT, Parameter::Type, self.tone.as_deref());
        states
    }
}

const RGB_FIELDS: &[FieldSpec] = &[
    FieldSpec::one_of("state", ON_OFF),
    FieldSpec::int("channel0", 0, 255),
    FieldSpec::int("channel1", 0, 255),
    FieldSpec::int("channel2", 0, 255),
    FieldSpec::int("channel3", 0, 255),
    FieldSpec::int("channel4", 0, 255),
    FieldSpec::one_of("type", WHITE_TONES),
];

/// Five channel RGB + white bulb (B1).
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct RgbLight {
    #[serde(flatten)]
    pub health: DeviceHealth,
    pub state: Option<String>,
    pub channel0: Option<i64>,
    pub channel1: Option<i64>,
    pub channel2: Option<i64>,
    pub channel3: Option<i64>,
    pub channel4: Option<i64>,
    #[serde(rename = "type")]
    pub tone: Option<String>,
}

impl UiidModel for RgbLight {
    const FIELDS: &'static [&'static [FieldSpec]] = &[DEVICE_HEALTH_FIELDS, RGB_FIELDS];

    fn to_states(&self) -> States {
        let mut states = States::new();
        self.health.project(&mut states);
        states
            .in_group(LIGHT, Parameter::State, self.state.as_deref())
            .in_group(LIGHT, Parameter::Channel0, self.channel0)
            .in_group(LIGHT, Parameter::Channel1, self.channel1)
            .in_group(LIGHT, Parameter::Channel2, self.channel2)
            .in_group(LIGHT, Parameter::Channel3, self.channel3)
            .in_group(LIGHT, Parameter::Channel4, self.channel4)
            .in_group(LIGHT, Parameter::Type, self.tone.as_deref());
        states
    }
}

const CCT_FIELDS: &[FieldSpec] = &[
    FieldSpec::one_of("state", ON_OFF),
    FieldSpec::int("channel0", 10, 255),
    FieldSpec::int("channel1", 0, 255),
];

/// Tunable white light; `channel0` is brightness and `channel1` color temperature.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct CctLight {
    #[serde(flatten)]
    pub health: DeviceHealth,
    pub state: Option<String>,
    pub channel0: Option<i64>,
    pub channel1: Option<i64>,
}

impl UiidModel for CctLight {
    const FIELDS: &'static [&'static [FieldSpec]] = &[DEVICE_HEALTH_FIELDS, CCT_FIELDS];

    fn to_states(&self) -> States {
        let mut states = States::new();
        self.health.project(&mut states);
        states
            .in_group(LIGHT, Parameter::State, self.state.as_deref())
            .in_group(LIGHT, Parameter::Channel0, self.channel0)
            .in_group(LIGHT, Parameter::Channel1, self.channel1);
        states
    }
}

// ----------------------------------------------------------------------------
// Strips
// ----------------------------------------------------------------------------

const LED_STRIP_FIELDS: &[FieldSpec] = &[
    FieldSpec::one_of("switch", ON_OFF),
    FieldSpec::int("light_type", 1, 2),
    FieldSpec::int("bright", 10, 100),
    FieldSpec::int("colorR", 0, 255),
    FieldSpec::int("colorG", 0, 255),
    FieldSpec::int("colorB", 0, 255),
    FieldSpec::int("mode", 1, 3),
    FieldSpec::int("speed", 0, 100),
];

const MUSIC_STRIP_FIELDS: &[FieldSpec] = &[
    FieldSpec::one_of("switch", ON_OFF),
    FieldSpec::int("light_type", 1, 2),
    FieldSpec::int("bright", 1, 100),
    FieldSpec::int("colorR", 0, 255),
    FieldSpec::int("colorG", 0, 255),
    FieldSpec::int("colorB", 0, 255),
    FieldSpec::int("mode", 1, 12),
    FieldSpec::int("speed", 0, 100),
    FieldSpec::int("sensitive", 0, 10),
];

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct StripColor {
    pub light_type: Option<i64>,
    pub bright: Option<i64>,
    #[serde(rename = "colorR")]
    pub red: Option<i64>,
    #[serde(rename = "colorG")]
    pub green: Option<i64>,
    #[serde(rename = "colorB")]
    pub blue: Option<i64>,
    pub mode: Option<i64>,
    pub speed: Option<i64>,
}

impl StripColor {
    fn project(&self, states: &mut States) {
        states
            .in_group(LIGHT, Parameter::LightType, self.light_type)
            .in_group(LIGHT, Parameter::Brightness, self.bright)
            .in_group(LIGHT, Parameter::Red, self.red)
            .in_group(LIGHT, Parameter::Green, self.green)
            .in_group(LIGHT, Parameter::Blue, self.blue)
            .in_group(LIGHT, Parameter::Mode, self.mode)
            .in_group(LIGHT, Parameter::Speed, self.speed);
    }
}

/// RGB LED strip controller.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct LedStrip {
    #[serde(flatten)]
    pub health: DeviceHealth,
    pub switch: Option<String>,
    #[serde(flatten)]
    pub color: StripColor,
}

impl UiidModel for LedStrip {
    const FIELDS: &'static [&'static [FieldSpec]] = &[DEVICE_HEALTH_FIELDS, LED_STRIP_FIELDS];

    fn to_states(&self) -> States {
        let mut states = States::new();
        self.health.project(&mut states);
        states.in_group(LIGHT, Parameter::Switch, self.switch.as_deref());
        self.color.project(&mut states);
        states
    }
}

/// LED strip with a microphone driven music mode.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct MusicLedStrip {
    #[serde(flatten)]
    pub health: DeviceHealth,
    pub switch: Option<String>,
    #[serde(flatten)]
    pub color: StripColor,
    #[serde(rename = "sensitive")]
    pub sensitivity: Option<i64>,
}

impl UiidModel for MusicLedStrip {
    const FIELDS: &'static [&'static [FieldSpec]] = &[DEVICE_HEALTH_FIELDS, MUSIC_STRIP_FIELDS];

    fn to_states(&self) -> States {
        let mut states = States::new();
        self.health.project(&mut states);
        states.in_group(LIGHT, Parameter::Switch, self.switch.as_deref());
        self.color.project(&mut states);
        states.in_group(LIGHT, Parameter::Sensitivity, self.sensitivity);
        states
    }
}

// ----------------------------------------------------------------------------
// Dimmers
// ----------------------------------------------------------------------------

const DIMMER_FIELDS: &[FieldSpec] = &[
    FieldSpec::one_of("switch", ON_OFF),
    FieldSpec::int("bright", 10, 100),
];

/// Wall dimmer with a 10..100 brightness scale.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct Dimmer {
    #[serde(flatten)]
    pub health: DeviceHealth,
    pub switch: Option<String>,
    pub bright: Option<i64>,
}

impl UiidModel for Dimmer {
    const FIELDS: &'static [&'static [FieldSpec]] = &[DEVICE_HEALTH_FIELDS, DIMMER_FIELDS];

    fn to_states(&self) -> States {
        let mut states = States::new();
        self.health.project(&mut states);
        states
            .in_group(LIGHT, Parameter::Switch, self.switch.as_deref())
            .in_group(LIGHT, Parameter::Brightness, self.bright);
        states
    }
}

const RANGE_DIMMER_FIELDS: &[FieldSpec] = &[
    FieldSpec::one_of("switch", ON_OFF),
    FieldSpec::int("brightness", 0, 100),
    FieldSpec::int("mode", 0, 255),
    FieldSpec::int("brightmin", 0, 254),
    FieldSpec::int("brightmax", 1, 255),
];

/// Dimmer with configurable output range (D1).
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct RangeDimmer {
    #[serde(flatten)]
    pub health: DeviceHealth,
    pub switch: Option<String>,
    pub brightness: Option<i64>,
    pub mode: Option<i64>,
    #[serde(rename = "brightmin")]
    pub bright_min: Option<i64>,
    #[serde(rename = "brightmax")]
    pub bright_max: Option<i64>,
}

impl UiidModel for RangeDimmer {
    const FIELDS: &'static [&'static [FieldSpec]] = &[DEVICE_HEALTH_FIELDS, RANGE_DIMMER_FIELDS];

    fn to_states(&self) -> States {
        let mut states = States::new();
        self.health.project(&mut states);
        states
            .in_group(LIGHT, Parameter::Switch, self.switch.as_deref())
            .in_group(LIGHT, Parameter::Brightness2, self.brightness)
            .in_group(LIGHT, Parameter::Mode, self.mode)
            .in_group(LIGHT, Parameter::MinimumBrightness, self.bright_min)
            .in_group(LIGHT, Parameter::MaximumBrightness, self.bright_max);
        states
    }
}

// ----------------------------------------------------------------------------
// Scene lights
// ----------------------------------------------------------------------------

const WHITE_SCENE_LIGHT_FIELDS: &[FieldSpec] = &[
    FieldSpec::text("pVer"),
    FieldSpec::one_of("switch", ON_OFF),
    FieldSpec::one_of("ltype", &["white", "bright", "read", "computer", "nightLight"]),
    FieldSpec::object("white", WHITE_SCENE_FIELDS),
    FieldSpec::object("bright", WHITE_SCENE_FIELDS),
    FieldSpec::object("read", WHITE_SCENE_FIELDS),
    FieldSpec::object("computer", WHITE_SCENE_FIELDS),
    FieldSpec::object("nightLight", WHITE_SCENE_FIELDS),
];

/// Tunable white bulb with white presets (B02/B05 white).
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct WhiteSceneLight {
    #[serde(flatten)]
    pub health: DeviceHealth,
    #[serde(rename = "pVer")]
    pub protocol_version: Option<String>,
    pub switch: Option<String>,
    #[serde(rename = "ltype")]
    pub scene: Option<String>,
    pub white: Option<WhiteScene>,
    pub bright: Option<WhiteScene>,
    pub read: Option<WhiteScene>,
    pub computer: Option<WhiteScene>,
    #[serde(rename = "nightLight")]
    pub night_light: Option<WhiteScene>,
}

impl UiidModel for WhiteSceneLight {
    const FIELDS: &'static [&'static [FieldSpec]] =
        &[DEVICE_HEALTH_FIELDS, WHITE_SCENE_LIGHT_FIELDS];

    fn to_states(&self) -> States {
        let mut states = States::new();
        self.health.project(&mut states);
        states
            .in_group(LIGHT, Parameter::Switch, self.switch.as_deref())
            .in_group(LIGHT, Parameter::LightWithScenesType, self.scene.as_deref())
            .in_group(LIGHT, Parameter::ProtocolVersion, self.protocol_version.as_deref());
        let scenes = [
            (&self.white, ParameterGroup::SceneWhite),
            (&self.bright, ParameterGroup::SceneBright),
            (&self.read, ParameterGroup::SceneRead),
            (&self.computer, ParameterGroup::SceneComputer),
            (&self.night_light, ParameterGroup::SceneNightLight),
        ];
        for (scene, group) in scenes {
            if let Some(scene) = scene {
                scene.project(&mut states, group);
            }
        }
        states
    }
}

const COLOR_SCENE_LIGHT_FIELDS: &[FieldSpec] = &[
    FieldSpec::text("pVer"),
    FieldSpec::one_of("switch", ON_OFF),
    FieldSpec::one_of(
        "ltype",
        &[
            "white",
            "color",
            "bright",
            "goodNight",
            "read",
            "nightLight",
            "party",
            "leisure",
            "soft",
            "colorful",
        ],
    ),
    FieldSpec::object("white", WHITE_SCENE_FIELDS),
    FieldSpec::object("color", COLOR_SCENE_FIELDS),
    FieldSpec::object("bright", MODE_SCENE_FIELDS),
    FieldSpec::object("goodNight", MODE_SCENE_FIELDS),
    FieldSpec::object("read", MODE_SCENE_FIELDS),
    FieldSpec::object("nightLight", MODE_SCENE_FIELDS),
    FieldSpec::object("party", MODE_SCENE_FIELDS),
    FieldSpec::object("leisure", MODE_SCENE_FIELDS),
    FieldSpec::object("soft", MODE_SCENE_FIELDS),
    FieldSpec::object("colorful", MODE_SCENE_FIELDS),
];

/// RGB + tunable white bulb with color presets (B05-B color).
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct ColorSceneLight {
    #[serde(flatten)]
    pub health: DeviceHealth,
    #[serde(rename = "pVer")]
    pub protocol_version: Option<String>,
    pub switch: Option<String>,
    #[serde(rename = "ltype")]
    pub scene: Option<String>,
    pub white: Option<WhiteScene>,
    pub color: Option<ColorScene>,
    pub bright: Option<ModeScene>,
    #[serde(rename = "goodNight")]
    pub good_night: Option<ModeScene>,
    pub read: Option<ModeScene>,
    #[serde(rename = "nightLight")]
    pub night_light: Option<ModeScene>,
    pub party: Option<ModeScene>,
    pub leisure: Option<ModeScene>,
    pub soft: Option<ModeScene>,
    pub colorful: Option<ModeScene>,
}

impl UiidModel for ColorSceneLight {
    const FIELDS: &'static [&'static [FieldSpec]] =
        &[DEVICE_HEALTH_FIELDS, COLOR_SCENE_LIGHT_FIELDS];

    fn to_states(&self) -> States {
        let mut states = States::new();
        self.health.project(&mut states);
        states
            .in_group(LIGHT, Parameter::Switch, self.switch.as_deref())
            .in_group(LIGHT, Parameter::LightWithScenesType, self.scene.as_deref())
            .in_group(LIGHT, Parameter::ProtocolVersion, self.protocol_version.as_deref());
        if let Some(white) = &self.white {
            white.project(&mut states, ParameterGroup::SceneWhite);
        }
        if let Some(color) = &self.color {
            color.project(&mut states, ParameterGroup::SceneColor);
        }
        let modes = [
            (&self.bright, ParameterGroup::SceneBright),
            (&self.good_night, ParameterGroup::SceneGoodNight),
            (&self.read, ParameterGroup::SceneRead),
            (&self.night_light, ParameterGroup::SceneNightLight),
            (&self.party, ParameterGroup::SceneParty),
            (&self.leisure, ParameterGroup::SceneLeisure),
            (&self.soft, ParameterGroup::SceneSoft),
            (&self.colorful, ParameterGroup::SceneColorful),
        ];
        for (mode, group) in modes {
            if let Some(mode) = mode {
                mode.project(&mut states, group);
            }
        }
        states
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn scene_groups_use_bare_names() {
        let model = WhiteSceneLight::from_params(&json!({
            "switch": "on",
            "ltype": "read",
            "read": {"br": 50, "ct": "200"},
            "nightLight": {"br": 5, "ct": 0},
        }))
        .unwrap();
        let states = model.to_states();
        assert_eq!(states.channel_value(Parameter::SceneBrightness, "read"), Some(&json!(50)));
        assert_eq!(
            states.channel_value(Parameter::SceneColorTemperature, "read"),
            Some(&json!(200))
        );
        assert_eq!(
            states.channel_value(Parameter::SceneBrightness, "nightLight"),
            Some(&json!(5))
        );
        assert_eq!(
            states.channel_value(Parameter::LightWithScenesType, "light"),
            Some(&json!("read"))
        );
    }

    #[test]
    fn color_scene_bounds() {
        let err = ColorSceneLight::from_params(&json!({"party": {"tf": 5}})).unwrap_err();
        assert!(err.to_string().contains("party.tf"));

        let model = ColorSceneLight::from_params(&json!({
            "ltype": "color",
            "color": {"br": 100, "r": 255, "g": 0, "b": 10},
        }))
        .unwrap();
        let states = model.to_states();
        assert_eq!(states.channel_value(Parameter::SceneColorRed, "color"), Some(&json!(255)));
    }

    #[test]
    fn strip_fields_project_under_light() {
        let model = MusicLedStrip::from_params(&json!({
            "switch": "on",
            "bright": 80,
            "colorR": "12",
            "sensitive": 7,
        }))
        .unwrap();
        let states = model.to_states();
        assert_eq!(states.channel_value(Parameter::Red, "light"), Some(&json!(12)));
        assert_eq!(states.channel_value(Parameter::Sensitivity, "light"), Some(&json!(7)));
        assert!(LedStrip::from_params(&json!({"bright": 5})).is_err());
    }

    #[test]
    fn range_dimmer_limits() {
        let model = RangeDimmer::from_params(&json!({"brightness": 40, "brightmin": 10})).unwrap();
        let states = model.to_states();
        assert_eq!(states.channel_value(Parameter::Brightness2, "light"), Some(&json!(40)));
        assert_eq!(
            states.channel_value(Parameter::MinimumBrightness, "light"),
            Some(&json!(10))
        );
        assert!(RangeDimmer::from_params(&json!({"brightmax": 0})).is_err());
    }
}
