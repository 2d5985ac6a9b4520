//! Identifier enums shared by the cloud and LAN transports.
//! Wire names match the eWeLink protocol exactly (case sensitive).

use crate::error::{Result, SonoffError};

define_wire_enum! {
    /// eWeLink account region; selects REST and sockets dispatch hosts.
    pub enum Region {
        Europe = "eu",
        America = "us",
        Asia = "as",
        China = "cn",
    }
}

impl Default for Region {
    fn default() -> Self {
        Region::Europe
    }
}

impl Region {
    /// Base URL of the REST API for this region.
    pub fn api_endpoint(&self) -> &'static str {
        match self {
            Region::Europe => "https://eu-apia.coolkit.cc",
            Region::America => "https://us-apia.coolkit.cc",
            Region::Asia => "https://as-apia.coolkit.cc",
            Region::China => "https://cn-apia.coolkit.cn",
        }
    }

    /// Base URL of the sockets dispatch service for this region.
    pub fn sockets_endpoint(&self) -> &'static str {
        match self {
            Region::Europe => "https://eu-dispa.coolkit.cc",
            Region::America => "https://us-dispa.coolkit.cc",
            Region::Asia => "https://as-dispa.coolkit.cc",
            Region::China => "https://cn-dispa.coolkit.cn",
        }
    }
}

define_wire_enum! {
    /// Transport used to reach devices.
    pub enum ClientMode {
        Lan = "lan",
        Cloud = "cloud",
        Auto = "auto",
    }
}

define_wire_enum! {
    /// Top-level keys of a normalized state projection.
    pub enum ParameterType {
        Device = "device",
        Channel = "channel",
    }
}

define_wire_enum! {
    /// Logical sub-feature a channel parameter belongs to.
    pub enum ParameterGroup {
        Device = "device",
        Light = "light",
        Switch = "switch",
        Thermostat = "thermostat",
        Fan = "fan",
        Sensor = "sensor",
        Humidifier = "humidifier",
        Other = "other",
        Bridge = "bridge",
        SceneWhite = "white",
        SceneBright = "bright",
        SceneRead = "read",
        SceneComputer = "computer",
        SceneNightLight = "nightLight",
        SceneColor = "color",
        SceneGoodNight = "goodNight",
        SceneParty = "party",
        SceneLeisure = "leisure",
        SceneSoft = "soft",
        SceneColorful = "colorful",
    }
}

impl ParameterGroup {
    /// Group name for one outlet of a multi-channel device, e.g. `switch_2`.
    pub fn outlet(&self, outlet: u32) -> String {
        format!("{}_{}", self.as_str(), outlet)
    }
}

define_wire_enum! {
    /// Arrays in multi-outlet payloads addressed by `outlet` index.
    pub enum ChannelGroup {
        Switches = "switches",
        Configure = "configure",
        Pulses = "pulses",
        RfList = "rfList",
    }
}

define_wire_enum! {
    /// Device and channel parameter wire names.
    pub enum Parameter {
        StatusLed = "sledOnline",
        FirmwareVersion = "fwVersion",
        Rssi = "rssi",
        Ssid = "ssid",
        Bssid = "bssid",
        Switch = "switch",
        Startup = "startup",
        Pulse = "pulse",
        PulseWidth = "pulseWidth",
        MinimumBrightness = "brightMin",
        MaximumBrightness = "brightMax",
        Mode = "mode",
        Power = "power",
        Voltage = "voltage",
        Current = "current",
        Consumption = "oneKwh",
        ConsumptionData = "oneKwhData",
        StartTime = "startTime",
        EndTime = "endTime",
        MainSwitch = "mainSwitch",
        DeviceType = "deviceType",
        SensorType = "sensorType",
        CurrentTemperature = "currentTemperature",
        CurrentHumidity = "currentHumidity",
        Channel0 = "channel0",
        Channel1 = "channel1",
        Channel2 = "channel2",
        Channel3 = "channel3",
        Channel4 = "channel4",
        Type = "type",
        Fan = "fan",
        Speed = "speed",
        Shake = "shake",
        Dusty = "dusty",
        Noise = "noise",
        Light = "light",
        Temperature = "temperature",
        Humidity = "humidity",
        State = "state",
        Water = "water",
        LightType = "light_type",
        LightSwitch = "lightswitch",
        LightMode = "lightmode",
        LightRedColor = "lightRcolor",
        LightGreenColor = "lightGcolor",
        LightBlueColor = "lightBcolor",
        LightBrightness = "lightbright",
        RemoteType = "remote_type",
        Command = "cmd",
        RfChannel = "rfChl",
        Red = "colorR",
        Green = "colorG",
        Blue = "colorB",
        Sensitivity = "sensitive",
        Brightness = "bright",
        Brightness2 = "brightness",
        Battery = "battery",
        LastUpdateTime = "lastUpdateTime",
        ActionTime = "actionTime",
        LightWithScenesType = "ltype",
        ProtocolVersion = "pVer",
        SceneBrightness = "br",
        SceneColorTemperature = "ct",
        SceneColorRed = "r",
        SceneColorGreen = "g",
        SceneColorBlue = "b",
        SceneName = "name",
        SceneColorMode = "tf",
        SceneSpeedChange = "sp",
    }
}

/// Cloud "thing" kind as reported by `itemType`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ItemType {
    /// Device owned by the user
    Device,
    /// Device shared with the user
    SharedDevice,
    /// Device group
    Group,
}

impl ItemType {
    pub fn value(&self) -> u8 {
        match self {
            ItemType::Device => 1,
            ItemType::SharedDevice => 2,
            ItemType::Group => 3,
        }
    }

    pub fn from_value(value: i64) -> Option<Self> {
        match value {
            1 => Some(ItemType::Device),
            2 => Some(ItemType::SharedDevice),
            3 => Some(ItemType::Group),
            _ => None,
        }
    }

    pub fn is_device(&self) -> bool {
        matches!(self, ItemType::Device | ItemType::SharedDevice)
    }
}

impl TryFrom<i64> for ItemType {
    type Error = SonoffError;

    fn try_from(value: i64) -> Result<Self> {
        Self::from_value(value)
            .ok_or_else(|| SonoffError::InvalidArgument(format!("Unknown item type: {}", value)))
    }
}
