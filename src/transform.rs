//! Lookup tables between wire parameter names and persisted property identifiers.

use crate::types::{ChannelGroup, Parameter};

pub const PROPERTY_STATUS_LED: &str = "status_led";
pub const PROPERTY_FIRMWARE_VERSION: &str = "firmware_version";
pub const PROPERTY_RSSI: &str = "rssi";
pub const PROPERTY_SSID: &str = "ssid";
pub const PROPERTY_HARDWARE_MAC_ADDRESS: &str = "hardware_mac_address";

/// Channel sub-unit address key inside grouped payloads.
pub const OUTLET: &str = "outlet";

const DEVICE_PROPERTIES: &[(Parameter, &str)] = &[
    (Parameter::StatusLed, PROPERTY_STATUS_LED),
    (Parameter::FirmwareVersion, PROPERTY_FIRMWARE_VERSION),
    (Parameter::Rssi, PROPERTY_RSSI),
    (Parameter::Ssid, PROPERTY_SSID),
    (Parameter::Bssid, PROPERTY_HARDWARE_MAC_ADDRESS),
];

/// Maps a device-level wire parameter to its property identifier.
/// Unmapped identifiers pass through unchanged.
pub fn device_parameter_to_property(identifier: &str) -> &str {
    DEVICE_PROPERTIES
        .iter()
        .find(|(param, _)| param.as_str() == identifier)
        .map(|(_, property)| *property)
        .unwrap_or(identifier)
}

/// Inverse of [`device_parameter_to_property`].
pub fn device_property_to_parameter(identifier: &str) -> &str {
    DEVICE_PROPERTIES
        .iter()
        .find(|(_, property)| *property == identifier)
        .map(|(param, _)| param.as_str())
        .unwrap_or(identifier)
}

/// Array a channel parameter lives in when addressed per outlet.
///
/// Only outlet addressed channels (identifier `outlet`) are grouped.
pub fn channel_identifier_to_group(channel: &str, parameter: &str) -> Option<ChannelGroup> {
    if channel != OUTLET {
        return None;
    }
    match Parameter::from_wire(parameter)? {
        Parameter::Switch => Some(ChannelGroup::Switches),
        Parameter::Startup => Some(ChannelGroup::Configure),
        Parameter::Pulse | Parameter::PulseWidth => Some(ChannelGroup::Pulses),
        _ => None,
    }
}

/// Channel identifier used by a grouped payload array.
pub fn group_to_channel_identifier(group: ChannelGroup) -> Option<&'static str> {
    match group {
        ChannelGroup::Switches | ChannelGroup::Configure | ChannelGroup::Pulses => Some(OUTLET),
        ChannelGroup::RfList => None,
    }
}
