//! Normalized `{device, channel}` projection of device parameters.

use crate::types::{Parameter, ParameterGroup};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One projected parameter value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StateEntry {
    pub name: Parameter,
    pub value: Value,
    /// Sub-feature the parameter belongs to, e.g. `light` or `switch_2`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group: Option<String>,
}

/// Device-level and channel-level parameters of a single status payload.
///
/// Only fields present in the payload are projected, so a partial push never
/// reports absent parameters.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct States {
    pub device: Vec<StateEntry>,
    pub channel: Vec<StateEntry>,
}

impl States {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn device<V: Into<Value>>(&mut self, name: Parameter, value: Option<V>) -> &mut Self {
        if let Some(value) = value {
            self.device.push(StateEntry {
                name,
                value: value.into(),
                group: None,
            });
        }
        self
    }

    pub fn channel<V: Into<Value>>(
        &mut self,
        name: Parameter,
        value: Option<V>,
        group: impl Into<String>,
    ) -> &mut Self {
        if let Some(value) = value {
            self.channel.push(StateEntry {
                name,
                value: value.into(),
                group: Some(group.into()),
            });
        }
        self
    }

    /// Shorthand for a channel parameter in a fixed group.
    pub fn in_group<V: Into<Value>>(
        &mut self,
        group: ParameterGroup,
        name: Parameter,
        value: Option<V>,
    ) -> &mut Self {
        self.channel(name, value, group.as_str())
    }

    pub fn is_empty(&self) -> bool {
        self.device.is_empty() && self.channel.is_empty()
    }

    pub fn device_value(&self, name: Parameter) -> Option<&Value> {
        self.device.iter().find(|e| e.name == name).map(|e| &e.value)
    }

    pub fn channel_value(&self, name: Parameter, group: &str) -> Option<&Value> {
        self.channel
            .iter()
            .find(|e| e.name == name && e.group.as_deref() == Some(group))
            .map(|e| &e.value)
    }
}
