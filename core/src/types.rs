// Copyright (c) 2024 Mike Tsao. All rights reserved.

//! Common data types used throughout the system.

use derive_more::Display as DeriveDisplay;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// A scalar held in the [SnapshotStore](crate::store::SnapshotStore). Derived
/// values are always simply comparable, so change detection is plain `==`.
#[derive(Clone, Debug, DeriveDisplay, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    #[allow(missing_docs)]
    #[display(fmt = "{}", _0)]
    Bool(bool),
    #[allow(missing_docs)]
    #[display(fmt = "{}", _0)]
    Number(f64),
    #[allow(missing_docs)]
    #[display(fmt = "{}", _0)]
    Text(String),
}
impl Value {
    /// Returns the numeric value, if this is a number.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Number(n) => Some(*n),
            _ => None,
        }
    }

    /// Returns the numeric value as an integer index. Fractions are dropped.
    pub fn as_i64(&self) -> Option<i64> {
        self.as_f64().map(|n| n as i64)
    }

    /// Returns the string slice, if this is text.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s.as_str()),
            _ => None,
        }
    }

    /// Loose truthiness, for flags that upstream sends as either booleans or
    /// numbers.
    pub fn is_truthy(&self) -> bool {
        match self {
            Value::Bool(b) => *b,
            Value::Number(n) => *n != 0.0,
            Value::Text(s) => !s.is_empty(),
        }
    }
}
impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Bool(value)
    }
}
impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Value::Number(value)
    }
}
impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::Number(value as f64)
    }
}
impl From<u32> for Value {
    fn from(value: u32) -> Self {
        Value::Number(value as f64)
    }
}
impl From<u64> for Value {
    fn from(value: u64) -> Self {
        Value::Number(value as f64)
    }
}
impl From<usize> for Value {
    fn from(value: usize) -> Self {
        Value::Number(value as f64)
    }
}
impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::Text(value)
    }
}
impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::Text(value.to_string())
    }
}

/// Identifies a device in the music tool. Most devices live on a numbered
/// track; the master track has its own address.
#[derive(Clone, Copy, Debug, DeriveDisplay, PartialEq, Eq, Hash)]
pub enum DeviceAddress {
    #[allow(missing_docs)]
    #[display(fmt = "{}", _0)]
    Track(u32),
    #[allow(missing_docs)]
    #[display(fmt = "master_track")]
    Master,
}
impl DeviceAddress {
    const MASTER_NAME: &'static str = "master_track";
}
impl Serialize for DeviceAddress {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            DeviceAddress::Track(track) => serializer.serialize_u32(*track),
            DeviceAddress::Master => serializer.serialize_str(Self::MASTER_NAME),
        }
    }
}
impl<'de> Deserialize<'de> for DeviceAddress {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Track(u32),
            Name(String),
        }
        match Raw::deserialize(deserializer)? {
            Raw::Track(track) => Ok(DeviceAddress::Track(track)),
            Raw::Name(name) if name == Self::MASTER_NAME => Ok(DeviceAddress::Master),
            Raw::Name(name) => Err(serde::de::Error::custom(format!(
                "unknown device address {name:?}"
            ))),
        }
    }
}

/// A single automatable parameter: device, parameter index, and channel.
#[derive(Clone, Copy, Debug, DeriveDisplay, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[display(fmt = "{}/{}/{}", device, index, channel)]
pub struct ParameterAddress {
    #[allow(missing_docs)]
    pub device: DeviceAddress,
    #[allow(missing_docs)]
    pub index: u32,
    #[allow(missing_docs)]
    pub channel: u32,
}
impl ParameterAddress {
    #[allow(missing_docs)]
    pub const fn new(device: DeviceAddress, index: u32, channel: u32) -> Self {
        Self {
            device,
            index,
            channel,
        }
    }
}

/// An addressable cue point in the music tool.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Scene {
    #[allow(missing_docs)]
    pub id: i64,
    #[allow(missing_docs)]
    pub name: String,
}

/// A clip slot on a track.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Clip {
    #[allow(missing_docs)]
    pub id: u32,
    #[allow(missing_docs)]
    pub name: String,
}

/// A device parameter as the music tool reports it.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Parameter {
    #[allow(missing_docs)]
    pub name: String,
    #[allow(missing_docs)]
    pub value: f64,
    #[allow(missing_docs)]
    #[serde(default)]
    pub min: f64,
    #[allow(missing_docs)]
    #[serde(default)]
    pub max: f64,
}
