use std::fmt;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Canonical warehouse identifier.
///
/// Upstream records store warehouse references as strings or integers.
/// Both are normalised into one string form so equality is exact and
/// case-sensitive regardless of where the record came from.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct WarehouseId(String);

impl WarehouseId {
    pub fn parse(raw: &str) -> Result<Self, String> {
        if raw.trim().is_empty() {
            return Err("warehouse id cannot be empty".to_string());
        }
        Ok(Self(raw.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<u64> for WarehouseId {
    fn from(value: u64) -> Self {
        Self(value.to_string())
    }
}

impl fmt::Display for WarehouseId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl Serialize for WarehouseId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0)
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawWarehouseId {
    Text(String),
    Number(u64),
}

impl<'de> Deserialize<'de> for WarehouseId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        match RawWarehouseId::deserialize(deserializer)? {
            RawWarehouseId::Text(raw) => WarehouseId::parse(&raw).map_err(serde::de::Error::custom),
            RawWarehouseId::Number(value) => Ok(WarehouseId::from(value)),
        }
    }
}
