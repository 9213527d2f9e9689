// ABOUTME: Custom serde deserializers for config types.
// ABOUTME: Validates service names and the non-empty application service list.

use nonempty::NonEmpty;
use serde::Deserialize;

use crate::types::ServiceName;

pub fn deserialize_service_name<'de, D>(deserializer: D) -> Result<ServiceName, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let s = String::deserialize(deserializer)?;
    ServiceName::new(&s).map_err(serde::de::Error::custom)
}

pub fn deserialize_services<'de, D>(deserializer: D) -> Result<NonEmpty<ServiceName>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let values: Vec<String> = Vec::deserialize(deserializer)?;
    let services = values
        .iter()
        .map(|s| ServiceName::new(s).map_err(|e| format!("{}: {}", s, e)))
        .collect::<Result<Vec<_>, _>>()
        .map_err(serde::de::Error::custom)?;

    NonEmpty::from_vec(services)
        .ok_or_else(|| serde::de::Error::custom("at least one application service is required"))
}
