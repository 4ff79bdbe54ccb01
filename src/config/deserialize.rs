// ABOUTME: Custom serde deserializers for config types.
// ABOUTME: Handles the metadata type list and environment map keys.

use nonempty::NonEmpty;
use serde::Deserialize;
use std::collections::BTreeMap;

use super::EnvironmentConfig;
use crate::types::{EnvironmentName, MetadataType};

pub fn deserialize_metadata_types<'de, D>(
    deserializer: D,
) -> Result<Option<NonEmpty<MetadataType>>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let values: Vec<String> = Vec::deserialize(deserializer)?;
    let mut types: Vec<MetadataType> = Vec::with_capacity(values.len());
    for value in &values {
        let parsed = MetadataType::new(value).map_err(serde::de::Error::custom)?;
        if !types.contains(&parsed) {
            types.push(parsed);
        }
    }

    NonEmpty::from_vec(types)
        .map(Some)
        .ok_or_else(|| serde::de::Error::custom("at least one metadata type is required"))
}

pub fn deserialize_environments<'de, D>(
    deserializer: D,
) -> Result<BTreeMap<EnvironmentName, EnvironmentConfig>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let raw: BTreeMap<String, EnvironmentConfig> = BTreeMap::deserialize(deserializer)?;
    raw.into_iter()
        .map(|(name, config)| {
            EnvironmentName::new(&name)
                .map(|name| (name, config))
                .map_err(|e| serde::de::Error::custom(format!("environment '{}': {}", name, e)))
        })
        .collect()
}
