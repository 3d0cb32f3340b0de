//! Order-preserving encoding of path specifications.
//!
//! A specification is written as a list of `{type_indicator, location}` records
//! from root to leaf. Decoding rebuilds the chain through [`PathSpec::new`], so
//! persisted specifications are validated exactly like freshly built ones.

use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use super::{Location, PathSpec, TypeIndicator};
use crate::error::{Result, VfsError};

/// One segment of a serialized path specification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PathSpecRecord {
    pub type_indicator: TypeIndicator,
    #[serde(default)]
    pub location: Location,
}

impl PathSpec {
    /// Segments of this specification, root first
    pub fn to_records(&self) -> Vec<PathSpecRecord> {
        let mut records: Vec<PathSpecRecord> = self
            .ancestors()
            .map(|spec| PathSpecRecord {
                type_indicator: spec.type_indicator.clone(),
                location: spec.location.clone(),
            })
            .collect();
        records.reverse();
        records
    }

    /// Rebuild a specification from root-first records
    pub fn from_records(records: impl IntoIterator<Item = PathSpecRecord>) -> Result<Self> {
        let mut spec: Option<PathSpec> = None;
        for record in records {
            spec = Some(PathSpec::new(record.type_indicator, record.location, spec)?);
        }
        spec.ok_or_else(|| VfsError::invalid_spec("path specification has no segments"))
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn to_json_pretty(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn from_json(text: &str) -> Result<Self> {
        let records: Vec<PathSpecRecord> = serde_json::from_str(text)?;
        Self::from_records(records)
    }
}

impl Serialize for PathSpec {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        self.to_records().serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for PathSpec {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let records = Vec::<PathSpecRecord>::deserialize(deserializer)?;
        PathSpec::from_records(records).map_err(D::Error::custom)
    }
}
