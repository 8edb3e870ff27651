use std::collections::BTreeMap;

use serde_json::Value as JSONValue;
use tilejson::VectorLayer;
use tilekit_tile_utils::TileFormat;
use tracing::warn;

use crate::errors::MbtResult;
use crate::{TileStore, queries};

/// Name/value pairs of the `metadata` table, ordered by name.
pub type Metadata = BTreeMap<String, String>;

/// The metadata key holding the vector layer description document.
pub const JSON_KEY: &str = "json";

impl TileStore {
    /// Get a single metadata value from the metadata table
    pub async fn get_metadata_value(&mut self, key: &str) -> MbtResult<Option<String>> {
        queries::get_metadata_value(&mut self.conn, key).await
    }

    /// Read the whole metadata table. Rows with a missing name or value are skipped.
    ///
    /// The `json` entry describes vector layers rather than the tileset itself,
    /// and is only returned when `include_json` is set.
    pub async fn read_metadata(&mut self, include_json: bool) -> MbtResult<Metadata> {
        let mut metadata = Metadata::new();
        for (name, value) in queries::metadata_rows(&mut self.conn).await? {
            match (name, value) {
                (Some(name), _) if !include_json && name == JSON_KEY => {}
                (Some(name), Some(value)) => {
                    metadata.insert(name, value);
                }
                (name, _) => {
                    let file = self.filename();
                    warn!("{file} has a metadata row without a value: {name:?}");
                }
            }
        }
        Ok(metadata)
    }

    /// Tile format declared by the `format` metadata value.
    pub async fn detect_format(&mut self) -> MbtResult<TileFormat> {
        Ok(self
            .get_metadata_value("format")
            .await?
            .map_or(TileFormat::Unknown, |v| TileFormat::parse(&v)))
    }

    /// Vector layers listed in the `json` metadata document, if any.
    pub async fn vector_layers(&mut self) -> MbtResult<Vec<VectorLayer>> {
        let Some(json) = self.get_metadata_value(JSON_KEY).await? else {
            return Ok(Vec::new());
        };
        Ok(parse_vector_layers(&json).unwrap_or_else(|err| {
            warn!("Unable to parse metadata json value in {}: {err}", self.filename());
            Vec::new()
        }))
    }
}

/// Extract the `vector_layers` array from a `json` metadata document.
pub fn parse_vector_layers(json: &str) -> serde_json::Result<Vec<VectorLayer>> {
    match serde_json::from_str::<JSONValue>(json)? {
        JSONValue::Object(mut obj) => match obj.remove("vector_layers") {
            Some(layers) => serde_json::from_value(layers),
            None => Ok(Vec::new()),
        },
        _ => Ok(Vec::new()),
    }
}
