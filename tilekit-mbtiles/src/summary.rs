use std::fmt::{Display, Formatter};

use enum_display::EnumDisplay;
use serde::Serialize;
use size_format::SizeFormatterBinary;
use tilejson::VectorLayer;

use crate::errors::MbtResult;
use crate::metadata::Metadata;
use crate::{SchemaKind, TileStore, ZoomRange};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, EnumDisplay)]
#[enum_display(case = "Kebab")]
#[serde(rename_all = "lowercase")]
pub enum TileKind {
    Vector,
    Raster,
    Unknown,
}

impl TileKind {
    /// Classify a `format` metadata value.
    #[must_use]
    pub fn from_format(format: Option<&str>) -> Self {
        let Some(format) = format.map(str::to_ascii_lowercase) else {
            return Self::Unknown;
        };
        if ["pbf", "vector"].iter().any(|v| format.contains(v)) {
            Self::Vector
        } else if ["png", "jpg", "jpeg", "webp", "raster"]
            .iter()
            .any(|v| format.contains(v))
        {
            Self::Raster
        } else {
            Self::Unknown
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct StoreSummary {
    pub file_size: Option<u64>,
    pub schema: SchemaKind,
    pub tile_kind: TileKind,
    pub zoom: Option<ZoomRange>,
    pub tile_count: u64,
    pub metadata: Metadata,
    pub vector_layers: Vec<VectorLayer>,
}

impl Display for StoreSummary {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        if let Some(file_size) = self.file_size {
            let file_size = SizeFormatterBinary::new(file_size);
            writeln!(f, "File size: {file_size:.2}B")?;
        } else {
            writeln!(f, "File size: unknown")?;
        }
        writeln!(f, "Schema: {}", self.schema)?;
        writeln!(f, "Tile kind: {}", self.tile_kind)?;
        match self.zoom {
            Some(zoom) => writeln!(f, "Zoom levels: {zoom}")?,
            None => writeln!(f, "Zoom levels: none")?,
        }
        writeln!(f, "Tile count: {}", self.tile_count)?;

        writeln!(f, "Metadata:")?;
        for (name, value) in &self.metadata {
            writeln!(f, "  {name}: {value}")?;
        }

        if !self.vector_layers.is_empty() {
            writeln!(f, "Vector layers:")?;
            for layer in &self.vector_layers {
                write!(f, "  {}", layer.id)?;
                if let (Some(min), Some(max)) = (layer.minzoom, layer.maxzoom) {
                    write!(f, " (zoom {min}..={max})")?;
                }
                if !layer.fields.is_empty() {
                    let fields: Vec<_> = layer.fields.keys().map(String::as_str).collect();
                    write!(f, ": {}", fields.join(", "))?;
                }
                writeln!(f)?;
            }
        }
        Ok(())
    }
}

impl TileStore {
    /// Gather an overview of the store for display.
    ///
    /// For vector stores the `json` metadata document is shown as its list of layers
    /// instead of the raw value.
    pub async fn summary(&mut self) -> MbtResult<StoreSummary> {
        let file_size = tokio::fs::metadata(self.filepath())
            .await
            .ok()
            .map(|m| m.len());
        let format = self.get_metadata_value("format").await?;
        let tile_kind = TileKind::from_format(format.as_deref());
        let is_vector = tile_kind == TileKind::Vector;

        Ok(StoreSummary {
            file_size,
            schema: self.schema(),
            tile_kind,
            zoom: self.zoom_bounds().await?,
            tile_count: self.count_tiles(ZoomRange::ALL).await?,
            metadata: self.read_metadata(!is_vector).await?,
            vector_layers: if is_vector {
                self.vector_layers().await?
            } else {
                Vec::new()
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use rstest::rstest;

    use super::*;

    #[rstest]
    #[case(Some("pbf"), TileKind::Vector)]
    #[case(Some("application/vnd.mapbox-vector-tile"), TileKind::Vector)]
    #[case(Some("PNG"), TileKind::Raster)]
    #[case(Some("jpeg"), TileKind::Raster)]
    #[case(Some("webp"), TileKind::Raster)]
    #[case(Some("raster"), TileKind::Raster)]
    #[case(Some("tiff"), TileKind::Unknown)]
    #[case(None, TileKind::Unknown)]
    fn tile_kind(#[case] format: Option<&str>, #[case] expected: TileKind) {
        assert_eq!(TileKind::from_format(format), expected);
    }

    #[test]
    fn display() {
        let summary = StoreSummary {
            file_size: None,
            schema: SchemaKind::View,
            tile_kind: TileKind::Vector,
            zoom: Some(ZoomRange { min: 0, max: 2 }),
            tile_count: 21,
            metadata: BTreeMap::from([
                ("format".to_string(), "pbf".to_string()),
                ("name".to_string(), "Test".to_string()),
            ]),
            vector_layers: vec![VectorLayer {
                id: "water".to_string(),
                fields: BTreeMap::from([("class".to_string(), "String".to_string())]),
                description: None,
                minzoom: Some(0),
                maxzoom: Some(2),
                other: BTreeMap::default(),
            }],
        };
        insta::assert_snapshot!(summary.to_string(), @r"
        File size: unknown
        Schema: view
        Tile kind: vector
        Zoom levels: 0..=2
        Tile count: 21
        Metadata:
          format: pbf
          name: Test
        Vector layers:
          water (zoom 0..=2): class
        ");
    }
}
