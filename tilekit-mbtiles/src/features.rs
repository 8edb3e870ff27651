use std::path::{Path, PathBuf};

use futures::TryStreamExt as _;
use geojson::FeatureCollection;
use tilekit_tile_utils::mvt::{TileLayers, VectorTileDecoder};
use tilekit_tile_utils::{TileCoord, TileScheme, try_decompress};
use tracing::{debug, info};

use crate::errors::{MbtError, MbtResult};
use crate::report::{BatchReport, FailureKind};
use crate::{AccessMode, TileStore, ZoomRange};

/// Append the features of one tile to the accumulated per-layer collections.
///
/// Features are concatenated in the order tiles are merged; nothing is deduplicated.
pub fn merge_layers(merged: &mut TileLayers, tile: TileLayers) {
    for (name, layer) in tile {
        merged
            .entry(name)
            .or_insert_with(|| FeatureCollection {
                bbox: None,
                features: Vec::new(),
                foreign_members: None,
            })
            .features
            .extend(layer.features);
    }
}

/// Write merged layers as one pretty-printed JSON document keyed by layer name.
pub async fn write_layers(path: &Path, layers: &TileLayers) -> MbtResult<()> {
    let json = serde_json::to_vec_pretty(layers)?;
    tokio::fs::write(path, json)
        .await
        .map_err(|source| MbtError::WriteError {
            path: path.to_path_buf(),
            source,
        })
}

/// Decode every vector tile of one zoom level and merge the features into a single `GeoJSON` file.
#[derive(Clone, Debug, PartialEq)]
pub struct GeoJsonExport {
    pub input: PathBuf,
    pub output: PathBuf,
    pub zoom: u8,
    /// With [`TileScheme::Xyz`], stored rows are flipped before decoding.
    /// The decoder projects coordinates assuming top-origin rows.
    pub scheme: TileScheme,
    /// Only keep this layer
    pub layer: Option<String>,
}

impl GeoJsonExport {
    #[must_use]
    pub fn new(input: PathBuf, output: PathBuf, zoom: u8) -> Self {
        Self {
            input,
            output,
            zoom,
            scheme: TileScheme::Xyz,
            layer: None,
        }
    }

    pub async fn run<D: VectorTileDecoder>(&self, decoder: &D) -> MbtResult<BatchReport> {
        let mut store = TileStore::open(&self.input, AccessMode::ReadOnly).await?;
        let (layers, report) = store
            .export_features(decoder, self.zoom, self.scheme, self.layer.as_deref())
            .await?;
        store.close().await?;

        write_layers(&self.output, &layers).await?;
        info!("Wrote {} layers to {}", layers.len(), self.output.display());
        Ok(report)
    }
}

impl TileStore {
    /// Decode all tiles of one zoom level and merge their features per layer.
    ///
    /// A payload that fails to decompress is recorded and decoded as is.
    /// A tile that fails to decode is recorded and left out of the result.
    /// The merged features of the whole zoom level are held in memory.
    pub async fn export_features<D: VectorTileDecoder>(
        &mut self,
        decoder: &D,
        zoom: u8,
        scheme: TileScheme,
        layer: Option<&str>,
    ) -> MbtResult<(TileLayers, BatchReport)> {
        let mut merged = TileLayers::new();
        let mut report = BatchReport::default();
        info!("Decoding vector tiles at zoom {zoom} from {self}");

        let mut tiles = self.iter_tiles(ZoomRange::single(zoom), true);
        while let Some(tile) = tiles.try_next().await? {
            report.processed += 1;
            let coord = TileCoord {
                y: scheme.translate_row(tile.coord.z, tile.coord.y),
                ..tile.coord
            };
            let data = try_decompress(tile.data).unwrap_or_else(|err| {
                report.fail(coord, FailureKind::Decompression, &err);
                err.into_original()
            });
            let mut layers = match decoder.decode(&data, coord) {
                Ok(layers) => layers,
                Err(err) => {
                    report.fail(coord, FailureKind::Decode, err);
                    continue;
                }
            };
            if let Some(name) = layer {
                layers.retain(|k, _| k == name);
            }
            debug!("Merging {} layers of tile {coord}", layers.len());
            merge_layers(&mut merged, layers);
            report.succeeded += 1;
        }

        info!("Finished decoding zoom {zoom}: {report}");
        Ok((merged, report))
    }
}

#[cfg(test)]
mod tests {
    use geojson::{Feature, JsonObject};
    use pretty_assertions::assert_eq;

    use super::*;

    fn layer_of(names: &[&str]) -> FeatureCollection {
        FeatureCollection {
            bbox: None,
            features: names
                .iter()
                .map(|n| {
                    let mut props = JsonObject::new();
                    props.insert("name".to_string(), (*n).into());
                    Feature {
                        properties: Some(props),
                        ..Default::default()
                    }
                })
                .collect(),
            foreign_members: None,
        }
    }

    fn tile(layers: &[(&str, &[&str])]) -> TileLayers {
        layers
            .iter()
            .map(|(name, feats)| ((*name).to_string(), layer_of(feats)))
            .collect()
    }

    fn names(layers: &TileLayers, layer: &str) -> Vec<String> {
        layers[layer]
            .features
            .iter()
            .map(|f| {
                let name = f.property("name").and_then(|v| v.as_str());
                name.unwrap_or_default().to_string()
            })
            .collect()
    }

    #[test]
    fn merge_concatenates_in_order() {
        let mut merged = TileLayers::new();
        merge_layers(&mut merged, tile(&[("water", &["a", "b"]), ("roads", &["r1"])]));
        merge_layers(&mut merged, tile(&[("water", &["c"])]));
        merge_layers(&mut merged, tile(&[("roads", &["r2"]), ("poi", &[])]));

        assert_eq!(names(&merged, "water"), vec!["a", "b", "c"]);
        assert_eq!(names(&merged, "roads"), vec!["r1", "r2"]);
        assert!(merged["poi"].features.is_empty());
        assert_eq!(
            merged.keys().map(String::as_str).collect::<Vec<_>>(),
            vec!["poi", "roads", "water"]
        );
    }

    #[test]
    fn merge_is_associative() {
        let a = tile(&[("water", &["a"])]);
        let b = tile(&[("water", &["b"]), ("roads", &["r"])]);
        let c = tile(&[("water", &["c"])]);

        let mut left = TileLayers::new();
        merge_layers(&mut left, a.clone());
        merge_layers(&mut left, b.clone());
        let mut grouped = TileLayers::new();
        merge_layers(&mut grouped, left);
        merge_layers(&mut grouped, c.clone());

        let mut flat = TileLayers::new();
        for t in [a, b, c] {
            merge_layers(&mut flat, t);
        }
        assert_eq!(grouped, flat);
    }
}
