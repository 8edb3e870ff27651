//! Decoding of Mapbox Vector Tiles into per-layer `GeoJSON` feature collections.
//!
//! Geometries are projected from tile-local integer coordinates to WGS84 longitude/latitude,
//! so the decoder must be given the tile address in the top-origin (`xyz`) row convention.

use std::collections::BTreeMap;
use std::f64::consts::PI;

use geojson::feature::Id;
use geojson::{Feature, FeatureCollection, Geometry, JsonObject, JsonValue, Value};
use geozero::mvt::tile::{self, GeomType};
use geozero::mvt::{Message as _, Tile};
use serde_json::Number;

use crate::TileCoord;

/// Extent used when a layer does not declare one.
pub const DEFAULT_EXTENT: u32 = 4096;

/// Decoded features of one tile, keyed by layer name.
pub type TileLayers = BTreeMap<String, FeatureCollection>;

#[derive(thiserror::Error, Debug)]
pub enum VectorTileError {
    #[error("Unable to parse vector tile {coord}: {reason}")]
    InvalidProtobuf { coord: TileCoord, reason: String },

    #[error("Layer {layer} of tile {coord} declares a zero extent")]
    InvalidExtent { coord: TileCoord, layer: String },

    #[error("Invalid geometry in layer {layer} of tile {coord}: {reason}")]
    InvalidGeometry {
        coord: TileCoord,
        layer: String,
        reason: &'static str,
    },

    #[error("Feature tags in layer {layer} of tile {coord} point outside of the key/value tables")]
    InvalidTags { coord: TileCoord, layer: String },
}

/// Turns encoded vector tile bytes into `GeoJSON`.
///
/// Implementations must be pure: the same bytes and address always give the same layers.
pub trait VectorTileDecoder {
    /// `coord` is the tile address in top-origin row convention.
    fn decode(&self, data: &[u8], coord: TileCoord) -> Result<TileLayers, VectorTileError>;
}

/// [`VectorTileDecoder`] for Mapbox Vector Tile v2 payloads.
#[derive(Clone, Copy, Debug, Default)]
pub struct MvtDecoder;

impl VectorTileDecoder for MvtDecoder {
    fn decode(&self, data: &[u8], coord: TileCoord) -> Result<TileLayers, VectorTileError> {
        let tile = Tile::decode(data).map_err(|e| VectorTileError::InvalidProtobuf {
            coord,
            reason: e.to_string(),
        })?;

        let mut layers = TileLayers::new();
        for layer in tile.layers {
            let features = layer_features(&layer, coord)?;
            layers
                .entry(layer.name)
                .or_insert_with(|| FeatureCollection {
                    bbox: None,
                    features: Vec::new(),
                    foreign_members: None,
                })
                .features
                .extend(features);
        }
        Ok(layers)
    }
}

fn layer_features(layer: &tile::Layer, coord: TileCoord) -> Result<Vec<Feature>, VectorTileError> {
    let extent = layer.extent.unwrap_or(DEFAULT_EXTENT);
    if extent == 0 {
        return Err(VectorTileError::InvalidExtent {
            coord,
            layer: layer.name.clone(),
        });
    }
    let projection = Projection::new(extent, coord);

    let mut features = Vec::with_capacity(layer.features.len());
    for feature in &layer.features {
        let geom_type = feature.r#type();
        if geom_type == GeomType::Unknown {
            continue;
        }
        let paths = decode_paths(&feature.geometry).map_err(|reason| {
            VectorTileError::InvalidGeometry {
                coord,
                layer: layer.name.clone(),
                reason,
            }
        })?;
        let properties = properties(layer, feature).ok_or_else(|| VectorTileError::InvalidTags {
            coord,
            layer: layer.name.clone(),
        })?;

        let geometry = to_geometry(geom_type, &paths, &projection).map_err(|reason| {
            VectorTileError::InvalidGeometry {
                coord,
                layer: layer.name.clone(),
                reason,
            }
        })?;

        features.push(Feature {
            bbox: None,
            geometry: geometry.map(Geometry::new),
            id: feature.id.map(|id| Id::Number(Number::from(id))),
            properties: Some(properties),
            foreign_members: None,
        });
    }
    Ok(features)
}

type Path = Vec<(i64, i64)>;

/// Runs the MoveTo / LineTo / ClosePath command stream, producing one path per MoveTo.
///
/// geozero keeps its command integer helpers private, so the stream is decoded here.
fn decode_paths(geometry: &[u32]) -> Result<Vec<Path>, &'static str> {
    const MOVE_TO: u32 = 1;
    const LINE_TO: u32 = 2;
    const CLOSE_PATH: u32 = 7;

    let mut paths: Vec<Path> = Vec::new();
    let mut cursor = (0_i64, 0_i64);
    let mut params = geometry.iter().copied();

    while let Some(command) = params.next() {
        let (id, count) = (command & 0x7, command >> 3);
        match id {
            MOVE_TO | LINE_TO => {
                for _ in 0..count {
                    let (Some(dx), Some(dy)) = (params.next(), params.next()) else {
                        return Err("command is missing its parameters");
                    };
                    cursor = match (
                        cursor.0.checked_add(zigzag(dx)),
                        cursor.1.checked_add(zigzag(dy)),
                    ) {
                        (Some(x), Some(y)) => (x, y),
                        _ => return Err("cursor leaves the coordinate range"),
                    };
                    if id == MOVE_TO {
                        paths.push(vec![cursor]);
                    } else {
                        paths
                            .last_mut()
                            .ok_or("LineTo before any MoveTo")?
                            .push(cursor);
                    }
                }
            }
            CLOSE_PATH => {
                let path = paths.last_mut().ok_or("ClosePath before any MoveTo")?;
                if let Some(&first) = path.first() {
                    path.push(first);
                }
            }
            _ => return Err("unknown command id"),
        }
    }
    Ok(paths)
}

fn zigzag(value: u32) -> i64 {
    i64::from(value >> 1) ^ -i64::from(value & 1)
}

/// Twice the signed area of a ring in tile coordinates (y pointing down).
/// Exterior rings are positive, holes negative. `None` if the sum leaves `i128`.
fn signed_area(ring: &[(i64, i64)]) -> Option<i128> {
    ring.windows(2).try_fold(0_i128, |area, w| {
        let cross = (i128::from(w[0].0) * i128::from(w[1].1))
            .checked_sub(i128::from(w[1].0) * i128::from(w[0].1))?;
        area.checked_add(cross)
    })
}

fn to_geometry(
    geom_type: GeomType,
    paths: &[Path],
    proj: &Projection,
) -> Result<Option<Value>, &'static str> {
    let project_path = |path: &Path| path.iter().map(|p| proj.position(*p)).collect::<Vec<_>>();

    Ok(match geom_type {
        GeomType::Unknown => None,
        GeomType::Point => {
            let mut points: Vec<_> = paths.iter().flatten().map(|p| proj.position(*p)).collect();
            match points.len() {
                0 => None,
                1 => points.pop().map(Value::Point),
                _ => Some(Value::MultiPoint(points)),
            }
        }
        GeomType::Linestring => {
            let mut lines: Vec<_> = paths.iter().map(project_path).collect();
            match lines.len() {
                0 => None,
                1 => lines.pop().map(Value::LineString),
                _ => Some(Value::MultiLineString(lines)),
            }
        }
        GeomType::Polygon => {
            let mut polygons: Vec<Vec<Vec<Vec<f64>>>> = Vec::new();
            for ring in paths {
                let area = signed_area(ring).ok_or("ring area overflows")?;
                if area > 0 {
                    polygons.push(vec![project_path(ring)]);
                } else if area < 0 {
                    // a hole without a preceding exterior ring is dropped
                    if let Some(polygon) = polygons.last_mut() {
                        polygon.push(project_path(ring));
                    }
                }
            }
            match polygons.len() {
                0 => None,
                1 => polygons.pop().map(Value::Polygon),
                _ => Some(Value::MultiPolygon(polygons)),
            }
        }
    })
}

fn properties(layer: &tile::Layer, feature: &tile::Feature) -> Option<JsonObject> {
    let mut properties = JsonObject::new();
    for pair in feature.tags.chunks(2) {
        let [key, value] = *pair else {
            return None;
        };
        let key = layer.keys.get(usize::try_from(key).ok()?)?;
        let value = layer.values.get(usize::try_from(value).ok()?)?;
        properties.insert(key.clone(), json_value(value));
    }
    Some(properties)
}

fn json_value(value: &tile::Value) -> JsonValue {
    if let Some(v) = &value.string_value {
        JsonValue::String(v.clone())
    } else if let Some(v) = value.float_value {
        Number::from_f64(f64::from(v)).map_or(JsonValue::Null, JsonValue::Number)
    } else if let Some(v) = value.double_value {
        Number::from_f64(v).map_or(JsonValue::Null, JsonValue::Number)
    } else if let Some(v) = value.int_value.or(value.sint_value) {
        JsonValue::Number(v.into())
    } else if let Some(v) = value.uint_value {
        JsonValue::Number(v.into())
    } else if let Some(v) = value.bool_value {
        JsonValue::Bool(v)
    } else {
        JsonValue::Null
    }
}

/// Web Mercator inverse projection of one tile's local grid.
struct Projection {
    size: f64,
    x0: f64,
    y0: f64,
}

impl Projection {
    fn new(extent: u32, coord: TileCoord) -> Self {
        let extent = f64::from(extent);
        Self {
            size: extent * 2_f64.powi(i32::from(coord.z)),
            x0: extent * f64::from(coord.x),
            y0: extent * f64::from(coord.y),
        }
    }

    #[expect(clippy::cast_precision_loss)]
    fn position(&self, (px, py): (i64, i64)) -> Vec<f64> {
        let lon = (px as f64 + self.x0) * 360.0 / self.size - 180.0;
        let y2 = 180.0 - (py as f64 + self.y0) * 360.0 / self.size;
        let lat = 360.0 / PI * (y2 * PI / 180.0).exp().atan() - 90.0;
        vec![lon, lat]
    }
}
