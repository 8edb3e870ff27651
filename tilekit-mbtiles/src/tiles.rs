use std::fmt::{Display, Formatter};

use futures::future::ready;
use futures::{Stream, TryStreamExt as _};
use serde::Serialize;
use sqlx::{SqliteExecutor, query_as};
use tilekit_tile_utils::{MAX_ZOOM, TileCoord};
use tracing::{info, warn};

use crate::errors::{MbtError, MbtResult};
use crate::queries::{self, TileRow};
use crate::{SchemaKind, TileStore};

/// Inclusive range of zoom levels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ZoomRange {
    pub min: u8,
    pub max: u8,
}

impl ZoomRange {
    /// Every zoom level a tile store may contain.
    pub const ALL: Self = Self {
        min: 0,
        max: MAX_ZOOM,
    };

    #[must_use]
    pub fn single(zoom: u8) -> Self {
        Self {
            min: zoom,
            max: zoom,
        }
    }

    #[must_use]
    pub fn contains(self, zoom: u8) -> bool {
        (self.min..=self.max).contains(&zoom)
    }
}

impl Display for ZoomRange {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}..={}", self.min, self.max)
    }
}

/// One tile as stored, with its row in the store's bottom-origin numbering.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TileRecord {
    pub coord: TileCoord,
    pub data: Vec<u8>,
}

/// Validate a raw `tiles` row. Rows outside the tile grid or without data are logged and dropped.
pub(crate) fn to_record(filename: &str, (z, x, y, data): TileRow) -> Option<TileRecord> {
    let coord = match (u8::try_from(z), u32::try_from(x), u32::try_from(y)) {
        (Ok(z), Ok(x), Ok(y)) => TileCoord { z, x, y },
        _ => {
            warn!("Skipping tile {z}/{x}/{y} with an invalid address in {filename}");
            return None;
        }
    };
    if !coord.is_valid() {
        warn!("Skipping tile {coord} outside of its zoom level grid in {filename}");
        return None;
    }
    let Some(data) = data else {
        warn!("Skipping tile {coord} with missing data in {filename}");
        return None;
    };
    Some(TileRecord { coord, data })
}

/// Overwrite the payload stored at `coord`.
/// Fails with [`MbtError::TileNotFound`] if no row matches.
pub(crate) async fn write_tile_data<T>(
    conn: &mut T,
    filename: &str,
    coord: TileCoord,
    data: &[u8],
) -> MbtResult<()>
where
    for<'e> &'e mut T: SqliteExecutor<'e>,
{
    let key = (i64::from(coord.z), i64::from(coord.x), i64::from(coord.y));
    match queries::update_tile_data(conn, key, data).await? {
        0 => Err(MbtError::TileNotFound(filename.to_string(), coord)),
        _ => Ok(()),
    }
}

impl TileStore {
    /// Lowest and highest zoom levels present in the store, or `None` if it has no tiles.
    pub async fn zoom_bounds(&mut self) -> MbtResult<Option<ZoomRange>> {
        let (min, max) = queries::zoom_bounds(&mut self.conn).await?;
        let (Some(min), Some(max)) = (min, max) else {
            return Ok(None);
        };
        Ok(Some(ZoomRange {
            min: self.checked_zoom(min)?,
            max: self.checked_zoom(max)?,
        }))
    }

    pub async fn max_zoom(&mut self) -> MbtResult<Option<u8>> {
        Ok(self.zoom_bounds().await?.map(|r| r.max))
    }

    fn checked_zoom(&self, zoom: i64) -> MbtResult<u8> {
        u8::try_from(zoom)
            .ok()
            .filter(|z| *z <= MAX_ZOOM)
            .ok_or_else(|| MbtError::InvalidZoomValue(self.filename().to_string(), zoom))
    }

    /// Turn a caller-requested zoom range into one the store can satisfy.
    ///
    /// A missing minimum means 0. A missing maximum, or one above the highest zoom in the store,
    /// is clamped to that highest zoom. Returns `None` if the store has no tiles or the range is empty.
    pub async fn resolve_zoom_range(
        &mut self,
        min_zoom: Option<u8>,
        max_zoom: Option<u8>,
    ) -> MbtResult<Option<ZoomRange>> {
        let Some(store_max) = self.max_zoom().await? else {
            return Ok(None);
        };
        let min = min_zoom.unwrap_or(0);
        let max = max_zoom.map_or(store_max, |z| z.min(store_max));
        Ok((min <= max).then_some(ZoomRange { min, max }))
    }

    /// Number of distinct tiles within the zoom range.
    pub async fn count_tiles(&mut self, zoom: ZoomRange) -> MbtResult<u64> {
        queries::count_tiles(&mut self.conn, self.schema, zoom).await
    }

    /// Get the stored payload of a tile, with `y` in bottom-origin numbering.
    pub async fn get_tile(&mut self, coord: TileCoord) -> MbtResult<Option<Vec<u8>>> {
        queries::get_tile(&mut self.conn, coord.z, coord.x, coord.y).await
    }

    /// Stream tiles in the zoom range without loading them all into memory.
    ///
    /// With `order_by_zoom`, tiles come in ascending zoom order, and by column and row within a zoom.
    /// Without it, the order is whatever the database returns.
    /// A view yields each address once, even if its join repeats rows.
    pub fn iter_tiles(
        &mut self,
        zoom: ZoomRange,
        order_by_zoom: bool,
    ) -> impl Stream<Item = MbtResult<TileRecord>> + '_ {
        let sql = match (self.schema, order_by_zoom) {
            (SchemaKind::Table, false) => {
                "SELECT zoom_level, tile_column, tile_row, tile_data
                 FROM tiles
                 WHERE zoom_level BETWEEN ? AND ?"
            }
            (SchemaKind::Table, true) => {
                "SELECT zoom_level, tile_column, tile_row, tile_data
                 FROM tiles
                 WHERE zoom_level BETWEEN ? AND ?
                 ORDER BY zoom_level, tile_column, tile_row"
            }
            (SchemaKind::View, false) => {
                "SELECT zoom_level, tile_column, tile_row, tile_data
                 FROM tiles
                 WHERE zoom_level BETWEEN ? AND ?
                 GROUP BY zoom_level, tile_column, tile_row"
            }
            (SchemaKind::View, true) => {
                "SELECT zoom_level, tile_column, tile_row, tile_data
                 FROM tiles
                 WHERE zoom_level BETWEEN ? AND ?
                 GROUP BY zoom_level, tile_column, tile_row
                 ORDER BY zoom_level, tile_column, tile_row"
            }
        };
        let filename = self.filename.as_str();
        query_as::<_, TileRow>(sql)
            .bind(zoom.min)
            .bind(zoom.max)
            .fetch(&mut self.conn)
            .map_err(MbtError::from)
            .try_filter_map(move |row| ready(Ok(to_record(filename, row))))
    }

    /// Overwrite the payload of a single tile, with `y` in bottom-origin numbering.
    ///
    /// A view is first rebuilt into a table, once, since it cannot be updated directly.
    /// Batch jobs write through `write_tile_data` inside their own transaction.
    pub async fn rewrite_payload(&mut self, coord: TileCoord, data: &[u8]) -> MbtResult<()> {
        if self.schema == SchemaKind::View {
            self.materialize_view().await?;
        }
        write_tile_data(&mut self.conn, &self.filename, coord, data).await
    }

    /// Replace a `tiles` view with an equivalent table with a unique `(zoom, column, row)` index.
    /// Does nothing if the store already has a table.
    pub async fn materialize_view(&mut self) -> MbtResult<()> {
        if self.schema == SchemaKind::Table {
            return Ok(());
        }
        let copied = queries::materialize_tiles_view(&mut self.conn).await?;
        self.schema = SchemaKind::Table;
        info!("Converted the tiles view of {self} into a table with {copied} tiles");
        Ok(())
    }
}
