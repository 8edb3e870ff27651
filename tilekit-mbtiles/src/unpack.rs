use std::path::{Path, PathBuf};

use futures::TryStreamExt as _;
use tilekit_tile_utils::{TileCoord, TileScheme};
use tracing::{debug, info, warn};

use crate::errors::{MbtError, MbtResult};
use crate::report::{BatchReport, FailureKind};
use crate::{AccessMode, TileStore};

/// File holding the store metadata at the root of an unpacked directory.
pub const METADATA_FILE: &str = "metadata.json";

/// Write every tile of a store as `<output_dir>/<z>/<x>/<y>.<ext>`, plus a `metadata.json`.
#[derive(Clone, Debug, PartialEq)]
pub struct DirectoryExport {
    pub input: PathBuf,
    pub output_dir: PathBuf,
    /// Row numbering of the written files
    pub scheme: TileScheme,
    pub min_zoom: Option<u8>,
    pub max_zoom: Option<u8>,
}

impl DirectoryExport {
    #[must_use]
    pub fn new(input: PathBuf, output_dir: PathBuf) -> Self {
        Self {
            input,
            output_dir,
            scheme: TileScheme::default(),
            min_zoom: None,
            max_zoom: None,
        }
    }

    pub async fn run(&self) -> MbtResult<BatchReport> {
        let mut store = TileStore::open(&self.input, AccessMode::ReadOnly).await?;
        let report = store
            .export_to_directory(&self.output_dir, self.scheme, self.min_zoom, self.max_zoom)
            .await?;
        store.close().await?;
        Ok(report)
    }
}

impl TileStore {
    /// Export tiles in the requested zoom range into a directory tree.
    ///
    /// Payloads are written exactly as stored. The metadata file is written first,
    /// even when no tile matches the range. Files that cannot be written are
    /// recorded in the report and the export moves on to the next tile.
    pub async fn export_to_directory(
        &mut self,
        output_dir: &Path,
        scheme: TileScheme,
        min_zoom: Option<u8>,
        max_zoom: Option<u8>,
    ) -> MbtResult<BatchReport> {
        create_dir(output_dir).await?;
        let metadata = self.read_metadata(true).await?;
        let metadata_path = output_dir.join(METADATA_FILE);
        let json = serde_json::to_vec_pretty(&metadata)?;
        tokio::fs::write(&metadata_path, json)
            .await
            .map_err(|source| MbtError::WriteError {
                path: metadata_path,
                source,
            })?;

        let mut report = BatchReport::default();
        let Some(zoom) = self.resolve_zoom_range(min_zoom, max_zoom).await? else {
            info!("No tiles to export from {self} in the requested zoom range");
            return Ok(report);
        };

        let format = self.detect_format().await?;
        let extension = format.extension();
        if extension.is_none() {
            warn!("Unknown tile format in {self}, tile files will have no extension");
        }
        let total = self.count_tiles(zoom).await?;
        info!(
            "Exporting {total} tiles at zoom {zoom} from {self} into {} using {scheme} rows",
            output_dir.display()
        );

        let mut tiles = self.iter_tiles(zoom, true);
        while let Some(tile) = tiles.try_next().await? {
            report.processed += 1;
            let coord = TileCoord {
                y: scheme.translate_row(tile.coord.z, tile.coord.y),
                ..tile.coord
            };
            let path = tile_path(output_dir, coord, extension);
            match write_tile(&path, &tile.data).await {
                Ok(()) => report.succeeded += 1,
                Err(err) => report.fail(coord, FailureKind::Write, err),
            }
        }

        info!("Finished exporting into {}: {report}", output_dir.display());
        Ok(report)
    }
}

fn tile_path(output_dir: &Path, coord: TileCoord, extension: Option<&str>) -> PathBuf {
    let dir = output_dir.join(coord.z.to_string()).join(coord.x.to_string());
    match extension {
        Some(ext) => dir.join(format!("{}.{ext}", coord.y)),
        None => dir.join(coord.y.to_string()),
    }
}

async fn create_dir(path: &Path) -> MbtResult<()> {
    tokio::fs::create_dir_all(path)
        .await
        .map_err(|source| MbtError::WriteError {
            path: path.to_path_buf(),
            source,
        })
}

async fn write_tile(path: &Path, data: &[u8]) -> MbtResult<()> {
    if let Some(dir) = path.parent() {
        create_dir(dir).await?;
    }
    debug!("Writing {}", path.display());
    tokio::fs::write(path, data)
        .await
        .map_err(|source| MbtError::WriteError {
            path: path.to_path_buf(),
            source,
        })
}
