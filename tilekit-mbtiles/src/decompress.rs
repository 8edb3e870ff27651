use std::path::Path;

use sqlx::Connection as _;
use tilekit_tile_utils::{Compression, try_decompress};
use tracing::{info, warn};

use crate::errors::{MbtError, MbtResult};
use crate::queries;
use crate::report::{BatchReport, FailureKind};
use crate::tiles::{to_record, write_tile_data};
use crate::{AccessMode, SchemaKind, TileStore};

/// Rows fetched per round trip while rewriting payloads.
const BATCH_SIZE: u32 = 1000;

impl TileStore {
    /// Replace every compressed payload in the store with its decompressed bytes.
    ///
    /// A view is rebuilt into a table before the first write. Raw payloads are left alone,
    /// and so are payloads that fail to decompress, which are recorded in the report.
    /// All updates are committed together at the end.
    pub async fn decompress_in_place(&mut self) -> MbtResult<BatchReport> {
        let was_view = self.schema == SchemaKind::View;
        self.materialize_view().await?;

        let mut report = BatchReport::default();
        let mut decompressed = 0_u64;
        let mut tx = self.conn.begin().await?;
        let mut after = (i64::MIN, i64::MIN, i64::MIN);
        loop {
            let page = queries::tiles_page(&mut *tx, after, BATCH_SIZE).await?;
            let Some(&(z, x, y, _)) = page.last() else {
                break;
            };
            after = (z, x, y);

            for row in page {
                let Some(tile) = to_record(&self.filename, row) else {
                    continue;
                };
                report.processed += 1;
                if !Compression::sniff(&tile.data).is_compressed() {
                    report.succeeded += 1;
                    continue;
                }
                match try_decompress(tile.data) {
                    Ok(data) => {
                        write_tile_data(&mut *tx, &self.filename, tile.coord, &data).await?;
                        decompressed += 1;
                        report.succeeded += 1;
                    }
                    Err(err) => report.fail(tile.coord, FailureKind::Decompression, err),
                }
            }
        }
        tx.commit().await?;

        if !was_view
            && let Err(err) = queries::create_tile_index(&mut self.conn).await
        {
            warn!("Unable to create a unique tile index in {}: {err}", self.filepath());
        }
        info!("Decompressed {decompressed} tiles in {}: {report}", self.filepath());
        Ok(report)
    }
}

/// Copy `input` to `output`, replacing any existing file, then decompress the copy in place.
pub async fn decompress_copy(input: &Path, output: &Path) -> MbtResult<BatchReport> {
    if !input.is_file() {
        return Err(MbtError::StoreNotFound(input.to_path_buf()));
    }
    let write_err = |source| MbtError::WriteError {
        path: output.to_path_buf(),
        source,
    };
    if tokio::fs::try_exists(output).await.map_err(write_err)? {
        info!("Replacing existing {}", output.display());
        tokio::fs::remove_file(output).await.map_err(write_err)?;
    }
    tokio::fs::copy(input, output).await.map_err(write_err)?;

    let mut store = TileStore::open(output, AccessMode::ReadWrite).await?;
    let report = store.decompress_in_place().await?;
    store.close().await?;
    Ok(report)
}
