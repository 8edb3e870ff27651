use std::path::Path;

use sqlx::sqlite::SqliteConnectOptions;
use sqlx::{Pool, Sqlite, SqlitePool};
use tilekit_tile_utils::TileCoord;
use tracing::debug;

use crate::errors::{MbtError, MbtResult};
use crate::store::file_stem;
use crate::{SchemaKind, queries};

/// Read-only connection pool over one `MBTiles` file, for concurrent tile lookups.
///
/// Cloning is cheap and shares the same pool.
#[derive(Clone, Debug)]
pub struct TileStorePool {
    filepath: String,
    filename: String,
    schema: SchemaKind,
    pool: Pool<Sqlite>,
}

impl TileStorePool {
    pub async fn open_readonly<P: AsRef<Path>>(filepath: P) -> MbtResult<Self> {
        let path = filepath.as_ref();
        if !path.is_file() {
            return Err(MbtError::StoreNotFound(path.to_path_buf()));
        }
        let filepath = path
            .to_str()
            .ok_or_else(|| MbtError::UnsupportedCharsInFilepath(path.to_path_buf()))?
            .to_string();
        let filename = file_stem(path);

        debug!("Opening {filepath} as a read-only pool");
        let opt = SqliteConnectOptions::new()
            .filename(&filepath)
            .read_only(true);
        let pool = SqlitePool::connect_with(opt).await?;
        let mut conn = pool.acquire().await?;
        let schema = SchemaKind::detect(&mut *conn, &filename).await?;
        drop(conn);

        Ok(Self {
            filepath,
            filename,
            schema,
            pool,
        })
    }

    #[must_use]
    pub fn filepath(&self) -> &str {
        &self.filepath
    }

    #[must_use]
    pub fn filename(&self) -> &str {
        &self.filename
    }

    #[must_use]
    pub fn schema(&self) -> SchemaKind {
        self.schema
    }

    pub async fn get_metadata_value(&self, key: &str) -> MbtResult<Option<String>> {
        let mut conn = self.pool.acquire().await?;
        queries::get_metadata_value(&mut *conn, key).await
    }

    /// All rows of the metadata table as `(name, value)` pairs, NULLs included.
    pub async fn metadata_rows(&self) -> MbtResult<Vec<(Option<String>, Option<String>)>> {
        let mut conn = self.pool.acquire().await?;
        queries::metadata_rows(&mut *conn).await
    }

    /// Look up a tile by its exact stored address (`y` in bottom-origin numbering).
    pub async fn get_tile(&self, coord: TileCoord) -> MbtResult<Option<Vec<u8>>> {
        let mut conn = self.pool.acquire().await?;
        queries::get_tile(&mut *conn, coord.z, coord.x, coord.y).await
    }
}
