use std::ffi::OsStr;
use std::fmt::{Display, Formatter};
use std::path::Path;

use enum_display::EnumDisplay;
use serde::Serialize;
use sqlx::sqlite::SqliteConnectOptions;
use sqlx::{Connection as _, SqliteConnection, SqliteExecutor};
use tracing::debug;

use crate::errors::{MbtError, MbtResult};
use crate::queries;

/// Shape of the `tiles` relation.
#[derive(Debug, Clone, Copy, Hash, PartialEq, Eq, Serialize, EnumDisplay)]
#[enum_display(case = "Kebab")]
#[serde(rename_all = "lowercase")]
pub enum SchemaKind {
    /// A physical table that can be updated in place
    Table,
    /// A view, usually joining a `map` table with deduplicated `images`
    View,
}

impl SchemaKind {
    pub async fn detect<T>(conn: &mut T, filename: &str) -> MbtResult<Self>
    where
        for<'e> &'e mut T: SqliteExecutor<'e>,
    {
        match queries::tiles_relation_type(conn).await?.as_deref() {
            Some("table") => Ok(Self::Table),
            Some("view") => Ok(Self::View),
            Some(other) => Err(MbtError::UnsupportedTilesRelation(
                filename.to_string(),
                other.to_string(),
            )),
            None => Err(MbtError::MissingTilesRelation(filename.to_string())),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessMode {
    ReadOnly,
    ReadWrite,
}

/// An open `MBTiles` file and the connection used to read (and possibly modify) it.
///
/// The schema variant is detected once when the file is opened and kept up to date
/// when [`TileStore::materialize_view`](crate::TileStore::materialize_view) rebuilds a view.
#[derive(Debug)]
pub struct TileStore {
    filepath: String,
    pub(crate) filename: String,
    mode: AccessMode,
    pub(crate) schema: SchemaKind,
    pub(crate) conn: SqliteConnection,
}

impl Display for TileStore {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.filepath)
    }
}

impl TileStore {
    pub async fn open<P: AsRef<Path>>(filepath: P, mode: AccessMode) -> MbtResult<Self> {
        let path = filepath.as_ref();
        if !path.is_file() {
            return Err(MbtError::StoreNotFound(path.to_path_buf()));
        }
        let filepath = path
            .to_str()
            .ok_or_else(|| MbtError::UnsupportedCharsInFilepath(path.to_path_buf()))?
            .to_string();
        let filename = file_stem(path);

        debug!("Opening {filepath} in {mode:?} mode");
        let opt = SqliteConnectOptions::new()
            .filename(&filepath)
            .read_only(mode == AccessMode::ReadOnly);
        let mut conn = SqliteConnection::connect_with(&opt).await?;
        let schema = SchemaKind::detect(&mut conn, &filename).await?;
        debug!("{filename} stores tiles in a {schema}");

        Ok(Self {
            filepath,
            filename,
            mode,
            schema,
            conn,
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
    pub fn mode(&self) -> AccessMode {
        self.mode
    }

    #[must_use]
    pub fn schema(&self) -> SchemaKind {
        self.schema
    }

    /// Names of all indexes defined on the `tiles` relation.
    pub async fn tile_indexes(&mut self) -> MbtResult<Vec<String>> {
        queries::tiles_indexes(&mut self.conn).await
    }

    /// Flush and close the underlying connection.
    pub async fn close(self) -> MbtResult<()> {
        self.conn.close().await?;
        Ok(())
    }
}

pub(crate) fn file_stem(path: &Path) -> String {
    path.file_stem()
        .unwrap_or_else(|| OsStr::new("unknown"))
        .to_string_lossy()
        .to_string()
}
