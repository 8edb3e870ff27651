use sqlx::{Connection as _, SqliteConnection, SqliteExecutor, query, query_as, query_scalar};
use tracing::debug;

use crate::errors::MbtResult;
use crate::{SchemaKind, ZoomRange};

/// One raw row of the `tiles` relation, before any validation.
pub(crate) type TileRow = (i64, i64, i64, Option<Vec<u8>>);

/// Returns the `sqlite_master` type of the `tiles` relation, if there is one.
pub async fn tiles_relation_type<T>(conn: &mut T) -> MbtResult<Option<String>>
where
    for<'e> &'e mut T: SqliteExecutor<'e>,
{
    Ok(
        query_scalar::<_, String>("SELECT type FROM sqlite_master WHERE name = 'tiles'")
            .fetch_optional(&mut *conn)
            .await?,
    )
}

/// Get a single metadata value from the metadata table
pub async fn get_metadata_value<T>(conn: &mut T, key: &str) -> MbtResult<Option<String>>
where
    for<'e> &'e mut T: SqliteExecutor<'e>,
{
    Ok(
        query_scalar::<_, Option<String>>("SELECT value FROM metadata WHERE name = ?")
            .bind(key)
            .fetch_optional(&mut *conn)
            .await?
            .flatten(),
    )
}

/// All `(name, value)` rows of the metadata table, in storage order.
pub async fn metadata_rows<T>(conn: &mut T) -> MbtResult<Vec<(Option<String>, Option<String>)>>
where
    for<'e> &'e mut T: SqliteExecutor<'e>,
{
    Ok(query_as("SELECT name, value FROM metadata")
        .fetch_all(&mut *conn)
        .await?)
}

pub async fn get_tile<T>(conn: &mut T, z: u8, x: u32, y: u32) -> MbtResult<Option<Vec<u8>>>
where
    for<'e> &'e mut T: SqliteExecutor<'e>,
{
    let data = query_scalar::<_, Option<Vec<u8>>>(
        "SELECT tile_data FROM tiles WHERE zoom_level = ? AND tile_column = ? AND tile_row = ? LIMIT 1",
    )
    .bind(z)
    .bind(x)
    .bind(y)
    .fetch_optional(&mut *conn)
    .await?;
    Ok(data.flatten())
}

/// Lowest and highest `zoom_level` present in the `tiles` relation.
pub async fn zoom_bounds<T>(conn: &mut T) -> MbtResult<(Option<i64>, Option<i64>)>
where
    for<'e> &'e mut T: SqliteExecutor<'e>,
{
    Ok(query_as("SELECT MIN(zoom_level), MAX(zoom_level) FROM tiles")
        .fetch_one(&mut *conn)
        .await?)
}

/// Count tiles within the zoom range.
///
/// Views joining deduplicated payloads may return a tile more than once,
/// so for them the distinct `(zoom, column, row)` triples are counted instead.
pub async fn count_tiles<T>(conn: &mut T, schema: SchemaKind, zoom: ZoomRange) -> MbtResult<u64>
where
    for<'e> &'e mut T: SqliteExecutor<'e>,
{
    let sql = match schema {
        SchemaKind::Table => "SELECT COUNT(*) FROM tiles WHERE zoom_level BETWEEN ? AND ?",
        SchemaKind::View => {
            "SELECT COUNT(*) FROM (
                 SELECT DISTINCT zoom_level, tile_column, tile_row
                 FROM tiles
                 WHERE zoom_level BETWEEN ? AND ?)"
        }
    };
    let count: i64 = query_scalar(sql)
        .bind(zoom.min)
        .bind(zoom.max)
        .fetch_one(&mut *conn)
        .await?;
    Ok(u64::try_from(count).unwrap_or_default())
}

/// Up to `limit` rows strictly after the `after` triple, ordered by `(zoom, column, row)`.
pub(crate) async fn tiles_page<T>(
    conn: &mut T,
    after: (i64, i64, i64),
    limit: u32,
) -> MbtResult<Vec<TileRow>>
where
    for<'e> &'e mut T: SqliteExecutor<'e>,
{
    Ok(query_as(
        "SELECT zoom_level, tile_column, tile_row, tile_data
         FROM tiles
         WHERE (zoom_level, tile_column, tile_row) > (?, ?, ?)
         ORDER BY zoom_level, tile_column, tile_row
         LIMIT ?",
    )
    .bind(after.0)
    .bind(after.1)
    .bind(after.2)
    .bind(limit)
    .fetch_all(&mut *conn)
    .await?)
}

/// Overwrite the payload of one tile, returning the number of updated rows.
pub async fn update_tile_data<T>(
    conn: &mut T,
    (z, x, y): (i64, i64, i64),
    data: &[u8],
) -> MbtResult<u64>
where
    for<'e> &'e mut T: SqliteExecutor<'e>,
{
    let res = query(
        "UPDATE tiles SET tile_data = ? WHERE zoom_level = ? AND tile_column = ? AND tile_row = ?",
    )
    .bind(data)
    .bind(z)
    .bind(x)
    .bind(y)
    .execute(&mut *conn)
    .await?;
    Ok(res.rows_affected())
}

pub async fn create_tile_index<T>(conn: &mut T) -> MbtResult<()>
where
    for<'e> &'e mut T: SqliteExecutor<'e>,
{
    query(
        "CREATE UNIQUE INDEX IF NOT EXISTS tile_index ON tiles (zoom_level, tile_column, tile_row)",
    )
    .execute(&mut *conn)
    .await?;
    Ok(())
}

/// Replace a `tiles` view with a physical table holding one row per tile, plus a unique index.
///
/// All steps run in a single transaction, so readers never observe the intermediate state
/// where the view is gone but the table is not yet renamed.
pub async fn materialize_tiles_view(conn: &mut SqliteConnection) -> MbtResult<u64> {
    let mut tx = conn.begin().await?;
    query(
        "CREATE TABLE tiles_new (
             zoom_level  INTEGER NOT NULL,
             tile_column INTEGER NOT NULL,
             tile_row    INTEGER NOT NULL,
             tile_data   BLOB)",
    )
    .execute(&mut *tx)
    .await?;
    let copied = query(
        "INSERT INTO tiles_new (zoom_level, tile_column, tile_row, tile_data)
         SELECT zoom_level, tile_column, tile_row, tile_data
         FROM tiles
         GROUP BY zoom_level, tile_column, tile_row",
    )
    .execute(&mut *tx)
    .await?
    .rows_affected();
    query("DROP VIEW tiles").execute(&mut *tx).await?;
    query("ALTER TABLE tiles_new RENAME TO tiles")
        .execute(&mut *tx)
        .await?;
    query("CREATE UNIQUE INDEX tile_index ON tiles (zoom_level, tile_column, tile_row)")
        .execute(&mut *tx)
        .await?;
    tx.commit().await?;
    debug!("Materialized {copied} tiles from the tiles view");
    Ok(copied)
}

/// Names of the indexes defined on the `tiles` relation.
pub async fn tiles_indexes<T>(conn: &mut T) -> MbtResult<Vec<String>>
where
    for<'e> &'e mut T: SqliteExecutor<'e>,
{
    Ok(query_scalar(
        "SELECT name FROM sqlite_master WHERE type = 'index' AND tbl_name = 'tiles' ORDER BY name",
    )
    .fetch_all(&mut *conn)
    .await?)
}
