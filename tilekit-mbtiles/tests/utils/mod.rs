#![allow(dead_code)]

use std::path::{Path, PathBuf};

use sqlx::sqlite::SqliteConnectOptions;
use sqlx::{Connection as _, Executor as _, SqliteConnection, query};
use tempfile::TempDir;

/// One tile row as stored: `(zoom, column, tms row, data)`.
pub type Row = (u8, u32, u32, Vec<u8>);

/// A zoom 0 tile plus the four zoom 1 tiles, each payload naming its stored address.
#[must_use]
pub fn pyramid() -> Vec<Row> {
    let mut rows = vec![(0, 0, 0, b"0/0/0".to_vec())];
    for x in 0..2 {
        for y in 0..2 {
            rows.push((1, x, y, format!("1/{x}/{y}").into_bytes()));
        }
    }
    rows
}

async fn connect(dir: &TempDir, name: &str) -> (PathBuf, SqliteConnection) {
    let path = dir.path().join(name);
    let opt = SqliteConnectOptions::new()
        .filename(&path)
        .create_if_missing(true);
    let conn = SqliteConnection::connect_with(&opt).await.unwrap();
    (path, conn)
}

async fn insert_metadata(conn: &mut SqliteConnection, metadata: &[(&str, &str)]) {
    conn.execute("CREATE TABLE metadata (name text, value text);")
        .await
        .unwrap();
    for (name, value) in metadata {
        query("INSERT INTO metadata (name, value) VALUES (?, ?)")
            .bind(*name)
            .bind(*value)
            .execute(&mut *conn)
            .await
            .unwrap();
    }
}

/// Create a store with a flat `tiles` table.
pub async fn table_store(
    dir: &TempDir,
    name: &str,
    metadata: &[(&str, &str)],
    rows: &[Row],
) -> PathBuf {
    let (path, mut conn) = connect(dir, name).await;
    insert_metadata(&mut conn, metadata).await;
    conn.execute(
        "CREATE TABLE tiles (
             zoom_level integer,
             tile_column integer,
             tile_row integer,
             tile_data blob);",
    )
    .await
    .unwrap();
    for (z, x, y, data) in rows {
        query("INSERT INTO tiles VALUES (?, ?, ?, ?)")
            .bind(*z)
            .bind(*x)
            .bind(*y)
            .bind(data.as_slice())
            .execute(&mut conn)
            .await
            .unwrap();
    }
    conn.close().await.unwrap();
    path
}

/// Create a store whose `tiles` relation is a view over `map` and `images`.
///
/// Every image is stored twice, so the view returns two rows per tile.
pub async fn view_store(
    dir: &TempDir,
    name: &str,
    metadata: &[(&str, &str)],
    rows: &[Row],
) -> PathBuf {
    let (path, mut conn) = connect(dir, name).await;
    insert_metadata(&mut conn, metadata).await;
    conn.execute(
        "CREATE TABLE map (zoom_level integer, tile_column integer, tile_row integer, tile_id text);
         CREATE TABLE images (tile_id text, tile_data blob);
         CREATE VIEW tiles AS
             SELECT map.zoom_level AS zoom_level,
                    map.tile_column AS tile_column,
                    map.tile_row AS tile_row,
                    images.tile_data AS tile_data
             FROM map JOIN images ON map.tile_id = images.tile_id;",
    )
    .await
    .unwrap();
    for (z, x, y, data) in rows {
        let id = format!("{z}-{x}-{y}");
        query("INSERT INTO map VALUES (?, ?, ?, ?)")
            .bind(*z)
            .bind(*x)
            .bind(*y)
            .bind(&id)
            .execute(&mut conn)
            .await
            .unwrap();
        for _ in 0..2 {
            query("INSERT INTO images VALUES (?, ?)")
                .bind(&id)
                .bind(data.as_slice())
                .execute(&mut conn)
                .await
                .unwrap();
        }
    }
    conn.close().await.unwrap();
    path
}

/// Read every row of a store ordered by address, bypassing the library.
pub async fn read_rows(path: &Path) -> Vec<(i64, i64, i64, Vec<u8>)> {
    let opt = SqliteConnectOptions::new().filename(path).read_only(true);
    let mut conn = SqliteConnection::connect_with(&opt).await.unwrap();
    let rows = sqlx::query_as(
        "SELECT zoom_level, tile_column, tile_row, tile_data FROM tiles
         ORDER BY zoom_level, tile_column, tile_row",
    )
    .fetch_all(&mut conn)
    .await
    .unwrap();
    conn.close().await.unwrap();
    rows
}
