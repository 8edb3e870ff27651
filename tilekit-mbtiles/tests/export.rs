use std::path::Path;

use futures::TryStreamExt as _;
use pretty_assertions::assert_eq;
use rstest::rstest;
use tempfile::TempDir;
use tilekit_mbtiles::{
    AccessMode, DirectoryExport, FailureKind, MbtError, METADATA_FILE, TileStore, ZoomRange,
};
use tilekit_tile_utils::TileScheme;
use walkdir::WalkDir;

mod utils;
use utils::{pyramid, table_store, view_store};

const METADATA: &[(&str, &str)] = &[
    ("name", "fixture"),
    ("format", "png"),
    ("minzoom", "0"),
    ("maxzoom", "1"),
    ("json", r#"{"vector_layers":[]}"#),
];

/// Files below `root`, relative and sorted, with their content.
fn list_files(root: &Path) -> Vec<(String, String)> {
    let mut files: Vec<_> = WalkDir::new(root)
        .into_iter()
        .map(Result::unwrap)
        .filter(|e| e.file_type().is_file())
        .map(|e| {
            let rel = e.path().strip_prefix(root).unwrap();
            let rel = rel.to_string_lossy().replace('\\', "/");
            let content = String::from_utf8_lossy(&std::fs::read(e.path()).unwrap()).to_string();
            (rel, content)
        })
        .collect();
    files.sort();
    files
}

#[rstest]
#[case::tms(TileScheme::Tms, ["1/0/0", "1/0/1", "1/1/0", "1/1/1"])]
#[case::xyz(TileScheme::Xyz, ["1/0/1", "1/0/0", "1/1/1", "1/1/0"])]
#[tokio::test]
async fn unpack_pyramid(#[case] scheme: TileScheme, #[case] payloads: [&str; 4]) {
    let names = ["1/0/0.png", "1/0/1.png", "1/1/0.png", "1/1/1.png"];
    let dir = TempDir::new().unwrap();
    let input = table_store(&dir, "world.mbtiles", METADATA, &pyramid()).await;
    let output = dir.path().join("world");

    let export = DirectoryExport {
        scheme,
        ..DirectoryExport::new(input, output.clone())
    };
    let report = export.run().await.unwrap();
    assert_eq!(report.processed, 5);
    assert_eq!(report.succeeded, 5);
    assert!(report.is_clean());

    let mut expected = vec![("0/0/0.png".to_string(), "0/0/0".to_string())];
    for (name, payload) in names.iter().zip(payloads) {
        expected.push(((*name).to_string(), payload.to_string()));
    }
    expected.push((METADATA_FILE.to_string(), String::new()));
    expected.sort();

    let files: Vec<_> = list_files(&output)
        .into_iter()
        .map(|(name, content)| {
            if name == METADATA_FILE {
                (name, String::new())
            } else {
                (name, content)
            }
        })
        .collect();
    assert_eq!(files, expected);
}

#[tokio::test]
async fn unpack_writes_full_metadata() {
    let dir = TempDir::new().unwrap();
    let input = table_store(&dir, "world.mbtiles", METADATA, &pyramid()).await;
    let output = dir.path().join("out");
    DirectoryExport::new(input, output.clone()).run().await.unwrap();

    let metadata = std::fs::read_to_string(output.join(METADATA_FILE)).unwrap();
    insta::assert_snapshot!(metadata, @r#"
    {
      "format": "png",
      "json": "{\"vector_layers\":[]}",
      "maxzoom": "1",
      "minzoom": "0",
      "name": "fixture"
    }
    "#);
}

#[tokio::test]
async fn unpack_clamps_zoom() {
    let dir = TempDir::new().unwrap();
    let input = table_store(&dir, "world.mbtiles", METADATA, &pyramid()).await;

    let output = dir.path().join("high");
    let export = DirectoryExport {
        min_zoom: Some(1),
        max_zoom: Some(12),
        ..DirectoryExport::new(input.clone(), output.clone())
    };
    let report = export.run().await.unwrap();
    assert_eq!(report.processed, 4);
    assert!(!output.join("0").exists());
    assert!(output.join("1/1/1.png").is_file());

    let output = dir.path().join("empty");
    let export = DirectoryExport {
        min_zoom: Some(5),
        ..DirectoryExport::new(input, output.clone())
    };
    let report = export.run().await.unwrap();
    assert_eq!(report.processed, 0);
    assert!(output.join(METADATA_FILE).is_file());
}

#[tokio::test]
async fn unpack_unknown_format_has_no_extension() {
    let dir = TempDir::new().unwrap();
    let rows = vec![(0, 0, 0, b"tile".to_vec())];
    let input = table_store(&dir, "raw.mbtiles", &[("format", "tiff")], &rows).await;
    let output = dir.path().join("raw");
    DirectoryExport::new(input, output.clone()).run().await.unwrap();
    assert_eq!(std::fs::read(output.join("0/0/0")).unwrap(), b"tile");
}

#[tokio::test]
async fn unpack_reports_write_failures() {
    let dir = TempDir::new().unwrap();
    let input = table_store(&dir, "world.mbtiles", METADATA, &pyramid()).await;
    let output = dir.path().join("blocked");
    std::fs::create_dir_all(&output).unwrap();
    // a file where the zoom 1 directory should go
    std::fs::write(output.join("1"), b"").unwrap();

    let report = DirectoryExport::new(input, output.clone()).run().await.unwrap();
    assert_eq!(report.processed, 5);
    assert_eq!(report.succeeded, 1);
    assert_eq!(report.failures_of(FailureKind::Write), 4);
    assert!(output.join("0/0/0.png").is_file());
}

#[tokio::test]
async fn missing_input_creates_nothing() {
    let dir = TempDir::new().unwrap();
    let output = dir.path().join("out");
    let err = DirectoryExport::new(dir.path().join("nope.mbtiles"), output.clone())
        .run()
        .await
        .unwrap_err();
    assert!(matches!(err, MbtError::StoreNotFound(_)));
    assert!(!output.exists());
}

#[tokio::test]
async fn view_counts_distinct_tiles() {
    let dir = TempDir::new().unwrap();
    let input = view_store(&dir, "dedup.mbtiles", METADATA, &pyramid()).await;
    let mut store = TileStore::open(&input, AccessMode::ReadOnly).await.unwrap();

    assert_eq!(store.count_tiles(ZoomRange::ALL).await.unwrap(), 5);
    assert_eq!(store.count_tiles(ZoomRange::single(1)).await.unwrap(), 4);
    assert_eq!(
        store.zoom_bounds().await.unwrap(),
        Some(ZoomRange { min: 0, max: 1 })
    );
    assert_eq!(
        store.resolve_zoom_range(None, Some(20)).await.unwrap(),
        Some(ZoomRange { min: 0, max: 1 })
    );
    assert_eq!(store.resolve_zoom_range(Some(3), None).await.unwrap(), None);
}

#[rstest]
#[case::ordered(true)]
#[case::unordered(false)]
#[tokio::test]
async fn view_streams_each_tile_once(#[case] order_by_zoom: bool) {
    let dir = TempDir::new().unwrap();
    let input = view_store(&dir, "dedup.mbtiles", METADATA, &pyramid()).await;
    let mut store = TileStore::open(&input, AccessMode::ReadOnly).await.unwrap();

    let mut coords: Vec<_> = store
        .iter_tiles(ZoomRange::ALL, order_by_zoom)
        .map_ok(|tile| tile.coord.to_string())
        .try_collect()
        .await
        .unwrap();
    coords.sort();
    assert_eq!(coords, ["0/0/0", "1/0/0", "1/0/1", "1/1/0", "1/1/1"]);
}

#[tokio::test]
async fn unpack_view_writes_each_tile_once() {
    let dir = TempDir::new().unwrap();
    let input = view_store(&dir, "dedup.mbtiles", METADATA, &pyramid()).await;
    let output = dir.path().join("dedup");

    let report = DirectoryExport::new(input, output.clone()).run().await.unwrap();
    assert_eq!(report.processed, 5);
    assert_eq!(report.succeeded, 5);
    assert_eq!(list_files(&output).len(), 6);
}

#[tokio::test]
async fn summary_of_raster_store() {
    let dir = TempDir::new().unwrap();
    let input = view_store(&dir, "dedup.mbtiles", METADATA, &pyramid()).await;
    let mut store = TileStore::open(&input, AccessMode::ReadOnly).await.unwrap();
    let summary = store.summary().await.unwrap();

    assert!(summary.file_size.is_some_and(|s| s > 0));
    assert_eq!(summary.tile_count, 5);
    assert_eq!(summary.metadata.get("json").map(String::as_str), Some(r#"{"vector_layers":[]}"#));
    assert!(summary.vector_layers.is_empty());
    insta::assert_json_snapshot!(summary, {".file_size" => "[size]"}, @r#"
    {
      "file_size": "[size]",
      "schema": "view",
      "tile_kind": "raster",
      "zoom": {
        "min": 0,
        "max": 1
      },
      "tile_count": 5,
      "metadata": {
        "format": "png",
        "json": "{\"vector_layers\":[]}",
        "maxzoom": "1",
        "minzoom": "0",
        "name": "fixture"
      },
      "vector_layers": []
    }
    "#);
}
