use actix_web::http::Method;
use actix_web::web::Data;
use actix_web::{HttpRequest, HttpResponse};
use tilekit_mbtiles::TileStorePool;
use tilekit_tile_utils::{TileCoord, TileScheme, stored_zoom, tiles_per_axis};
use tracing::{debug, info, trace, warn};

use crate::config::{ServiceConfig, TileExt};
use crate::{ServeError, TilekitResult};

/// What a request path asks for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    Metadata,
    /// A tile at its stored address
    Tile(TileCoord),
}

/// Maps presented request addresses to stored ones. Fixed at startup.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TileAddressing {
    pub zoom_offset: i32,
    pub scheme: TileScheme,
    /// Presented zoom bounds, when the store declares them
    pub min_zoom: Option<i64>,
    pub max_zoom: Option<i64>,
}

impl TileAddressing {
    /// Bounds as presented to clients: `max(stored + offset, 0)`.
    #[must_use]
    pub fn presented_zoom(&self, stored: i64) -> i64 {
        stored.saturating_add(i64::from(self.zoom_offset)).max(0)
    }

    pub fn route(&self, path: &str) -> Result<Route, ServeError> {
        let invalid = || ServeError::InvalidPath(path.to_string());
        let mut segments = path.strip_prefix('/').unwrap_or(path).split('/');

        let first = segments.next().unwrap_or_default();
        if first == "metadata" {
            return Ok(Route::Metadata);
        }
        let (Some(column), Some(row_ext)) = (segments.next(), segments.next()) else {
            return Err(invalid());
        };

        let zoom: i64 = first.parse().map_err(|_| invalid())?;
        let column: i64 = column.parse().map_err(|_| invalid())?;
        let row: i64 = match row_ext.split('.').collect::<Vec<_>>().as_slice() {
            [row, ext] if !row.is_empty() && !ext.is_empty() => {
                row.parse().map_err(|_| invalid())?
            }
            _ => return Err(invalid()),
        };

        if let (Some(min), Some(max)) = (self.min_zoom, self.max_zoom)
            && !(min..=max).contains(&zoom)
        {
            return Err(ServeError::ZoomNotAvailable {
                path: path.to_string(),
                zoom,
                min,
                max,
            });
        }

        let z = stored_zoom(zoom, self.zoom_offset).map_err(|_| ServeError::ZoomOutOfRange {
            path: path.to_string(),
            zoom,
        })?;
        let in_grid = |v: i64| {
            u32::try_from(v)
                .ok()
                .filter(|v| u64::from(*v) < tiles_per_axis(z))
                .ok_or_else(|| ServeError::TileNotFound(path.to_string()))
        };
        let x = in_grid(column)?;
        let y = in_grid(row)?;

        Ok(Route::Tile(TileCoord {
            z,
            x,
            y: self.scheme.translate_row(z, y),
        }))
    }
}

/// Shared state of all request handlers.
#[derive(Clone, Debug)]
pub struct TileService {
    pub store: TileStorePool,
    pub tile_ext: TileExt,
    pub addressing: TileAddressing,
}

impl TileService {
    /// Open the store and compute the presented zoom bounds from its metadata.
    pub async fn new(config: &ServiceConfig) -> TilekitResult<Self> {
        let store = TileStorePool::open_readonly(&config.mbtiles).await?;
        let mut addressing = TileAddressing {
            zoom_offset: config.zoom_offset,
            scheme: config.scheme,
            ..Default::default()
        };
        addressing.min_zoom = zoom_bound(&store, "minzoom")
            .await?
            .map(|v| addressing.presented_zoom(v));
        addressing.max_zoom = zoom_bound(&store, "maxzoom")
            .await?
            .map(|v| addressing.presented_zoom(v));

        match (addressing.min_zoom, addressing.max_zoom) {
            (Some(min), Some(max)) => info!(
                "Serving {} with zoom levels {min}..={max}",
                store.filepath()
            ),
            _ => info!("Serving {} without zoom bounds", store.filepath()),
        }

        Ok(Self {
            store,
            tile_ext: config.tile_ext,
            addressing,
        })
    }

    async fn get_metadata(&self) -> Result<HttpResponse, ServeError> {
        let rows = self.store.metadata_rows().await?;
        if rows.is_empty() {
            return Err(ServeError::MetadataNotFound);
        }
        Ok(HttpResponse::Ok().json(rows))
    }

    async fn get_tile(&self, path: &str, coord: TileCoord) -> Result<HttpResponse, ServeError> {
        trace!("Looking up stored tile {coord} for {path}");
        match self.store.get_tile(coord).await? {
            Some(data) => Ok(HttpResponse::Ok()
                .content_type(self.tile_ext.content_type())
                .body(data)),
            None => Err(ServeError::TileNotFound(path.to_string())),
        }
    }
}

async fn zoom_bound(store: &TileStorePool, key: &str) -> TilekitResult<Option<i64>> {
    let Some(value) = store.get_metadata_value(key).await? else {
        return Ok(None);
    };
    match value.trim().parse::<i64>() {
        Ok(v) => Ok(Some(v)),
        Err(e) => {
            warn!(
                "Ignoring metadata {key}={value} in {}: {e}",
                store.filename()
            );
            Ok(None)
        }
    }
}

/// Handles every request: `GET /metadata` and `GET /<zoom>/<column>/<row>.<ext>`.
pub async fn serve(
    req: HttpRequest,
    service: Data<TileService>,
) -> Result<HttpResponse, ServeError> {
    if req.method() != Method::GET {
        return Err(ServeError::UnsupportedMethod(req.method().to_string()));
    }
    let path = req.path();
    debug!("Request for {path}");
    match service.addressing.route(path)? {
        Route::Metadata => service.get_metadata().await,
        Route::Tile(coord) => service.get_tile(path, coord).await,
    }
}
