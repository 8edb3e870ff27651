use std::io;
use std::path::PathBuf;

use actix_web::http::StatusCode;
use actix_web::http::header::ContentType;
use actix_web::{HttpResponse, ResponseError};
use tilekit_mbtiles::MbtError;
use tracing::error;

/// A convenience [`Result`] for the tilekit crate.
pub type TilekitResult<T> = Result<T, TilekitError>;

#[derive(thiserror::Error, Debug)]
pub enum TilekitError {
    #[error("Unable to bind to {1}: {0}")]
    BindingError(#[source] io::Error, String),

    #[error("Unable to load config file {1}: {0}")]
    ConfigLoadError(#[source] io::Error, PathBuf),

    #[error("Unable to parse config file {1}: {0}")]
    ConfigParseError(#[source] serde_yaml::Error, PathBuf),

    #[error("Unable to write config file {1}: {0}")]
    ConfigWriteError(#[source] io::Error, PathBuf),

    #[error("Unable to serialize the configuration: {0}")]
    ConfigSerializeError(#[source] serde_yaml::Error),

    #[error(
        "No MBTiles file to serve. Set it on the command line, with the TILEKIT_MBTILES env variable, or as `mbtiles` in the config file."
    )]
    NoTileStore,

    #[error(transparent)]
    MbtilesError(#[from] MbtError),

    #[error(transparent)]
    IoError(#[from] io::Error),
}

/// Per-request failures of the tile service, each mapped to a response status.
#[derive(thiserror::Error, Debug)]
pub enum ServeError {
    #[error("Only GET requests are supported, got {0}")]
    UnsupportedMethod(String),

    #[error("Unable to parse {0}, expecting \"/metadata\" or \"/<zoom>/<column>/<row>.<ext>\"")]
    InvalidPath(String),

    #[error("Requested zoom level {zoom} is not available in {path}, valid range is {min}..={max}")]
    ZoomNotAvailable {
        path: String,
        zoom: i64,
        min: i64,
        max: i64,
    },

    #[error("Requested zoom level {zoom} is not available in {path}")]
    ZoomOutOfRange { path: String, zoom: i64 },

    #[error("No data found for {0}")]
    TileNotFound(String),

    #[error("\"metadata\" not found in the configured MBTiles file")]
    MetadataNotFound,

    #[error(transparent)]
    StoreError(#[from] MbtError),
}

impl ResponseError for ServeError {
    fn status_code(&self) -> StatusCode {
        match self {
            Self::UnsupportedMethod(_) | Self::InvalidPath(_) => StatusCode::BAD_REQUEST,
            Self::ZoomNotAvailable { .. }
            | Self::ZoomOutOfRange { .. }
            | Self::TileNotFound(_)
            | Self::MetadataNotFound => StatusCode::NOT_FOUND,
            Self::StoreError(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let status = self.status_code();
        let body = if status.is_server_error() {
            error!("{self}");
            "Unable to read from the tile store".to_string()
        } else {
            self.to_string()
        };
        HttpResponse::build(status)
            .content_type(ContentType::plaintext())
            .body(body)
    }
}
