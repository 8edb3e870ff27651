use std::future::Future;
use std::pin::Pin;

use actix_web::middleware::Logger;
use actix_web::web::{self, Data};
use actix_web::{App, HttpServer};
use futures::TryFutureExt as _;

use crate::config::ServiceConfig;
use crate::srv::tiles::{TileService, serve};
use crate::{TilekitError, TilekitResult};

pub type Server = Pin<Box<dyn Future<Output = TilekitResult<()>>>>;

/// Every path goes to the same handler, which sorts out metadata and tile requests itself.
pub fn router(cfg: &mut web::ServiceConfig) {
    cfg.default_service(web::to(serve));
}

/// Create a new server instance bound to the configured address.
///
/// Returns the server future and the address it listens on.
pub fn new_server(config: &ServiceConfig, service: TileService) -> TilekitResult<(Server, String)> {
    let listen_addresses = config.listen_addresses.clone();

    let factory = move || {
        App::new()
            .app_data(Data::new(service.clone()))
            .wrap(Logger::default())
            .configure(router)
    };

    let server = HttpServer::new(factory)
        .bind(listen_addresses.clone())
        .map_err(|e| TilekitError::BindingError(e, listen_addresses.clone()))?
        .keep_alive(config.keep_alive)
        .shutdown_timeout(0)
        .workers(config.workers)
        .run()
        .err_into();

    Ok((Box::pin(server), listen_addresses))
}
