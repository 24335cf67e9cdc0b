pub mod access;
pub mod auth;
pub mod config;
pub mod db;
pub mod dto;
pub mod entity;
pub mod error;
pub mod mail;
pub mod response;
pub mod routes;
pub mod store;
pub mod timesince;

use actix_web::{
    body::MessageBody,
    dev::{ServiceFactory, ServiceRequest, ServiceResponse},
    middleware, web, App, Error,
};
use sea_orm::DatabaseConnection;

use crate::config::AppConfig;
use crate::mail::MailQueue;
use crate::response::{json_error_handler, path_error_handler, query_error_handler};

/// The full application: shared state, payload error handlers, middleware
/// and every route.
pub fn build_app(
    config: web::Data<AppConfig>,
    db: web::Data<DatabaseConnection>,
    mail: web::Data<MailQueue>,
) -> App<
    impl ServiceFactory<
        ServiceRequest,
        Config = (),
        Response = ServiceResponse<impl MessageBody>,
        Error = Error,
        InitError = (),
    >,
> {
    App::new()
        .app_data(config)
        .app_data(db)
        .app_data(mail)
        .app_data(web::JsonConfig::default().error_handler(json_error_handler))
        .app_data(web::QueryConfig::default().error_handler(query_error_handler))
        .app_data(web::PathConfig::default().error_handler(path_error_handler))
        .wrap(middleware::Logger::default())
        .wrap(middleware::from_fn(routes::cors::cors_handler))
        .configure(routes::config)
}
