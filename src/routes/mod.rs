pub mod account;
pub mod bookmark;
pub mod cors;
pub mod follow;
pub mod like;
pub mod reply;
pub mod token;
pub mod tweet;

use actix_web::{web, HttpResponse, Resource};

use crate::error::AppError;

pub fn config(cfg: &mut web::ServiceConfig) {
    cfg.configure(account::config)
        .configure(token::config)
        .configure(tweet::config)
        .configure(follow::config)
        .configure(like::config)
        .configure(bookmark::config)
        .configure(reply::config);
}

/// A resource that answers unserved verbs with the 405 envelope.
pub(crate) fn resource(path: &str) -> Resource {
    web::resource(path).default_service(web::to(method_not_allowed))
}

/// Fallback for resources hit with a verb they do not serve.
pub(crate) async fn method_not_allowed() -> Result<HttpResponse, AppError> {
    Err(AppError::MethodNotAllowed)
}
