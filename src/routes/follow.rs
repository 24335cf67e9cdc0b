use actix_web::{web, HttpRequest, HttpResponse};
use log::info;
use sea_orm::DatabaseConnection;
use serde::Deserialize;

use crate::access::AccessDecision;
use crate::auth::OptionalAuthUser;
use crate::dto;
use crate::error::AppError;
use crate::response::{created, no_content};
use crate::routes::resource;
use crate::store::account::get_by_username;
use crate::store::graph::{follow_account, unfollow_account, unfollow_by_id};

pub fn config(cfg: &mut web::ServiceConfig) {
    cfg.service(resource("/follow-request").route(web::post().to(follow_request)))
        .service(resource("/unfollow/{follow_id}").route(web::delete().to(unfollow_edge)))
        .service(resource("/profiles/{handle}/unfollow").route(web::delete().to(unfollow_profile)));
}

#[derive(Deserialize)]
struct FollowRequest {
    username: Option<String>,
}

async fn follow_request(
    req: HttpRequest,
    db: web::Data<DatabaseConnection>,
    auth: OptionalAuthUser,
    payload: Result<web::Json<FollowRequest>, actix_web::Error>,
) -> actix_web::Result<HttpResponse> {
    let user = AccessDecision::AuthenticatedRequired.require(req.method(), auth.identity())?;
    let username = payload?.into_inner().username.unwrap_or_default();
    if username.trim().is_empty() {
        return Err(AppError::param_error("username", "username cannot be empty").into());
    }

    let target = get_by_username(db.get_ref(), username.trim())
        .await
        .map_err(|e| match e {
            AppError::NotFound(_) => AppError::param_error("username", "no account with this username"),
            other => other,
        })?;
    let edge = follow_account(db.get_ref(), target.id, user.account_id).await?;
    info!("{} now follows {}", user.username, target.username);
    Ok(created(dto::follow_edge(db.get_ref(), &edge).await?))
}

async fn unfollow_edge(
    req: HttpRequest,
    db: web::Data<DatabaseConnection>,
    auth: OptionalAuthUser,
    path: web::Path<i32>,
) -> Result<HttpResponse, AppError> {
    let user = AccessDecision::AuthenticatedRequired.require(req.method(), auth.identity())?;
    unfollow_by_id(db.get_ref(), path.into_inner(), user.account_id).await?;
    Ok(no_content())
}

async fn unfollow_profile(
    req: HttpRequest,
    db: web::Data<DatabaseConnection>,
    auth: OptionalAuthUser,
    path: web::Path<String>,
) -> Result<HttpResponse, AppError> {
    let user = AccessDecision::AuthenticatedRequired.require(req.method(), auth.identity())?;
    let target = get_by_username(db.get_ref(), &path).await?;
    unfollow_account(db.get_ref(), target.id, user.account_id).await?;
    info!("{} unfollowed {}", user.username, target.username);
    Ok(no_content())
}
