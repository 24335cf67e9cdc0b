use actix_web::{web, HttpRequest, HttpResponse};
use log::debug;
use sea_orm::DatabaseConnection;
use serde::Deserialize;

use crate::access::AccessDecision;
use crate::auth::OptionalAuthUser;
use crate::dto;
use crate::error::AppError;
use crate::response::{created, ok};
use crate::routes::resource;
use crate::store::content::{create_reply, get_tweet, replies_for};

pub fn config(cfg: &mut web::ServiceConfig) {
    cfg.service(
        resource("/tweets/{id}/reply")
            .route(web::get().to(list_replies))
            .route(web::post().to(add_reply)),
    );
}

#[derive(Deserialize)]
struct ReplyRequest {
    text: Option<String>,
}

async fn list_replies(
    req: HttpRequest,
    db: web::Data<DatabaseConnection>,
    auth: OptionalAuthUser,
    path: web::Path<i32>,
) -> Result<HttpResponse, AppError> {
    AccessDecision::Public.authorize(req.method(), auth.identity())?;
    let tweet = get_tweet(db.get_ref(), path.into_inner()).await?;
    let replies = replies_for(db.get_ref(), tweet.id).await?;
    Ok(ok(dto::replies(db.get_ref(), replies).await?))
}

async fn add_reply(
    req: HttpRequest,
    db: web::Data<DatabaseConnection>,
    auth: OptionalAuthUser,
    path: web::Path<i32>,
    payload: Result<web::Json<ReplyRequest>, actix_web::Error>,
) -> actix_web::Result<HttpResponse> {
    let user = AccessDecision::AuthenticatedRequired.require(req.method(), auth.identity())?;
    let text = payload?.into_inner().text.unwrap_or_default();
    let reply = create_reply(db.get_ref(), user.account_id, path.into_inner(), &text).await?;
    debug!("reply {} on tweet {}", reply.id, reply.tweet_id);
    let mut rendered = dto::replies(db.get_ref(), vec![reply]).await?;
    let body = rendered.pop().ok_or_else(AppError::system_exception)?;
    Ok(created(body))
}
