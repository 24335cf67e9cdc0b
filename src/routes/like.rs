use actix_web::{web, HttpRequest, HttpResponse};
use log::debug;
use sea_orm::DatabaseConnection;
use serde::Serialize;

use crate::access::AccessDecision;
use crate::auth::OptionalAuthUser;
use crate::dto;
use crate::error::AppError;
use crate::response::{created, no_content, ok};
use crate::routes::resource;
use crate::store::content::{get_tweet, has_liked, like_tweet, likers, remove_like};

pub fn config(cfg: &mut web::ServiceConfig) {
    cfg.service(resource("/like-tweet/{id}").route(web::post().to(like)))
        .service(resource("/remove-like/{id}").route(web::delete().to(unlike)))
        .service(resource("/list-tweet-likes/{id}").route(web::get().to(list_likes)))
        .service(resource("/like/{id}/check").route(web::get().to(check_like)));
}

#[derive(Serialize)]
struct LikeDto {
    id: i32,
    user: i32,
    tweet: i32,
}

#[derive(Serialize)]
struct LikedDto {
    liked: bool,
}

async fn like(
    req: HttpRequest,
    db: web::Data<DatabaseConnection>,
    auth: OptionalAuthUser,
    path: web::Path<i32>,
) -> Result<HttpResponse, AppError> {
    let user = AccessDecision::AuthenticatedRequired.require(req.method(), auth.identity())?;
    let created_like = like_tweet(db.get_ref(), user.account_id, path.into_inner()).await?;
    debug!("tweet {} liked by {}", created_like.tweet_id, user.account_id);
    Ok(created(LikeDto {
        id: created_like.id,
        user: created_like.user_id,
        tweet: created_like.tweet_id,
    }))
}

async fn unlike(
    req: HttpRequest,
    db: web::Data<DatabaseConnection>,
    auth: OptionalAuthUser,
    path: web::Path<i32>,
) -> Result<HttpResponse, AppError> {
    let user = AccessDecision::AuthenticatedRequired.require(req.method(), auth.identity())?;
    remove_like(db.get_ref(), user.account_id, path.into_inner()).await?;
    Ok(no_content())
}

async fn list_likes(
    req: HttpRequest,
    db: web::Data<DatabaseConnection>,
    auth: OptionalAuthUser,
    path: web::Path<i32>,
) -> Result<HttpResponse, AppError> {
    AccessDecision::Public.authorize(req.method(), auth.identity())?;
    let tweet = get_tweet(db.get_ref(), path.into_inner()).await?;
    let accounts = likers(db.get_ref(), tweet.id).await?;
    Ok(ok(dto::mini_accounts(&accounts)))
}

async fn check_like(
    req: HttpRequest,
    db: web::Data<DatabaseConnection>,
    auth: OptionalAuthUser,
    path: web::Path<i32>,
) -> Result<HttpResponse, AppError> {
    let user = AccessDecision::AuthenticatedRequired.require(req.method(), auth.identity())?;
    let tweet = get_tweet(db.get_ref(), path.into_inner()).await?;
    let liked = has_liked(db.get_ref(), user.account_id, tweet.id).await?;
    Ok(ok(LikedDto { liked }))
}
