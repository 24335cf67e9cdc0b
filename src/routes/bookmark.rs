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
use crate::store::content::{bookmark_tweet, bookmarks_of, get_tweet, has_bookmarked, remove_bookmark};

pub fn config(cfg: &mut web::ServiceConfig) {
    cfg.service(resource("/bookmarks").route(web::get().to(list_bookmarks)))
        .service(
            resource("/bookmarks/{id}")
                .route(web::post().to(add_bookmark))
                .route(web::delete().to(delete_bookmark)),
        )
        .service(resource("/bookmarks/{id}/check").route(web::get().to(check_bookmark)));
}

#[derive(Serialize)]
struct SavedDto {
    id: i32,
    tweet: i32,
    date_created: String,
}

#[derive(Serialize)]
struct BookmarkedDto {
    bookmarked: bool,
}

async fn list_bookmarks(
    req: HttpRequest,
    db: web::Data<DatabaseConnection>,
    auth: OptionalAuthUser,
) -> Result<HttpResponse, AppError> {
    let user = AccessDecision::AuthenticatedRequired.require(req.method(), auth.identity())?;
    let marks = bookmarks_of(db.get_ref(), user.account_id).await?;
    Ok(ok(dto::bookmarks(db.get_ref(), marks, Some(user.account_id)).await?))
}

async fn add_bookmark(
    req: HttpRequest,
    db: web::Data<DatabaseConnection>,
    auth: OptionalAuthUser,
    path: web::Path<i32>,
) -> Result<HttpResponse, AppError> {
    let user = AccessDecision::AuthenticatedRequired.require(req.method(), auth.identity())?;
    let mark = bookmark_tweet(db.get_ref(), user.account_id, path.into_inner()).await?;
    debug!("tweet {} bookmarked by {}", mark.tweet_id, user.account_id);
    Ok(created(SavedDto {
        id: mark.id,
        tweet: mark.tweet_id,
        date_created: dto::format_time(mark.date_created),
    }))
}

async fn delete_bookmark(
    req: HttpRequest,
    db: web::Data<DatabaseConnection>,
    auth: OptionalAuthUser,
    path: web::Path<i32>,
) -> Result<HttpResponse, AppError> {
    let user = AccessDecision::AuthenticatedRequired.require(req.method(), auth.identity())?;
    remove_bookmark(db.get_ref(), user.account_id, path.into_inner()).await?;
    Ok(no_content())
}

async fn check_bookmark(
    req: HttpRequest,
    db: web::Data<DatabaseConnection>,
    auth: OptionalAuthUser,
    path: web::Path<i32>,
) -> Result<HttpResponse, AppError> {
    let user = AccessDecision::AuthenticatedRequired.require(req.method(), auth.identity())?;
    let tweet = get_tweet(db.get_ref(), path.into_inner()).await?;
    let bookmarked = has_bookmarked(db.get_ref(), user.account_id, tweet.id).await?;
    Ok(ok(BookmarkedDto { bookmarked }))
}
