use actix_web::{web, HttpRequest, HttpResponse};
use log::info;
use sea_orm::DatabaseConnection;
use serde::Deserialize;

use crate::access::AccessDecision;
use crate::auth::OptionalAuthUser;
use crate::config::AppConfig;
use crate::dto;
use crate::error::AppError;
use crate::response::{created, no_content, ok};
use crate::routes::account::SearchQuery;
use crate::routes::resource;
use crate::store::account::get_by_username;
use crate::store::content::{create_tweet, get_tweet, remove_tweet, search_tweets, tweets_by_account};
use crate::store::feed::{explore, home_timeline};

pub fn config(cfg: &mut web::ServiceConfig) {
    cfg.service(
        resource("/home")
            .route(web::get().to(list_home))
            .route(web::post().to(post_home)),
    )
    .service(resource("/explore").route(web::get().to(list_explore)))
    .service(
        resource("/compose/tweet")
            .route(web::post().to(compose))
            .default_service(web::to(compose_other)),
    )
    .service(
        resource("/tweets/{id}")
            .route(web::get().to(tweet_detail))
            .route(web::delete().to(delete_tweet)),
    )
    .service(resource("/profiles/{handle}/tweets").route(web::get().to(profile_tweets)))
    .service(resource("/search-tweets").route(web::get().to(search)));
}

#[derive(Deserialize)]
struct ComposeRequest {
    content: Option<String>,
}

async fn list_home(
    req: HttpRequest,
    db: web::Data<DatabaseConnection>,
    auth: OptionalAuthUser,
) -> Result<HttpResponse, AppError> {
    AccessDecision::Public.authorize(req.method(), auth.identity())?;
    let viewer = auth.identity().map(|a| a.account_id);
    let tweets = home_timeline(db.get_ref(), viewer).await?;
    Ok(ok(dto::tweets(db.get_ref(), tweets, viewer).await?))
}

async fn post_home(
    req: HttpRequest,
    db: web::Data<DatabaseConnection>,
    auth: OptionalAuthUser,
    payload: Result<web::Json<ComposeRequest>, actix_web::Error>,
) -> actix_web::Result<HttpResponse> {
    let user = AccessDecision::AuthenticatedRequired.require(req.method(), auth.identity())?;
    Ok(publish(&db, user.account_id, payload?.into_inner()).await?)
}

async fn compose(
    req: HttpRequest,
    db: web::Data<DatabaseConnection>,
    auth: OptionalAuthUser,
    payload: Result<web::Json<ComposeRequest>, actix_web::Error>,
) -> actix_web::Result<HttpResponse> {
    let user = AccessDecision::AuthenticatedRequired.require(req.method(), auth.identity())?;
    Ok(publish(&db, user.account_id, payload?.into_inner()).await?)
}

/// Anonymous callers learn they must log in before they learn the verb is wrong.
async fn compose_other(req: HttpRequest, auth: OptionalAuthUser) -> Result<HttpResponse, AppError> {
    AccessDecision::AuthenticatedRequired.authorize(req.method(), auth.identity())?;
    Err(AppError::MethodNotAllowed)
}

async fn publish(db: &DatabaseConnection, author_id: i32, payload: ComposeRequest) -> Result<HttpResponse, AppError> {
    let content = payload.content.unwrap_or_default();
    let tweet = create_tweet(db, author_id, &content).await?;
    info!("tweet published id={} user={}", tweet.id, author_id);
    Ok(created(dto::tweet(db, tweet, Some(author_id)).await?))
}

async fn list_explore(
    req: HttpRequest,
    db: web::Data<DatabaseConnection>,
    config: web::Data<AppConfig>,
    auth: OptionalAuthUser,
) -> Result<HttpResponse, AppError> {
    AccessDecision::Public.authorize(req.method(), auth.identity())?;
    let viewer = auth.identity().map(|a| a.account_id);
    let tweets = explore(db.get_ref(), config.explore_limit).await?;
    Ok(ok(dto::tweets(db.get_ref(), tweets, viewer).await?))
}

async fn tweet_detail(
    req: HttpRequest,
    db: web::Data<DatabaseConnection>,
    auth: OptionalAuthUser,
    path: web::Path<i32>,
) -> Result<HttpResponse, AppError> {
    let tweet = get_tweet(db.get_ref(), path.into_inner()).await?;
    AccessDecision::OwnerOnlyMutation { owner_id: tweet.user_id }.authorize(req.method(), auth.identity())?;
    let viewer = auth.identity().map(|a| a.account_id);
    Ok(ok(dto::tweet(db.get_ref(), tweet, viewer).await?))
}

async fn delete_tweet(
    req: HttpRequest,
    db: web::Data<DatabaseConnection>,
    auth: OptionalAuthUser,
    path: web::Path<i32>,
) -> Result<HttpResponse, AppError> {
    let tweet = get_tweet(db.get_ref(), path.into_inner()).await?;
    AccessDecision::OwnerOnlyMutation { owner_id: tweet.user_id }.authorize(req.method(), auth.identity())?;
    remove_tweet(db.get_ref(), tweet.id).await?;
    info!("tweet deleted id={}", tweet.id);
    Ok(no_content())
}

async fn profile_tweets(
    req: HttpRequest,
    db: web::Data<DatabaseConnection>,
    auth: OptionalAuthUser,
    path: web::Path<String>,
) -> Result<HttpResponse, AppError> {
    AccessDecision::Public.authorize(req.method(), auth.identity())?;
    let account = get_by_username(db.get_ref(), &path).await?;
    let viewer = auth.identity().map(|a| a.account_id);
    let tweets = tweets_by_account(db.get_ref(), account.id).await?;
    Ok(ok(dto::tweets(db.get_ref(), tweets, viewer).await?))
}

async fn search(
    req: HttpRequest,
    db: web::Data<DatabaseConnection>,
    auth: OptionalAuthUser,
    query: web::Query<SearchQuery>,
) -> Result<HttpResponse, AppError> {
    AccessDecision::Public.authorize(req.method(), auth.identity())?;
    let term = query.search.clone().unwrap_or_default();
    let viewer = auth.identity().map(|a| a.account_id);
    let tweets = search_tweets(db.get_ref(), &term).await?;
    Ok(ok(dto::tweets(db.get_ref(), tweets, viewer).await?))
}
