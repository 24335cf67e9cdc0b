use actix_web::{web, HttpRequest, HttpResponse};
use log::{info, warn};
use sea_orm::DatabaseConnection;
use serde::{Deserialize, Serialize};

use crate::access::AccessDecision;
use crate::auth::{issue_activation_token, redeem_activation_token, OptionalAuthUser};
use crate::config::AppConfig;
use crate::dto;
use crate::entity::account;
use crate::error::AppError;
use crate::mail::{activation_mail, MailQueue};
use crate::response::{created, ok};
use crate::routes::resource;
use crate::store::account::{
    create_account, email_exists, get_by_username, search_users, update_profile, username_exists, NewAccount,
    ProfileUpdate,
};
use crate::store::feed::suggested_users;
use crate::store::graph::{followers, followings};

pub fn config(cfg: &mut web::ServiceConfig) {
    cfg.service(resource("/signup").route(web::post().to(sign_up)))
    .service(resource("/verify-email").route(web::get().to(verify_email)))
    .service(resource("/check-email").route(web::post().to(check_email)))
    .service(resource("/check-username").route(web::post().to(check_username)))
    .service(
        resource("/profiles/{handle}")
            .route(web::get().to(get_profile))
            .route(web::patch().to(patch_profile)),
    )
    .service(resource("/profiles/{handle}/followers").route(web::get().to(list_followers)))
    .service(resource("/profiles/{handle}/followings").route(web::get().to(list_followings)))
    .service(resource("/search-users").route(web::get().to(search)))
    .service(resource("/suggested-users").route(web::get().to(suggestions)));
}

#[derive(Deserialize)]
struct SignUpRequest {
    email: Option<String>,
    username: Option<String>,
    firstname: Option<String>,
    lastname: Option<String>,
    password: Option<String>,
    bio: Option<String>,
}

#[derive(Deserialize)]
struct UpdateProfileRequest {
    username: Option<String>,
    firstname: Option<String>,
    lastname: Option<String>,
    bio: Option<String>,
    picture: Option<String>,
    background_picture: Option<String>,
    password: Option<String>,
}

#[derive(Deserialize)]
struct VerifyEmailQuery {
    token: String,
}

#[derive(Serialize)]
struct VerifiedDto {
    username: String,
    is_active: bool,
}

#[derive(Deserialize)]
struct CheckEmailRequest {
    email: Option<String>,
}

#[derive(Deserialize)]
struct CheckUsernameRequest {
    username: Option<String>,
}

#[derive(Deserialize)]
pub(crate) struct SearchQuery {
    pub(crate) search: Option<String>,
}

async fn sign_up(
    req: HttpRequest,
    db: web::Data<DatabaseConnection>,
    config: web::Data<AppConfig>,
    mail: web::Data<MailQueue>,
    auth: OptionalAuthUser,
    payload: web::Json<SignUpRequest>,
) -> Result<HttpResponse, AppError> {
    AccessDecision::Public.authorize(req.method(), auth.identity())?;

    let payload = payload.into_inner();
    let new = NewAccount {
        email: payload.email.unwrap_or_default(),
        username: payload.username.unwrap_or_default(),
        firstname: payload.firstname.unwrap_or_default(),
        lastname: payload.lastname.unwrap_or_default(),
        password: payload.password.unwrap_or_default(),
        bio: payload.bio.unwrap_or_default(),
    };
    let account = create_account(db.get_ref(), new).await?;
    info!("account signed up id={} username={}", account.id, account.username);

    queue_activation_mail(&config, &mail, &account);

    let owner = Some(account.id);
    let body = dto::profile(db.get_ref(), account, owner).await?;
    Ok(created(body))
}

/// The account is already committed; mail problems are logged, never raised.
fn queue_activation_mail(config: &AppConfig, mail: &MailQueue, account: &account::Model) {
    let token = match issue_activation_token(config, account) {
        Ok(token) => token,
        Err(e) => {
            warn!("activation token for account id={} not issued: {}", account.id, e);
            return;
        }
    };
    let link = config.verify_email_link(&token);
    if let Err(e) = mail.enqueue(activation_mail(account, &link)) {
        warn!(
            "activation mail for account id={} not queued: {} ({})",
            account.id,
            e,
            mail.stats()
        );
    }
}

async fn verify_email(
    req: HttpRequest,
    db: web::Data<DatabaseConnection>,
    config: web::Data<AppConfig>,
    query: web::Query<VerifyEmailQuery>,
) -> Result<HttpResponse, AppError> {
    AccessDecision::Public.authorize(req.method(), None)?;

    let account = redeem_activation_token(db.get_ref(), &config, &query.token)
        .await
        .map_err(|e| match e {
            AppError::Authentication(reason) => AppError::param_error("token", reason.to_string()),
            other => other,
        })?;

    Ok(ok(VerifiedDto {
        username: account.username,
        is_active: account.is_active,
    }))
}

async fn check_email(
    req: HttpRequest,
    db: web::Data<DatabaseConnection>,
    payload: web::Json<CheckEmailRequest>,
) -> Result<HttpResponse, AppError> {
    AccessDecision::Public.authorize(req.method(), None)?;
    let email = payload.email.clone().unwrap_or_default();
    if email.trim().is_empty() {
        return Err(AppError::param_error("email", "email cannot be empty"));
    }
    Ok(ok(email_exists(db.get_ref(), &email).await?))
}

async fn check_username(
    req: HttpRequest,
    db: web::Data<DatabaseConnection>,
    payload: web::Json<CheckUsernameRequest>,
) -> Result<HttpResponse, AppError> {
    AccessDecision::Public.authorize(req.method(), None)?;
    let username = payload.username.clone().unwrap_or_default();
    if username.trim().is_empty() {
        return Err(AppError::param_error("username", "username cannot be empty"));
    }
    Ok(ok(username_exists(db.get_ref(), username.trim()).await?))
}

async fn get_profile(
    req: HttpRequest,
    db: web::Data<DatabaseConnection>,
    auth: OptionalAuthUser,
    path: web::Path<String>,
) -> Result<HttpResponse, AppError> {
    let account = get_by_username(db.get_ref(), &path).await?;
    AccessDecision::OwnerOnlyMutation { owner_id: account.id }.authorize(req.method(), auth.identity())?;

    let viewer = auth.identity().map(|a| a.account_id);
    Ok(ok(dto::profile(db.get_ref(), account, viewer).await?))
}

async fn patch_profile(
    req: HttpRequest,
    db: web::Data<DatabaseConnection>,
    auth: OptionalAuthUser,
    path: web::Path<String>,
    payload: Result<web::Json<UpdateProfileRequest>, actix_web::Error>,
) -> actix_web::Result<HttpResponse> {
    let account = get_by_username(db.get_ref(), &path).await?;
    AccessDecision::OwnerOnlyMutation { owner_id: account.id }.authorize(req.method(), auth.identity())?;

    let payload = payload?.into_inner();
    let update = ProfileUpdate {
        username: payload.username,
        firstname: payload.firstname,
        lastname: payload.lastname,
        bio: payload.bio,
        picture: payload.picture,
        background_picture: payload.background_picture,
        password: payload.password,
    };
    let updated = update_profile(db.get_ref(), account, update).await?;
    info!("profile updated id={}", updated.id);

    let viewer = Some(updated.id);
    Ok(ok(dto::profile(db.get_ref(), updated, viewer).await?))
}

async fn list_followers(
    req: HttpRequest,
    db: web::Data<DatabaseConnection>,
    auth: OptionalAuthUser,
    path: web::Path<String>,
) -> Result<HttpResponse, AppError> {
    AccessDecision::Public.authorize(req.method(), auth.identity())?;
    let account = get_by_username(db.get_ref(), &path).await?;
    let accounts = followers(db.get_ref(), account.id).await?;
    let viewer = auth.identity().map(|a| a.account_id);
    Ok(ok(dto::profiles(db.get_ref(), accounts, viewer).await?))
}

async fn list_followings(
    req: HttpRequest,
    db: web::Data<DatabaseConnection>,
    auth: OptionalAuthUser,
    path: web::Path<String>,
) -> Result<HttpResponse, AppError> {
    AccessDecision::Public.authorize(req.method(), auth.identity())?;
    let account = get_by_username(db.get_ref(), &path).await?;
    let accounts = followings(db.get_ref(), account.id).await?;
    let viewer = auth.identity().map(|a| a.account_id);
    Ok(ok(dto::profiles(db.get_ref(), accounts, viewer).await?))
}

async fn search(
    req: HttpRequest,
    db: web::Data<DatabaseConnection>,
    auth: OptionalAuthUser,
    query: web::Query<SearchQuery>,
) -> Result<HttpResponse, AppError> {
    AccessDecision::Public.authorize(req.method(), auth.identity())?;
    let term = query.search.clone().unwrap_or_default();
    let accounts = search_users(db.get_ref(), &term).await?;
    let viewer = auth.identity().map(|a| a.account_id);
    Ok(ok(dto::profiles(db.get_ref(), accounts, viewer).await?))
}

async fn suggestions(
    req: HttpRequest,
    db: web::Data<DatabaseConnection>,
    auth: OptionalAuthUser,
) -> Result<HttpResponse, AppError> {
    AccessDecision::Public.authorize(req.method(), auth.identity())?;
    let viewer = auth.identity().map(|a| a.account_id);
    let accounts = suggested_users(db.get_ref(), viewer).await?;
    Ok(ok(dto::profiles(db.get_ref(), accounts, viewer).await?))
}
