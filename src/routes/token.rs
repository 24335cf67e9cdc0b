use actix_web::{web, HttpRequest, HttpResponse};
use sea_orm::DatabaseConnection;
use serde::{Deserialize, Serialize};

use crate::access::AccessDecision;
use crate::auth::{inspect_token, issue_credentialed_token, refresh_access_token, TokenKind};
use crate::config::AppConfig;
use crate::error::AppError;
use crate::response::ok;
use crate::routes::resource;

pub fn config(cfg: &mut web::ServiceConfig) {
    cfg.service(resource("/token").route(web::post().to(obtain_pair)))
        .service(resource("/token/refresh").route(web::post().to(refresh)))
        .service(resource("/token/verify").route(web::post().to(verify)));
}

#[derive(Deserialize)]
struct ObtainPairRequest {
    email: Option<String>,
    password: Option<String>,
}

#[derive(Deserialize)]
struct RefreshRequest {
    refresh: Option<String>,
}

#[derive(Deserialize)]
struct VerifyRequest {
    token: Option<String>,
}

#[derive(Serialize)]
struct AccessDto {
    access: String,
}

#[derive(Serialize)]
struct VerifiedTokenDto {
    username: String,
    kind: TokenKind,
}

fn required(field: &str, value: Option<String>) -> Result<String, AppError> {
    match value {
        Some(v) if !v.trim().is_empty() => Ok(v),
        _ => Err(AppError::param_error(field, format!("{} cannot be empty", field))),
    }
}

async fn obtain_pair(
    req: HttpRequest,
    db: web::Data<DatabaseConnection>,
    config: web::Data<AppConfig>,
    payload: web::Json<ObtainPairRequest>,
) -> Result<HttpResponse, AppError> {
    AccessDecision::Public.authorize(req.method(), None)?;
    let payload = payload.into_inner();
    let email = required("email", payload.email)?;
    let password = required("password", payload.password)?;

    let pair = issue_credentialed_token(db.get_ref(), &config, &email, &password).await?;
    Ok(ok(pair))
}

async fn refresh(
    req: HttpRequest,
    db: web::Data<DatabaseConnection>,
    config: web::Data<AppConfig>,
    payload: web::Json<RefreshRequest>,
) -> Result<HttpResponse, AppError> {
    AccessDecision::Public.authorize(req.method(), None)?;
    let token = required("refresh", payload.into_inner().refresh)?;
    let access = refresh_access_token(db.get_ref(), &config, &token).await?;
    Ok(ok(AccessDto { access }))
}

async fn verify(
    req: HttpRequest,
    config: web::Data<AppConfig>,
    payload: web::Json<VerifyRequest>,
) -> Result<HttpResponse, AppError> {
    AccessDecision::Public.authorize(req.method(), None)?;
    let token = required("token", payload.into_inner().token)?;
    let claims = inspect_token(&config, &token)?;
    Ok(ok(VerifiedTokenDto {
        username: claims.username,
        kind: claims.kind,
    }))
}
