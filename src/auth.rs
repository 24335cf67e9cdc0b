use actix_web::{dev::Payload, web, FromRequest, HttpRequest};
use bcrypt::verify;
use chrono::{Duration, Utc};
use futures_util::future::LocalBoxFuture;
use jsonwebtoken::{decode, encode, errors::ErrorKind, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use log::debug;
use rand::Rng;
use sea_orm::{ActiveModelTrait, DatabaseConnection, Set};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::AppConfig;
use crate::entity::account;
use crate::error::{db_error, AppError};
use crate::store;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum AuthError {
    #[error("no active account found with the given credentials")]
    InvalidCredentials,
    #[error("token has expired")]
    Expired,
    #[error("token is invalid")]
    Malformed,
    #[error("account not found or inactive")]
    InactiveAccount,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenKind {
    Access,
    Refresh,
    Activation,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: i32,
    pub username: String,
    pub kind: TokenKind,
    pub iat: usize,
    pub exp: usize,
    pub jti: String,
}

/// Identity carried by a verified access token.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AccountIdentity {
    pub account_id: i32,
    pub username: String,
}

#[derive(Serialize)]
pub struct TokenPair {
    pub access: String,
    pub refresh: String,
}

/// The requester, resolved from a valid access token to an active account.
#[derive(Clone, Debug)]
pub struct AuthUser {
    pub account_id: i32,
    pub username: String,
}

#[derive(Clone, Debug)]
pub struct OptionalAuthUser(pub Option<AuthUser>);

impl OptionalAuthUser {
    pub fn identity(&self) -> Option<&AuthUser> {
        self.0.as_ref()
    }
}

impl FromRequest for OptionalAuthUser {
    type Error = actix_web::Error;
    type Future = LocalBoxFuture<'static, Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _payload: &mut Payload) -> Self::Future {
        let db = match req.app_data::<web::Data<DatabaseConnection>>() {
            Some(db) => db.clone(),
            None => {
                return Box::pin(async { Ok(OptionalAuthUser(None)) });
            }
        };
        let config = match req.app_data::<web::Data<AppConfig>>() {
            Some(cfg) => cfg.clone(),
            None => {
                return Box::pin(async { Ok(OptionalAuthUser(None)) });
            }
        };
        let token = extract_token(req, &config);

        Box::pin(async move {
            if let Some(token) = token {
                let auth = authenticate_token(&db, &config, &token).await.ok();
                return Ok(OptionalAuthUser(auth));
            }
            Ok(OptionalAuthUser(None))
        })
    }
}

fn extract_token(req: &HttpRequest, config: &AppConfig) -> Option<String> {
    let header = config.token_header.as_str();
    req.headers()
        .get(header)
        .and_then(|v| v.to_str().ok())
        .map(strip_scheme)
        .filter(|v| !v.is_empty())
}

/// Accepts `Bearer <token>`, `JWT <token>` or a bare token.
fn strip_scheme(value: &str) -> String {
    let value = value.trim();
    for scheme in ["Bearer ", "bearer ", "JWT ", "jwt "] {
        if let Some(rest) = value.strip_prefix(scheme) {
            return rest.trim().to_string();
        }
    }
    value.to_string()
}

async fn authenticate_token(
    db: &DatabaseConnection,
    config: &AppConfig,
    token: &str,
) -> Result<AuthUser, AppError> {
    let identity = verify_token(config, token)?;
    let account = store::account::find_by_id(db, identity.account_id)
        .await?
        .filter(|a| a.is_active)
        .ok_or(AuthError::InactiveAccount)?;

    Ok(AuthUser {
        account_id: account.id,
        username: account.username,
    })
}

pub fn verify_token(config: &AppConfig, token: &str) -> Result<AccountIdentity, AuthError> {
    let claims = decode_claims(config, token, TokenKind::Access)?;
    Ok(AccountIdentity {
        account_id: claims.sub,
        username: claims.username,
    })
}

/// Checks signature and expiry of a token of any kind.
pub fn inspect_token(config: &AppConfig, token: &str) -> Result<Claims, AuthError> {
    let key = DecodingKey::from_secret(config.jwt_secret.as_bytes());
    let mut validation = Validation::new(Algorithm::HS256);
    validation.leeway = 0;
    decode::<Claims>(token, &key, &validation)
        .map(|data| data.claims)
        .map_err(|e| match e.kind() {
            ErrorKind::ExpiredSignature => AuthError::Expired,
            _ => AuthError::Malformed,
        })
}

/// Checks signature, expiry and kind of a token.
pub fn decode_claims(config: &AppConfig, token: &str, kind: TokenKind) -> Result<Claims, AuthError> {
    let claims = inspect_token(config, token)?;
    if claims.kind != kind {
        return Err(AuthError::Malformed);
    }
    Ok(claims)
}

pub fn encode_token(
    config: &AppConfig,
    account: &account::Model,
    kind: TokenKind,
    lifetime: Duration,
) -> Result<String, AppError> {
    let now = Utc::now();
    let claims = Claims {
        sub: account.id,
        username: account.username.clone(),
        kind,
        iat: now.timestamp().max(0) as usize,
        exp: (now + lifetime).timestamp().max(0) as usize,
        jti: generate_jti(),
    };
    encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(config.jwt_secret.as_bytes()),
    )
    .map_err(|_| AppError::system_exception())
}

fn generate_jti() -> String {
    let bytes: [u8; 16] = rand::thread_rng().gen();
    bytes.iter().map(|b| format!("{:02x}", b)).collect()
}

pub async fn issue_credentialed_token(
    db: &DatabaseConnection,
    config: &AppConfig,
    email: &str,
    password: &str,
) -> Result<TokenPair, AppError> {
    let account = store::account::find_by_email(db, email)
        .await?
        .filter(|a| a.is_active)
        .ok_or(AuthError::InvalidCredentials)?;

    let ok = verify(password, &account.password_hash).map_err(|_| AppError::system_exception())?;
    if !ok {
        return Err(AuthError::InvalidCredentials.into());
    }

    debug!("issued token pair for account id={}", account.id);
    Ok(TokenPair {
        access: encode_token(config, &account, TokenKind::Access, Duration::minutes(config.access_token_minutes))?,
        refresh: encode_token(config, &account, TokenKind::Refresh, Duration::hours(config.refresh_token_hours))?,
    })
}

pub async fn refresh_access_token(
    db: &DatabaseConnection,
    config: &AppConfig,
    refresh: &str,
) -> Result<String, AppError> {
    let claims = decode_claims(config, refresh, TokenKind::Refresh)?;
    let account = store::account::find_by_id(db, claims.sub)
        .await?
        .filter(|a| a.is_active)
        .ok_or(AuthError::InactiveAccount)?;
    encode_token(config, &account, TokenKind::Access, Duration::minutes(config.access_token_minutes))
}

pub fn issue_activation_token(config: &AppConfig, account: &account::Model) -> Result<String, AppError> {
    encode_token(
        config,
        account,
        TokenKind::Activation,
        Duration::minutes(config.activation_token_minutes),
    )
}

/// Activates the account named by `token`. Redeeming a token for an account
/// that is already active succeeds without touching it.
pub async fn redeem_activation_token(
    db: &DatabaseConnection,
    config: &AppConfig,
    token: &str,
) -> Result<account::Model, AppError> {
    let claims = decode_claims(config, token, TokenKind::Activation)?;
    let account = store::account::find_by_id(db, claims.sub)
        .await?
        .ok_or(AuthError::Malformed)?;
    if account.is_active {
        return Ok(account);
    }

    let mut active: account::ActiveModel = account.into();
    active.is_active = Set(true);
    let updated = active.update(db).await.map_err(db_error)?;
    debug!("account activated id={}", updated.id);
    Ok(updated)
}
