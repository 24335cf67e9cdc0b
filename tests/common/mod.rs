#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use actix_web::{
    body::MessageBody,
    dev::{Service, ServiceResponse},
    http::StatusCode,
    test, web,
};
use sea_orm::DatabaseConnection;
use serde_json::{json, Value};

use chirp_backend::auth::issue_activation_token;
use chirp_backend::config::{AppConfig, MailBackend, MailConfig};
use chirp_backend::db::connect_url;
use chirp_backend::mail::{MailQueue, MemoryMailer};
use chirp_backend::store::account::find_by_username;

pub const PASSWORD: &str = "testpassword";

pub struct Context {
    pub config: web::Data<AppConfig>,
    pub db: web::Data<DatabaseConnection>,
    pub mail: web::Data<MailQueue>,
    pub mailer: Arc<MemoryMailer>,
}

pub fn test_config() -> AppConfig {
    AppConfig {
        server_port: 0,
        sqlite_path: String::new(),
        database_url: Some("sqlite::memory:".to_string()),
        jwt_secret: "integration-secret".to_string(),
        token_header: "authorization".to_string(),
        access_token_minutes: 60,
        refresh_token_hours: 24,
        activation_token_minutes: 60,
        public_base_url: "http://testserver".to_string(),
        explore_limit: 20,
        mail: MailConfig {
            backend: MailBackend::Log,
            smtp_host: "localhost".to_string(),
            smtp_port: 587,
            smtp_username: None,
            smtp_password: None,
            smtp_starttls: false,
            from: "noreply@testserver".to_string(),
            queue_capacity: 16,
            workers: 1,
        },
    }
}

/// Fresh in-memory database and a mail queue that delivers into memory.
pub async fn context() -> Context {
    let config = test_config();
    let db = connect_url("sqlite::memory:").await.unwrap();
    let mailer = Arc::new(MemoryMailer::default());
    let queue = MailQueue::start(mailer.clone(), config.mail.queue_capacity, config.mail.workers);
    Context {
        config: web::Data::new(config),
        db: web::Data::new(db),
        mail: web::Data::new(queue),
        mailer,
    }
}

/// Sends a request and returns the status with the decoded JSON body
/// (`Value::Null` for an empty body).
pub async fn send<S, R, B>(app: &S, req: R) -> (StatusCode, Value)
where
    S: Service<R, Response = ServiceResponse<B>, Error = actix_web::Error>,
    B: MessageBody,
{
    let res = test::call_service(app, req).await;
    let status = res.status();
    let body = test::read_body(res).await;
    let json = if body.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&body).unwrap()
    };
    (status, json)
}

pub fn signup_body(username: &str) -> Value {
    json!({
        "email": format!("{}@example.com", username),
        "username": username,
        "firstname": format!("{}_first", username),
        "lastname": format!("{}_last", username),
        "password": PASSWORD,
    })
}

pub fn bearer(token: &str) -> (&'static str, String) {
    ("Authorization", format!("Bearer {}", token))
}

/// Signs up, activates and logs in `username`; returns the access token.
pub async fn register<S, B>(app: &S, ctx: &Context, username: &str) -> String
where
    S: Service<actix_http::Request, Response = ServiceResponse<B>, Error = actix_web::Error>,
    B: MessageBody,
{
    let req = test::TestRequest::post()
        .uri("/signup")
        .set_json(signup_body(username))
        .to_request();
    let (status, _) = send(app, req).await;
    assert_eq!(status, StatusCode::CREATED);

    let account = find_by_username(ctx.db.get_ref(), username).await.unwrap().unwrap();
    let token = issue_activation_token(&ctx.config, &account).unwrap();
    let req = test::TestRequest::get()
        .uri(&format!("/verify-email?token={}", token))
        .to_request();
    let (status, _) = send(app, req).await;
    assert_eq!(status, StatusCode::OK);

    login(app, username).await
}

pub async fn login<S, B>(app: &S, username: &str) -> String
where
    S: Service<actix_http::Request, Response = ServiceResponse<B>, Error = actix_web::Error>,
    B: MessageBody,
{
    let req = test::TestRequest::post()
        .uri("/token")
        .set_json(json!({ "email": format!("{}@example.com", username), "password": PASSWORD }))
        .to_request();
    let (status, body) = send(app, req).await;
    assert_eq!(status, StatusCode::OK, "login failed: {}", body);
    body["data"]["access"].as_str().unwrap().to_string()
}

/// Polls until the mail workers have delivered `count` messages.
pub async fn wait_for_mail(ctx: &Context, count: usize) {
    for _ in 0..200 {
        if ctx.mailer.sent().len() >= count {
            return;
        }
        actix_web::rt::time::sleep(Duration::from_millis(5)).await;
    }
}
