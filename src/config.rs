use std::env;
use std::str::FromStr;

#[derive(Clone)]
pub struct AppConfig {
    pub server_port: u16,
    pub sqlite_path: String,
    pub database_url: Option<String>,
    pub jwt_secret: String,
    pub token_header: String,
    pub access_token_minutes: i64,
    pub refresh_token_hours: i64,
    pub activation_token_minutes: i64,
    pub public_base_url: String,
    pub explore_limit: u64,
    pub mail: MailConfig,
}

#[derive(Clone, Debug, PartialEq)]
pub enum MailBackend {
    Log,
    Smtp,
}

#[derive(Clone)]
pub struct MailConfig {
    pub backend: MailBackend,
    pub smtp_host: String,
    pub smtp_port: u16,
    pub smtp_username: Option<String>,
    pub smtp_password: Option<String>,
    pub smtp_starttls: bool,
    pub from: String,
    pub queue_capacity: usize,
    pub workers: usize,
}

impl AppConfig {
    pub fn from_env() -> Self {
        let server_port = parse_var("SERVER_PORT", 38321);

        let sqlite_path = env::var("SQLITE_PATH").unwrap_or_else(|_| "/opt/chirp/data.sqlite".to_string());
        let database_url = env::var("DATABASE_URL").ok();

        let jwt_secret = env::var("JWT_SECRET").unwrap_or_else(|_| "Xq3vJm8RkT2pLw9N".to_string());

        let token_header = env::var("TOKEN_HEADER").unwrap_or_else(|_| "authorization".to_string());

        let public_base_url = env::var("PUBLIC_BASE_URL")
            .unwrap_or_else(|_| format!("http://localhost:{}", server_port));

        let mail_backend = match env::var("MAIL_BACKEND").unwrap_or_default().to_lowercase().as_str() {
            "smtp" => MailBackend::Smtp,
            _ => MailBackend::Log,
        };

        let mail = MailConfig {
            backend: mail_backend,
            smtp_host: env::var("SMTP_HOST").unwrap_or_else(|_| "localhost".to_string()),
            smtp_port: parse_var("SMTP_PORT", 587),
            smtp_username: env::var("SMTP_USERNAME").ok().filter(|v| !v.is_empty()),
            smtp_password: env::var("SMTP_PASSWORD").ok().filter(|v| !v.is_empty()),
            smtp_starttls: parse_var("SMTP_STARTTLS", true),
            from: env::var("MAIL_FROM").unwrap_or_else(|_| "noreply@localhost".to_string()),
            queue_capacity: parse_var("MAIL_QUEUE_CAPACITY", 64usize).max(1),
            workers: parse_var("MAIL_WORKERS", 2usize).max(1),
        };

        Self {
            server_port,
            sqlite_path,
            database_url,
            jwt_secret,
            token_header,
            access_token_minutes: parse_var("ACCESS_TOKEN_MINUTES", 60),
            refresh_token_hours: parse_var("REFRESH_TOKEN_HOURS", 24),
            activation_token_minutes: parse_var("ACTIVATION_TOKEN_MINUTES", 60),
            public_base_url,
            explore_limit: parse_var("EXPLORE_LIMIT", 20),
            mail,
        }
    }

    pub fn database_url(&self) -> String {
        if let Some(url) = &self.database_url {
            return url.clone();
        }

        let path = self.sqlite_path.trim();
        if path.starts_with("sqlite:") || path.starts_with("file:") {
            return path.to_string();
        }
        format!("sqlite://{}?mode=rwc", path)
    }

    /// Link mailed to a new account; redeeming it activates the account.
    pub fn verify_email_link(&self, token: &str) -> String {
        format!("{}/verify-email?token={}", self.public_base_url.trim_end_matches('/'), token)
    }
}

fn parse_var<T: FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|v| v.trim().parse::<T>().ok())
        .unwrap_or(default)
}

#[cfg(test)]
pub(crate) fn test_config() -> AppConfig {
    AppConfig {
        server_port: 0,
        sqlite_path: String::new(),
        database_url: Some("sqlite::memory:".to_string()),
        jwt_secret: "test-secret".to_string(),
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
            queue_capacity: 8,
            workers: 1,
        },
    }
}
