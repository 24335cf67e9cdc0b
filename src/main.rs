use actix_web::{web, HttpServer};
use log::info;

use chirp_backend::build_app;
use chirp_backend::config::AppConfig;
use chirp_backend::db::connect_db;
use chirp_backend::mail::{build_mailer, MailQueue};

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    dotenvy::dotenv().ok();
    env_logger::init();
    let config = AppConfig::from_env();

    let db = connect_db(&config)
        .await
        .map_err(|e| std::io::Error::other(format!("database: {}", e)))?;
    let mailer = build_mailer(&config.mail)
        .map_err(|e| std::io::Error::other(format!("mailer: {}", e)))?;
    let mail_queue = MailQueue::start(mailer, config.mail.queue_capacity, config.mail.workers);
    let server_port = config.server_port;

    let config = web::Data::new(config);
    let db = web::Data::new(db);
    let mail_queue = web::Data::new(mail_queue);

    let server = HttpServer::new(move || build_app(config.clone(), db.clone(), mail_queue.clone()))
        .bind(("0.0.0.0", server_port))?;
    info!("server started at http://0.0.0.0:{}", server_port);
    server.run().await
}
