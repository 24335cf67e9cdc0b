//! Outgoing mail. Handlers hand messages to a [`MailQueue`]; a fixed set of
//! worker tasks drains it and delivers through a [`Mailer`]. Delivery is best
//! effort: nothing is retried, failures are logged and counted.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use futures_util::future::BoxFuture;
use lettre::message::{header::ContentType, Mailbox};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use log::{debug, info, warn};
use serde::Serialize;
use thiserror::Error;
use tokio::sync::mpsc::{self, error::TrySendError};

use crate::config::{MailBackend, MailConfig};
use crate::entity::account;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OutgoingMail {
    pub subject: String,
    pub body: String,
    pub recipient: String,
}

#[derive(Debug, Error)]
pub enum MailError {
    #[error("invalid address: {0}")]
    Address(String),
    #[error("could not build message: {0}")]
    Build(String),
    #[error("transport failed: {0}")]
    Transport(String),
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum MailQueueError {
    #[error("mail queue is full")]
    Full,
    #[error("mail queue is closed")]
    Closed,
}

pub trait Mailer: Send + Sync {
    fn send<'a>(&'a self, mail: &'a OutgoingMail) -> BoxFuture<'a, Result<(), MailError>>;
}

pub struct SmtpMailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
}

impl SmtpMailer {
    pub fn new(config: &MailConfig) -> Result<Self, MailError> {
        let mut builder = if config.smtp_starttls {
            AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.smtp_host)
                .map_err(|e| MailError::Transport(e.to_string()))?
        } else {
            AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(&config.smtp_host)
        };
        builder = builder.port(config.smtp_port);
        if let (Some(user), Some(pass)) = (&config.smtp_username, &config.smtp_password) {
            builder = builder.credentials(Credentials::new(user.clone(), pass.clone()));
        }

        let from = config
            .from
            .parse::<Mailbox>()
            .map_err(|e| MailError::Address(format!("{}: {}", config.from, e)))?;

        Ok(Self {
            transport: builder.build(),
            from,
        })
    }
}

impl Mailer for SmtpMailer {
    fn send<'a>(&'a self, mail: &'a OutgoingMail) -> BoxFuture<'a, Result<(), MailError>> {
        Box::pin(async move {
            let to = mail
                .recipient
                .parse::<Mailbox>()
                .map_err(|e| MailError::Address(format!("{}: {}", mail.recipient, e)))?;
            let message = Message::builder()
                .from(self.from.clone())
                .to(to)
                .subject(mail.subject.clone())
                .header(ContentType::TEXT_PLAIN)
                .body(mail.body.clone())
                .map_err(|e| MailError::Build(e.to_string()))?;
            self.transport
                .send(message)
                .await
                .map_err(|e| MailError::Transport(e.to_string()))?;
            Ok(())
        })
    }
}

/// Writes mail to the log instead of delivering it.
pub struct LogMailer;

impl Mailer for LogMailer {
    fn send<'a>(&'a self, mail: &'a OutgoingMail) -> BoxFuture<'a, Result<(), MailError>> {
        Box::pin(async move {
            info!("mail to={} subject={:?}\n{}", mail.recipient, mail.subject, mail.body);
            Ok(())
        })
    }
}

/// Keeps every message in memory.
#[derive(Default)]
pub struct MemoryMailer {
    sent: Mutex<Vec<OutgoingMail>>,
}

impl MemoryMailer {
    pub fn sent(&self) -> Vec<OutgoingMail> {
        self.sent.lock().map(|v| v.clone()).unwrap_or_default()
    }
}

impl Mailer for MemoryMailer {
    fn send<'a>(&'a self, mail: &'a OutgoingMail) -> BoxFuture<'a, Result<(), MailError>> {
        Box::pin(async move {
            if let Ok(mut sent) = self.sent.lock() {
                sent.push(mail.clone());
            }
            Ok(())
        })
    }
}

pub fn build_mailer(config: &MailConfig) -> Result<Arc<dyn Mailer>, MailError> {
    match config.backend {
        MailBackend::Smtp => Ok(Arc::new(SmtpMailer::new(config)?)),
        MailBackend::Log => Ok(Arc::new(LogMailer)),
    }
}

#[derive(Default)]
struct Counters {
    queued: AtomicU64,
    sent: AtomicU64,
    failed: AtomicU64,
    rejected: AtomicU64,
}

impl Counters {
    fn snapshot(&self) -> MailStats {
        MailStats {
            queued: self.queued.load(Ordering::Relaxed),
            sent: self.sent.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
            rejected: self.rejected.load(Ordering::Relaxed),
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct MailStats {
    pub queued: u64,
    pub sent: u64,
    pub failed: u64,
    pub rejected: u64,
}

impl fmt::Display for MailStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "queued={} sent={} failed={} rejected={}",
            self.queued, self.sent, self.failed, self.rejected
        )
    }
}

/// Bounded hand-off between request handlers and mail workers.
#[derive(Clone)]
pub struct MailQueue {
    tx: mpsc::Sender<OutgoingMail>,
    counters: Arc<Counters>,
}

impl MailQueue {
    /// Spawns `workers` delivery tasks on the current runtime.
    pub fn start(mailer: Arc<dyn Mailer>, capacity: usize, workers: usize) -> Self {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        let rx = Arc::new(tokio::sync::Mutex::new(rx));
        let counters = Arc::new(Counters::default());
        for id in 0..workers.max(1) {
            actix_web::rt::spawn(run_worker(id, rx.clone(), mailer.clone(), counters.clone()));
        }
        debug!("mail queue started capacity={} workers={}", capacity, workers);
        Self { tx, counters }
    }

    /// Never waits: a full queue is an error the caller decides to swallow.
    pub fn enqueue(&self, mail: OutgoingMail) -> Result<(), MailQueueError> {
        match self.tx.try_send(mail) {
            Ok(()) => {
                self.counters.queued.fetch_add(1, Ordering::Relaxed);
                Ok(())
            }
            Err(TrySendError::Full(_)) => {
                self.counters.rejected.fetch_add(1, Ordering::Relaxed);
                Err(MailQueueError::Full)
            }
            Err(TrySendError::Closed(_)) => {
                self.counters.rejected.fetch_add(1, Ordering::Relaxed);
                Err(MailQueueError::Closed)
            }
        }
    }

    pub fn stats(&self) -> MailStats {
        self.counters.snapshot()
    }
}

async fn run_worker(
    id: usize,
    rx: Arc<tokio::sync::Mutex<mpsc::Receiver<OutgoingMail>>>,
    mailer: Arc<dyn Mailer>,
    counters: Arc<Counters>,
) {
    loop {
        let next = { rx.lock().await.recv().await };
        let Some(mail) = next else {
            debug!("mail worker {} stopped", id);
            break;
        };
        match mailer.send(&mail).await {
            Ok(()) => {
                counters.sent.fetch_add(1, Ordering::Relaxed);
                debug!("mail worker {} delivered to {}", id, mail.recipient);
            }
            Err(e) => {
                counters.failed.fetch_add(1, Ordering::Relaxed);
                warn!(
                    "mail worker {} could not deliver to {}: {} ({})",
                    id,
                    mail.recipient,
                    e,
                    counters.snapshot()
                );
            }
        }
    }
}

pub fn activation_mail(account: &account::Model, link: &str) -> OutgoingMail {
    OutgoingMail {
        subject: "Verify your email".to_string(),
        body: format!(
            "Hi {},\n\nUse the link below to verify your email address:\n{}\n",
            account.username, link
        ),
        recipient: account.email.clone(),
    }
}
