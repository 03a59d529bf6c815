use crate::alert::Alert;
use crate::config::SmtpConfig;
use crate::metrics::Metrics;
use anyhow::{Context, Result};
use async_trait::async_trait;
use lettre::message::header::ContentType;
use lettre::message::{Mailbox, Mailboxes};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use log::{debug, info, warn};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tokio::task::JoinHandle;

pub const DISPATCH_QUEUE_DEPTH: usize = 64;

/// Delivers one alert message. Implementations report failure; callers
/// decide what to do with it.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, subject: &str, body: &str) -> Result<()>;
}

/// Plain-text mail over a STARTTLS relay with login credentials.
pub struct SmtpNotifier {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    sender: Mailbox,
    recipients: Mailboxes,
}

impl SmtpNotifier {
    pub fn new(cfg: &SmtpConfig) -> Result<Self> {
        let sender: Mailbox = cfg
            .sender_address()
            .parse()
            .with_context(|| format!("invalid sender address {:?}", cfg.sender_address()))?;

        let mut recipients = Mailboxes::new();
        for recipient in &cfg.recipients {
            let mailbox: Mailbox = recipient
                .parse()
                .with_context(|| format!("invalid recipient address {recipient:?}"))?;
            recipients.push(mailbox);
        }

        let transport = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&cfg.server)
            .with_context(|| format!("failed to configure SMTP relay {}", cfg.server))?
            .port(cfg.port)
            .credentials(Credentials::new(
                cfg.username.clone(),
                cfg.password.clone(),
            ))
            .timeout(Some(Duration::from_secs(cfg.timeout_secs.max(1))))
            .build();

        Ok(Self {
            transport,
            sender,
            recipients,
        })
    }

    fn build_message(&self, subject: &str, body: &str) -> Result<Message> {
        let mut builder = Message::builder()
            .from(self.sender.clone())
            .subject(subject)
            .header(ContentType::TEXT_PLAIN);
        for recipient in self.recipients.iter() {
            builder = builder.to(recipient.clone());
        }
        builder
            .body(body.to_string())
            .context("failed to build alert message")
    }
}

#[async_trait]
impl Notifier for SmtpNotifier {
    async fn notify(&self, subject: &str, body: &str) -> Result<()> {
        let message = self.build_message(subject, body)?;
        self.transport
            .send(message)
            .await
            .context("SMTP delivery failed")?;
        Ok(())
    }
}

/// Hands alerts to a background worker so a slow or failing transport
/// never delays the sampling loop.
///
/// The queue is bounded; when it is full the alert is dropped and counted.
/// Dropping every clone closes the queue and lets the worker finish.
#[derive(Clone)]
pub struct AlertDispatcher {
    tx: mpsc::Sender<Alert>,
    metrics: Arc<Metrics>,
}

impl AlertDispatcher {
    pub fn spawn(
        notifier: Arc<dyn Notifier>,
        metrics: Arc<Metrics>,
        depth: usize,
    ) -> (Self, JoinHandle<()>) {
        let (tx, rx) = mpsc::channel(depth.max(1));
        let worker_metrics = Arc::clone(&metrics);
        let handle = tokio::spawn(async move {
            run_worker(rx, notifier, worker_metrics).await;
        });
        (Self { tx, metrics }, handle)
    }

    /// Queues `alert` for delivery. Returns false if it was dropped.
    pub fn dispatch(&self, alert: Alert) -> bool {
        match self.tx.try_send(alert) {
            Ok(()) => {
                self.metrics.inc_alerts_dispatched();
                true
            }
            Err(TrySendError::Full(alert)) => {
                self.metrics.inc_alerts_dropped();
                warn!(
                    "[notify] queue full; dropping {} alert: {}",
                    alert.key, alert.subject
                );
                false
            }
            Err(TrySendError::Closed(alert)) => {
                self.metrics.inc_alerts_dropped();
                warn!("[notify] worker gone; dropping {} alert", alert.key);
                false
            }
        }
    }
}

async fn run_worker(
    mut rx: mpsc::Receiver<Alert>,
    notifier: Arc<dyn Notifier>,
    metrics: Arc<Metrics>,
) {
    while let Some(alert) = rx.recv().await {
        match notifier.notify(&alert.subject, &alert.body).await {
            Ok(()) => {
                metrics.inc_alerts_sent();
                info!("[notify] {} alert sent: {}", alert.key, alert.subject);
            }
            Err(err) => {
                metrics.inc_alerts_failed();
                warn!("[notify] {} alert lost: {err:#}", alert.key);
            }
        }
    }
    debug!("[notify] dispatch queue closed");
}
