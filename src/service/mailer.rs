use crate::error::PortalError;

use backon::{ExponentialBuilder, Retryable};
use futures::stream::StreamExt;
use governor::{Quota, RateLimiter};
use reqwest::StatusCode;
use serde::Serialize;
use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error as ThisError;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tracing::{debug, info, warn};
use url::Url;

const QUEUE_CAPACITY: usize = 256;

fn default_retry_policy() -> ExponentialBuilder {
    ExponentialBuilder::default()
        .with_min_delay(Duration::from_millis(500))
        .with_max_delay(Duration::from_secs(3))
        .with_max_times(3)
        .with_jitter()
}

/// One outbound e-mail, serialized as the relay request body.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct MailJob {
    pub to: String,
    pub subject: String,
    pub text: String,
    pub html: String,
}

#[derive(Debug, ThisError)]
enum DeliveryError {
    #[error("relay unreachable: {0}")]
    Network(#[from] reqwest::Error),

    #[error("relay answered {0}")]
    Status(StatusCode),
}

impl DeliveryError {
    fn is_retryable(&self) -> bool {
        match self {
            DeliveryError::Network(e) => e.is_timeout() || e.is_connect(),
            DeliveryError::Status(s) => s.is_server_error() || *s == StatusCode::TOO_MANY_REQUESTS,
        }
    }
}

#[derive(Serialize)]
struct RelayRequest<'a> {
    from: &'a str,
    #[serde(flatten)]
    job: &'a MailJob,
}

#[derive(Clone)]
enum Transport {
    Relay { client: reqwest::Client, url: Url },
    /// No relay configured: mails are written to the log.
    Preview,
}

impl Transport {
    async fn deliver(&self, from: &str, job: &MailJob) -> Result<(), DeliveryError> {
        match self {
            Transport::Preview => {
                info!(
                    to = %job.to,
                    subject = %job.subject,
                    "mail preview (no relay configured)\n{}",
                    job.text
                );
                Ok(())
            }
            Transport::Relay { client, url } => {
                let resp = client
                    .post(url.clone())
                    .json(&RelayRequest { from, job })
                    .send()
                    .await?;
                let status = resp.status();
                if status.is_success() {
                    Ok(())
                } else {
                    Err(DeliveryError::Status(status))
                }
            }
        }
    }
}

/// Settings for [`MailService::new`].
#[derive(Debug, Clone)]
pub struct MailSettings {
    pub relay_url: Option<Url>,
    pub from: String,
    pub per_minute: u32,
    pub concurrency: usize,
}

/// Queues outbound mail and delivers it from a background pipeline.
#[derive(Clone)]
pub struct MailService {
    job_tx: mpsc::Sender<MailJob>,
}

impl MailService {
    /// Build the transport and start the delivery worker. Must run inside a tokio runtime.
    pub fn new(settings: MailSettings) -> Result<Self, PortalError> {
        let transport = match settings.relay_url.clone() {
            Some(url) => {
                let client = reqwest::Client::builder()
                    .user_agent("resident-portal-mailer/1.0")
                    .connect_timeout(Duration::from_secs(5))
                    .timeout(Duration::from_secs(15))
                    .build()?;
                Transport::Relay { client, url }
            }
            None => Transport::Preview,
        };

        let per_minute = NonZeroU32::new(settings.per_minute).unwrap_or(NonZeroU32::MIN);
        let limiter = Arc::new(RateLimiter::direct(Quota::per_minute(per_minute)));
        let concurrency = settings.concurrency.max(1);
        let relay_label = settings
            .relay_url
            .as_ref()
            .map_or_else(|| "<preview>".to_string(), Url::to_string);
        let from: Arc<str> = Arc::from(settings.from);

        let (job_tx, job_rx) = mpsc::channel::<MailJob>(QUEUE_CAPACITY);

        tokio::spawn(async move {
            info!(
                "Mail Pipeline Started: Concurrency={}, RateLimit={}/min, Relay={}",
                concurrency, per_minute, relay_label
            );

            let mut pipeline = ReceiverStream::new(job_rx)
                .map(|job| {
                    let lim = limiter.clone();
                    let transport = transport.clone();
                    let from = from.clone();
                    async move {
                        lim.until_ready().await;
                        let res = (|| async { transport.deliver(&from, &job).await })
                            .retry(default_retry_policy())
                            .when(DeliveryError::is_retryable)
                            .notify(|err, dur: Duration| {
                                warn!(to = %job.to, "mail delivery retrying after {err}, sleeping {dur:?}");
                            })
                            .await;
                        (job, res)
                    }
                })
                .buffer_unordered(concurrency);

            while let Some((job, res)) = pipeline.next().await {
                match res {
                    Ok(()) => debug!(to = %job.to, subject = %job.subject, "mail delivered"),
                    Err(e) => warn!(to = %job.to, subject = %job.subject, error = %e, "mail dropped"),
                }
            }
            info!("Mail Pipeline Stopped");
        });

        Ok(Self { job_tx })
    }

    /// Enqueue a mail. Never blocks the caller; a full queue drops the mail with a warning.
    pub fn submit(&self, job: MailJob) {
        if let Err(e) = self.job_tx.try_send(job) {
            warn!("Failed to queue mail (channel closed/full): {}", e);
        }
    }

    pub fn send_chat_notification(&self, to: &str, sender_name: &str, message: &str, chat_url: &str) {
        self.submit(chat_notification(to, sender_name, message, chat_url));
    }
}

/// Render the mail sent to the recipient of a private chat message.
pub fn chat_notification(to: &str, sender_name: &str, message: &str, chat_url: &str) -> MailJob {
    let text = format!(
        "Hello,\n\n\
         You received a new message from {sender_name}:\n\n\
         \"{message}\"\n\n\
         Follow this link to reply:\n\
         {chat_url}\n\n\
         Kind regards,\n\
         Resident Portal\n"
    );

    let sender = html_escape::encode_text(sender_name);
    let body = html_escape::encode_text(message);
    let href = html_escape::encode_double_quoted_attribute(chat_url);
    let html = format!(
        r#"<div style="font-family: Arial, sans-serif; max-width: 600px; margin: 0 auto;">
  <h2 style="color: #2563eb;">New message received</h2>
  <p>Hello,</p>
  <p>You received a new message from <strong>{sender}</strong>:</p>
  <div style="background-color: #f3f4f6; padding: 15px; border-radius: 5px; margin: 15px 0;">
    <p style="margin: 0;">"{body}"</p>
  </div>
  <p><a href="{href}" style="background-color: #2563eb; color: white; padding: 10px 15px; text-decoration: none; border-radius: 5px; display: inline-block;">Reply</a></p>
  <p style="margin-top: 20px; color: #6b7280; font-size: 0.9em;">Kind regards,<br>Resident Portal</p>
</div>"#
    );

    MailJob {
        to: to.to_string(),
        subject: format!("New message from {sender_name}"),
        text,
        html,
    }
}
