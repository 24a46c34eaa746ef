/// Outbound email
///
/// Handlers send mail through `Arc<dyn EmailSender>` in `AppState`. The
/// server ships with `LogEmailSender`, which writes each message to the log
/// instead of delivering it; `MockEmailSender` keeps messages in memory for
/// tests.

use async_trait::async_trait;
use tokio::sync::Mutex;

#[async_trait]
pub trait EmailSender: Send + Sync {
    async fn send(&self, to: &str, subject: &str, body: &str) -> anyhow::Result<()>;
}

/// Logs messages at `info` instead of delivering them
#[derive(Debug, Default, Clone, Copy)]
pub struct LogEmailSender;

#[async_trait]
impl EmailSender for LogEmailSender {
    async fn send(&self, to: &str, subject: &str, body: &str) -> anyhow::Result<()> {
        tracing::info!(to = %to, subject = %subject, body = %body, "Outgoing email");
        Ok(())
    }
}

/// A message captured by `MockEmailSender`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentEmail {
    pub to: String,
    pub subject: String,
    pub body: String,
}

/// Records messages in memory
#[derive(Debug, Default)]
pub struct MockEmailSender {
    sent: Mutex<Vec<SentEmail>>,
}

impl MockEmailSender {
    pub fn new() -> Self {
        MockEmailSender::default()
    }

    /// Everything sent so far, oldest first
    pub async fn sent(&self) -> Vec<SentEmail> {
        self.sent.lock().await.clone()
    }
}

#[async_trait]
impl EmailSender for MockEmailSender {
    async fn send(&self, to: &str, subject: &str, body: &str) -> anyhow::Result<()> {
        self.sent.lock().await.push(SentEmail {
            to: to.to_string(),
            subject: subject.to_string(),
            body: body.to_string(),
        });
        Ok(())
    }
}
