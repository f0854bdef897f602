use async_trait::async_trait;
use tracing::info;

/// Outbound email seam. Actual delivery belongs to an external provider;
/// failures never propagate to the calling flow.
#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, to: &str, subject: &str, body: &str);
}

/// Logs the message instead of sending it. Stands in until a provider
/// implementation is wired up behind the same trait.
pub struct LogMailer;

#[async_trait]
impl Mailer for LogMailer {
    async fn send(&self, to: &str, subject: &str, _body: &str) {
        info!(to, subject, "outbound mail");
    }
}
