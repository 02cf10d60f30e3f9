use crate::domain::model::{Notification, RunStatus};
use crate::domain::ports::Notifier;
use crate::utils::error::Result;
use async_trait::async_trait;

/// Emits the terminal notification as a structured log event.
///
/// Mail delivery is left to whatever collects these events.
#[derive(Debug, Clone, Default)]
pub struct LogNotifier {
    recipients: Vec<String>,
}

impl LogNotifier {
    pub fn new(recipients: Vec<String>) -> Self {
        Self { recipients }
    }
}

#[async_trait]
impl Notifier for LogNotifier {
    async fn notify(&self, notification: &Notification) -> Result<()> {
        let recipients = self.recipients.join(", ");
        match notification.status {
            RunStatus::Success => tracing::info!(
                recipients = %recipients,
                subject = %notification.subject,
                "📧 {}",
                notification.body
            ),
            RunStatus::Failure => tracing::error!(
                recipients = %recipients,
                subject = %notification.subject,
                "📧 {}",
                notification.body
            ),
        }
        Ok(())
    }
}
