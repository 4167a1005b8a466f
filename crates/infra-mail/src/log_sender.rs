// Log-only sender for development setups without a mail provider

use async_trait::async_trait;
use reservo_core::port::{EmailTemplate, NotificationError, NotificationSender};
use tracing::info;

#[derive(Debug, Default, Clone, Copy)]
pub struct LogMailSender;

#[async_trait]
impl NotificationSender for LogMailSender {
    async fn send_email(
        &self,
        to: &str,
        template: EmailTemplate,
        context: &serde_json::Value,
        idempotency_key: &str,
    ) -> Result<(), NotificationError> {
        info!(
            to = %to,
            template = %template,
            idempotency_key = %idempotency_key,
            context = %context,
            "Email (log only)"
        );
        Ok(())
    }
}
