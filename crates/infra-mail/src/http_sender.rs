// HTTP mail API sender
//
// POSTs `{from, to, template, context}` as JSON with a bearer token and an
// `Idempotency-Key` header so providers can drop redelivered reminders.

use async_trait::async_trait;
use reqwest::Client;
use reservo_core::error::{AppError, Result};
use reservo_core::port::{EmailTemplate, NotificationError, NotificationSender};
use serde::Serialize;
use std::time::Duration;
use tracing::{debug, warn};

/// Upper bound on the provider error body kept in `Rejected`
const MAX_ERROR_BODY_CHARS: usize = 512;

#[derive(Debug, Clone)]
pub struct HttpMailConfig {
    pub endpoint: String,
    pub api_key: String,
    pub from: String,
    pub timeout: Duration,
}

pub struct HttpMailSender {
    client: Client,
    endpoint: String,
    api_key: String,
    from: String,
}

#[derive(Serialize)]
struct EmailPayload<'a> {
    from: &'a str,
    to: &'a str,
    template: EmailTemplate,
    context: &'a serde_json::Value,
}

impl HttpMailSender {
    pub fn new(config: HttpMailConfig) -> Result<Self> {
        if config.endpoint.trim().is_empty() {
            return Err(AppError::Config("mail endpoint must not be empty".into()));
        }

        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| AppError::Config(format!("Failed to build mail HTTP client: {}", e)))?;

        Ok(Self {
            client,
            endpoint: config.endpoint,
            api_key: config.api_key,
            from: config.from,
        })
    }
}

#[async_trait]
impl NotificationSender for HttpMailSender {
    async fn send_email(
        &self,
        to: &str,
        template: EmailTemplate,
        context: &serde_json::Value,
        idempotency_key: &str,
    ) -> std::result::Result<(), NotificationError> {
        let payload = EmailPayload {
            from: &self.from,
            to,
            template,
            context,
        };

        let res = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .header("Idempotency-Key", idempotency_key)
            .json(&payload)
            .send()
            .await
            .map_err(|e| {
                warn!(template = %template, error = %e, "Mail API unreachable");
                NotificationError::Transport(e.to_string())
            })?;

        let status = res.status();
        if !status.is_success() {
            let body = res.text().await.unwrap_or_default();
            let message: String = body.chars().take(MAX_ERROR_BODY_CHARS).collect();
            warn!(
                template = %template,
                status = status.as_u16(),
                body = %message,
                "Mail API rejected email"
            );
            return Err(NotificationError::Rejected {
                status: status.as_u16(),
                message,
            });
        }

        debug!(template = %template, idempotency_key = %idempotency_key, "Email accepted");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn sender(server: &MockServer) -> HttpMailSender {
        HttpMailSender::new(HttpMailConfig {
            endpoint: format!("{}/v1/send", server.uri()),
            api_key: "secret".into(),
            from: "noreply@reservo.test".into(),
            timeout: Duration::from_secs(2),
        })
        .unwrap()
    }

    #[tokio::test]
    async fn test_posts_payload_with_auth_and_idempotency_key() {
        let server = MockServer::start().await;
        let context = json!({ "booking_id": "b-1", "price_cents": 9900 });

        Mock::given(method("POST"))
            .and(path("/v1/send"))
            .and(header("Authorization", "Bearer secret"))
            .and(header("Idempotency-Key", "b-1:REMINDER_24H"))
            .and(body_json(json!({
                "from": "noreply@reservo.test",
                "to": "c@example.com",
                "template": "SESSION_REMINDER_24H",
                "context": { "booking_id": "b-1", "price_cents": 9900 }
            })))
            .respond_with(ResponseTemplate::new(202))
            .expect(1)
            .mount(&server)
            .await;

        sender(&server)
            .send_email(
                "c@example.com",
                EmailTemplate::SessionReminder24h,
                &context,
                "b-1:REMINDER_24H",
            )
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_non_success_status_is_rejected() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(503).set_body_string("try later"))
            .mount(&server)
            .await;

        let err = sender(&server)
            .send_email(
                "c@example.com",
                EmailTemplate::SessionReminder1h,
                &json!({}),
                "k",
            )
            .await
            .unwrap_err();

        assert_eq!(
            err,
            NotificationError::Rejected {
                status: 503,
                message: "try later".into()
            }
        );
    }

    #[tokio::test]
    async fn test_unreachable_endpoint_is_transport_error() {
        let s = HttpMailSender::new(HttpMailConfig {
            endpoint: "http://127.0.0.1:1/v1/send".into(),
            api_key: "secret".into(),
            from: "noreply@reservo.test".into(),
            timeout: Duration::from_secs(2),
        })
        .unwrap();

        let err = s
            .send_email("c@example.com", EmailTemplate::SessionReminder1h, &json!({}), "k")
            .await
            .unwrap_err();

        assert!(matches!(err, NotificationError::Transport(_)));
    }

    #[test]
    fn test_empty_endpoint_is_config_error() {
        let result = HttpMailSender::new(HttpMailConfig {
            endpoint: " ".into(),
            api_key: String::new(),
            from: "x".into(),
            timeout: Duration::from_secs(1),
        });
        assert!(matches!(result, Err(AppError::Config(_))));
    }
}
