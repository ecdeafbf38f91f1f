//! Email delivery.
//!
//! [`Mailer`] is the seam; [`ResendMailer`] posts to the Resend HTTP API.
//! Delivery is never retried: every failure surfaces as
//! [`IdeaError::Delivery`].

use async_trait::async_trait;
use serde::Serialize;

use crate::config::{EmailConfig, EmailCredentials};
use crate::error::IdeaError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmailMessage {
    pub from: String,
    pub to: String,
    pub subject: String,
    pub html: String,
}

#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, message: &EmailMessage) -> Result<(), IdeaError>;
}

#[derive(Serialize)]
struct SendRequest<'a> {
    from: &'a str,
    to: [&'a str; 1],
    subject: &'a str,
    html: &'a str,
}

pub struct ResendMailer {
    client: reqwest::Client,
    api_base: String,
    api_key: String,
}

impl ResendMailer {
    pub fn new(config: &EmailConfig, credentials: &EmailCredentials) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_base: config.api_base.trim_end_matches('/').to_string(),
            api_key: credentials.email_key.clone(),
        }
    }
}

#[async_trait]
impl Mailer for ResendMailer {
    async fn send(&self, message: &EmailMessage) -> Result<(), IdeaError> {
        let body = SendRequest {
            from: &message.from,
            to: [&message.to],
            subject: &message.subject,
            html: &message.html,
        };

        let response = self
            .client
            .post(format!("{}/emails", self.api_base))
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&body)
            .send()
            .await
            .map_err(|e| IdeaError::Delivery(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(IdeaError::Delivery(format!("{}: {}", status, text)));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_shape() {
        let body = SendRequest {
            from: "bot@example.com",
            to: ["me@example.com"],
            subject: "Hi",
            html: "<p>x</p>",
        };
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["to"], serde_json::json!(["me@example.com"]));
        assert_eq!(json["from"], "bot@example.com");
        assert_eq!(json["html"], "<p>x</p>");
    }

    #[tokio::test]
    async fn test_unreachable_endpoint_is_delivery_error() {
        let mailer = ResendMailer::new(
            &EmailConfig {
                api_base: "http://127.0.0.1:9".to_string(),
            },
            &EmailCredentials {
                email_key: "k".to_string(),
                email_to: "me@example.com".to_string(),
                email_from: "bot@example.com".to_string(),
            },
        );
        let err = mailer
            .send(&EmailMessage {
                from: "bot@example.com".to_string(),
                to: "me@example.com".to_string(),
                subject: "s".to_string(),
                html: "h".to_string(),
            })
            .await
            .unwrap_err();
        assert!(matches!(err, IdeaError::Delivery(_)));
    }
}
