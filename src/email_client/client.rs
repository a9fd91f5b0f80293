use std::time::Duration;

use anyhow::Context;
use derivative::Derivative;
use reqwest::{
    Client,
    Url,
};

use crate::domain::SubscriberEmail;
use crate::email_client::errors::EmailClientError;
use crate::email_client::request::EmailRequest;

/// Client for the mail provider's HTTP send endpoint.
///
/// Every request is bounded by the configured timeout, so no send can
/// block a caller indefinitely.
#[derive(Derivative)]
#[derivative(Debug)]
pub struct EmailClient {
    http_client: Client,
    base_url: Url,
    sender: SubscriberEmail,
    #[derivative(Debug = "ignore")]
    token: String,
    send_pacing: Duration,
}

impl EmailClient {
    pub fn new(
        base_url: Url,
        sender: SubscriberEmail,
        token: String,
        timeout_secs: u64,
        send_pacing: Duration,
    ) -> Result<Self, anyhow::Error> {
        Ok(Self {
            http_client: Client::builder()
                .timeout(Duration::from_secs(timeout_secs))
                .build()
                .context(format!(
                    "error creating mail client with base_url: {} sender: {} timeout_secs: {}",
                    base_url,
                    sender.as_ref(),
                    timeout_secs
                ))?,
            base_url,
            sender,
            token,
            send_pacing,
        })
    }

    /// The fixed delay inserted between two consecutive sends of a fan-out
    /// loop, keeping the outbound rate below the provider's throttling
    /// threshold.
    pub fn send_pacing(&self) -> Duration {
        self.send_pacing
    }

    pub async fn send_email(
        &self,
        recipient: &SubscriberEmail,
        subject: &str,
        html_part: &str,
        text_part: &str,
    ) -> Result<(), EmailClientError> {
        let response = self
            .http_client
            .post(self.base_url.join("send")?)
            .header("Content-Type", "application/json")
            .header("Authorization", self.token.as_str())
            .json(&EmailRequest::single(
                self.sender.as_ref(),
                recipient.as_ref(),
                subject,
                html_part,
                text_part,
            ))
            .send()
            .await?;
        let status = response.status();
        if status.is_client_error() || status.is_server_error() {
            return Err(EmailClientError::ErrorResponse {
                code: status.as_str().to_string(),
                reason: status
                    .canonical_reason()
                    .unwrap_or("unknown status")
                    .to_string(),
            });
        }
        Ok(())
    }

    /// Attempt exactly one delivery and report the outcome.
    ///
    /// Never fails the caller: any transport or provider error is logged
    /// with its context and collapsed into `false`. This is what lets a
    /// fan-out loop treat every recipient uniformly.
    pub async fn send_best_effort(
        &self,
        recipient: &SubscriberEmail,
        subject: &str,
        html_part: &str,
        text_part: &str,
    ) -> bool {
        match self.send_email(recipient, subject, html_part, text_part).await {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!(
                    recipient = %recipient,
                    subject = %subject,
                    "error sending email: {}",
                    e
                );
                false
            }
        }
    }
}
