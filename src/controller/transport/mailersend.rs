//! # MailerSend Transport
//!
//! `POST {base_url}/v1/email` with a bearer token.
//!
//! Request body:
//!
//! ```json
//! {"from":{"email":"..."},"to":[{"email":"..."}],"subject":"...","html":"..."}
//! ```
//!
//! The message id is read from the `message_id` field of a JSON response
//! body, or from the `X-Message-Id` header when the provider answers 202
//! without a body.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::{EmailTransport, OutboundEmail, SendReceipt, TransportError};
use crate::constants::MAILERSEND_SEND_PATH;
use crate::observability::metrics;

const MESSAGE_ID_HEADER: &str = "x-message-id";

#[derive(Serialize)]
struct Address<'a> {
    email: &'a str,
}

#[derive(Serialize)]
struct SendRequestBody<'a> {
    from: Address<'a>,
    to: [Address<'a>; 1],
    subject: &'a str,
    html: &'a str,
}

#[derive(Deserialize)]
struct SendResponseBody {
    message_id: Option<String>,
}

/// MailerSend REST client
#[derive(Debug, Clone)]
pub struct MailerSendTransport {
    http_client: reqwest::Client,
    endpoint: String,
    timeout: Duration,
}

impl MailerSendTransport {
    /// Create a transport for `base_url` (e.g. `https://api.mailersend.com`)
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, reqwest::Error> {
        let http_client = reqwest::Client::builder()
            .timeout(timeout)
            .connect_timeout(timeout)
            .build()?;

        Ok(Self {
            http_client,
            endpoint: format!("{}{MAILERSEND_SEND_PATH}", base_url.trim_end_matches('/')),
            timeout,
        })
    }

    #[must_use]
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    fn classify(&self, err: &reqwest::Error) -> TransportError {
        if err.is_timeout() {
            TransportError::Timeout(self.timeout)
        } else {
            TransportError::Network(err.to_string())
        }
    }

    async fn submit(&self, email: &OutboundEmail) -> Result<SendReceipt, TransportError> {
        let body = SendRequestBody {
            from: Address { email: &email.from },
            to: [Address { email: &email.to }],
            subject: &email.subject,
            html: &email.html,
        };

        let response = self
            .http_client
            .post(&self.endpoint)
            .bearer_auth(email.api_token.as_str())
            .json(&body)
            .send()
            .await
            .map_err(|e| self.classify(&e))?;

        let status = response.status();
        let header_message_id = response
            .headers()
            .get(MESSAGE_ID_HEADER)
            .and_then(|value| value.to_str().ok())
            .map(str::to_string);

        // Body read shares the client timeout
        let text = response.text().await.map_err(|e| {
            if status.is_success() {
                // Accepted, so the message may be out; never retry this one
                TransportError::MalformedResponse(format!("failed to read response body: {e}"))
            } else {
                // The status line already decided the outcome
                TransportError::Status {
                    status: status.as_u16(),
                    body: format!("<unreadable body: {e}>"),
                }
            }
        })?;

        if !status.is_success() {
            return Err(TransportError::Status {
                status: status.as_u16(),
                body: text,
            });
        }

        let body_message_id = if text.trim().is_empty() {
            None
        } else {
            serde_json::from_str::<SendResponseBody>(&text)
                .map_err(|e| TransportError::MalformedResponse(format!("invalid JSON body: {e}")))?
                .message_id
        };

        body_message_id
            .or(header_message_id)
            .filter(|id| !id.trim().is_empty())
            .map(|message_id| SendReceipt { message_id })
            .ok_or_else(|| {
                TransportError::MalformedResponse(format!(
                    "HTTP {} without message_id: {text}",
                    status.as_u16()
                ))
            })
    }
}

#[async_trait]
impl EmailTransport for MailerSendTransport {
    async fn send(&self, email: &OutboundEmail) -> Result<SendReceipt, TransportError> {
        let start = Instant::now();
        let result = self.submit(email).await;
        metrics::observe_transport_request_duration(start.elapsed().as_secs_f64());

        match &result {
            Ok(receipt) => {
                metrics::increment_transport_requests("success");
                debug!(
                    endpoint = %self.endpoint,
                    message_id = %receipt.message_id,
                    "MailerSend accepted message"
                );
            }
            Err(err) => {
                metrics::increment_transport_requests(err.kind());
                warn!(
                    endpoint = %self.endpoint,
                    error = %err,
                    retryable = err.is_retryable(),
                    "MailerSend request failed"
                );
            }
        }

        result
    }
}
