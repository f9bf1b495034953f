use async_trait::async_trait;
use serde::Deserialize;
use tracing::debug;

/// Errors produced by SMS delivery.
#[derive(Debug, thiserror::Error)]
pub enum SmsError {
    #[error("at least one recipient is required")]
    NoRecipients,
    #[error("sms request failed: {0}")]
    Request(#[from] reqwest::Error),
}

/// The delivery result for a single recipient.
///
/// Recipients succeed or fail independently; a failed recipient does not
/// abort delivery to the others.
#[derive(Debug, Clone)]
pub struct SmsOutcome {
    pub to: String,
    pub successful: bool,
    pub message_id: Option<String>,
    pub error: Option<String>,
}

/// A provider that delivers one message body to a list of recipients.
#[async_trait]
pub trait SmsProvider: Send + Sync {
    /// Sends `body` from `from` to every number in `to`, reporting one
    /// outcome per recipient in the same order.
    async fn send(&self, from: &str, to: &[String], body: &str)
    -> Result<Vec<SmsOutcome>, SmsError>;
}

/// An `SmsProvider` backed by the Twilio Messages REST API.
///
/// Twilio accepts one recipient per request, so a multi-recipient send issues
/// one POST per number and collects the per-recipient outcomes.
pub struct TwilioSmsClient {
    http: reqwest::Client,
    account_sid: String,
    auth_token: String,
    endpoint: String,
}

impl TwilioSmsClient {
    const DEFAULT_ENDPOINT: &'static str = "https://api.twilio.com";

    pub fn new(account_sid: String, auth_token: String) -> Self {
        Self {
            http: reqwest::Client::new(),
            account_sid,
            auth_token,
            endpoint: Self::DEFAULT_ENDPOINT.to_string(),
        }
    }

    /// Overrides the API endpoint, e.g. to point at a local stub.
    pub fn with_endpoint(mut self, endpoint: String) -> Self {
        self.endpoint = endpoint;
        self
    }

    fn messages_url(&self) -> String {
        format!(
            "{}/2010-04-01/Accounts/{}/Messages.json",
            self.endpoint, self.account_sid
        )
    }
}

#[async_trait]
impl SmsProvider for TwilioSmsClient {
    async fn send(
        &self,
        from: &str,
        to: &[String],
        body: &str,
    ) -> Result<Vec<SmsOutcome>, SmsError> {
        if to.is_empty() {
            return Err(SmsError::NoRecipients);
        }

        let mut outcomes = Vec::with_capacity(to.len());
        for recipient in to {
            let request = self
                .http
                .post(self.messages_url())
                .basic_auth(&self.account_sid, Some(&self.auth_token))
                .form(&[("From", from), ("To", recipient.as_str()), ("Body", body)]);

            let outcome = match request.send().await {
                Ok(response) => {
                    let status = response.status();
                    let text = response.text().await.unwrap_or_default();
                    outcome_for(recipient, status.is_success(), &text)
                }
                // A transport failure on one recipient is that recipient's
                // failure, not the whole batch's.
                Err(e) => SmsOutcome {
                    to: recipient.clone(),
                    successful: false,
                    message_id: None,
                    error: Some(e.to_string()),
                },
            };
            debug!(to = %outcome.to, successful = outcome.successful, "sms delivery attempt");
            outcomes.push(outcome);
        }
        Ok(outcomes)
    }
}

#[derive(Debug, Deserialize)]
struct MessageCreated {
    sid: String,
}

#[derive(Debug, Deserialize)]
struct ApiFailure {
    message: Option<String>,
}

/// Builds the per-recipient outcome from one Twilio response.
fn outcome_for(to: &str, success: bool, body: &str) -> SmsOutcome {
    if success {
        let message_id = serde_json::from_str::<MessageCreated>(body)
            .ok()
            .map(|m| m.sid);
        SmsOutcome {
            to: to.to_string(),
            successful: true,
            message_id,
            error: None,
        }
    } else {
        let error = serde_json::from_str::<ApiFailure>(body)
            .ok()
            .and_then(|f| f.message)
            .unwrap_or_else(|| body.to_string());
        SmsOutcome {
            to: to.to_string(),
            successful: false,
            message_id: None,
            error: Some(error),
        }
    }
}
