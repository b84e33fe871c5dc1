use reqwest::{Client, Response, StatusCode};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use url::Url;

/// Client for a Brevo-compatible transactional email API.
#[derive(Clone)]
pub struct MailClient {
    http: Client,
    base_url: Url,
    api_key: String,
    sender: Sender,
}

/// Address mail is sent from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Sender {
    pub name: String,
    pub email: String,
}

/// Mailbox receiving a message (or replies to it).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Recipient {
    pub email: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

impl Recipient {
    pub fn new(email: impl Into<String>, name: Option<String>) -> Self {
        Self {
            email: email.into(),
            name,
        }
    }
}

/// Fully rendered message ready to be delivered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutgoingMail {
    pub to: Vec<Recipient>,
    pub reply_to: Option<Recipient>,
    pub subject: String,
    pub html: String,
    pub text: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SendEmailRequest<'a> {
    sender: &'a Sender,
    to: &'a [Recipient],
    #[serde(skip_serializing_if = "Option::is_none")]
    reply_to: Option<&'a Recipient>,
    subject: &'a str,
    html_content: &'a str,
    text_content: &'a str,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct SendEmailResponse {
    message_id: String,
}

impl MailClient {
    /// Creates a client. `base_url` must end with a slash so relative joins keep its path.
    pub fn new(base_url: Url, api_key: impl Into<String>, sender: Sender, http: Client) -> Self {
        Self {
            http,
            base_url,
            api_key: api_key.into(),
            sender,
        }
    }

    /// Delivers the message and returns the provider message id.
    pub async fn send(&self, mail: &OutgoingMail) -> Result<String, MailError> {
        let url = self.base_url.join("smtp/email")?;
        let body = SendEmailRequest {
            sender: &self.sender,
            to: &mail.to,
            reply_to: mail.reply_to.as_ref(),
            subject: &mail.subject,
            html_content: &mail.html,
            text_content: &mail.text,
        };

        let response = self
            .http
            .post(url)
            .header("api-key", &self.api_key)
            .header("accept", "application/json")
            .json(&body)
            .send()
            .await?;

        let parsed: SendEmailResponse = parse_json(response).await?;
        Ok(parsed.message_id)
    }
}

/// Errors produced by the mail client.
#[derive(Debug, Error)]
pub enum MailError {
    #[error("failed to build url: {0}")]
    Url(#[from] url::ParseError),
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("unexpected status {status}: {body}")]
    Status { status: StatusCode, body: String },
}

async fn parse_json<T>(response: Response) -> Result<T, MailError>
where
    T: serde::de::DeserializeOwned,
{
    let status = response.status();
    if !status.is_success() {
        let body = response
            .text()
            .await
            .unwrap_or_else(|_| String::from("<unavailable>"));
        return Err(MailError::Status { status, body });
    }

    Ok(response.json().await?)
}
