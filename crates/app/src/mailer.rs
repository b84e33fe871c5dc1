use metrics::counter;
use tracing::{error, info};
use url::Url;

use empleaworks_mail::{MailClient, MailError, OutgoingMail, Recipient, Sender};
use empleaworks_util::MailConfig;

/// Outcome of a delivery attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Delivery {
    Sent(String),
    /// Mail is disabled; the message was only logged.
    Skipped,
}

/// Sends notifications when an API key is configured.
#[derive(Clone)]
pub struct Mailer {
    client: Option<MailClient>,
    inbox: Recipient,
}

impl Mailer {
    pub fn from_config(config: &MailConfig, http: reqwest::Client) -> Result<Self, url::ParseError> {
        let client = match &config.api_key {
            Some(api_key) => Some(MailClient::new(
                Url::parse(&config.api_url)?,
                api_key.clone(),
                Sender {
                    name: config.from_name.clone(),
                    email: config.from_address.clone(),
                },
                http,
            )),
            None => None,
        };
        let inbox = Recipient::new(
            config
                .contact_recipient
                .clone()
                .unwrap_or_else(|| config.from_address.clone()),
            Some(config.from_name.clone()),
        );
        Ok(Self { client, inbox })
    }

    /// Mailbox that receives contact form messages.
    pub fn inbox(&self) -> Recipient {
        self.inbox.clone()
    }

    pub async fn send(&self, kind: &'static str, mail: &OutgoingMail) -> Result<Delivery, MailError> {
        let Some(client) = &self.client else {
            info!(stage = "mail", kind, subject = %mail.subject, "mail disabled, skipping delivery");
            counter!("mail_deliveries_total", "kind" => kind, "result" => "skipped").increment(1);
            return Ok(Delivery::Skipped);
        };

        match client.send(mail).await {
            Ok(message_id) => {
                info!(stage = "mail", kind, %message_id, "mail delivered");
                counter!("mail_deliveries_total", "kind" => kind, "result" => "sent").increment(1);
                Ok(Delivery::Sent(message_id))
            }
            Err(err) => {
                error!(stage = "mail", kind, error = %err, "mail delivery failed");
                counter!("mail_deliveries_total", "kind" => kind, "result" => "failed").increment(1);
                Err(err)
            }
        }
    }

    /// Sends a notification whose failure must not fail the request.
    pub async fn notify(&self, kind: &'static str, mail: OutgoingMail) {
        // Failures are already logged and counted by `send`.
        let _ = self.send(kind, &mail).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(api_key: Option<&str>) -> MailConfig {
        MailConfig {
            api_url: "https://api.brevo.com/v3/".into(),
            api_key: api_key.map(str::to_string),
            from_address: "no-reply@empleaworks.test".into(),
            from_name: "EmpleaWorks".into(),
            contact_recipient: None,
        }
    }

    #[tokio::test]
    async fn disabled_mailer_skips_delivery() {
        let mailer = Mailer::from_config(&config(None), reqwest::Client::new()).expect("mailer");
        let mail = OutgoingMail {
            to: vec![Recipient::new("ana@example.com", None)],
            reply_to: None,
            subject: "Hi".into(),
            html: "<p>Hi</p>".into(),
            text: "Hi".into(),
        };
        assert_eq!(mailer.send("welcome", &mail).await.expect("send"), Delivery::Skipped);
    }

    #[test]
    fn inbox_falls_back_to_sender_address() {
        let mailer = Mailer::from_config(&config(Some("key")), reqwest::Client::new()).expect("mailer");
        assert_eq!(mailer.inbox().email, "no-reply@empleaworks.test");
    }
}
