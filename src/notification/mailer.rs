//! OTP mail delivery through an HTTP mail relay.
//!
//! Posts a JSON message to the configured relay endpoint. When no relay
//! is configured (local dev) delivery degrades to a logged no-op so the
//! auth flow stays testable without mail infrastructure.

use anyhow::Context;
use serde::Serialize;

#[derive(Clone)]
pub struct Mailer {
    client: reqwest::Client,
    api_url: Option<String>,
    from: String,
}

#[derive(Serialize)]
struct MailMessage<'a> {
    from: &'a str,
    to: &'a str,
    subject: &'a str,
    text: &'a str,
}

impl Mailer {
    pub fn new(api_url: Option<String>, from: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_url,
            from,
        }
    }

    pub async fn send(&self, to: &str, subject: &str, body: &str) -> anyhow::Result<()> {
        let url = match &self.api_url {
            Some(u) => u,
            None => {
                tracing::debug!(%to, %subject, "mail relay not configured, dropping message");
                return Ok(());
            }
        };

        let message = MailMessage {
            from: &self.from,
            to,
            subject,
            text: body,
        };

        let resp = self
            .client
            .post(url)
            .json(&message)
            .send()
            .await
            .context("failed to reach mail relay")?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            anyhow::bail!("mail relay returned error: status={}, body={}", status, body);
        }

        tracing::info!(%to, "mail sent");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn unconfigured_relay_is_a_noop() {
        let mailer = Mailer::new(None, "no-reply@navgate.local".into());
        assert!(mailer
            .send("user@example.com", "Your OTP Code", "Your OTP is: 123456")
            .await
            .is_ok());
    }
}
