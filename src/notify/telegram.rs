//! Telegram Bot API notifier.

use serde_json::json;
use tracing::{info, warn};

use super::Notifier;
use crate::config::NotifyConfig;
use crate::error::{ForgeError, Result};

pub struct TelegramNotifier {
    client: reqwest::blocking::Client,
    api_base: String,
    token: String,
    chat_id: String,
}

impl std::fmt::Debug for TelegramNotifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TelegramNotifier")
            .field("api_base", &self.api_base)
            .field("chat_id", &self.chat_id)
            .finish_non_exhaustive()
    }
}

impl TelegramNotifier {
    /// Build from the env vars named in config; `None` when either is unset.
    pub fn from_config(config: &NotifyConfig) -> Result<Option<Self>> {
        let token = std::env::var(&config.bot_token_env).ok().filter(|v| !v.is_empty());
        let chat_id = std::env::var(&config.chat_id_env).ok().filter(|v| !v.is_empty());
        match (token, chat_id) {
            (Some(token), Some(chat_id)) => Self::new(&config.telegram_api, token, chat_id).map(Some),
            _ => Ok(None),
        }
    }

    pub fn new(
        api_base: &str,
        token: impl Into<String>,
        chat_id: impl Into<String>,
    ) -> Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .timeout(std::time::Duration::from_secs(15))
            .build()
            .map_err(|err| ForgeError::Config(format!("telegram http client: {err}")))?;
        Ok(Self {
            client,
            api_base: api_base.trim_end_matches('/').to_string(),
            token: token.into(),
            chat_id: chat_id.into(),
        })
    }

    fn send(&self, text: &str, html: bool) -> Result<()> {
        let mut body = json!({ "chat_id": self.chat_id, "text": text });
        if html {
            body["parse_mode"] = json!("HTML");
        }
        let response = self
            .client
            .post(format!("{}/bot{}/sendMessage", self.api_base, self.token))
            .json(&body)
            .send()
            .map_err(|err| ForgeError::Notification(format!("telegram request failed: {}", err.without_url())))?;
        if !response.status().is_success() {
            return Err(ForgeError::Notification(format!(
                "telegram HTTP {}",
                response.status()
            )));
        }
        Ok(())
    }
}

impl Notifier for TelegramNotifier {
    /// Send as HTML, retrying once as plain text if Telegram rejects the markup.
    fn notify(&self, message: &str) -> Result<()> {
        match self.send(message, true) {
            Ok(()) => {
                info!("sent telegram notification");
                Ok(())
            }
            Err(err) => {
                warn!(error = %err, "telegram HTML send failed, retrying as plain text");
                self.send(message, false)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::prelude::*;

    #[test]
    fn sends_html_message() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(POST)
                .path("/botTOKEN/sendMessage")
                .json_body(json!({"chat_id": "42", "text": "<b>hi</b>", "parse_mode": "HTML"}));
            then.status(200).json_body(json!({"ok": true}));
        });
        let notifier = TelegramNotifier::new(&server.base_url(), "TOKEN", "42").unwrap();
        notifier.notify("<b>hi</b>").unwrap();
        mock.assert();
    }

    #[test]
    fn falls_back_to_plain_text() {
        let server = MockServer::start();
        let html = server.mock(|when, then| {
            when.method(POST)
                .path("/botTOKEN/sendMessage")
                .json_body(json!({"chat_id": "42", "text": "<bad", "parse_mode": "HTML"}));
            then.status(400);
        });
        let plain = server.mock(|when, then| {
            when.method(POST)
                .path("/botTOKEN/sendMessage")
                .json_body(json!({"chat_id": "42", "text": "<bad"}));
            then.status(200).json_body(json!({"ok": true}));
        });
        let notifier = TelegramNotifier::new(&server.base_url(), "TOKEN", "42").unwrap();
        notifier.notify("<bad").unwrap();
        html.assert();
        plain.assert();
    }

    #[test]
    fn missing_credentials_yield_none() {
        let config = NotifyConfig {
            bot_token_env: "SKILL_FORGE_TEST_UNSET_TOKEN".to_string(),
            chat_id_env: "SKILL_FORGE_TEST_UNSET_CHAT".to_string(),
            ..NotifyConfig::default()
        };
        assert!(TelegramNotifier::from_config(&config).unwrap().is_none());
    }
}
