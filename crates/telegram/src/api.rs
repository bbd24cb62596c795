//! Telegram Bot API transport over HTTPS long polling.

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::debug;

use faqbot_core::config::TelegramConfig;
use faqbot_core::ChatUser;

use crate::events::{
    BotAction, BotEvent, BotUpdate, CallbackQueryEvent, IncomingMessage, MessageRef,
};
use crate::polling::{BotTransport, TransportError};

const ALLOWED_UPDATES: [&str; 2] = ["message", "callback_query"];
const NOT_MODIFIED: &str = "message is not modified";

/// Margin on top of the long-poll timeout before the HTTP client gives up.
const HTTP_TIMEOUT_MARGIN_SECS: u64 = 10;

pub struct BotApiTransport {
    http: Client,
    base_url: String,
    token: SecretString,
}

impl fmt::Debug for BotApiTransport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BotApiTransport")
            .field("base_url", &self.base_url)
            .field("token", &"[REDACTED]")
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Serialize)]
struct GetUpdatesParams {
    #[serde(skip_serializing_if = "Option::is_none")]
    offset: Option<i64>,
    timeout: u64,
    allowed_updates: [&'static str; 2],
}

#[derive(Debug, Deserialize)]
struct ApiResponse<T> {
    ok: bool,
    result: Option<T>,
    #[serde(default)]
    error_code: Option<i64>,
    description: Option<String>,
}

impl BotApiTransport {
    pub fn new(http: Client, base_url: impl Into<String>, token: SecretString) -> Self {
        Self { http, base_url: base_url.into(), token }
    }

    pub fn from_config(config: &TelegramConfig) -> Result<Self, TransportError> {
        let http = Client::builder()
            .timeout(Duration::from_secs(config.poll_timeout_secs + HTTP_TIMEOUT_MARGIN_SECS))
            .build()
            .map_err(|error| TransportError::Request(error.to_string()))?;
        Ok(Self::new(http, config.api_base_url.clone(), config.bot_token.clone()))
    }

    fn method_url(&self, method: &str) -> String {
        format!(
            "{}/bot{}/{method}",
            self.base_url.trim_end_matches('/'),
            self.token.expose_secret()
        )
    }

    async fn call<P, R>(&self, method: &str, params: &P) -> Result<R, TransportError>
    where
        P: Serialize + ?Sized + Sync,
        R: DeserializeOwned,
    {
        // Request errors carry the URL, and the URL carries the token.
        let response = self
            .http
            .post(self.method_url(method))
            .json(params)
            .send()
            .await
            .map_err(|error| TransportError::Request(error.without_url().to_string()))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|error| TransportError::Request(error.without_url().to_string()))?;

        let envelope: ApiResponse<R> = serde_json::from_str(&body).map_err(|error| {
            if status.is_success() {
                TransportError::Decode(format!("{method}: {error}"))
            } else {
                TransportError::Request(format!("{method} returned {status}"))
            }
        })?;

        if !envelope.ok {
            return Err(TransportError::Api {
                method: method.to_owned(),
                error_code: envelope.error_code.or(Some(i64::from(status.as_u16()))),
                description: envelope.description.unwrap_or_else(|| status.to_string()),
            });
        }

        envelope
            .result
            .ok_or_else(|| TransportError::Decode(format!("{method}: response has no result")))
    }
}

#[async_trait]
impl BotTransport for BotApiTransport {
    async fn get_updates(
        &self,
        offset: Option<i64>,
        timeout_secs: u64,
    ) -> Result<Option<Vec<BotUpdate>>, TransportError> {
        let params =
            GetUpdatesParams { offset, timeout: timeout_secs, allowed_updates: ALLOWED_UPDATES };
        let updates: Vec<WireUpdate> = self.call("getUpdates", &params).await?;
        Ok(Some(updates.into_iter().map(BotUpdate::from).collect()))
    }

    async fn execute(&self, action: &BotAction) -> Result<(), TransportError> {
        match self.call::<_, serde_json::Value>(action.method(), action).await {
            Ok(_) => Ok(()),
            Err(TransportError::Api { description, .. })
                if matches!(action, BotAction::EditMessageText { .. })
                    && description.contains(NOT_MODIFIED) =>
            {
                debug!(method = action.method(), "message already shows this answer");
                Ok(())
            }
            Err(error) => Err(error),
        }
    }
}

#[derive(Debug, Deserialize)]
struct WireUpdate {
    update_id: i64,
    #[serde(default)]
    message: Option<WireMessage>,
    #[serde(default)]
    callback_query: Option<WireCallbackQuery>,
}

#[derive(Debug, Deserialize)]
struct WireMessage {
    message_id: i64,
    chat: WireChat,
    #[serde(default)]
    from: Option<WireUser>,
    #[serde(default)]
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct WireChat {
    id: i64,
}

#[derive(Debug, Deserialize)]
struct WireUser {
    id: i64,
    #[serde(default)]
    username: Option<String>,
    #[serde(default)]
    first_name: String,
    #[serde(default)]
    last_name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct WireCallbackQuery {
    id: String,
    from: WireUser,
    #[serde(default)]
    message: Option<WireMessage>,
    #[serde(default)]
    data: Option<String>,
}

impl From<WireUser> for ChatUser {
    fn from(user: WireUser) -> Self {
        Self {
            id: user.id,
            username: user.username,
            first_name: user.first_name,
            last_name: user.last_name,
        }
    }
}

impl From<WireUpdate> for BotUpdate {
    fn from(update: WireUpdate) -> Self {
        let event = match (update.message, update.callback_query) {
            (Some(WireMessage { message_id, chat, from, text: Some(text) }), _) => {
                BotEvent::from_message(IncomingMessage {
                    chat_id: chat.id,
                    message_id,
                    from: from.map(ChatUser::from),
                    text,
                })
            }
            (Some(_), _) => BotEvent::Unsupported { event_type: "non_text_message".to_owned() },
            (None, Some(query)) => BotEvent::CallbackQuery(CallbackQueryEvent {
                id: query.id,
                data: query.data,
                from: query.from.into(),
                message: query.message.map(|origin| MessageRef {
                    chat_id: origin.chat.id,
                    message_id: origin.message_id,
                }),
            }),
            (None, None) => BotEvent::Unsupported { event_type: "unknown".to_owned() },
        };

        Self { update_id: update.update_id, event }
    }
}

#[cfg(test)]
mod tests {
    use httpmock::prelude::*;
    use secrecy::SecretString;
    use serde_json::json;

    use super::BotApiTransport;
    use crate::events::{BotAction, BotEvent, CommandEvent};
    use crate::markup::ParseMode;
    use crate::polling::{BotTransport, TransportError};

    const TOKEN: &str = "123456:test-secret";

    fn transport_for(server: &MockServer) -> BotApiTransport {
        let token = SecretString::from(TOKEN.to_owned());
        BotApiTransport::new(reqwest::Client::new(), server.base_url(), token)
    }

    #[tokio::test]
    async fn get_updates_decodes_messages_and_callbacks() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(POST).path("/bot123456:test-secret/getUpdates").json_body(json!({
                    "offset": 41,
                    "timeout": 25,
                    "allowed_updates": ["message", "callback_query"]
                }));
                then.status(200).json_body(json!({
                    "ok": true,
                    "result": [
                        {
                            "update_id": 41,
                            "message": {
                                "message_id": 5,
                                "date": 1700000000,
                                "chat": { "id": 100, "type": "private" },
                                "from": { "id": 7, "is_bot": false, "first_name": "Ann", "username": "ann" },
                                "text": "/start"
                            }
                        },
                        {
                            "update_id": 42,
                            "callback_query": {
                                "id": "cb-9",
                                "chat_instance": "ci",
                                "from": { "id": 7, "is_bot": false, "first_name": "Ann" },
                                "message": {
                                    "message_id": 6,
                                    "date": 1700000001,
                                    "chat": { "id": 100, "type": "private" }
                                },
                                "data": "d804a6fc748b3c0d"
                            }
                        },
                        {
                            "update_id": 43,
                            "message": {
                                "message_id": 7,
                                "date": 1700000002,
                                "chat": { "id": 100, "type": "private" },
                                "sticker": { "file_id": "x" }
                            }
                        }
                    ]
                }));
            })
            .await;

        let updates = transport_for(&server)
            .get_updates(Some(41), 25)
            .await
            .expect("updates")
            .expect("stream open");

        mock.assert_async().await;
        assert_eq!(updates.len(), 3);
        assert!(matches!(
            &updates[0].event,
            BotEvent::Command(CommandEvent { name, message, .. })
                if name == "start"
                    && message.chat_id == 100
                    && message.from.as_ref().and_then(|u| u.username.as_deref()) == Some("ann")
        ));
        match &updates[1].event {
            BotEvent::CallbackQuery(query) => {
                assert_eq!(query.id, "cb-9");
                assert_eq!(query.data.as_deref(), Some("d804a6fc748b3c0d"));
                assert_eq!(query.message.as_ref().map(|origin| origin.message_id), Some(6));
                assert_eq!(query.from.display_name(), "Ann ");
            }
            other => panic!("expected callback query, got {other:?}"),
        }
        assert!(matches!(updates[2].event, BotEvent::Unsupported { .. }));
    }

    #[tokio::test]
    async fn send_message_posts_bot_api_parameters() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(POST).path("/bot123456:test-secret/sendMessage").json_body(json!({
                    "chat_id": 100,
                    "text": "<b>hi</b>",
                    "parse_mode": "HTML"
                }));
                then.status(200).json_body(json!({
                    "ok": true,
                    "result": { "message_id": 8, "date": 1700000003, "chat": { "id": 100 } }
                }));
            })
            .await;

        transport_for(&server)
            .execute(&BotAction::SendMessage {
                chat_id: 100,
                text: "<b>hi</b>".to_owned(),
                parse_mode: Some(ParseMode::Html),
                reply_markup: None,
            })
            .await
            .expect("send message");

        mock.assert_async().await;
    }

    #[tokio::test]
    async fn api_rejections_carry_the_description() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/bot123456:test-secret/sendMessage");
                then.status(403).json_body(json!({
                    "ok": false,
                    "error_code": 403,
                    "description": "Forbidden: bot was blocked by the user"
                }));
            })
            .await;

        let error = transport_for(&server)
            .execute(&BotAction::SendMessage {
                chat_id: 100,
                text: "hello".to_owned(),
                parse_mode: None,
                reply_markup: None,
            })
            .await
            .expect_err("blocked");

        assert_eq!(
            error,
            TransportError::Api {
                method: "sendMessage".to_owned(),
                error_code: Some(403),
                description: "Forbidden: bot was blocked by the user".to_owned(),
            }
        );
    }

    #[tokio::test]
    async fn unchanged_edit_counts_as_success() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/bot123456:test-secret/editMessageText");
                then.status(400).json_body(json!({
                    "ok": false,
                    "error_code": 400,
                    "description": "Bad Request: message is not modified: specified new message content and reply markup are exactly the same"
                }));
            })
            .await;

        transport_for(&server)
            .execute(&BotAction::EditMessageText {
                chat_id: 100,
                message_id: 6,
                text: "<b>Q</b>\r\n\r\nA".to_owned(),
                parse_mode: Some(ParseMode::Html),
                reply_markup: None,
            })
            .await
            .expect("unchanged edit is fine");
    }

    #[tokio::test]
    async fn non_json_failures_are_request_errors() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/bot123456:test-secret/getUpdates");
                then.status(502).body("Bad Gateway");
            })
            .await;

        let error = transport_for(&server).get_updates(None, 1).await.expect_err("gateway error");

        assert!(matches!(error, TransportError::Request(ref message) if message.contains("502")));
        assert!(!error.to_string().contains("test-secret"));
    }

    #[test]
    fn debug_output_redacts_token() {
        let transport = BotApiTransport::new(
            reqwest::Client::new(),
            "https://api.telegram.org",
            SecretString::from(TOKEN.to_owned()),
        );
        let rendered = format!("{transport:?}");

        assert!(!rendered.contains("test-secret"));
        assert!(transport.method_url("getMe").ends_with("/bot123456:test-secret/getMe"));
    }
}
