use std::{future::Future, sync::Arc, time::Duration};

use anyhow::Result;
use async_trait::async_trait;
use thiserror::Error;
use tracing::{debug, error, info, warn};

use crate::events::{BotAction, BotEvent, BotUpdate, EventContext, EventDispatcher};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TransportError {
    #[error("bot api request failed: {0}")]
    Request(String),
    #[error("bot api rejected `{method}`: {description}")]
    Api { method: String, error_code: Option<i64>, description: String },
    #[error("bot api response could not be decoded: {0}")]
    Decode(String),
}

impl TransportError {
    /// A rejected token (401) or an unknown bot endpoint (404) will not heal
    /// by waiting. Everything else, including 409/429/5xx, is retried.
    pub fn is_unrecoverable(&self) -> bool {
        matches!(self, Self::Api { error_code: Some(401 | 404), .. })
    }
}

#[derive(Debug, Error)]
pub enum RunnerError {
    #[error("polling stopped after {attempts} consecutive transport failures: {last}")]
    Unrecoverable { attempts: u32, last: TransportError },
}

/// Backoff between failed polls. Transient failures are retried forever.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ReconnectPolicy {
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self { base_delay_ms: 250, max_delay_ms: 5_000 }
    }
}

impl ReconnectPolicy {
    fn backoff(&self, attempt: u32) -> Duration {
        let exponent = attempt.min(16);
        let multiplier = 1_u64 << exponent;
        let delay_ms = self.base_delay_ms.saturating_mul(multiplier).min(self.max_delay_ms);
        Duration::from_millis(delay_ms)
    }
}

#[async_trait]
pub trait BotTransport: Send + Sync {
    /// Long-polls for updates after `offset`. `None` means the stream ended.
    async fn get_updates(
        &self,
        offset: Option<i64>,
        timeout_secs: u64,
    ) -> Result<Option<Vec<BotUpdate>>, TransportError>;
    async fn execute(&self, action: &BotAction) -> Result<(), TransportError>;
}

#[derive(Default)]
pub struct NoopBotTransport;

#[async_trait]
impl BotTransport for NoopBotTransport {
    async fn get_updates(
        &self,
        _offset: Option<i64>,
        _timeout_secs: u64,
    ) -> Result<Option<Vec<BotUpdate>>, TransportError> {
        Ok(None)
    }

    async fn execute(&self, _action: &BotAction) -> Result<(), TransportError> {
        Ok(())
    }
}

pub struct PollingRunner {
    transport: Arc<dyn BotTransport>,
    dispatcher: EventDispatcher,
    reconnect_policy: ReconnectPolicy,
    poll_timeout_secs: u64,
}

impl Default for PollingRunner {
    fn default() -> Self {
        Self {
            transport: Arc::new(NoopBotTransport),
            dispatcher: EventDispatcher::default(),
            reconnect_policy: ReconnectPolicy::default(),
            poll_timeout_secs: 30,
        }
    }
}

impl PollingRunner {
    pub fn new(
        transport: Arc<dyn BotTransport>,
        dispatcher: EventDispatcher,
        reconnect_policy: ReconnectPolicy,
        poll_timeout_secs: u64,
    ) -> Self {
        Self { transport, dispatcher, reconnect_policy, poll_timeout_secs }
    }

    pub async fn run(&self) -> Result<()> {
        self.run_until(std::future::pending::<()>()).await
    }

    /// Polls and dispatches until the stream ends, `shutdown` resolves, or
    /// Telegram rejects the bot outright (see `is_unrecoverable`).
    pub async fn run_until<F>(&self, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()> + Send,
    {
        tokio::pin!(shutdown);
        let mut offset: Option<i64> = None;
        let mut failures: u32 = 0;

        info!(poll_timeout_secs = self.poll_timeout_secs, "starting telegram long polling");
        loop {
            let batch = tokio::select! {
                biased;
                () = &mut shutdown => {
                    info!("shutdown requested; stopping telegram polling");
                    return Ok(());
                }
                batch = self.transport.get_updates(offset, self.poll_timeout_secs) => batch,
            };

            match batch {
                Ok(None) => {
                    info!("telegram update stream closed");
                    return Ok(());
                }
                Ok(Some(updates)) => {
                    failures = 0;
                    for update in updates {
                        offset = Some(update.update_id + 1);
                        self.process(&update).await;
                    }
                }
                Err(transport_error) => {
                    failures = failures.saturating_add(1);
                    if transport_error.is_unrecoverable() {
                        error!(
                            event_name = "ingress.telegram.polling_aborted",
                            attempt = failures,
                            error = %transport_error,
                            "telegram rejected polling; check the bot token"
                        );
                        return Err(RunnerError::Unrecoverable {
                            attempts: failures,
                            last: transport_error,
                        }
                        .into());
                    }
                    warn!(
                        event_name = "ingress.telegram.polling_failed",
                        attempt = failures,
                        error = %transport_error,
                        "telegram polling request failed; retrying"
                    );

                    let delay = self.reconnect_policy.backoff(failures - 1);
                    if !delay.is_zero() {
                        tokio::select! {
                            biased;
                            () = &mut shutdown => return Ok(()),
                            () = tokio::time::sleep(delay) => {}
                        }
                    }
                }
            }
        }
    }

    async fn process(&self, update: &BotUpdate) {
        let (chat_id, user_id) = correlation_fields(update);
        info!(
            event_name = "ingress.telegram.update_received",
            update_id = update.update_id,
            event_type = ?update.event.event_type(),
            chat_id = chat_id.unwrap_or_default(),
            user_id = user_id.unwrap_or_default(),
            "received telegram update"
        );

        let context = EventContext { correlation_id: update.update_id.to_string() };
        let actions = match self.dispatcher.dispatch(update, &context).await {
            Ok(result) => result.into_actions(),
            Err(error) => {
                warn!(
                    update_id = update.update_id,
                    correlation_id = %context.correlation_id,
                    error = %error,
                    "event dispatch failed; continuing polling loop"
                );
                return;
            }
        };

        for action in &actions {
            match self.transport.execute(action).await {
                Ok(()) => debug!(
                    event_name = "egress.telegram.action_sent",
                    update_id = update.update_id,
                    method = action.method(),
                    "telegram action sent"
                ),
                Err(error) => warn!(
                    event_name = "egress.telegram.action_sent",
                    update_id = update.update_id,
                    method = action.method(),
                    error = %error,
                    "failed to send telegram action"
                ),
            }
        }
    }
}

fn correlation_fields(update: &BotUpdate) -> (Option<i64>, Option<i64>) {
    match &update.event {
        BotEvent::Command(event) => {
            (Some(event.message.chat_id), event.message.from.as_ref().map(|user| user.id))
        }
        BotEvent::Text(message) => {
            (Some(message.chat_id), message.from.as_ref().map(|user| user.id))
        }
        BotEvent::CallbackQuery(query) => {
            (query.message.as_ref().map(|origin| origin.chat_id), Some(query.from.id))
        }
        BotEvent::Unsupported { .. } => (None, None),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::sync::Arc;
    use std::time::Duration;

    use async_trait::async_trait;
    use tokio::sync::Mutex;

    use faqbot_core::ChatUser;

    use super::{BotTransport, PollingRunner, ReconnectPolicy, RunnerError, TransportError};
    use crate::events::{
        BotAction, BotEvent, BotEventType, BotUpdate, EventContext, EventDispatcher,
        EventHandler, EventHandlerError, HandlerResult, IncomingMessage,
    };

    type Batch = Result<Option<Vec<BotUpdate>>, TransportError>;

    #[derive(Default)]
    struct ScriptedTransport {
        state: Mutex<ScriptedState>,
    }

    #[derive(Default)]
    struct ScriptedState {
        batches: VecDeque<Batch>,
        execute_results: VecDeque<Result<(), TransportError>>,
        offsets: Vec<Option<i64>>,
        executed: Vec<BotAction>,
    }

    impl ScriptedTransport {
        fn with_script(
            batches: Vec<Batch>,
            execute_results: Vec<Result<(), TransportError>>,
        ) -> Self {
            Self {
                state: Mutex::new(ScriptedState {
                    batches: batches.into(),
                    execute_results: execute_results.into(),
                    offsets: Vec::new(),
                    executed: Vec::new(),
                }),
            }
        }

        async fn offsets(&self) -> Vec<Option<i64>> {
            self.state.lock().await.offsets.clone()
        }

        async fn executed_texts(&self) -> Vec<String> {
            let state = self.state.lock().await;
            state.executed.iter().filter_map(|action| action.text().map(str::to_owned)).collect()
        }
    }

    #[async_trait]
    impl BotTransport for ScriptedTransport {
        async fn get_updates(&self, offset: Option<i64>, _timeout_secs: u64) -> Batch {
            let mut state = self.state.lock().await;
            state.offsets.push(offset);
            state.batches.pop_front().unwrap_or(Ok(None))
        }

        async fn execute(&self, action: &BotAction) -> Result<(), TransportError> {
            let mut state = self.state.lock().await;
            state.executed.push(action.clone());
            state.execute_results.pop_front().unwrap_or(Ok(()))
        }
    }

    struct EchoHandler;

    #[async_trait]
    impl EventHandler for EchoHandler {
        fn event_type(&self) -> BotEventType {
            BotEventType::Text
        }

        async fn handle(
            &self,
            update: &BotUpdate,
            _ctx: &EventContext,
        ) -> Result<HandlerResult, EventHandlerError> {
            let BotEvent::Text(message) = &update.event else {
                return Ok(HandlerResult::Ignored);
            };
            Ok(HandlerResult::Responded(vec![
                BotAction::SendMessage {
                    chat_id: message.chat_id,
                    text: format!("{}-a", message.text),
                    parse_mode: None,
                    reply_markup: None,
                },
                BotAction::SendMessage {
                    chat_id: message.chat_id,
                    text: format!("{}-b", message.text),
                    parse_mode: None,
                    reply_markup: None,
                },
            ]))
        }
    }

    fn text_update(update_id: i64, text: &str) -> BotUpdate {
        BotUpdate {
            update_id,
            event: BotEvent::Text(IncomingMessage {
                chat_id: 1,
                message_id: update_id,
                from: Some(ChatUser {
                    id: 9,
                    username: None,
                    first_name: "Eve".to_owned(),
                    last_name: None,
                }),
                text: text.to_owned(),
            }),
        }
    }

    fn echo_dispatcher() -> EventDispatcher {
        let mut dispatcher = EventDispatcher::new();
        dispatcher.register(EchoHandler);
        dispatcher
    }

    fn instant_policy() -> ReconnectPolicy {
        ReconnectPolicy { base_delay_ms: 0, max_delay_ms: 0 }
    }

    fn connection_reset() -> Batch {
        Err(TransportError::Request("connection reset".to_owned()))
    }

    #[tokio::test]
    async fn advances_offset_and_executes_actions_in_order() {
        let transport = Arc::new(ScriptedTransport::with_script(
            vec![Ok(Some(vec![text_update(10, "one"), text_update(11, "two")])), Ok(None)],
            vec![],
        ));
        let runner = PollingRunner::new(transport.clone(), echo_dispatcher(), instant_policy(), 30);

        runner.run().await.expect("runner should finish cleanly");

        assert_eq!(transport.offsets().await, vec![None, Some(12)]);
        assert_eq!(transport.executed_texts().await, vec!["one-a", "one-b", "two-a", "two-b"]);
    }

    #[tokio::test]
    async fn retries_after_transport_failures() {
        let transport = Arc::new(ScriptedTransport::with_script(
            vec![
                Err(TransportError::Request("network down".to_owned())),
                Err(TransportError::Request("still down".to_owned())),
                Ok(Some(vec![text_update(3, "hi")])),
                Ok(None),
            ],
            vec![],
        ));
        let runner = PollingRunner::new(transport.clone(), echo_dispatcher(), instant_policy(), 30);

        runner.run().await.expect("runner should recover");

        assert_eq!(transport.offsets().await, vec![None, None, None, Some(4)]);
        assert_eq!(transport.executed_texts().await, vec!["hi-a", "hi-b"]);
    }

    #[tokio::test(start_paused = true)]
    async fn keeps_polling_through_a_long_outage() {
        let mut script: Vec<Batch> = (0..12).map(|_| connection_reset()).collect();
        script.push(Err(TransportError::Api {
            method: "getUpdates".to_owned(),
            error_code: Some(502),
            description: "Bad Gateway".to_owned(),
        }));
        script.push(Err(TransportError::Api {
            method: "getUpdates".to_owned(),
            error_code: Some(429),
            description: "Too Many Requests: retry after 1".to_owned(),
        }));
        script.push(Ok(Some(vec![text_update(7, "back")])));
        script.push(Ok(None));
        let transport = Arc::new(ScriptedTransport::with_script(script, vec![]));
        let runner = PollingRunner::new(
            transport.clone(),
            echo_dispatcher(),
            ReconnectPolicy::default(),
            30,
        );

        runner.run().await.expect("transient failures never stop the runner");

        assert_eq!(transport.executed_texts().await, vec!["back-a", "back-b"]);
        assert_eq!(transport.offsets().await.last(), Some(&Some(8)));
    }

    #[tokio::test]
    async fn stops_when_the_token_is_rejected() {
        let transport = Arc::new(ScriptedTransport::with_script(
            vec![
                connection_reset(),
                Err(TransportError::Api {
                    method: "getUpdates".to_owned(),
                    error_code: Some(401),
                    description: "Unauthorized".to_owned(),
                }),
                Ok(Some(vec![text_update(1, "never")])),
            ],
            vec![],
        ));
        let runner = PollingRunner::new(transport.clone(), echo_dispatcher(), instant_policy(), 30);

        let error = runner.run().await.expect_err("bad token is fatal");

        assert!(matches!(
            error.downcast_ref::<RunnerError>(),
            Some(RunnerError::Unrecoverable { attempts: 2, .. })
        ));
        assert_eq!(transport.offsets().await.len(), 2);
        assert!(transport.executed_texts().await.is_empty());
    }

    #[test]
    fn only_auth_and_missing_bot_errors_are_unrecoverable() {
        let api = |code| TransportError::Api {
            method: "getUpdates".to_owned(),
            error_code: code,
            description: String::new(),
        };

        assert!(api(Some(401)).is_unrecoverable());
        assert!(api(Some(404)).is_unrecoverable());
        assert!(!api(Some(409)).is_unrecoverable());
        assert!(!api(Some(429)).is_unrecoverable());
        assert!(!api(Some(500)).is_unrecoverable());
        assert!(!api(None).is_unrecoverable());
        assert!(!TransportError::Request("timeout".to_owned()).is_unrecoverable());
        assert!(!TransportError::Decode("bad json".to_owned()).is_unrecoverable());
    }

    #[tokio::test]
    async fn failed_actions_do_not_stop_the_loop() {
        let transport = Arc::new(ScriptedTransport::with_script(
            vec![Ok(Some(vec![text_update(1, "x")])), Ok(Some(vec![text_update(2, "y")]))],
            vec![Err(TransportError::Api {
                method: "sendMessage".to_owned(),
                error_code: Some(403),
                description: "Forbidden: bot was blocked by the user".to_owned(),
            })],
        ));
        let runner = PollingRunner::new(transport.clone(), echo_dispatcher(), instant_policy(), 30);

        runner.run().await.expect("runner should finish cleanly");

        assert_eq!(transport.executed_texts().await, vec!["x-a", "x-b", "y-a", "y-b"]);
        assert_eq!(transport.offsets().await, vec![None, Some(2), Some(3)]);
    }

    #[tokio::test]
    async fn resolved_shutdown_stops_before_polling() {
        let transport = Arc::new(ScriptedTransport::with_script(
            vec![Ok(Some(vec![text_update(1, "never")]))],
            vec![],
        ));
        let runner = PollingRunner::new(transport.clone(), echo_dispatcher(), instant_policy(), 30);

        runner.run_until(async {}).await.expect("shutdown is not an error");

        assert!(transport.offsets().await.is_empty());
    }

    #[test]
    fn backoff_doubles_up_to_the_cap() {
        let policy = ReconnectPolicy::default();

        assert_eq!(policy.backoff(0), Duration::from_millis(250));
        assert_eq!(policy.backoff(1), Duration::from_millis(500));
        assert_eq!(policy.backoff(3), Duration::from_millis(2_000));
        assert_eq!(policy.backoff(10), Duration::from_millis(5_000));
    }
}
