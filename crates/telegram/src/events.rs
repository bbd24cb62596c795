use std::{collections::HashMap, sync::Arc};

use async_trait::async_trait;
use serde::Serialize;
use thiserror::Error;

use faqbot_core::{ChatUser, IndexError};

use crate::{
    commands::{parse_command_text, BotCommand},
    markup::{ParseMode, ReplyMarkup},
    service::FaqBotService,
};

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BotUpdate {
    pub update_id: i64,
    pub event: BotEvent,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum BotEvent {
    Command(CommandEvent),
    Text(IncomingMessage),
    CallbackQuery(CallbackQueryEvent),
    Unsupported { event_type: String },
}

impl BotEvent {
    /// Classifies a text message as a command or free text.
    pub fn from_message(message: IncomingMessage) -> Self {
        match parse_command_text(&message.text) {
            Some(command) => {
                Self::Command(CommandEvent { name: command.name, args: command.args, message })
            }
            None => Self::Text(message),
        }
    }

    pub fn event_type(&self) -> BotEventType {
        match self {
            Self::Command(_) => BotEventType::Command,
            Self::Text(_) => BotEventType::Text,
            Self::CallbackQuery(_) => BotEventType::CallbackQuery,
            Self::Unsupported { .. } => BotEventType::Unsupported,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum BotEventType {
    Command,
    Text,
    CallbackQuery,
    Unsupported,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct IncomingMessage {
    pub chat_id: i64,
    pub message_id: i64,
    pub from: Option<ChatUser>,
    pub text: String,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CommandEvent {
    pub name: String,
    pub args: String,
    pub message: IncomingMessage,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MessageRef {
    pub chat_id: i64,
    pub message_id: i64,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CallbackQueryEvent {
    pub id: String,
    pub data: Option<String>,
    pub from: ChatUser,
    pub message: Option<MessageRef>,
}

/// Outgoing Bot API call. Serializes to the method's JSON parameters.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum BotAction {
    SendMessage {
        chat_id: i64,
        text: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        parse_mode: Option<ParseMode>,
        #[serde(skip_serializing_if = "Option::is_none")]
        reply_markup: Option<ReplyMarkup>,
    },
    EditMessageText {
        chat_id: i64,
        message_id: i64,
        text: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        parse_mode: Option<ParseMode>,
        #[serde(skip_serializing_if = "Option::is_none")]
        reply_markup: Option<ReplyMarkup>,
    },
    AnswerCallbackQuery {
        callback_query_id: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        text: Option<String>,
    },
}

impl BotAction {
    pub fn method(&self) -> &'static str {
        match self {
            Self::SendMessage { .. } => "sendMessage",
            Self::EditMessageText { .. } => "editMessageText",
            Self::AnswerCallbackQuery { .. } => "answerCallbackQuery",
        }
    }

    pub fn text(&self) -> Option<&str> {
        match self {
            Self::SendMessage { text, .. } | Self::EditMessageText { text, .. } => {
                Some(text.as_str())
            }
            Self::AnswerCallbackQuery { text, .. } => text.as_deref(),
        }
    }

    pub fn reply_markup(&self) -> Option<&ReplyMarkup> {
        match self {
            Self::SendMessage { reply_markup, .. } | Self::EditMessageText { reply_markup, .. } => {
                reply_markup.as_ref()
            }
            Self::AnswerCallbackQuery { .. } => None,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EventContext {
    pub correlation_id: String,
}

impl Default for EventContext {
    fn default() -> Self {
        Self { correlation_id: "unknown-correlation-id".to_owned() }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum HandlerResult {
    Responded(Vec<BotAction>),
    Processed,
    Ignored,
}

impl HandlerResult {
    pub fn from_actions(actions: Vec<BotAction>) -> Self {
        if actions.is_empty() {
            Self::Processed
        } else {
            Self::Responded(actions)
        }
    }

    pub fn into_actions(self) -> Vec<BotAction> {
        match self {
            Self::Responded(actions) => actions,
            Self::Processed | Self::Ignored => Vec::new(),
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum EventHandlerError {
    #[error("catalog reload failed: {0}")]
    Reload(#[from] IndexError),
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum DispatchError {
    #[error(transparent)]
    Handler(#[from] EventHandlerError),
}

#[async_trait]
pub trait EventHandler: Send + Sync {
    fn event_type(&self) -> BotEventType;
    async fn handle(
        &self,
        update: &BotUpdate,
        ctx: &EventContext,
    ) -> Result<HandlerResult, EventHandlerError>;
}

#[derive(Default)]
pub struct EventDispatcher {
    handlers: HashMap<BotEventType, Arc<dyn EventHandler>>,
}

impl EventDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<H>(&mut self, handler: H)
    where
        H: EventHandler + 'static,
    {
        self.handlers.insert(handler.event_type(), Arc::new(handler));
    }

    pub async fn dispatch(
        &self,
        update: &BotUpdate,
        ctx: &EventContext,
    ) -> Result<HandlerResult, DispatchError> {
        let Some(handler) = self.handlers.get(&update.event.event_type()) else {
            return Ok(HandlerResult::Ignored);
        };

        handler.handle(update, ctx).await.map_err(DispatchError::from)
    }

    pub fn handler_count(&self) -> usize {
        self.handlers.len()
    }
}

/// Dispatcher wired to the FAQ handlers.
pub fn faq_dispatcher(service: Arc<FaqBotService>) -> EventDispatcher {
    let mut dispatcher = EventDispatcher::new();
    dispatcher.register(CommandHandler::new(service.clone()));
    dispatcher.register(TextHandler::new(service.clone()));
    dispatcher.register(CallbackQueryHandler::new(service));
    dispatcher
}

pub struct CommandHandler {
    service: Arc<FaqBotService>,
}

impl CommandHandler {
    pub fn new(service: Arc<FaqBotService>) -> Self {
        Self { service }
    }
}

#[async_trait]
impl EventHandler for CommandHandler {
    fn event_type(&self) -> BotEventType {
        BotEventType::Command
    }

    async fn handle(
        &self,
        update: &BotUpdate,
        _ctx: &EventContext,
    ) -> Result<HandlerResult, EventHandlerError> {
        let BotEvent::Command(event) = &update.event else {
            return Ok(HandlerResult::Ignored);
        };
        let Some(user) = &event.message.from else {
            return Ok(HandlerResult::Ignored);
        };

        let actions = match BotCommand::from_name(&event.name) {
            BotCommand::Start => self.service.start(&event.message, user),
            BotCommand::Update => self.service.update(&event.message, user).await,
            // Unrecognized commands fall through to the section lookup.
            BotCommand::Other(_) => self.service.show_section(&event.message, user),
        };
        Ok(HandlerResult::from_actions(actions))
    }
}

pub struct TextHandler {
    service: Arc<FaqBotService>,
}

impl TextHandler {
    pub fn new(service: Arc<FaqBotService>) -> Self {
        Self { service }
    }
}

#[async_trait]
impl EventHandler for TextHandler {
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
        let Some(user) = &message.from else {
            return Ok(HandlerResult::Ignored);
        };

        Ok(HandlerResult::from_actions(self.service.show_section(message, user)))
    }
}

pub struct CallbackQueryHandler {
    service: Arc<FaqBotService>,
}

impl CallbackQueryHandler {
    pub fn new(service: Arc<FaqBotService>) -> Self {
        Self { service }
    }
}

#[async_trait]
impl EventHandler for CallbackQueryHandler {
    fn event_type(&self) -> BotEventType {
        BotEventType::CallbackQuery
    }

    async fn handle(
        &self,
        update: &BotUpdate,
        _ctx: &EventContext,
    ) -> Result<HandlerResult, EventHandlerError> {
        let BotEvent::CallbackQuery(query) = &update.event else {
            return Ok(HandlerResult::Ignored);
        };

        Ok(HandlerResult::from_actions(self.service.answer_click(query)))
    }
}
