use std::sync::Arc;

use tracing::{info, warn};

use faqbot_core::analytics::START_LABEL;
use faqbot_core::{
    AdminAllowList, AnalyticsRecord, AnalyticsSink, ChatUser, FaqCatalog, QuestionKey,
    ReloadSummary, SpreadsheetClient,
};

use crate::events::{BotAction, CallbackQueryEvent, EventHandlerError, IncomingMessage};
use crate::markup::{
    answer_text, question_keyboard, section_menu, welcome_text, ParseMode, ReplyMarkup,
    ANSWER_NOT_FOUND_TEXT, NOT_ALLOWED_TEXT, UPDATED_TEXT, UPDATE_FAILED_TEXT,
};

/// Turns user interactions into Bot API actions against the current FAQ
/// snapshot.
pub struct FaqBotService {
    catalog: Arc<FaqCatalog>,
    sheets: Arc<dyn SpreadsheetClient>,
    admins: AdminAllowList,
    analytics: Arc<dyn AnalyticsSink>,
    bot_title: String,
}

impl FaqBotService {
    pub fn new(
        catalog: Arc<FaqCatalog>,
        sheets: Arc<dyn SpreadsheetClient>,
        admins: AdminAllowList,
        analytics: Arc<dyn AnalyticsSink>,
        bot_title: impl Into<String>,
    ) -> Self {
        Self { catalog, sheets, admins, analytics, bot_title: bot_title.into() }
    }

    pub fn catalog(&self) -> &Arc<FaqCatalog> {
        &self.catalog
    }

    fn menu(&self) -> ReplyMarkup {
        let snapshot = self.catalog.snapshot();
        section_menu(snapshot.index.section_names())
    }

    pub fn start(&self, message: &IncomingMessage, user: &ChatUser) -> Vec<BotAction> {
        let actions = vec![BotAction::SendMessage {
            chat_id: message.chat_id,
            text: welcome_text(&self.bot_title, &user.display_name()),
            parse_mode: Some(ParseMode::Html),
            reply_markup: Some(self.menu()),
        }];

        self.analytics.record(AnalyticsRecord::new(user, START_LABEL, None));
        actions
    }

    pub async fn reload(&self) -> Result<ReloadSummary, EventHandlerError> {
        Ok(self.catalog.reload(self.sheets.as_ref()).await?)
    }

    /// Admin-only reload. Denials and failures are answered, not returned.
    pub async fn update(&self, message: &IncomingMessage, user: &ChatUser) -> Vec<BotAction> {
        let text = if !self.admins.is_admin(user) {
            warn!(
                event_name = "bot.update.denied",
                user_id = user.id,
                username = user.username.as_deref().unwrap_or("unknown"),
                "non-admin requested content update"
            );
            NOT_ALLOWED_TEXT
        } else {
            match self.reload().await {
                Ok(summary) => {
                    info!(
                        event_name = "bot.update.completed",
                        user_id = user.id,
                        sections = summary.sections,
                        questions = summary.questions,
                        "content updated on admin request"
                    );
                    UPDATED_TEXT
                }
                Err(error) => {
                    warn!(
                        event_name = "bot.update.failed",
                        user_id = user.id,
                        error = %error,
                        "content update failed; keeping previous snapshot"
                    );
                    UPDATE_FAILED_TEXT
                }
            }
        };

        vec![BotAction::SendMessage {
            chat_id: message.chat_id,
            text: text.to_owned(),
            parse_mode: None,
            reply_markup: Some(self.menu()),
        }]
    }

    /// Replies with a section's question buttons when the text names a
    /// section. Every message is recorded.
    pub fn show_section(&self, message: &IncomingMessage, user: &ChatUser) -> Vec<BotAction> {
        let snapshot = self.catalog.snapshot();
        let actions = match snapshot.index.section(&message.text) {
            Some(section) => vec![BotAction::SendMessage {
                chat_id: message.chat_id,
                text: message.text.clone(),
                parse_mode: None,
                reply_markup: Some(question_keyboard(section)),
            }],
            None => Vec::new(),
        };

        self.analytics.record(AnalyticsRecord::new(user, message.text.clone(), None));
        actions
    }

    pub fn answer_click(&self, query: &CallbackQueryEvent) -> Vec<BotAction> {
        let mut actions = vec![BotAction::AnswerCallbackQuery {
            callback_query_id: query.id.clone(),
            text: None,
        }];

        let snapshot = self.catalog.snapshot();
        let resolved = query
            .data
            .as_deref()
            .and_then(QuestionKey::parse)
            .and_then(|key| snapshot.index.resolve(&key));

        let Some((section, entry)) = resolved else {
            warn!(
                event_name = "bot.callback.not_found",
                callback_query_id = %query.id,
                data = query.data.as_deref().unwrap_or(""),
                "callback payload does not match any question"
            );
            if let Some(origin) = &query.message {
                actions.push(BotAction::SendMessage {
                    chat_id: origin.chat_id,
                    text: ANSWER_NOT_FOUND_TEXT.to_owned(),
                    parse_mode: None,
                    reply_markup: None,
                });
            }
            return actions;
        };

        if let Some(origin) = &query.message {
            actions.push(BotAction::EditMessageText {
                chat_id: origin.chat_id,
                message_id: origin.message_id,
                text: answer_text(&entry.question, &entry.answer),
                parse_mode: Some(ParseMode::Html),
                reply_markup: Some(question_keyboard(section)),
            });
        }

        self.analytics.record(AnalyticsRecord::new(
            &query.from,
            section.name(),
            Some(entry.question.clone()),
        ));
        actions
    }
}
