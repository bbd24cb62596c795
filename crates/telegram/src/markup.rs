use serde::Serialize;

use faqbot_core::Section;

pub const MENU_PLACEHOLDER: &str = " 👉 Choose what interests you...";
pub const UPDATED_TEXT: &str = "🛠 Bot was updated!";
pub const NOT_ALLOWED_TEXT: &str = "⛔️ Not allowed!";
pub const UPDATE_FAILED_TEXT: &str = "⚠️ Update failed, previous content kept.";
pub const ANSWER_NOT_FOUND_TEXT: &str = "Answer not found ... 😟";

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum ParseMode {
    #[serde(rename = "HTML")]
    Html,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct InlineKeyboardButton {
    pub text: String,
    pub callback_data: String,
}

impl InlineKeyboardButton {
    pub fn callback(text: impl Into<String>, callback_data: impl Into<String>) -> Self {
        Self { text: text.into(), callback_data: callback_data.into() }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct KeyboardButton {
    pub text: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct InlineKeyboardMarkup {
    pub inline_keyboard: Vec<Vec<InlineKeyboardButton>>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ReplyKeyboardMarkup {
    pub keyboard: Vec<Vec<KeyboardButton>>,
    pub resize_keyboard: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub input_field_placeholder: Option<String>,
}

/// Markup attached to an outgoing message. Serializes to the bare Bot API
/// object, without a variant tag.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum ReplyMarkup {
    Inline(InlineKeyboardMarkup),
    Keyboard(ReplyKeyboardMarkup),
}

impl ReplyMarkup {
    pub fn inline_buttons(&self) -> &[Vec<InlineKeyboardButton>] {
        match self {
            Self::Inline(markup) => &markup.inline_keyboard,
            Self::Keyboard(_) => &[],
        }
    }

    pub fn keyboard_rows(&self) -> &[Vec<KeyboardButton>] {
        match self {
            Self::Inline(_) => &[],
            Self::Keyboard(markup) => &markup.keyboard,
        }
    }
}

/// Persistent menu with one section per row.
pub fn section_menu<'a, I>(section_names: I) -> ReplyMarkup
where
    I: IntoIterator<Item = &'a str>,
{
    ReplyMarkup::Keyboard(ReplyKeyboardMarkup {
        keyboard: section_names
            .into_iter()
            .map(|name| vec![KeyboardButton { text: name.to_string() }])
            .collect(),
        resize_keyboard: true,
        input_field_placeholder: Some(MENU_PLACEHOLDER.to_string()),
    })
}

/// One button per question, in sheet order.
pub fn question_keyboard(section: &Section) -> ReplyMarkup {
    ReplyMarkup::Inline(InlineKeyboardMarkup {
        inline_keyboard: section
            .buttons()
            .iter()
            .map(|button| {
                vec![InlineKeyboardButton::callback(&button.label, button.payload.as_str())]
            })
            .collect(),
    })
}

pub fn welcome_text(bot_title: &str, display_name: &str) -> String {
    format!(
        "⭐ {} welcomes you <b>{}!</b> ⭐",
        escape_html(bot_title),
        escape_html(display_name)
    )
}

/// The question is escaped; the answer is authored HTML and passes through.
pub fn answer_text(question: &str, answer: &str) -> String {
    format!("<b>{}</b>\r\n\r\n{answer}", escape_html(question))
}

pub fn escape_html(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            other => escaped.push(other),
        }
    }
    escaped
}
