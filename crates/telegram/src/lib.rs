//! Telegram front end for the FAQ bot.
//!
//! - **Events** (`events`) - updates, actions and the handler dispatcher
//! - **Service** (`service`) - replies to `/start`, `/update`, section names and button clicks
//! - **Markup** (`markup`) - reply/inline keyboards and message texts
//! - **Commands** (`commands`) - `/name@bot args` parsing
//! - **Polling** (`polling`) - long-polling loop with backoff
//! - **API** (`api`) - Bot API transport over HTTPS
//!
//! ```text
//! getUpdates → PollingRunner → EventDispatcher → FaqBotService → FaqCatalog
//!                   ↑                                  ↓
//!             BotTransport  ←────────── BotAction ─────┘
//! ```

pub mod api;
pub mod commands;
pub mod events;
pub mod markup;
pub mod polling;
pub mod service;

pub use api::BotApiTransport;
pub use events::{faq_dispatcher, BotAction, BotEvent, BotUpdate, EventDispatcher};
pub use polling::{BotTransport, PollingRunner, ReconnectPolicy, TransportError};
pub use service::FaqBotService;
