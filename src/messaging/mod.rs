mod keyboards;
mod utils;

use async_trait::async_trait;
use chrono_tz::Tz;
use mockall::automock;
use teloxide::{
    prelude::*,
    types::{ChatId, ForceReply, InlineKeyboardMarkup, ParseMode},
    utils::{command::BotCommands, html},
};
use thiserror::Error;

use crate::{
    bot_handler::{BotHandlerError, Command, CommandState},
    garden::{FuturePlanting, PlantOverview, PlantTasks},
    schedule::PlantEvent,
    storage::{Plant, SeedStock, User},
};

#[derive(Debug, Error)]
pub enum MessagingError {
    #[error("Teloxide API request failed: {0}")]
    TeloxideRequest(#[from] teloxide::RequestError),
}

type Result<T> = std::result::Result<T, MessagingError>;

/// Trait for sending messages to the user.
#[automock]
#[async_trait]
pub trait MessagingService: Send + Sync {
    /// Sends an HTML message to the provided chat with a keyboard. If no
    /// keyboard is provided, the default command keyboard is used.
    async fn send_response_with_keyboard(
        &self,
        chat_id: ChatId,
        text: String,
        keyboard: Option<InlineKeyboardMarkup>,
    ) -> Result<()>;

    /// Asks the user to reply with the arguments of a pending command.
    async fn prompt_for_input(&self, chat_id: ChatId, state: CommandState) -> Result<()>;

    async fn send_error_msg(&self, chat_id: ChatId, error: BotHandlerError) -> Result<()>;

    async fn send_help_msg(&self, chat_id: ChatId) -> Result<()>;

    /// Greets a new user, or an existing one when `new_account` is false.
    async fn send_start_msg(&self, chat_id: ChatId, user: User, new_account: bool) -> Result<()>;

    async fn send_plants_msg(&self, chat_id: ChatId, plants: Vec<PlantOverview>) -> Result<()>;

    async fn send_today_tasks_msg(&self, chat_id: ChatId, tasks: Vec<PlantTasks>) -> Result<()>;

    async fn send_seed_stock_msg(&self, chat_id: ChatId, stock: Vec<SeedStock>) -> Result<()>;

    async fn send_seeds_added_msg(
        &self,
        chat_id: ChatId,
        added: u32,
        stock: SeedStock,
    ) -> Result<()>;

    async fn send_planted_msg(
        &self,
        chat_id: ChatId,
        plant: Plant,
        stock: SeedStock,
    ) -> Result<()>;

    async fn send_future_plantings_msg(
        &self,
        chat_id: ChatId,
        plantings: Vec<FuturePlanting>,
    ) -> Result<()>;

    async fn send_event_recorded_msg(
        &self,
        chat_id: ChatId,
        plant: Plant,
        event: PlantEvent,
    ) -> Result<()>;

    async fn send_timezone_msg(&self, chat_id: ChatId, timezone: Tz) -> Result<()>;

    async fn send_stages_msg(&self, chat_id: ChatId) -> Result<()>;

    /// Clears the loading spinner of a pressed inline button.
    async fn answer_callback_query(&self, query_id: &str) -> Result<()>;
}

/// Telegram messaging service.
pub struct TelegramMessagingService {
    bot: Bot,
}

impl TelegramMessagingService {
    pub fn new(bot: Bot) -> Self {
        Self { bot }
    }

    fn prompt_text(state: &CommandState) -> &'static str {
        match state {
            CommandState::AwaitingAddSeeds => {
                "Reply with: <type_slug> <quantity> [variety_slug]\nFor example: tomato 10 cherry"
            }
            CommandState::AwaitingPlant => "Reply with the id of the seed stock to plant from.",
            CommandState::AwaitingEvent => {
                "Reply with: <plant_id> <stage> [YYYY-MM-DD] [comment]\nFor example: 3 sprouting"
            }
            CommandState::AwaitingTimezone => {
                "Reply with your time zone, for example Europe/Berlin."
            }
            CommandState::None => "Please reply to this message.",
        }
    }
}

#[async_trait]
impl MessagingService for TelegramMessagingService {
    async fn send_response_with_keyboard(
        &self,
        chat_id: ChatId,
        text: String,
        keyboard: Option<InlineKeyboardMarkup>,
    ) -> Result<()> {
        // If no keyboard is provided, use the default command keyboard.
        let keyboard = keyboard.unwrap_or_else(|| keyboards::COMMAND_KEYBOARD.clone());

        self.bot
            .send_message(chat_id, text)
            .parse_mode(ParseMode::Html)
            .reply_markup(keyboard)
            .await
            .map(|_| ())
            .map_err(MessagingError::TeloxideRequest)
    }

    async fn prompt_for_input(&self, chat_id: ChatId, state: CommandState) -> Result<()> {
        self.bot
            .send_message(chat_id, Self::prompt_text(&state))
            .reply_markup(ForceReply::new())
            .await
            .map(|_| ())
            .map_err(MessagingError::TeloxideRequest)
    }

    async fn send_error_msg(&self, chat_id: ChatId, error: BotHandlerError) -> Result<()> {
        let text = format!("❌ {}", html::escape(&error.to_string()));
        self.send_response_with_keyboard(chat_id, text, None).await
    }

    async fn send_help_msg(&self, chat_id: ChatId) -> Result<()> {
        let help_text = html::escape(&Command::descriptions().to_string());
        self.send_response_with_keyboard(chat_id, help_text, None).await
    }

    async fn send_start_msg(&self, chat_id: ChatId, user: User, new_account: bool) -> Result<()> {
        let name = html::escape(&user.to_string());
        let text = if new_account {
            format!(
                "👋 Welcome, {name}! I'm your plant care assistant bot. Use /seeds to view seed \
                 stock, /addseeds to add seeds, /plant to plant from stock, /myplants to see \
                 your plants, or /today to check today's tasks."
            )
        } else {
            format!("Hello again, {name}!")
        };
        self.send_response_with_keyboard(chat_id, text, None).await
    }

    async fn send_plants_msg(&self, chat_id: ChatId, plants: Vec<PlantOverview>) -> Result<()> {
        self.send_response_with_keyboard(chat_id, utils::format_plants(&plants), None).await
    }

    async fn send_today_tasks_msg(&self, chat_id: ChatId, tasks: Vec<PlantTasks>) -> Result<()> {
        self.send_response_with_keyboard(chat_id, utils::format_today_tasks(&tasks), None).await
    }

    async fn send_seed_stock_msg(&self, chat_id: ChatId, stock: Vec<SeedStock>) -> Result<()> {
        let keyboard = keyboards::build_seed_stock_keyboard(&stock);
        self.send_response_with_keyboard(chat_id, utils::format_seed_stock(&stock), Some(keyboard))
            .await
    }

    async fn send_seeds_added_msg(
        &self,
        chat_id: ChatId,
        added: u32,
        stock: SeedStock,
    ) -> Result<()> {
        let text = format!(
            "✅ Added {added} seeds to stock: {}. Total: {}.",
            html::escape(&stock.plant_name()),
            stock.quantity
        );
        self.send_response_with_keyboard(chat_id, text, None).await
    }

    async fn send_planted_msg(
        &self,
        chat_id: ChatId,
        plant: Plant,
        stock: SeedStock,
    ) -> Result<()> {
        let text = format!(
            "🌱 Planted: {} (#{}). Remaining seeds: {}.",
            html::escape(&plant.name),
            plant.id,
            stock.quantity
        );
        self.send_response_with_keyboard(chat_id, text, None).await
    }

    async fn send_future_plantings_msg(
        &self,
        chat_id: ChatId,
        plantings: Vec<FuturePlanting>,
    ) -> Result<()> {
        self.send_response_with_keyboard(chat_id, utils::format_future_plantings(&plantings), None)
            .await
    }

    async fn send_event_recorded_msg(
        &self,
        chat_id: ChatId,
        plant: Plant,
        event: PlantEvent,
    ) -> Result<()> {
        let text = format!(
            "📝 {}: {} on {}",
            html::escape(&plant.name),
            event.stage,
            event.date.format("%Y-%m-%d")
        );
        self.send_response_with_keyboard(chat_id, text, None).await
    }

    async fn send_timezone_msg(&self, chat_id: ChatId, timezone: Tz) -> Result<()> {
        let text = format!("🕒 Your time zone is {}.", timezone.name());
        self.send_response_with_keyboard(chat_id, text, None).await
    }

    async fn send_stages_msg(&self, chat_id: ChatId) -> Result<()> {
        self.send_response_with_keyboard(chat_id, utils::format_stages(), None).await
    }

    async fn answer_callback_query(&self, query_id: &str) -> Result<()> {
        self.bot
            .answer_callback_query(query_id.to_string())
            .await
            .map(|_| ())
            .map_err(MessagingError::TeloxideRequest)
    }
}
