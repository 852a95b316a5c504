mod callback_actions;
pub mod commands;
#[cfg(test)]
mod test_helpers;
#[cfg(test)]
mod tests;

use std::sync::Arc;

pub use callback_actions::CallbackAction;
use serde::{Deserialize, Serialize};
use teloxide::{
    dispatching::dialogue::{Dialogue, SqliteStorage, SqliteStorageError, serializer::Json},
    prelude::*,
    types::{Message, User},
    utils::command::BotCommands,
};
use thiserror::Error;

use crate::{
    clock::Clock,
    garden::{GardenService, GardenServiceError},
    messaging::{MessagingError, MessagingService},
};

/// Persistent storage of dialogue states.
pub type DialogueStorage = SqliteStorage<Json>;

#[derive(BotCommands, Clone, Debug, PartialEq, Eq)]
#[command(rename_rule = "lowercase", description = "Available commands:")]
pub enum Command {
    #[command(description = "Start the bot and create your diary.")]
    Start,
    #[command(description = "Show this help text.")]
    Help,
    #[command(description = "List your plants.")]
    MyPlants,
    #[command(description = "Show the care tasks due today.")]
    Today,
    #[command(description = "Show your seed stock.")]
    Seeds,
    #[command(description = "Add seeds: /addseeds <type_slug> <quantity> [variety_slug].")]
    AddSeeds(String),
    #[command(description = "Plant one seed: /plant <seed_stock_id>.")]
    Plant(String),
    #[command(description = "Show upcoming planting periods.")]
    Planting,
    #[command(description = "Record a growth stage: /event <plant_id> <stage> [YYYY-MM-DD] [comment].")]
    Event(String),
    #[command(description = "Show or set your time zone: /timezone [Europe/Berlin].")]
    Timezone(String),
    #[command(description = "List the growth stage codes.")]
    Stages,
}

/// The command waiting for its arguments in a force-reply message.
#[derive(Clone, Default, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum CommandState {
    #[default]
    None,
    AwaitingAddSeeds,
    AwaitingPlant,
    AwaitingEvent,
    AwaitingTimezone,
}

#[derive(Error, Debug)]
pub enum BotHandlerError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Failed to get or update dialogue: {0}")]
    DialogueError(#[from] SqliteStorageError<serde_json::Error>),

    #[error(transparent)]
    GardenError(#[from] GardenServiceError),

    #[error("Failed to send message: {0}")]
    SendError(#[from] MessagingError),

    #[error("Sorry, an error occurred while creating your account. Please try again later.")]
    RegistrationFailed,
}

pub type BotHandlerResult<T> = Result<T, BotHandlerError>;

/// Everything a command handler needs to serve one update.
pub struct Context<'a> {
    pub handler: &'a BotHandler,
    /// The message to answer. For callback queries this is the message
    /// carrying the pressed keyboard.
    pub message: &'a Message,
    /// The user who sent the command or pressed the button.
    pub user: &'a User,
    pub dialogue: &'a Dialogue<CommandState, DialogueStorage>,
}

impl Context<'_> {
    pub fn chat_id(&self) -> ChatId {
        self.message.chat.id
    }

    pub fn user_id(&self) -> UserId {
        self.user.id
    }
}

/// Routes commands, force replies and keyboard presses to the command
/// handlers.
pub struct BotHandler {
    messaging_service: Arc<dyn MessagingService>,
    garden_service: Arc<dyn GardenService>,
    clock: Arc<dyn Clock>,
}

impl BotHandler {
    pub fn new(
        messaging_service: Arc<dyn MessagingService>,
        garden_service: Arc<dyn GardenService>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self { messaging_service, garden_service, clock }
    }

    /// Dispatches the incoming command to the appropriate handler.
    pub async fn handle_commands(
        &self,
        msg: &Message,
        cmd: Command,
        dialogue: Dialogue<CommandState, DialogueStorage>,
    ) -> BotHandlerResult<()> {
        let Some(user) = msg.from.as_ref() else {
            tracing::warn!("Received command without user information in chat {}", msg.chat.id);
            return Ok(());
        };

        let ctx = Context { handler: self, message: msg, user, dialogue: &dialogue };
        self.run_command(ctx, cmd).await
    }

    /// Handles the reply to a force-reply prompt of a pending command.
    pub async fn handle_reply(
        &self,
        msg: &Message,
        dialogue: &Dialogue<CommandState, DialogueStorage>,
    ) -> BotHandlerResult<()> {
        let Some(user) = msg.from.as_ref() else {
            tracing::warn!("Received reply without user information in chat {}", msg.chat.id);
            return Ok(());
        };
        let state = dialogue.get().await?.unwrap_or_default();
        let text = msg.text().unwrap_or_default().trim();

        if state == CommandState::None {
            tracing::debug!("Ignoring reply without a pending command in chat {}", msg.chat.id);
            return Ok(());
        }
        // A prompt is answered once, even if handling the answer fails.
        dialogue.exit().await?;

        let ctx = Context { handler: self, message: msg, user, dialogue };
        match state {
            CommandState::None => {}
            CommandState::AwaitingAddSeeds => commands::add_seeds::handle_reply(&ctx, text).await?,
            CommandState::AwaitingPlant => commands::plant::handle_reply(&ctx, text).await?,
            CommandState::AwaitingEvent => commands::event::handle_reply(&ctx, text).await?,
            CommandState::AwaitingTimezone => commands::timezone::handle_reply(&ctx, text).await?,
        }
        Ok(())
    }

    /// Handles a press of an inline keyboard button.
    pub async fn handle_callback_query(
        &self,
        query: &CallbackQuery,
        dialogue: Dialogue<CommandState, DialogueStorage>,
    ) -> BotHandlerResult<()> {
        // Answer first to clear the loading spinner.
        self.messaging_service.answer_callback_query(&query.id).await?;

        let Some(data) = query.data.as_deref() else {
            return Ok(());
        };
        let action = match serde_json::from_str::<CallbackAction>(data) {
            Ok(action) => action,
            Err(e) => {
                tracing::warn!("Received unknown callback data {data:?}: {e}");
                return Ok(());
            }
        };
        let Some(message) = query.message.as_ref().and_then(|m| m.regular_message()) else {
            tracing::warn!("Callback query {} has no accessible message", query.id);
            return Ok(());
        };

        let ctx = Context { handler: self, message, user: &query.from, dialogue: &dialogue };
        match action {
            CallbackAction::CmdHelp => self.run_command(ctx, Command::Help).await,
            CallbackAction::CmdToday => self.run_command(ctx, Command::Today).await,
            CallbackAction::CmdMyPlants => self.run_command(ctx, Command::MyPlants).await,
            CallbackAction::CmdSeeds => self.run_command(ctx, Command::Seeds).await,
            CallbackAction::CmdPlanting => self.run_command(ctx, Command::Planting).await,
            CallbackAction::CmdStages => self.run_command(ctx, Command::Stages).await,
            CallbackAction::PlantStock(stock_id) => {
                commands::plant::plant_stock(&ctx, stock_id).await
            }
        }
    }

    async fn run_command(&self, ctx: Context<'_>, cmd: Command) -> BotHandlerResult<()> {
        tracing::debug!("Handling {cmd:?} from user {}", ctx.user_id());

        match cmd {
            Command::Start => commands::start::handle(&ctx).await,
            Command::Help => commands::help::handle(&ctx).await,
            Command::MyPlants => commands::my_plants::handle(&ctx).await,
            Command::Today => commands::today::handle(&ctx).await,
            Command::Seeds => commands::seeds::handle(&ctx).await,
            Command::AddSeeds(args) => commands::add_seeds::handle(&ctx, &args).await,
            Command::Plant(args) => commands::plant::handle(&ctx, &args).await,
            Command::Planting => commands::planting::handle(&ctx).await,
            Command::Event(args) => commands::event::handle(&ctx, &args).await,
            Command::Timezone(args) => commands::timezone::handle(&ctx, &args).await,
            Command::Stages => commands::stages::handle(&ctx).await,
        }
    }

    /// Sends a user-facing garden error to the chat and returns `None`.
    /// Storage failures are propagated.
    async fn reply_on_error<T>(
        &self,
        chat_id: ChatId,
        result: Result<T, GardenServiceError>,
    ) -> BotHandlerResult<Option<T>> {
        match result {
            Ok(value) => Ok(Some(value)),
            Err(e @ GardenServiceError::StorageError(_)) => Err(e.into()),
            Err(e) => {
                self.messaging_service.send_error_msg(chat_id, e.into()).await?;
                Ok(None)
            }
        }
    }

    /// Sends an invalid-input error with the given text.
    async fn reply_invalid_input(&self, chat_id: ChatId, text: &str) -> BotHandlerResult<()> {
        self.messaging_service
            .send_error_msg(chat_id, BotHandlerError::InvalidInput(text.to_string()))
            .await?;
        Ok(())
    }

    /// Asks for the arguments of `state`'s command and remembers it.
    async fn prompt_and_wait_for_reply(
        &self,
        ctx: &Context<'_>,
        state: CommandState,
    ) -> BotHandlerResult<()> {
        self.messaging_service.prompt_for_input(ctx.chat_id(), state.clone()).await?;
        ctx.dialogue.update(state).await?;
        Ok(())
    }

    /// The current calendar day of the context's user.
    async fn local_today(&self, ctx: &Context<'_>) -> BotHandlerResult<chrono::NaiveDate> {
        Ok(self.garden_service.local_today(ctx.user_id(), self.clock.now()).await?)
    }
}
