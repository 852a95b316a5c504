use std::sync::Arc;

use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use serde_json::{Value, json};
use teloxide::{
    dispatching::dialogue::{Dialogue, serializer},
    types::{CallbackQuery, ChatId, Message, UserId},
};

use super::*;
use crate::{
    clock::MockClock,
    garden::MockGardenService,
    messaging::MockMessagingService,
    storage::{Plant, SeedStock},
};

pub const CHAT_ID: ChatId = ChatId(123);
pub const USER_ID: UserId = UserId(123);

pub fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 5, 1, 9, 0, 0).unwrap()
}

pub fn today() -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 5, 1).unwrap()
}

// Test harness to encapsulate common test setup and actions.
pub struct TestHarness {
    bot_handler: BotHandler,
    pub dialogue: Dialogue<CommandState, DialogueStorage>,
    storage: Arc<DialogueStorage>,
}

impl TestHarness {
    // Creates a new TestHarness with mock services and a clock frozen at `now()`.
    pub async fn new(mock_messaging: MockMessagingService, mock_garden: MockGardenService) -> Self {
        let mut mock_clock = MockClock::new();
        mock_clock.expect_now().returning(now);

        let bot_handler =
            BotHandler::new(Arc::new(mock_messaging), Arc::new(mock_garden), Arc::new(mock_clock));
        let storage = DialogueStorage::open("sqlite::memory:", serializer::Json).await.unwrap();
        let dialogue = Dialogue::<CommandState, DialogueStorage>::new(storage.clone(), CHAT_ID);

        Self { bot_handler, dialogue, storage }
    }

    // Creates a new dialogue for the same chat to test state persistence.
    pub fn new_dialogue(&self) -> Dialogue<CommandState, DialogueStorage> {
        Dialogue::new(self.storage.clone(), CHAT_ID)
    }

    pub async fn handle_command(&self, command: Command) -> BotHandlerResult<()> {
        let msg = mock_message("/command");
        self.bot_handler.handle_commands(&msg, command, self.dialogue.clone()).await
    }

    // Simulates a reply to a force-reply prompt.
    pub async fn handle_reply(&self, text: &str) -> BotHandlerResult<()> {
        let msg = mock_reply(text);
        self.bot_handler.handle_reply(&msg, &self.new_dialogue()).await
    }

    pub async fn handle_callback(&self, action: &CallbackAction) -> BotHandlerResult<()> {
        let data = serde_json::to_string(action).unwrap();
        self.handle_callback_data(&data).await
    }

    pub async fn handle_callback_data(&self, data: &str) -> BotHandlerResult<()> {
        let query = mock_callback_query(data);
        self.bot_handler.handle_callback_query(&query, self.dialogue.clone()).await
    }

    pub async fn state(&self) -> Option<CommandState> {
        self.new_dialogue().get().await.unwrap()
    }
}

fn user_json() -> Value {
    json!({ "id": USER_ID.0, "is_bot": false, "first_name": "Ann", "username": "ann" })
}

fn message_json(text: &str) -> Value {
    json!({
        "message_id": 1,
        "date": now().timestamp(),
        "chat": { "id": CHAT_ID.0, "type": "private", "first_name": "Ann", "username": "ann" },
        "from": user_json(),
        "text": text,
    })
}

// Helper to create a teloxide message from the Bot API JSON shape.
pub fn mock_message(text: &str) -> Message {
    serde_json::from_value(message_json(text)).unwrap()
}

pub fn mock_reply(text: &str) -> Message {
    let mut msg = message_json(text);
    msg["reply_to_message"] = message_json("Reply with...");
    serde_json::from_value(msg).unwrap()
}

pub fn mock_callback_query(data: &str) -> CallbackQuery {
    serde_json::from_value(json!({
        "id": "test_callback_id",
        "from": user_json(),
        "message": message_json("This is a message with a keyboard."),
        "chat_instance": "test_instance",
        "data": data,
    }))
    .unwrap()
}

pub fn mock_plant(id: i64) -> Plant {
    Plant {
        id,
        user_id: USER_ID,
        name: "Tomato Cherry (2024-05-01)".to_string(),
        type_id: 1,
        type_name: "Tomato".to_string(),
        variety_id: Some(2),
        variety_name: Some("Cherry".to_string()),
        duration_days: 100,
        planting_period: None,
        created_at: now(),
    }
}

pub fn mock_stock(id: i64, quantity: u32) -> SeedStock {
    SeedStock {
        id,
        type_id: 1,
        type_name: "Tomato".to_string(),
        variety_id: Some(2),
        variety_name: Some("Cherry".to_string()),
        quantity,
    }
}

pub fn expect_local_today(mock_garden: &mut MockGardenService) {
    mock_garden
        .expect_local_today()
        .with(mockall::predicate::eq(USER_ID), mockall::predicate::eq(now()))
        .returning(|_, _| Ok(today()));
}
