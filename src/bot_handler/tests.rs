use mockall::predicate::*;

use super::test_helpers::*;
use super::*;
use crate::{
    garden::{MockGardenService, PlantTasks},
    messaging::MockMessagingService,
    schedule::{GrowthStage, PlantEvent},
    storage::StorageError,
};

#[tokio::test]
async fn test_today_uses_local_date() {
    let mut mock_messaging = MockMessagingService::new();
    let mut mock_garden = MockGardenService::new();

    expect_local_today(&mut mock_garden);
    mock_garden
        .expect_today_tasks()
        .with(eq(USER_ID), eq(today()))
        .times(1)
        .returning(|_, _| Ok(vec![]));
    mock_messaging
        .expect_send_today_tasks_msg()
        .with(eq(CHAT_ID), eq(Vec::<PlantTasks>::new()))
        .times(1)
        .returning(|_, _| Ok(()));

    let harness = TestHarness::new(mock_messaging, mock_garden).await;
    harness.handle_command(Command::Today).await.unwrap();
}

#[tokio::test]
async fn test_start_registration_failure_is_reported() {
    let mut mock_messaging = MockMessagingService::new();
    let mut mock_garden = MockGardenService::new();

    mock_garden.expect_register().times(1).returning(|_| {
        Err(GardenServiceError::StorageError(StorageError::DbError("locked".to_string())))
    });
    mock_messaging
        .expect_send_error_msg()
        .withf(|chat_id, e| {
            *chat_id == CHAT_ID && matches!(e, BotHandlerError::RegistrationFailed)
        })
        .times(1)
        .returning(|_, _| Ok(()));

    let harness = TestHarness::new(mock_messaging, mock_garden).await;
    harness.handle_command(Command::Start).await.unwrap();
}

#[tokio::test]
async fn test_add_seeds_with_args() {
    let mut mock_messaging = MockMessagingService::new();
    let mut mock_garden = MockGardenService::new();

    mock_garden
        .expect_add_seeds()
        .with(eq(USER_ID), eq("tomato".to_string()), eq(5_i64), eq(Some("cherry".to_string())))
        .times(1)
        .returning(|_, _, _, _| Ok(mock_stock(7, 12)));
    mock_messaging
        .expect_send_seeds_added_msg()
        .with(eq(CHAT_ID), eq(5_u32), eq(mock_stock(7, 12)))
        .times(1)
        .returning(|_, _, _| Ok(()));

    let harness = TestHarness::new(mock_messaging, mock_garden).await;
    harness.handle_command(Command::AddSeeds("Tomato 5 Cherry".to_string())).await.unwrap();
}

#[tokio::test]
async fn test_add_seeds_prompt_then_reply() {
    let mut mock_messaging = MockMessagingService::new();
    let mut mock_garden = MockGardenService::new();

    mock_messaging
        .expect_prompt_for_input()
        .with(eq(CHAT_ID), eq(CommandState::AwaitingAddSeeds))
        .times(1)
        .returning(|_, _| Ok(()));
    mock_garden
        .expect_add_seeds()
        .with(eq(USER_ID), eq("basil".to_string()), eq(3_i64), eq(None::<String>))
        .times(1)
        .returning(|_, _, _, _| Ok(mock_stock(8, 3)));
    mock_messaging.expect_send_seeds_added_msg().times(1).returning(|_, _, _| Ok(()));

    let harness = TestHarness::new(mock_messaging, mock_garden).await;

    harness.handle_command(Command::AddSeeds(String::new())).await.unwrap();
    assert_eq!(harness.state().await, Some(CommandState::AwaitingAddSeeds));

    harness.handle_reply("basil 3").await.unwrap();
    assert_eq!(harness.state().await, None);
}

#[tokio::test]
async fn test_add_seeds_invalid_reply_exits_dialogue() {
    let mut mock_messaging = MockMessagingService::new();
    let mut mock_garden = MockGardenService::new();

    mock_messaging.expect_prompt_for_input().times(1).returning(|_, _| Ok(()));
    mock_messaging
        .expect_send_error_msg()
        .withf(|_, e| matches!(e, BotHandlerError::InvalidInput(text) if text.starts_with("Usage")))
        .times(1)
        .returning(|_, _| Ok(()));
    mock_garden.expect_add_seeds().never();

    let harness = TestHarness::new(mock_messaging, mock_garden).await;

    harness.handle_command(Command::AddSeeds(String::new())).await.unwrap();
    harness.handle_reply("tomato lots").await.unwrap();
    assert_eq!(harness.state().await, None);
}

#[tokio::test]
async fn test_failed_reply_still_exits_dialogue() {
    let mut mock_messaging = MockMessagingService::new();
    let mut mock_garden = MockGardenService::new();

    mock_messaging.expect_prompt_for_input().times(1).returning(|_, _| Ok(()));
    mock_garden.expect_add_seeds().times(1).returning(|_, _, _, _| {
        Err(GardenServiceError::StorageError(StorageError::DbError("locked".to_string())))
    });
    mock_messaging.expect_send_seeds_added_msg().never();

    let harness = TestHarness::new(mock_messaging, mock_garden).await;

    harness.handle_command(Command::AddSeeds(String::new())).await.unwrap();
    let result = harness.handle_reply("basil 3").await;
    assert!(matches!(
        result,
        Err(BotHandlerError::GardenError(GardenServiceError::StorageError(_)))
    ));
    assert_eq!(harness.state().await, None);
}

#[tokio::test]
async fn test_reply_without_pending_command_is_ignored() {
    let mock_messaging = MockMessagingService::new();
    let mock_garden = MockGardenService::new();

    let harness = TestHarness::new(mock_messaging, mock_garden).await;
    harness.handle_reply("tomato 5").await.unwrap();
}

#[tokio::test]
async fn test_user_facing_garden_error_is_sent() {
    let mut mock_messaging = MockMessagingService::new();
    let mut mock_garden = MockGardenService::new();

    mock_garden
        .expect_add_seeds()
        .returning(|_, slug, _, _| Err(GardenServiceError::PlantTypeNotFound(slug)));
    mock_messaging
        .expect_send_error_msg()
        .withf(|_, e| {
            matches!(
                e,
                BotHandlerError::GardenError(GardenServiceError::PlantTypeNotFound(slug))
                    if slug == "okra"
            )
        })
        .times(1)
        .returning(|_, _| Ok(()));
    mock_messaging.expect_send_seeds_added_msg().never();

    let harness = TestHarness::new(mock_messaging, mock_garden).await;
    harness.handle_command(Command::AddSeeds("okra 2".to_string())).await.unwrap();
}

#[tokio::test]
async fn test_storage_error_is_propagated() {
    let mut mock_messaging = MockMessagingService::new();
    let mut mock_garden = MockGardenService::new();

    expect_local_today(&mut mock_garden);
    mock_garden.expect_plant_from_stock().returning(|_, _, _| {
        Err(GardenServiceError::StorageError(StorageError::DbError("disk I/O".to_string())))
    });
    mock_messaging.expect_send_error_msg().never();

    let harness = TestHarness::new(mock_messaging, mock_garden).await;
    let result = harness.handle_command(Command::Plant("5".to_string())).await;

    assert!(matches!(result, Err(BotHandlerError::GardenError(GardenServiceError::StorageError(_)))));
}

#[tokio::test]
async fn test_plant_stock_callback() {
    let mut mock_messaging = MockMessagingService::new();
    let mut mock_garden = MockGardenService::new();

    mock_messaging
        .expect_answer_callback_query()
        .with(eq("test_callback_id"))
        .times(1)
        .returning(|_| Ok(()));
    expect_local_today(&mut mock_garden);
    mock_garden
        .expect_plant_from_stock()
        .with(eq(USER_ID), eq(5_i64), eq(today()))
        .times(1)
        .returning(|_, _, _| Ok((mock_plant(9), mock_stock(5, 2))));
    mock_messaging
        .expect_send_planted_msg()
        .with(eq(CHAT_ID), eq(mock_plant(9)), eq(mock_stock(5, 2)))
        .times(1)
        .returning(|_, _, _| Ok(()));

    let harness = TestHarness::new(mock_messaging, mock_garden).await;
    harness.handle_callback(&CallbackAction::PlantStock(5)).await.unwrap();
}

#[tokio::test]
async fn test_command_keyboard_callback_runs_command() {
    let mut mock_messaging = MockMessagingService::new();
    let mock_garden = MockGardenService::new();

    mock_messaging.expect_answer_callback_query().times(1).returning(|_| Ok(()));
    mock_messaging.expect_send_stages_msg().with(eq(CHAT_ID)).times(1).returning(|_| Ok(()));

    let harness = TestHarness::new(mock_messaging, mock_garden).await;
    harness.handle_callback(&CallbackAction::CmdStages).await.unwrap();
}

#[tokio::test]
async fn test_unknown_callback_data_is_ignored() {
    let mut mock_messaging = MockMessagingService::new();
    let mock_garden = MockGardenService::new();

    mock_messaging.expect_answer_callback_query().times(1).returning(|_| Ok(()));

    let harness = TestHarness::new(mock_messaging, mock_garden).await;
    harness.handle_callback_data(r#"{"water-plant":1}"#).await.unwrap();
}

#[tokio::test]
async fn test_event_defaults_to_local_today() {
    let mut mock_messaging = MockMessagingService::new();
    let mut mock_garden = MockGardenService::new();

    let event = PlantEvent {
        stage: GrowthStage::Sprouting,
        date: today(),
        comment: Some("first leaves".to_string()),
    };

    expect_local_today(&mut mock_garden);
    mock_garden
        .expect_record_event()
        .with(eq(USER_ID), eq(9_i64), eq(event.clone()))
        .times(1)
        .returning(|_, _, _| Ok(mock_plant(9)));
    mock_messaging
        .expect_send_event_recorded_msg()
        .with(eq(CHAT_ID), eq(mock_plant(9)), eq(event))
        .times(1)
        .returning(|_, _, _| Ok(()));

    let harness = TestHarness::new(mock_messaging, mock_garden).await;
    harness.handle_command(Command::Event("9 sprouting first leaves".to_string())).await.unwrap();
}

#[tokio::test]
async fn test_timezone_without_args_shows_current_and_prompts() {
    let mut mock_messaging = MockMessagingService::new();
    let mut mock_garden = MockGardenService::new();

    mock_garden
        .expect_user_timezone()
        .with(eq(USER_ID))
        .returning(|_| Ok(chrono_tz::Europe::Moscow));
    mock_messaging
        .expect_send_timezone_msg()
        .with(eq(CHAT_ID), eq(chrono_tz::Europe::Moscow))
        .times(1)
        .returning(|_, _| Ok(()));
    mock_messaging
        .expect_prompt_for_input()
        .with(eq(CHAT_ID), eq(CommandState::AwaitingTimezone))
        .times(1)
        .returning(|_, _| Ok(()));
    mock_garden
        .expect_set_timezone()
        .with(eq(USER_ID), eq("Asia/Tokyo"))
        .times(1)
        .returning(|_, _| Ok(chrono_tz::Asia::Tokyo));
    mock_messaging
        .expect_send_timezone_msg()
        .with(eq(CHAT_ID), eq(chrono_tz::Asia::Tokyo))
        .times(1)
        .returning(|_, _| Ok(()));

    let harness = TestHarness::new(mock_messaging, mock_garden).await;

    harness.handle_command(Command::Timezone(String::new())).await.unwrap();
    harness.handle_reply(" Asia/Tokyo ").await.unwrap();
    assert_eq!(harness.state().await, None);
}
