use std::num::NonZeroU32;

use chrono::TimeZone;
use mockall::predicate::*;

use super::*;
use crate::{
    schedule::{OperationKind, PlantingPeriod},
    storage::{MockGardenStorage, PlantStep, PlantType, PlantVariety},
};

const USER_ID: UserId = UserId(7);

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

fn plant(id: i64, period: Option<&str>) -> Plant {
    Plant {
        id,
        user_id: USER_ID,
        name: format!("Tomato #{id}"),
        type_id: 1,
        type_name: "Tomato".to_string(),
        variety_id: None,
        variety_name: None,
        duration_days: 100,
        planting_period: period.map(|p| p.parse::<PlantingPeriod>().unwrap()),
        created_at: Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap(),
    }
}

fn watering_every_two_days() -> OperationDefinition {
    OperationDefinition {
        id: 1,
        kind: OperationKind::Watering,
        description: String::new(),
        since_stage: GrowthStage::Sowing,
        until_stage: GrowthStage::Planting,
        delay_days: None,
        interval_days: NonZeroU32::new(2).unwrap(),
        duration_days: None,
    }
}

fn user(timezone: Option<&str>) -> User {
    User {
        id: USER_ID,
        username: "ann".to_string(),
        telegram_username: Some("ann".to_string()),
        first_name: "Ann".to_string(),
        last_name: None,
        language_code: None,
        timezone: timezone.map(String::from),
        last_reminded_on: None,
    }
}

fn tomato_type() -> PlantType {
    PlantType {
        id: 1,
        slug: "tomato".to_string(),
        name: "Tomato".to_string(),
        description: String::new(),
        sowing_period: None,
        planting_period: None,
        duration_days: 110,
    }
}

fn stock(quantity: u32) -> SeedStock {
    SeedStock {
        id: 3,
        type_id: 1,
        type_name: "Tomato".to_string(),
        variety_id: Some(2),
        variety_name: Some("Cherry".to_string()),
        quantity,
    }
}

fn service(storage: MockGardenStorage) -> DefaultGardenService {
    DefaultGardenService::new(Arc::new(storage), chrono_tz::UTC)
}

#[tokio::test]
async fn test_today_tasks_skips_plants_without_due_operations() {
    let mut storage = MockGardenStorage::new();
    storage.expect_list_plants().with(eq(USER_ID)).returning(|_| Ok(vec![plant(1, None), plant(2, None)]));
    storage.expect_list_events().with(eq(1)).returning(|_| {
        Ok(vec![PlantEvent::new(GrowthStage::Sowing, date(2024, 5, 1))])
    });
    storage.expect_list_events().with(eq(2)).returning(|_| {
        Ok(vec![PlantEvent::new(GrowthStage::Sowing, date(2024, 5, 2))])
    });
    storage.expect_get_operations_for_type().with(eq(1)).returning(|_| Ok(vec![watering_every_two_days()]));

    let tasks = service(storage).today_tasks(USER_ID, date(2024, 5, 3)).await.unwrap();

    assert_eq!(tasks.len(), 1);
    assert_eq!(tasks[0].plant.id, 1);
    assert_eq!(tasks[0].operations, vec![watering_every_two_days()]);
}

#[tokio::test]
async fn test_my_plants_with_harvest_date() {
    let mut storage = MockGardenStorage::new();
    storage.expect_list_plants().returning(|_| Ok(vec![plant(1, None)]));
    storage.expect_list_events().returning(|_| {
        Ok(vec![
            PlantEvent::new(GrowthStage::Sowing, date(2024, 3, 1)),
            PlantEvent::new(GrowthStage::Sprouting, date(2024, 3, 10)),
        ])
    });

    let plants = service(storage).my_plants(USER_ID).await.unwrap();

    assert_eq!(plants.len(), 1);
    assert_eq!(plants[0].harvest_date, Some(date(2024, 6, 18)));
    assert_eq!(plants[0].current_stage(), Some(GrowthStage::Sprouting));
}

#[tokio::test]
async fn test_set_timezone_validates_name() {
    let mut storage = MockGardenStorage::new();
    storage
        .expect_set_timezone()
        .with(eq(USER_ID), eq("Europe/Berlin"))
        .times(1)
        .returning(|_, _| Ok(()));
    let service = service(storage);

    let tz = service.set_timezone(USER_ID, " Europe/Berlin ").await.unwrap();
    assert_eq!(tz, chrono_tz::Europe::Berlin);

    let result = service.set_timezone(USER_ID, "Mars/Olympus").await;
    assert!(matches!(result, Err(GardenServiceError::UnknownTimezone(name)) if name == "Mars/Olympus"));
}

#[tokio::test]
async fn test_local_today_uses_profile_timezone() {
    let mut storage = MockGardenStorage::new();
    storage.expect_get_user().returning(|_| Ok(Some(user(Some("Asia/Tokyo")))));
    let now = Utc.with_ymd_and_hms(2024, 5, 1, 20, 0, 0).unwrap();

    let today = service(storage).local_today(USER_ID, now).await.unwrap();

    assert_eq!(today, date(2024, 5, 2));
}

#[tokio::test]
async fn test_local_today_falls_back_to_default_timezone() {
    let mut storage = MockGardenStorage::new();
    storage.expect_get_user().returning(|_| Ok(Some(user(None))));
    let now = Utc.with_ymd_and_hms(2024, 5, 1, 20, 0, 0).unwrap();

    let service = DefaultGardenService::new(Arc::new(storage), chrono_tz::America::New_York);
    let today = service.local_today(USER_ID, now).await.unwrap();

    assert_eq!(today, date(2024, 5, 1));
}

#[tokio::test]
async fn test_add_seeds_with_variety() {
    let mut storage = MockGardenStorage::new();
    storage.expect_get_user().returning(|_| Ok(Some(user(None))));
    storage.expect_get_plant_type_by_slug().with(eq("tomato")).returning(|_| Ok(Some(tomato_type())));
    storage.expect_get_variety_by_slug().with(eq(1), eq("cherry")).returning(|_, _| {
        Ok(Some(PlantVariety {
            id: 2,
            type_id: 1,
            slug: "cherry".to_string(),
            name: "Cherry".to_string(),
            description: String::new(),
            sowing_period: None,
            planting_period: None,
            duration_days: 95,
        }))
    });
    storage
        .expect_add_seeds()
        .with(eq(USER_ID), eq(1), eq(Some(2)), eq(5))
        .times(1)
        .returning(|_, _, _, _| Ok(stock(5)));

    let result = service(storage)
        .add_seeds(USER_ID, "Tomato".to_string(), 5, Some("Cherry".to_string()))
        .await
        .unwrap();

    assert_eq!(result.quantity, 5);
}

#[tokio::test]
async fn test_add_seeds_rejects_bad_input() {
    let mut storage = MockGardenStorage::new();
    storage.expect_get_user().returning(|_| Ok(Some(user(None))));
    storage.expect_get_plant_type_by_slug().with(eq("tomato")).returning(|_| Ok(Some(tomato_type())));
    storage.expect_get_plant_type_by_slug().with(eq("melon")).returning(|_| Ok(None));
    storage.expect_get_variety_by_slug().returning(|_, _| Ok(None));
    storage.expect_add_seeds().never();
    let service = service(storage);

    let zero = service.add_seeds(USER_ID, "tomato".to_string(), 0, None).await;
    assert!(matches!(zero, Err(GardenServiceError::InvalidQuantity)));

    let negative = service.add_seeds(USER_ID, "tomato".to_string(), -3, None).await;
    assert!(matches!(negative, Err(GardenServiceError::InvalidQuantity)));

    let unknown_type = service.add_seeds(USER_ID, "melon".to_string(), 1, None).await;
    assert!(matches!(unknown_type, Err(GardenServiceError::PlantTypeNotFound(_))));

    let unknown_variety =
        service.add_seeds(USER_ID, "tomato".to_string(), 1, Some("roma".to_string())).await;
    assert!(matches!(unknown_variety, Err(GardenServiceError::VarietyNotFound(_, _))));
}

#[tokio::test]
async fn test_add_seeds_requires_registration() {
    let mut storage = MockGardenStorage::new();
    storage.expect_get_user().with(eq(USER_ID)).returning(|_| Ok(None));
    storage.expect_add_seeds().never();

    let result = service(storage).add_seeds(USER_ID, "tomato".to_string(), 3, None).await;

    assert!(matches!(result, Err(GardenServiceError::NotRegistered)));
}

#[tokio::test]
async fn test_set_timezone_for_unknown_user() {
    let mut storage = MockGardenStorage::new();
    storage
        .expect_set_timezone()
        .returning(|_, _| Err(StorageError::NotFound("User".to_string())));

    let result = service(storage).set_timezone(USER_ID, "UTC").await;

    assert!(matches!(result, Err(GardenServiceError::NotRegistered)));
}

#[tokio::test]
async fn test_plant_from_stock_maps_storage_errors() {
    let mut storage = MockGardenStorage::new();
    storage
        .expect_plant_from_stock()
        .with(eq(USER_ID), eq(3), always())
        .returning(|_, _, _| Err(StorageError::StockEmpty));
    storage
        .expect_plant_from_stock()
        .with(eq(USER_ID), eq(4), always())
        .returning(|_, _, _| Err(StorageError::NotFound("Seed stock".to_string())));
    let service = service(storage);

    let empty = service.plant_from_stock(USER_ID, 3, date(2024, 3, 1)).await;
    assert!(matches!(empty, Err(GardenServiceError::StockEmpty)));

    let missing = service.plant_from_stock(USER_ID, 4, date(2024, 3, 1)).await;
    assert!(matches!(missing, Err(GardenServiceError::StockNotFound(4))));
}

#[tokio::test]
async fn test_future_plantings_are_sorted_and_filtered() {
    let mut storage = MockGardenStorage::new();
    storage.expect_list_plants().returning(|_| {
        Ok(vec![
            plant(1, Some("01.VI-30.VI")),
            plant(2, None),
            plant(3, Some("01.III-31.III")),
            plant(4, Some("15.V-10.VI")),
        ])
    });

    let plantings = service(storage).future_plantings(USER_ID, date(2024, 5, 20)).await.unwrap();

    let ids: Vec<_> = plantings.iter().map(|p| p.plant.id).collect();
    assert_eq!(ids, vec![4, 1]);
    assert_eq!(plantings[0].start, date(2024, 5, 15));
    assert_eq!(plantings[0].end, date(2024, 6, 10));
}

#[tokio::test]
async fn test_future_plantings_keep_winter_period_open_in_january() {
    let mut storage = MockGardenStorage::new();
    storage.expect_list_plants().returning(|_| Ok(vec![plant(1, Some("01.XI-28.II")), plant(2, Some("01.III-31.III"))]));

    let plantings = service(storage).future_plantings(USER_ID, date(2025, 1, 15)).await.unwrap();

    let ids: Vec<_> = plantings.iter().map(|p| p.plant.id).collect();
    assert_eq!(ids, vec![1, 2]);
    assert_eq!(plantings[0].start, date(2024, 11, 1));
    assert_eq!(plantings[0].end, date(2025, 2, 28));
}

#[tokio::test]
async fn test_record_event_checks_ownership_and_steps() {
    let mut storage = MockGardenStorage::new();
    storage.expect_get_plant().with(eq(USER_ID), eq(1)).returning(|_, _| Ok(Some(plant(1, None))));
    storage.expect_get_plant().with(eq(USER_ID), eq(9)).returning(|_, _| Ok(None));
    storage.expect_get_steps_for_type().with(eq(1)).returning(|_| {
        Ok(vec![PlantStep {
            id: 1,
            type_id: 1,
            stage: GrowthStage::Sowing,
            description: String::new(),
        }])
    });
    storage
        .expect_record_event()
        .with(eq(1), eq(PlantEvent::new(GrowthStage::Sowing, date(2024, 3, 1))))
        .times(1)
        .returning(|_, _| Ok(()));
    let service = service(storage);

    let recorded = service
        .record_event(USER_ID, 1, PlantEvent::new(GrowthStage::Sowing, date(2024, 3, 1)))
        .await
        .unwrap();
    assert_eq!(recorded.id, 1);

    let foreign = service
        .record_event(USER_ID, 9, PlantEvent::new(GrowthStage::Sowing, date(2024, 3, 1)))
        .await;
    assert!(matches!(foreign, Err(GardenServiceError::PlantNotFound(9))));

    let undefined = service
        .record_event(USER_ID, 1, PlantEvent::new(GrowthStage::Harvesting, date(2024, 8, 1)))
        .await;
    assert!(matches!(
        undefined,
        Err(GardenServiceError::StageNotDefined { stage: GrowthStage::Harvesting, .. })
    ));
}
