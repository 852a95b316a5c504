#[cfg(test)]
mod tests;

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use chrono_tz::Tz;
use mockall::automock;
use teloxide::types::UserId;
use thiserror::Error;

use crate::{
    clock,
    schedule::{self, GrowthStage, OperationDefinition, PlantEvent},
    storage::{GardenStorage, NewUser, Plant, SeedStock, StorageError, User},
};

#[derive(Debug, Error)]
pub enum GardenServiceError {
    #[error("Storage error: {0}")]
    StorageError(#[from] StorageError),
    #[error("You are not registered yet. Send /start first")]
    NotRegistered,
    #[error("Unknown time zone: {0}")]
    UnknownTimezone(String),
    #[error("Plant type not found: {0}")]
    PlantTypeNotFound(String),
    #[error("Plant variety {1} not found for type {0}")]
    VarietyNotFound(String, String),
    #[error("Quantity must be greater than 0")]
    InvalidQuantity,
    #[error("Plant #{0} not found")]
    PlantNotFound(i64),
    #[error("Seed stock #{0} not found")]
    StockNotFound(i64),
    #[error("This seed stock is empty")]
    StockEmpty,
    #[error("{plant} has no {stage} step")]
    StageNotDefined { plant: String, stage: GrowthStage },
}

type Result<T> = std::result::Result<T, GardenServiceError>;

/// Care operations due today for one plant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlantTasks {
    pub plant: Plant,
    pub operations: Vec<OperationDefinition>,
}

/// A plant together with its recorded growth.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlantOverview {
    pub plant: Plant,
    pub events: Vec<PlantEvent>,
    pub harvest_date: Option<NaiveDate>,
}

impl PlantOverview {
    /// The most advanced stage recorded for the plant.
    pub fn current_stage(&self) -> Option<GrowthStage> {
        self.events.iter().map(|e| e.stage).max()
    }
}

/// A plant whose planting period has not passed yet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FuturePlanting {
    pub plant: Plant,
    pub start: NaiveDate,
    pub end: NaiveDate,
}

#[automock]
#[async_trait]
pub trait GardenService: Send + Sync {
    /// Provision an account for a Telegram user.
    async fn register(&self, user: NewUser) -> Result<(User, bool)>;

    /// Set the user's time zone from an IANA name such as `Europe/Berlin`.
    async fn set_timezone(&self, user_id: UserId, name: &str) -> Result<Tz>;

    /// The time zone used for the user.
    async fn user_timezone(&self, user_id: UserId) -> Result<Tz>;

    /// The user's calendar day at `now`.
    async fn local_today(&self, user_id: UserId, now: DateTime<Utc>) -> Result<NaiveDate>;

    /// The care operations due on `today`, grouped by plant. Plants with
    /// nothing due are left out.
    async fn today_tasks(&self, user_id: UserId, today: NaiveDate) -> Result<Vec<PlantTasks>>;

    async fn my_plants(&self, user_id: UserId) -> Result<Vec<PlantOverview>>;

    async fn seed_stock(&self, user_id: UserId) -> Result<Vec<SeedStock>>;

    async fn add_seeds(
        &self,
        user_id: UserId,
        type_slug: String,
        quantity: i64,
        variety_slug: Option<String>,
    ) -> Result<SeedStock>;

    /// Plant one seed from a stock entry.
    async fn plant_from_stock(
        &self,
        user_id: UserId,
        stock_id: i64,
        today: NaiveDate,
    ) -> Result<(Plant, SeedStock)>;

    /// Plants whose planting period ends on `today` or later, earliest start
    /// first.
    async fn future_plantings(
        &self,
        user_id: UserId,
        today: NaiveDate,
    ) -> Result<Vec<FuturePlanting>>;

    /// Record that one of the user's plants reached `stage` on `date`.
    async fn record_event(
        &self,
        user_id: UserId,
        plant_id: i64,
        event: PlantEvent,
    ) -> Result<Plant>;
}

pub struct DefaultGardenService {
    storage: Arc<dyn GardenStorage>,
    default_timezone: Tz,
}

impl DefaultGardenService {
    pub fn new(storage: Arc<dyn GardenStorage>, default_timezone: Tz) -> Self {
        Self { storage, default_timezone }
    }

    async fn plant_tasks(&self, plant: Plant, today: NaiveDate) -> Result<PlantTasks> {
        let events = self.storage.list_events(plant.id).await?;
        let operations = self.storage.get_operations_for_type(plant.type_id).await?;

        let due = schedule::due_operations(&events, &operations, today).cloned().collect();
        Ok(PlantTasks { plant, operations: due })
    }
}

#[async_trait]
impl GardenService for DefaultGardenService {
    async fn register(&self, user: NewUser) -> Result<(User, bool)> {
        self.storage.register_user(user).await.map_err(GardenServiceError::from)
    }

    async fn set_timezone(&self, user_id: UserId, name: &str) -> Result<Tz> {
        let tz = name
            .trim()
            .parse::<Tz>()
            .map_err(|_| GardenServiceError::UnknownTimezone(name.to_string()))?;

        self.storage.set_timezone(user_id, tz.name()).await.map_err(|e| match e {
            StorageError::NotFound(_) => GardenServiceError::NotRegistered,
            other => GardenServiceError::StorageError(other),
        })?;
        Ok(tz)
    }

    async fn user_timezone(&self, user_id: UserId) -> Result<Tz> {
        let user = self.storage.get_user(user_id).await?;
        Ok(user.and_then(|u| u.tz()).unwrap_or(self.default_timezone))
    }

    async fn local_today(&self, user_id: UserId, now: DateTime<Utc>) -> Result<NaiveDate> {
        let tz = self.user_timezone(user_id).await?;
        Ok(clock::local_date(now, tz))
    }

    async fn today_tasks(&self, user_id: UserId, today: NaiveDate) -> Result<Vec<PlantTasks>> {
        tracing::debug!("Computing tasks of user {user_id} for {today}");

        let mut tasks = Vec::new();
        for plant in self.storage.list_plants(user_id).await? {
            let plant_tasks = self.plant_tasks(plant, today).await?;
            if !plant_tasks.operations.is_empty() {
                tasks.push(plant_tasks);
            }
        }

        Ok(tasks)
    }

    async fn my_plants(&self, user_id: UserId) -> Result<Vec<PlantOverview>> {
        let mut overviews = Vec::new();
        for plant in self.storage.list_plants(user_id).await? {
            let events = self.storage.list_events(plant.id).await?;
            let harvest_date = schedule::planned_harvest_date(&events, plant.duration_days);
            overviews.push(PlantOverview { plant, events, harvest_date });
        }

        Ok(overviews)
    }

    async fn seed_stock(&self, user_id: UserId) -> Result<Vec<SeedStock>> {
        self.storage.list_seed_stock(user_id).await.map_err(GardenServiceError::from)
    }

    async fn add_seeds(
        &self,
        user_id: UserId,
        type_slug: String,
        quantity: i64,
        variety_slug: Option<String>,
    ) -> Result<SeedStock> {
        let quantity = u32::try_from(quantity)
            .ok()
            .filter(|q| *q > 0)
            .ok_or(GardenServiceError::InvalidQuantity)?;

        if self.storage.get_user(user_id).await?.is_none() {
            return Err(GardenServiceError::NotRegistered);
        }

        let type_slug = type_slug.to_lowercase();
        let plant_type = self
            .storage
            .get_plant_type_by_slug(&type_slug)
            .await?
            .ok_or_else(|| GardenServiceError::PlantTypeNotFound(type_slug.clone()))?;

        let variety_id = match variety_slug.map(|s| s.to_lowercase()) {
            Some(slug) => {
                let variety = self
                    .storage
                    .get_variety_by_slug(plant_type.id, &slug)
                    .await?
                    .ok_or_else(|| GardenServiceError::VarietyNotFound(type_slug.clone(), slug))?;
                Some(variety.id)
            }
            None => None,
        };

        let stock = self.storage.add_seeds(user_id, plant_type.id, variety_id, quantity).await?;
        tracing::debug!("User {user_id} now has {} seeds of {}", stock.quantity, stock.plant_name());
        Ok(stock)
    }

    async fn plant_from_stock(
        &self,
        user_id: UserId,
        stock_id: i64,
        today: NaiveDate,
    ) -> Result<(Plant, SeedStock)> {
        self.storage.plant_from_stock(user_id, stock_id, today).await.map_err(|e| match e {
            StorageError::NotFound(_) => GardenServiceError::StockNotFound(stock_id),
            StorageError::StockEmpty => GardenServiceError::StockEmpty,
            other => GardenServiceError::StorageError(other),
        })
    }

    async fn future_plantings(
        &self,
        user_id: UserId,
        today: NaiveDate,
    ) -> Result<Vec<FuturePlanting>> {
        let mut plantings: Vec<FuturePlanting> = self
            .storage
            .list_plants(user_id)
            .await?
            .into_iter()
            .filter_map(|plant| {
                let (start, end) = plant.planting_period?.resolve_around(today);
                (end >= today).then_some(FuturePlanting { plant, start, end })
            })
            .collect();

        plantings.sort_by_key(|p| (p.start, p.plant.id));
        Ok(plantings)
    }

    async fn record_event(
        &self,
        user_id: UserId,
        plant_id: i64,
        event: PlantEvent,
    ) -> Result<Plant> {
        let plant = self
            .storage
            .get_plant(user_id, plant_id)
            .await?
            .ok_or(GardenServiceError::PlantNotFound(plant_id))?;

        let steps = self.storage.get_steps_for_type(plant.type_id).await?;
        if !steps.iter().any(|step| step.stage == event.stage) {
            return Err(GardenServiceError::StageNotDefined {
                plant: plant.name.clone(),
                stage: event.stage,
            });
        }

        tracing::debug!("Recording {} for plant {}", event.stage.code(), plant.id);
        self.storage.record_event(plant.id, event).await?;
        Ok(plant)
    }
}
