mod entities;
pub mod sqlite;

use async_trait::async_trait;
use chrono::NaiveDate;
pub use entities::{NewUser, Plant, PlantStep, PlantType, PlantVariety, SeedStock, User};
use mockall::automock;
use teloxide::types::UserId;
use thiserror::Error;

use crate::{
    catalog::Catalog,
    schedule::{OperationDefinition, PlantEvent},
};

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Database error: {0}")]
    DbError(String),
    #[error("Data integrity error: Stored {0} is invalid: {1}")]
    DataIntegrityError(String, String),
    #[error("{0} not found")]
    NotFound(String),
    #[error("Seed stock is empty")]
    StockEmpty,
}

impl From<sqlx::Error> for StorageError {
    fn from(err: sqlx::Error) -> Self {
        StorageError::DbError(err.to_string())
    }
}

impl From<sqlx::migrate::MigrateError> for StorageError {
    fn from(err: sqlx::migrate::MigrateError) -> Self {
        StorageError::DbError(err.to_string())
    }
}

pub type StorageResult<T> = Result<T, StorageError>;

#[automock]
#[async_trait]
pub trait GardenStorage: Send + Sync {
    /// Register a Telegram user. Returns the stored user and whether it was
    /// created by this call.
    async fn register_user(&self, user: NewUser) -> StorageResult<(User, bool)>;

    /// Get a registered user.
    async fn get_user(&self, user_id: UserId) -> StorageResult<Option<User>>;

    /// Get all registered users.
    async fn all_users(&self) -> StorageResult<Vec<User>>;

    /// Set the IANA time zone of a user.
    async fn set_timezone(&self, user_id: UserId, timezone: &str) -> StorageResult<()>;

    /// Remember the local date a reminder was delivered to a user.
    async fn set_last_reminded_on(&self, user_id: UserId, date: NaiveDate) -> StorageResult<()>;

    /// Insert or update the catalog. Operations of every listed type are
    /// replaced.
    async fn import_catalog(&self, catalog: &Catalog) -> StorageResult<()>;

    /// Get all plant types ordered by name.
    async fn list_plant_types(&self) -> StorageResult<Vec<PlantType>>;

    async fn get_plant_type_by_slug(&self, slug: &str) -> StorageResult<Option<PlantType>>;

    async fn get_variety_by_slug(
        &self,
        type_id: i64,
        slug: &str,
    ) -> StorageResult<Option<PlantVariety>>;

    /// Get the steps of a plant type in lifecycle order.
    async fn get_steps_for_type(&self, type_id: i64) -> StorageResult<Vec<PlantStep>>;

    /// Get the operations of a plant type ordered by since-stage, then kind.
    async fn get_operations_for_type(
        &self,
        type_id: i64,
    ) -> StorageResult<Vec<OperationDefinition>>;

    /// Get all plants of a user.
    async fn list_plants(&self, user_id: UserId) -> StorageResult<Vec<Plant>>;

    /// Get a plant if it belongs to the user.
    async fn get_plant(&self, user_id: UserId, plant_id: i64) -> StorageResult<Option<Plant>>;

    /// Get the growth-stage events of a plant in date order.
    async fn list_events(&self, plant_id: i64) -> StorageResult<Vec<PlantEvent>>;

    /// Record that a plant reached a stage, replacing an earlier record of the
    /// same stage.
    async fn record_event(&self, plant_id: i64, event: PlantEvent) -> StorageResult<()>;

    /// Get the non-empty seed stock of a user.
    async fn list_seed_stock(&self, user_id: UserId) -> StorageResult<Vec<SeedStock>>;

    /// Add seeds to a user's stock, creating the entry when needed.
    async fn add_seeds(
        &self,
        user_id: UserId,
        type_id: i64,
        variety_id: Option<i64>,
        quantity: u32,
    ) -> StorageResult<SeedStock>;

    /// Take one seed from a stock entry and create a plant from it.
    async fn plant_from_stock(
        &self,
        user_id: UserId,
        stock_id: i64,
        today: NaiveDate,
    ) -> StorageResult<(Plant, SeedStock)>;
}
