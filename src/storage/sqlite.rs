use std::{num::NonZeroU32, str::FromStr};

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use sqlx::{
    FromRow, Pool, Sqlite,
    migrate,
    sqlite::{SqliteConnectOptions, SqlitePoolOptions},
};
use teloxide::types::UserId;

use super::{
    GardenStorage, NewUser, Plant, PlantStep, PlantType, PlantVariety, SeedStock, StorageError,
    StorageResult, User,
};
use crate::{
    catalog::Catalog,
    schedule::{GrowthStage, OperationDefinition, OperationKind, PlantEvent, PlantingPeriod},
};

const PLANT_SELECT: &str = "SELECT p.id, p.user_id, p.name, p.type_id, t.name AS type_name, \
     p.variety_id, v.name AS variety_name, \
     COALESCE(v.duration_days, t.duration_days) AS duration_days, \
     COALESCE(v.planting_period, t.planting_period) AS planting_period, \
     p.created_at \
     FROM plants p \
     JOIN plant_types t ON t.id = p.type_id \
     LEFT JOIN plant_varieties v ON v.id = p.variety_id";

const STOCK_SELECT: &str = "SELECT s.id, s.type_id, t.name AS type_name, s.variety_id, \
     v.name AS variety_name, s.quantity \
     FROM seed_stocks s \
     JOIN plant_types t ON t.id = s.type_id \
     LEFT JOIN plant_varieties v ON v.id = s.variety_id";

const USER_SELECT: &str = "SELECT id, username, telegram_username, first_name, last_name, \
     language_code, timezone, last_reminded_on FROM users";

fn db_id(user_id: UserId) -> i64 {
    user_id.0 as i64
}

fn integrity(what: &str, reason: impl ToString) -> StorageError {
    StorageError::DataIntegrityError(what.to_string(), reason.to_string())
}

fn parse_period(what: &str, period: Option<String>) -> StorageResult<Option<PlantingPeriod>> {
    period
        .map(|p| PlantingPeriod::from_str(&p).map_err(|e| integrity(what, e)))
        .transpose()
}

fn parse_days(what: &str, days: i64) -> StorageResult<u32> {
    u32::try_from(days).map_err(|_| integrity(what, format!("negative day count {days}")))
}

#[derive(FromRow)]
struct UserRow {
    id: i64,
    username: String,
    telegram_username: Option<String>,
    first_name: String,
    last_name: Option<String>,
    language_code: Option<String>,
    timezone: Option<String>,
    last_reminded_on: Option<NaiveDate>,
}

impl From<UserRow> for User {
    fn from(row: UserRow) -> Self {
        Self {
            id: UserId(row.id as u64),
            username: row.username,
            telegram_username: row.telegram_username,
            first_name: row.first_name,
            last_name: row.last_name,
            language_code: row.language_code,
            timezone: row.timezone,
            last_reminded_on: row.last_reminded_on,
        }
    }
}

#[derive(FromRow)]
struct PlantTypeRow {
    id: i64,
    slug: String,
    name: String,
    description: String,
    sowing_period: Option<String>,
    planting_period: Option<String>,
    duration_days: i64,
}

impl TryFrom<PlantTypeRow> for PlantType {
    type Error = StorageError;

    fn try_from(row: PlantTypeRow) -> StorageResult<Self> {
        let what = format!("plant type '{}'", row.slug);
        Ok(Self {
            sowing_period: parse_period(&what, row.sowing_period)?,
            planting_period: parse_period(&what, row.planting_period)?,
            duration_days: parse_days(&what, row.duration_days)?,
            id: row.id,
            slug: row.slug,
            name: row.name,
            description: row.description,
        })
    }
}

#[derive(FromRow)]
struct PlantVarietyRow {
    id: i64,
    type_id: i64,
    slug: String,
    name: String,
    description: String,
    sowing_period: Option<String>,
    planting_period: Option<String>,
    duration_days: i64,
}

impl TryFrom<PlantVarietyRow> for PlantVariety {
    type Error = StorageError;

    fn try_from(row: PlantVarietyRow) -> StorageResult<Self> {
        let what = format!("plant variety '{}'", row.slug);
        Ok(Self {
            sowing_period: parse_period(&what, row.sowing_period)?,
            planting_period: parse_period(&what, row.planting_period)?,
            duration_days: parse_days(&what, row.duration_days)?,
            id: row.id,
            type_id: row.type_id,
            slug: row.slug,
            name: row.name,
            description: row.description,
        })
    }
}

#[derive(FromRow)]
struct PlantStepRow {
    id: i64,
    type_id: i64,
    stage: String,
    description: String,
}

impl TryFrom<PlantStepRow> for PlantStep {
    type Error = StorageError;

    fn try_from(row: PlantStepRow) -> StorageResult<Self> {
        Ok(Self {
            stage: GrowthStage::from_str(&row.stage).map_err(|e| integrity("plant step", e))?,
            id: row.id,
            type_id: row.type_id,
            description: row.description,
        })
    }
}

#[derive(FromRow)]
struct OperationRow {
    id: i64,
    operation: String,
    description: String,
    since_stage: String,
    until_stage: String,
    delay_days: Option<i64>,
    interval_days: i64,
    duration_days: Option<i64>,
}

impl TryFrom<OperationRow> for OperationDefinition {
    type Error = StorageError;

    fn try_from(row: OperationRow) -> StorageResult<Self> {
        let what = format!("operation #{}", row.id);
        let stage = |code: &str| GrowthStage::from_str(code).map_err(|e| integrity(&what, e));
        let optional_days = |days: Option<i64>| days.map(|d| parse_days(&what, d)).transpose();

        Ok(Self {
            id: row.id,
            kind: OperationKind::from_str(&row.operation).map_err(|e| integrity(&what, e))?,
            since_stage: stage(&row.since_stage)?,
            until_stage: stage(&row.until_stage)?,
            delay_days: optional_days(row.delay_days)?,
            interval_days: u32::try_from(row.interval_days)
                .ok()
                .and_then(NonZeroU32::new)
                .ok_or_else(|| integrity(&what, format!("interval {}", row.interval_days)))?,
            duration_days: optional_days(row.duration_days)?,
            description: row.description,
        })
    }
}

#[derive(FromRow)]
struct PlantRow {
    id: i64,
    user_id: i64,
    name: String,
    type_id: i64,
    type_name: String,
    variety_id: Option<i64>,
    variety_name: Option<String>,
    duration_days: i64,
    planting_period: Option<String>,
    created_at: DateTime<Utc>,
}

impl TryFrom<PlantRow> for Plant {
    type Error = StorageError;

    fn try_from(row: PlantRow) -> StorageResult<Self> {
        let what = format!("plant #{}", row.id);
        Ok(Self {
            duration_days: parse_days(&what, row.duration_days)?,
            planting_period: parse_period(&what, row.planting_period)?,
            id: row.id,
            user_id: UserId(row.user_id as u64),
            name: row.name,
            type_id: row.type_id,
            type_name: row.type_name,
            variety_id: row.variety_id,
            variety_name: row.variety_name,
            created_at: row.created_at,
        })
    }
}

#[derive(FromRow)]
struct EventRow {
    stage: String,
    date: NaiveDate,
    comment: Option<String>,
}

impl TryFrom<EventRow> for PlantEvent {
    type Error = StorageError;

    fn try_from(row: EventRow) -> StorageResult<Self> {
        Ok(Self {
            stage: GrowthStage::from_str(&row.stage).map_err(|e| integrity("plant event", e))?,
            date: row.date,
            comment: row.comment,
        })
    }
}

#[derive(FromRow)]
struct StockRow {
    id: i64,
    type_id: i64,
    type_name: String,
    variety_id: Option<i64>,
    variety_name: Option<String>,
    quantity: i64,
}

impl TryFrom<StockRow> for SeedStock {
    type Error = StorageError;

    fn try_from(row: StockRow) -> StorageResult<Self> {
        Ok(Self {
            quantity: parse_days("seed stock", row.quantity)?,
            id: row.id,
            type_id: row.type_id,
            type_name: row.type_name,
            variety_id: row.variety_id,
            variety_name: row.variety_name,
        })
    }
}

fn convert_all<R, T>(rows: Vec<R>) -> StorageResult<Vec<T>>
where
    T: TryFrom<R, Error = StorageError>,
{
    rows.into_iter().map(T::try_from).collect()
}

pub struct SqliteStorage {
    pool: Pool<Sqlite>,
}

impl SqliteStorage {
    pub async fn new(database_url: &str) -> StorageResult<Self> {
        tracing::debug!("Connecting to SQLite database: {database_url}");

        let options =
            SqliteConnectOptions::from_str(database_url)?.create_if_missing(true).foreign_keys(true);

        // Every connection to `sqlite::memory:` opens its own database, so keep
        // exactly one alive.
        let pool = if database_url.contains(":memory:") {
            SqlitePoolOptions::new()
                .max_connections(1)
                .idle_timeout(None)
                .max_lifetime(None)
                .connect_with(options)
                .await?
        } else {
            SqlitePoolOptions::new().connect_with(options).await?
        };

        migrate!("./migrations").run(&pool).await?;
        tracing::debug!("SQLite database migrated");

        Ok(Self { pool })
    }

    async fn fetch_stock(&self, user_id: UserId, stock_id: i64) -> StorageResult<SeedStock> {
        let row = sqlx::query_as::<_, StockRow>(&format!(
            "{STOCK_SELECT} WHERE s.id = ? AND s.user_id = ?"
        ))
        .bind(stock_id)
        .bind(db_id(user_id))
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| StorageError::NotFound("Seed stock".to_string()))?;

        row.try_into()
    }
}

#[async_trait]
impl GardenStorage for SqliteStorage {
    async fn register_user(&self, user: NewUser) -> StorageResult<(User, bool)> {
        if let Some(existing) = self.get_user(user.id).await? {
            tracing::debug!("User {} is already registered", user.id);
            return Ok((existing, false));
        }

        let base_username = user.username.clone().unwrap_or_else(|| format!("tg{}", user.id.0));
        let mut username = base_username.clone();
        let mut suffix = 1;

        loop {
            let result = sqlx::query(
                "INSERT INTO users (id, username, telegram_username, first_name, last_name, \
                 language_code, created_at) VALUES (?, ?, ?, ?, ?, ?, ?)",
            )
            .bind(db_id(user.id))
            .bind(&username)
            .bind(&user.username)
            .bind(&user.first_name)
            .bind(&user.last_name)
            .bind(&user.language_code)
            .bind(Utc::now())
            .execute(&self.pool)
            .await;

            match result {
                Ok(_) => break,
                Err(sqlx::Error::Database(e)) if e.is_unique_violation() => {
                    // Either the id was registered concurrently or the username is taken.
                    if let Some(existing) = self.get_user(user.id).await? {
                        return Ok((existing, false));
                    }
                    username = format!("{base_username}{suffix}");
                    suffix += 1;
                }
                Err(e) => return Err(e.into()),
            }
        }

        tracing::info!("Registered user {} as {username}", user.id);
        let created = self
            .get_user(user.id)
            .await?
            .ok_or_else(|| StorageError::NotFound("User".to_string()))?;
        Ok((created, true))
    }

    async fn get_user(&self, user_id: UserId) -> StorageResult<Option<User>> {
        let row = sqlx::query_as::<_, UserRow>(&format!("{USER_SELECT} WHERE id = ?"))
            .bind(db_id(user_id))
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.map(User::from))
    }

    async fn all_users(&self) -> StorageResult<Vec<User>> {
        let rows = sqlx::query_as::<_, UserRow>(&format!("{USER_SELECT} ORDER BY id"))
            .fetch_all(&self.pool)
            .await?;

        Ok(rows.into_iter().map(User::from).collect())
    }

    async fn set_timezone(&self, user_id: UserId, timezone: &str) -> StorageResult<()> {
        tracing::debug!("Setting time zone of user {user_id} to {timezone}");

        let result = sqlx::query("UPDATE users SET timezone = ? WHERE id = ?")
            .bind(timezone)
            .bind(db_id(user_id))
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(StorageError::NotFound("User".to_string()));
        }
        Ok(())
    }

    async fn set_last_reminded_on(&self, user_id: UserId, date: NaiveDate) -> StorageResult<()> {
        sqlx::query("UPDATE users SET last_reminded_on = ? WHERE id = ?")
            .bind(date)
            .bind(db_id(user_id))
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    async fn import_catalog(&self, catalog: &Catalog) -> StorageResult<()> {
        tracing::debug!("Importing catalog with {} plant types", catalog.plant_types.len());

        let mut tx = self.pool.begin().await?;

        for plant_type in &catalog.plant_types {
            let type_id: i64 = sqlx::query_scalar(
                "INSERT INTO plant_types (slug, name, description, sowing_period, \
                 planting_period, duration_days) VALUES (?, ?, ?, ?, ?, ?) \
                 ON CONFLICT (slug) DO UPDATE SET name = excluded.name, \
                 description = excluded.description, sowing_period = excluded.sowing_period, \
                 planting_period = excluded.planting_period, \
                 duration_days = excluded.duration_days \
                 RETURNING id",
            )
            .bind(&plant_type.slug)
            .bind(&plant_type.name)
            .bind(&plant_type.description)
            .bind(plant_type.sowing_period.map(|p| p.to_string()))
            .bind(plant_type.planting_period.map(|p| p.to_string()))
            .bind(i64::from(plant_type.duration_days))
            .fetch_one(&mut *tx)
            .await?;

            for variety in &plant_type.varieties {
                sqlx::query(
                    "INSERT INTO plant_varieties (type_id, slug, name, description, \
                     sowing_period, planting_period, duration_days) \
                     VALUES (?, ?, ?, ?, ?, ?, ?) \
                     ON CONFLICT (type_id, slug) DO UPDATE SET name = excluded.name, \
                     description = excluded.description, \
                     sowing_period = excluded.sowing_period, \
                     planting_period = excluded.planting_period, \
                     duration_days = excluded.duration_days",
                )
                .bind(type_id)
                .bind(&variety.slug)
                .bind(&variety.name)
                .bind(&variety.description)
                .bind(variety.sowing_period.map(|p| p.to_string()))
                .bind(variety.planting_period.map(|p| p.to_string()))
                .bind(i64::from(variety.duration_days))
                .execute(&mut *tx)
                .await?;
            }

            for step in &plant_type.steps {
                sqlx::query(
                    "INSERT INTO plant_steps (type_id, stage, description) VALUES (?, ?, ?) \
                     ON CONFLICT (type_id, stage) DO UPDATE SET description = excluded.description",
                )
                .bind(type_id)
                .bind(step.stage.code())
                .bind(&step.description)
                .execute(&mut *tx)
                .await?;
            }

            sqlx::query("DELETE FROM plant_operations WHERE type_id = ?")
                .bind(type_id)
                .execute(&mut *tx)
                .await?;

            for operation in &plant_type.operations {
                sqlx::query(
                    "INSERT INTO plant_operations (type_id, operation, description, \
                     since_stage, until_stage, delay_days, interval_days, duration_days) \
                     VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
                )
                .bind(type_id)
                .bind(operation.kind.code())
                .bind(&operation.description)
                .bind(operation.since_stage.code())
                .bind(operation.until_stage.code())
                .bind(operation.delay_days.map(i64::from))
                .bind(i64::from(operation.interval_days.get()))
                .bind(operation.duration_days.map(i64::from))
                .execute(&mut *tx)
                .await?;
            }
        }

        tx.commit().await?;
        tracing::info!(
            "Imported {} plant types with {} operations",
            catalog.plant_types.len(),
            catalog.operations_count()
        );
        Ok(())
    }

    async fn list_plant_types(&self) -> StorageResult<Vec<PlantType>> {
        let rows = sqlx::query_as::<_, PlantTypeRow>(
            "SELECT id, slug, name, description, sowing_period, planting_period, duration_days \
             FROM plant_types ORDER BY name",
        )
        .fetch_all(&self.pool)
        .await?;

        convert_all(rows)
    }

    async fn get_plant_type_by_slug(&self, slug: &str) -> StorageResult<Option<PlantType>> {
        let row = sqlx::query_as::<_, PlantTypeRow>(
            "SELECT id, slug, name, description, sowing_period, planting_period, duration_days \
             FROM plant_types WHERE slug = ?",
        )
        .bind(slug)
        .fetch_optional(&self.pool)
        .await?;

        row.map(PlantType::try_from).transpose()
    }

    async fn get_variety_by_slug(
        &self,
        type_id: i64,
        slug: &str,
    ) -> StorageResult<Option<PlantVariety>> {
        let row = sqlx::query_as::<_, PlantVarietyRow>(
            "SELECT id, type_id, slug, name, description, sowing_period, planting_period, \
             duration_days FROM plant_varieties WHERE type_id = ? AND slug = ?",
        )
        .bind(type_id)
        .bind(slug)
        .fetch_optional(&self.pool)
        .await?;

        row.map(PlantVariety::try_from).transpose()
    }

    async fn get_steps_for_type(&self, type_id: i64) -> StorageResult<Vec<PlantStep>> {
        let rows = sqlx::query_as::<_, PlantStepRow>(
            "SELECT id, type_id, stage, description FROM plant_steps \
             WHERE type_id = ? ORDER BY stage",
        )
        .bind(type_id)
        .fetch_all(&self.pool)
        .await?;

        convert_all(rows)
    }

    async fn get_operations_for_type(
        &self,
        type_id: i64,
    ) -> StorageResult<Vec<OperationDefinition>> {
        let rows = sqlx::query_as::<_, OperationRow>(
            "SELECT id, operation, description, since_stage, until_stage, delay_days, \
             interval_days, duration_days FROM plant_operations \
             WHERE type_id = ? ORDER BY since_stage, operation, id",
        )
        .bind(type_id)
        .fetch_all(&self.pool)
        .await?;

        convert_all(rows)
    }

    async fn list_plants(&self, user_id: UserId) -> StorageResult<Vec<Plant>> {
        tracing::debug!("Getting plants for user: {user_id}");

        let rows =
            sqlx::query_as::<_, PlantRow>(&format!("{PLANT_SELECT} WHERE p.user_id = ? ORDER BY p.id"))
                .bind(db_id(user_id))
                .fetch_all(&self.pool)
                .await?;

        convert_all(rows)
    }

    async fn get_plant(&self, user_id: UserId, plant_id: i64) -> StorageResult<Option<Plant>> {
        let row = sqlx::query_as::<_, PlantRow>(&format!(
            "{PLANT_SELECT} WHERE p.id = ? AND p.user_id = ?"
        ))
        .bind(plant_id)
        .bind(db_id(user_id))
        .fetch_optional(&self.pool)
        .await?;

        row.map(Plant::try_from).transpose()
    }

    async fn list_events(&self, plant_id: i64) -> StorageResult<Vec<PlantEvent>> {
        let rows = sqlx::query_as::<_, EventRow>(
            "SELECT stage, date, comment FROM plant_events WHERE plant_id = ? ORDER BY date, stage",
        )
        .bind(plant_id)
        .fetch_all(&self.pool)
        .await?;

        convert_all(rows)
    }

    async fn record_event(&self, plant_id: i64, event: PlantEvent) -> StorageResult<()> {
        tracing::debug!("Recording {} for plant {plant_id} on {}", event.stage.code(), event.date);

        let mut tx = self.pool.begin().await?;

        sqlx::query(
            "INSERT INTO plant_events (plant_id, stage, date, comment) VALUES (?, ?, ?, ?) \
             ON CONFLICT (plant_id, stage) DO UPDATE SET date = excluded.date, \
             comment = excluded.comment",
        )
        .bind(plant_id)
        .bind(event.stage.code())
        .bind(event.date)
        .bind(&event.comment)
        .execute(&mut *tx)
        .await?;

        sqlx::query("UPDATE plants SET updated_at = ? WHERE id = ?")
            .bind(Utc::now())
            .bind(plant_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(())
    }

    async fn list_seed_stock(&self, user_id: UserId) -> StorageResult<Vec<SeedStock>> {
        let rows = sqlx::query_as::<_, StockRow>(&format!(
            "{STOCK_SELECT} WHERE s.user_id = ? AND s.quantity > 0 \
             ORDER BY t.name, COALESCE(v.name, '')"
        ))
        .bind(db_id(user_id))
        .fetch_all(&self.pool)
        .await?;

        convert_all(rows)
    }

    async fn add_seeds(
        &self,
        user_id: UserId,
        type_id: i64,
        variety_id: Option<i64>,
        quantity: u32,
    ) -> StorageResult<SeedStock> {
        tracing::debug!("Adding {quantity} seeds of type {type_id} for user {user_id}");

        let mut tx = self.pool.begin().await?;

        let existing: Option<i64> = sqlx::query_scalar(
            "SELECT id FROM seed_stocks WHERE user_id = ? AND type_id = ? AND variety_id IS ?",
        )
        .bind(db_id(user_id))
        .bind(type_id)
        .bind(variety_id)
        .fetch_optional(&mut *tx)
        .await?;

        let stock_id = match existing {
            Some(id) => {
                sqlx::query("UPDATE seed_stocks SET quantity = quantity + ? WHERE id = ?")
                    .bind(i64::from(quantity))
                    .bind(id)
                    .execute(&mut *tx)
                    .await?;
                id
            }
            None => sqlx::query(
                "INSERT INTO seed_stocks (user_id, type_id, variety_id, quantity) \
                 VALUES (?, ?, ?, ?)",
            )
            .bind(db_id(user_id))
            .bind(type_id)
            .bind(variety_id)
            .bind(i64::from(quantity))
            .execute(&mut *tx)
            .await?
            .last_insert_rowid(),
        };

        tx.commit().await?;
        self.fetch_stock(user_id, stock_id).await
    }

    async fn plant_from_stock(
        &self,
        user_id: UserId,
        stock_id: i64,
        today: NaiveDate,
    ) -> StorageResult<(Plant, SeedStock)> {
        let stock = self.fetch_stock(user_id, stock_id).await?;
        if stock.quantity == 0 {
            return Err(StorageError::StockEmpty);
        }

        let mut tx = self.pool.begin().await?;

        // Guarded decrement: a concurrent planting may have taken the last seed.
        let taken = sqlx::query(
            "UPDATE seed_stocks SET quantity = quantity - 1 WHERE id = ? AND quantity > 0",
        )
        .bind(stock_id)
        .execute(&mut *tx)
        .await?;
        if taken.rows_affected() == 0 {
            return Err(StorageError::StockEmpty);
        }

        let now = Utc::now();
        let name = Plant::default_name(&stock.type_name, stock.variety_name.as_deref(), today);
        let plant_id = sqlx::query(
            "INSERT INTO plants (user_id, name, type_id, variety_id, created_at, updated_at) \
             VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(db_id(user_id))
        .bind(&name)
        .bind(stock.type_id)
        .bind(stock.variety_id)
        .bind(now)
        .bind(now)
        .execute(&mut *tx)
        .await?
        .last_insert_rowid();

        tx.commit().await?;
        tracing::info!("User {user_id} planted {name} from stock {stock_id}");

        let plant = self
            .get_plant(user_id, plant_id)
            .await?
            .ok_or_else(|| StorageError::NotFound("Plant".to_string()))?;
        let stock = self.fetch_stock(user_id, stock_id).await?;

        Ok((plant, stock))
    }
}
