use std::fmt;

use chrono::{DateTime, NaiveDate, Utc};
use chrono_tz::Tz;
use teloxide::types::UserId;

use crate::schedule::{GrowthStage, PlantingPeriod};

/// Profile data of a Telegram user who contacted the bot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewUser {
    pub id: UserId,
    pub username: Option<String>,
    pub first_name: String,
    pub last_name: Option<String>,
    pub language_code: Option<String>,
}

impl From<&teloxide::types::User> for NewUser {
    fn from(user: &teloxide::types::User) -> Self {
        Self {
            id: user.id,
            username: user.username.clone(),
            first_name: user.first_name.clone(),
            last_name: user.last_name.clone(),
            language_code: user.language_code.clone(),
        }
    }
}

/// A registered diary owner.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct User {
    pub id: UserId,
    /// Account name, unique across the diary.
    pub username: String,
    pub telegram_username: Option<String>,
    pub first_name: String,
    pub last_name: Option<String>,
    pub language_code: Option<String>,
    /// IANA time zone name.
    pub timezone: Option<String>,
    /// The last local date a reminder was delivered.
    pub last_reminded_on: Option<NaiveDate>,
}

impl User {
    /// The configured time zone, if it is set and known.
    pub fn tz(&self) -> Option<Tz> {
        self.timezone.as_deref().and_then(|name| name.parse::<Tz>().ok())
    }
}

impl fmt::Display for User {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (&self.telegram_username, &self.last_name) {
            (Some(username), _) => write!(f, "@{username}"),
            (None, Some(last_name)) => write!(f, "{} {}", self.first_name, last_name),
            (None, None) => write!(f, "{}", self.first_name),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlantType {
    pub id: i64,
    pub slug: String,
    pub name: String,
    pub description: String,
    pub sowing_period: Option<PlantingPeriod>,
    pub planting_period: Option<PlantingPeriod>,
    pub duration_days: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlantVariety {
    pub id: i64,
    pub type_id: i64,
    pub slug: String,
    pub name: String,
    pub description: String,
    pub sowing_period: Option<PlantingPeriod>,
    pub planting_period: Option<PlantingPeriod>,
    pub duration_days: u32,
}

/// What a plant type needs at one growth stage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlantStep {
    pub id: i64,
    pub type_id: i64,
    pub stage: GrowthStage,
    pub description: String,
}

/// A plant in a user's diary, joined with its type and variety.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Plant {
    pub id: i64,
    pub user_id: UserId,
    pub name: String,
    pub type_id: i64,
    pub type_name: String,
    pub variety_id: Option<i64>,
    pub variety_name: Option<String>,
    /// Maturation days of the variety, or of the type without one.
    pub duration_days: u32,
    /// Planting period of the variety, falling back to the type's.
    pub planting_period: Option<PlantingPeriod>,
    pub created_at: DateTime<Utc>,
}

impl Plant {
    /// Name given to a plant nobody named: `Tomato Cherry (2024-05-01)`.
    pub fn default_name(type_name: &str, variety_name: Option<&str>, today: NaiveDate) -> String {
        let mut name = type_name.to_string();
        if let Some(variety) = variety_name {
            name.push(' ');
            name.push_str(variety);
        }
        format!("{name} ({})", today.format("%Y-%m-%d"))
    }
}

impl fmt::Display for Plant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

/// Seeds of one type and variety a user keeps.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SeedStock {
    pub id: i64,
    pub type_id: i64,
    pub type_name: String,
    pub variety_id: Option<i64>,
    pub variety_name: Option<String>,
    pub quantity: u32,
}

impl SeedStock {
    pub fn plant_name(&self) -> String {
        match &self.variety_name {
            Some(variety) => format!("{} {}", self.type_name, variety),
            None => self.type_name.clone(),
        }
    }
}
