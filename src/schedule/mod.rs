mod period;

use std::{collections::HashMap, fmt, num::NonZeroU32, str::FromStr};

use chrono::{Days, NaiveDate};
pub use period::{PeriodError, PlantingPeriod};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ParseCodeError {
    #[error("Unknown growth stage: {0}")]
    UnknownStage(String),
    #[error("Unknown operation: {0}")]
    UnknownOperation(String),
}

/// A named phase of a plant's lifecycle. The declaration order is the
/// lifecycle order.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub enum GrowthStage {
    #[serde(rename = "10-seed_preparation")]
    SeedPreparation,
    #[serde(rename = "20-sowing")]
    Sowing,
    #[serde(rename = "30-sprouting")]
    Sprouting,
    #[serde(rename = "40-transplanting")]
    Transplanting,
    #[serde(rename = "50-planting_preparation")]
    PlantingPreparation,
    #[serde(rename = "60-planting")]
    Planting,
    #[serde(rename = "65-blooming")]
    Blooming,
    #[serde(rename = "70-pinching_out")]
    PinchingOut,
    #[serde(rename = "80-tie_up")]
    TieUp,
    #[serde(rename = "90-harvesting")]
    Harvesting,
}

impl GrowthStage {
    /// All stages in lifecycle order.
    pub const ALL: [GrowthStage; 10] = [
        GrowthStage::SeedPreparation,
        GrowthStage::Sowing,
        GrowthStage::Sprouting,
        GrowthStage::Transplanting,
        GrowthStage::PlantingPreparation,
        GrowthStage::Planting,
        GrowthStage::Blooming,
        GrowthStage::PinchingOut,
        GrowthStage::TieUp,
        GrowthStage::Harvesting,
    ];

    /// The stable code stored in the database and used in catalog files.
    pub fn code(&self) -> &'static str {
        match self {
            GrowthStage::SeedPreparation => "10-seed_preparation",
            GrowthStage::Sowing => "20-sowing",
            GrowthStage::Sprouting => "30-sprouting",
            GrowthStage::Transplanting => "40-transplanting",
            GrowthStage::PlantingPreparation => "50-planting_preparation",
            GrowthStage::Planting => "60-planting",
            GrowthStage::Blooming => "65-blooming",
            GrowthStage::PinchingOut => "70-pinching_out",
            GrowthStage::TieUp => "80-tie_up",
            GrowthStage::Harvesting => "90-harvesting",
        }
    }

    /// The code without its ordering prefix, e.g. `sowing`.
    pub fn short_code(&self) -> &'static str {
        let code = self.code();
        code.split_once('-').map_or(code, |(_, name)| name)
    }

    pub fn label(&self) -> &'static str {
        match self {
            GrowthStage::SeedPreparation => "🌱🛠️ Seed preparation",
            GrowthStage::Sowing => "🌱👐 Sowing",
            GrowthStage::Sprouting => "🌱🌞 Sprouting",
            GrowthStage::Transplanting => "🪴🚜 Transplanting",
            GrowthStage::PlantingPreparation => "🌿🛠️ Pre-planting",
            GrowthStage::Planting => "🌱🏞️ Planting",
            GrowthStage::Blooming => "🌸🌼 Blooming",
            GrowthStage::PinchingOut => "✂️🌿 Pinching out",
            GrowthStage::TieUp => "🌿🪢 Tie-up",
            GrowthStage::Harvesting => "🧺🍅 Harvesting",
        }
    }
}

impl fmt::Display for GrowthStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for GrowthStage {
    type Err = ParseCodeError;

    /// Accepts both the full code (`20-sowing`) and the short one (`sowing`).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let needle = s.trim().to_lowercase();
        GrowthStage::ALL
            .into_iter()
            .find(|stage| stage.code() == needle || stage.short_code() == needle)
            .ok_or_else(|| ParseCodeError::UnknownStage(s.to_string()))
    }
}

/// A kind of recurring care task.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum OperationKind {
    Watering,
    Fertilizing,
    Hardening,
    Hilling,
}

impl OperationKind {
    pub const ALL: [OperationKind; 4] = [
        OperationKind::Watering,
        OperationKind::Fertilizing,
        OperationKind::Hardening,
        OperationKind::Hilling,
    ];

    pub fn code(&self) -> &'static str {
        match self {
            OperationKind::Watering => "watering",
            OperationKind::Fertilizing => "fertilizing",
            OperationKind::Hardening => "hardening",
            OperationKind::Hilling => "hilling",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            OperationKind::Watering => "💦 Watering",
            OperationKind::Fertilizing => "🧪 Fertilizing",
            OperationKind::Hardening => "❄️ Hardening",
            OperationKind::Hilling => "🪨 Hilling",
        }
    }
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for OperationKind {
    type Err = ParseCodeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let needle = s.trim().to_lowercase();
        OperationKind::ALL
            .into_iter()
            .find(|kind| kind.code() == needle)
            .ok_or_else(|| ParseCodeError::UnknownOperation(s.to_string()))
    }
}

/// A recurring care rule of a plant type, active between two growth stages.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OperationDefinition {
    pub id: i64,
    pub kind: OperationKind,
    pub description: String,
    /// The stage whose event opens the window.
    pub since_stage: GrowthStage,
    /// The stage whose event closes the window for good.
    pub until_stage: GrowthStage,
    /// Days between the since-stage event and the first due day.
    pub delay_days: Option<u32>,
    pub interval_days: NonZeroU32,
    /// Days after the window opens after which the rule stops firing.
    pub duration_days: Option<u32>,
}

impl OperationDefinition {
    /// The first day the operation may be due, given the date of its
    /// since-stage event. `None` if the date overflows the calendar.
    pub fn window_start(&self, since: NaiveDate) -> Option<NaiveDate> {
        since.checked_add_days(Days::new(self.delay_days.unwrap_or(0).into()))
    }

    /// Whether the operation falls due on `as_of` for a window anchored at
    /// `since`. Ignores the until-stage, see [`due_operations`].
    pub fn is_due(&self, since: NaiveDate, as_of: NaiveDate) -> bool {
        let Some(start) = self.window_start(since) else {
            return false;
        };
        if start > as_of {
            return false;
        }

        let elapsed = (as_of - start).num_days();
        if self.duration_days.is_some_and(|duration| elapsed > i64::from(duration)) {
            return false;
        }

        elapsed % i64::from(self.interval_days.get()) == 0
    }
}

impl fmt::Display for OperationDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.kind.label())
    }
}

/// A plant reaching a growth stage on a calendar date.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlantEvent {
    pub stage: GrowthStage,
    pub date: NaiveDate,
    pub comment: Option<String>,
}

impl PlantEvent {
    pub fn new(stage: GrowthStage, date: NaiveDate) -> Self {
        Self { stage, date, comment: None }
    }
}

/// Returns the operations due on `as_of` for a plant with the given events.
///
/// An operation is a candidate when its since-stage has been recorded and its
/// until-stage has not. A candidate is due on the first day of its window and
/// every `interval_days` after that, until `duration_days` have elapsed.
/// Operations are yielded in input order.
pub fn due_operations<'a>(
    events: &[PlantEvent],
    operations: &'a [OperationDefinition],
    as_of: NaiveDate,
) -> impl Iterator<Item = &'a OperationDefinition> + use<'a> {
    let recorded: HashMap<GrowthStage, NaiveDate> =
        events.iter().map(|event| (event.stage, event.date)).collect();

    operations.iter().filter(move |operation| {
        if recorded.contains_key(&operation.until_stage) {
            return false;
        }
        recorded
            .get(&operation.since_stage)
            .is_some_and(|&since| operation.is_due(since, as_of))
    })
}

/// The expected harvest date: the sprouting date plus the maturation time.
pub fn planned_harvest_date(events: &[PlantEvent], maturation_days: u32) -> Option<NaiveDate> {
    events
        .iter()
        .find(|event| event.stage == GrowthStage::Sprouting)
        .and_then(|event| event.date.checked_add_days(Days::new(maturation_days.into())))
}
