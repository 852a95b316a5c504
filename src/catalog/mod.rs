//! Plant catalog documents.
//!
//! Administrators describe plant types, their varieties, growth steps and
//! care operations in a JSON file. The document is checked as a whole and
//! every problem is reported, so one edit-and-reload cycle fixes them all.


use std::{collections::HashSet, num::NonZeroU32, path::Path};

use serde::Deserialize;
use thiserror::Error;

use crate::schedule::{GrowthStage, OperationKind, PlantingPeriod};

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("Failed to read catalog file: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to parse catalog: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Invalid catalog:\n{}", .0.join("\n"))]
    Invalid(Vec<String>),
}

pub type CatalogResult<T> = Result<T, CatalogError>;

#[derive(Debug, Deserialize)]
struct RawCatalog {
    plant_types: Vec<RawPlantType>,
}

#[derive(Debug, Deserialize)]
struct RawPlantType {
    slug: String,
    name: String,
    #[serde(default)]
    description: String,
    sowing_period: Option<String>,
    planting_period: Option<String>,
    duration_days: i64,
    #[serde(default)]
    varieties: Vec<RawVariety>,
    #[serde(default)]
    steps: Vec<RawStep>,
    #[serde(default)]
    operations: Vec<RawOperation>,
}

#[derive(Debug, Deserialize)]
struct RawVariety {
    slug: String,
    name: String,
    #[serde(default)]
    description: String,
    sowing_period: Option<String>,
    planting_period: Option<String>,
    duration_days: i64,
}

#[derive(Debug, Deserialize)]
struct RawStep {
    stage: String,
    #[serde(default)]
    description: String,
}

#[derive(Debug, Deserialize)]
struct RawOperation {
    operation: String,
    #[serde(default)]
    description: String,
    since_stage: String,
    until_stage: String,
    delay_days: Option<i64>,
    interval_days: i64,
    duration_days: Option<i64>,
}

/// A validated plant catalog.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Catalog {
    pub plant_types: Vec<PlantTypeEntry>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlantTypeEntry {
    pub slug: String,
    pub name: String,
    pub description: String,
    pub sowing_period: Option<PlantingPeriod>,
    pub planting_period: Option<PlantingPeriod>,
    /// Days from sprouting to harvest.
    pub duration_days: u32,
    pub varieties: Vec<VarietyEntry>,
    pub steps: Vec<StepEntry>,
    pub operations: Vec<OperationEntry>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VarietyEntry {
    pub slug: String,
    pub name: String,
    pub description: String,
    pub sowing_period: Option<PlantingPeriod>,
    pub planting_period: Option<PlantingPeriod>,
    pub duration_days: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepEntry {
    pub stage: GrowthStage,
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OperationEntry {
    pub kind: OperationKind,
    pub description: String,
    pub since_stage: GrowthStage,
    pub until_stage: GrowthStage,
    pub delay_days: Option<u32>,
    pub interval_days: NonZeroU32,
    pub duration_days: Option<u32>,
}

impl Catalog {
    /// Reads and validates a catalog file.
    pub fn load(path: impl AsRef<Path>) -> CatalogResult<Self> {
        let path = path.as_ref();
        tracing::debug!("Loading catalog from {}", path.display());
        let contents = std::fs::read_to_string(path)?;
        Self::from_json(&contents)
    }

    /// Parses and validates a catalog document.
    pub fn from_json(json: &str) -> CatalogResult<Self> {
        let raw: RawCatalog = serde_json::from_str(json)?;
        let mut errors = Vec::new();

        let mut type_slugs = HashSet::new();
        let plant_types = raw
            .plant_types
            .into_iter()
            .map(|raw_type| {
                if !type_slugs.insert(raw_type.slug.clone()) {
                    errors.push(format!("Duplicate plant type slug: {}", raw_type.slug));
                }
                validate_plant_type(raw_type, &mut errors)
            })
            .collect();

        if errors.is_empty() {
            Ok(Self { plant_types })
        } else {
            Err(CatalogError::Invalid(errors))
        }
    }

    pub fn operations_count(&self) -> usize {
        self.plant_types.iter().map(|t| t.operations.len()).sum()
    }
}

fn validate_plant_type(raw: RawPlantType, errors: &mut Vec<String>) -> PlantTypeEntry {
    let context = format!("plant type '{}'", raw.slug);
    check_slug(&raw.slug, &context, errors);
    check_name(&raw.name, &context, errors);

    let mut variety_slugs = HashSet::new();
    let varieties = raw
        .varieties
        .into_iter()
        .map(|variety| {
            let variety_context = format!("{context}, variety '{}'", variety.slug);
            if !variety_slugs.insert(variety.slug.clone()) {
                errors.push(format!("{context}: duplicate variety slug '{}'", variety.slug));
            }
            check_slug(&variety.slug, &variety_context, errors);
            check_name(&variety.name, &variety_context, errors);
            VarietyEntry {
                sowing_period: parse_period(
                    variety.sowing_period.as_deref(),
                    &variety_context,
                    errors,
                ),
                planting_period: parse_period(
                    variety.planting_period.as_deref(),
                    &variety_context,
                    errors,
                ),
                duration_days: positive_days(variety.duration_days, &variety_context, errors),
                slug: variety.slug,
                name: variety.name,
                description: variety.description,
            }
        })
        .collect();

    let mut seen_stages = HashSet::new();
    let steps = raw
        .steps
        .into_iter()
        .filter_map(|step| {
            let stage = parse_stage(&step.stage, &context, errors)?;
            if !seen_stages.insert(stage) {
                errors.push(format!("{context}: duplicate step '{}'", stage.code()));
            }
            Some(StepEntry { stage, description: step.description })
        })
        .collect();

    let operations = raw
        .operations
        .into_iter()
        .enumerate()
        .filter_map(|(index, operation)| {
            let op_context = format!("{context}, operation #{}", index + 1);
            validate_operation(operation, &op_context, errors)
        })
        .collect();

    PlantTypeEntry {
        sowing_period: parse_period(raw.sowing_period.as_deref(), &context, errors),
        planting_period: parse_period(raw.planting_period.as_deref(), &context, errors),
        duration_days: positive_days(raw.duration_days, &context, errors),
        slug: raw.slug,
        name: raw.name,
        description: raw.description,
        varieties,
        steps,
        operations,
    }
}

fn validate_operation(
    raw: RawOperation,
    context: &str,
    errors: &mut Vec<String>,
) -> Option<OperationEntry> {
    let kind = match raw.operation.parse::<OperationKind>() {
        Ok(kind) => Some(kind),
        Err(e) => {
            errors.push(format!("{context}: {e}"));
            None
        }
    };
    let since_stage = parse_stage(&raw.since_stage, context, errors);
    let until_stage = parse_stage(&raw.until_stage, context, errors);

    let interval_days = u32::try_from(raw.interval_days).ok().and_then(NonZeroU32::new);
    if interval_days.is_none() {
        errors.push(format!(
            "{context}: interval_days must be at least 1, got {}",
            raw.interval_days
        ));
    }
    let delay_days = optional_days(raw.delay_days, "delay_days", context, errors);
    let duration_days = optional_days(raw.duration_days, "duration_days", context, errors);

    Some(OperationEntry {
        kind: kind?,
        description: raw.description,
        since_stage: since_stage?,
        until_stage: until_stage?,
        delay_days: delay_days.ok()?,
        interval_days: interval_days?,
        duration_days: duration_days.ok()?,
    })
}

fn check_slug(slug: &str, context: &str, errors: &mut Vec<String>) {
    let valid = !slug.is_empty()
        && slug.chars().all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-' || c == '_');
    if !valid {
        errors.push(format!(
            "{context}: slug must be lowercase letters, digits, '-' or '_'"
        ));
    }
}

fn check_name(name: &str, context: &str, errors: &mut Vec<String>) {
    if name.trim().is_empty() {
        errors.push(format!("{context}: name cannot be empty"));
    }
}

fn parse_stage(code: &str, context: &str, errors: &mut Vec<String>) -> Option<GrowthStage> {
    code.parse::<GrowthStage>()
        .map_err(|e| errors.push(format!("{context}: {e}")))
        .ok()
}

fn parse_period(
    period: Option<&str>,
    context: &str,
    errors: &mut Vec<String>,
) -> Option<PlantingPeriod> {
    period?
        .parse::<PlantingPeriod>()
        .map_err(|e| errors.push(format!("{context}: {e}")))
        .ok()
}

fn positive_days(days: i64, context: &str, errors: &mut Vec<String>) -> u32 {
    match u32::try_from(days) {
        Ok(days) if days > 0 => days,
        _ => {
            errors.push(format!("{context}: duration_days must be positive, got {days}"));
            0
        }
    }
}

/// `Err(())` marks an invalid value that has already been reported.
fn optional_days(
    days: Option<i64>,
    field: &str,
    context: &str,
    errors: &mut Vec<String>,
) -> Result<Option<u32>, ()> {
    match days {
        None => Ok(None),
        Some(days) => u32::try_from(days).map(Some).map_err(|_| {
            errors.push(format!("{context}: {field} cannot be negative, got {days}"));
        }),
    }
}
