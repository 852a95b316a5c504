use teloxide::utils::html;

use crate::{
    bot_handler::CallbackAction,
    garden::{FuturePlanting, PlantOverview, PlantTasks},
    schedule::GrowthStage,
    storage::SeedStock,
};

/// Serializes a `CallbackAction` to a JSON string. Used for keyboard buttons.
/// expect is ok because inputs are simple and controlled.
pub fn serialize_action(action: &CallbackAction) -> String {
    serde_json::to_string(action).expect("Failed to serialize action")
}

pub fn format_today_tasks(tasks: &[PlantTasks]) -> String {
    if tasks.is_empty() {
        return "No tasks scheduled for today! 🌱".to_string();
    }

    let mut text = "<b>Tasks for today:</b>\n".to_string();
    for plant_tasks in tasks {
        text.push_str(&format!("\n<b>{}:</b>\n", html::escape(&plant_tasks.plant.name)));
        for operation in &plant_tasks.operations {
            text.push_str(&format!(" {operation}"));
            if !operation.description.is_empty() {
                text.push_str(&format!(": {}", html::escape(&operation.description)));
            }
            text.push('\n');
        }
    }
    text
}

pub fn format_plants(plants: &[PlantOverview]) -> String {
    if plants.is_empty() {
        return "You don't have any plants yet.".to_string();
    }

    let mut text = "<b>Your plants:</b>\n".to_string();
    for overview in plants {
        text.push_str(&format!(
            "\n#{} 🌱 {}\n",
            overview.plant.id,
            html::escape(&overview.plant.name)
        ));
        if let Some(stage) = overview.current_stage() {
            text.push_str(&format!("  Stage: {stage}\n"));
        }
        if let Some(harvest) = overview.harvest_date {
            text.push_str(&format!("  Planned harvest: {}\n", harvest.format("%Y-%m-%d")));
        }
    }
    text
}

pub fn format_seed_stock(stock: &[SeedStock]) -> String {
    if stock.is_empty() {
        return "Your seed stock is empty.\n\nUse /addseeds &lt;type_slug&gt; &lt;quantity&gt; \
                [variety_slug] to add seeds."
            .to_string();
    }

    let mut text = "<b>Your seed stock:</b>\n\n".to_string();
    for entry in stock {
        text.push_str(&format!(
            "{}. 🌱 {}: {}\n",
            entry.id,
            html::escape(&entry.plant_name()),
            entry.quantity
        ));
    }
    text.push_str(
        "\nUse /addseeds &lt;type_slug&gt; &lt;quantity&gt; [variety_slug] to add seeds.\n\
         Use /plant &lt;seed_stock_id&gt; to plant one seed.",
    );
    text
}

pub fn format_future_plantings(plantings: &[FuturePlanting]) -> String {
    if plantings.is_empty() {
        return "No plantings ahead.".to_string();
    }

    let mut text = "<b>Your future plantings:</b>\n".to_string();
    for planting in plantings {
        text.push_str(&format!(
            "\n🌱 {}\n  Planned planting period: {} to {}\n",
            html::escape(&planting.plant.name),
            planting.start.format("%d.%m.%Y"),
            planting.end.format("%d.%m.%Y"),
        ));
    }
    text
}

pub fn format_stages() -> String {
    let lines: Vec<String> = GrowthStage::ALL
        .iter()
        .map(|stage| format!("<code>{}</code> {}", stage.short_code(), stage.label()))
        .collect();

    format!(
        "<b>Growth stages:</b>\n\n{}\n\nRecord one with /event &lt;plant_id&gt; &lt;stage&gt; \
         [YYYY-MM-DD] [comment].",
        lines.join("\n")
    )
}
