use lazy_static::lazy_static;
use teloxide::types::{InlineKeyboardButton, InlineKeyboardMarkup};

use super::utils;
use crate::{bot_handler::CallbackAction, storage::SeedStock};

/// One "plant a seed" button per stock entry, followed by the command rows.
pub fn build_seed_stock_keyboard(stock: &[SeedStock]) -> InlineKeyboardMarkup {
    let mut buttons: Vec<Vec<InlineKeyboardButton>> = stock
        .iter()
        .map(|entry| {
            let action = utils::serialize_action(&CallbackAction::PlantStock(entry.id));
            vec![InlineKeyboardButton::callback(
                format!("🌱 Plant {} ({})", entry.plant_name(), entry.quantity),
                action,
            )]
        })
        .collect();

    buttons.extend(COMMAND_KEYBOARD.inline_keyboard.iter().cloned());
    InlineKeyboardMarkup::new(buttons)
}

lazy_static! {
    pub static ref COMMAND_KEYBOARD: InlineKeyboardMarkup = InlineKeyboardMarkup::new(vec![
        vec![
            InlineKeyboardButton::callback(
                "📅 Today",
                utils::serialize_action(&CallbackAction::CmdToday)
            ),
            InlineKeyboardButton::callback(
                "🌿 My plants",
                utils::serialize_action(&CallbackAction::CmdMyPlants)
            ),
        ],
        vec![
            InlineKeyboardButton::callback(
                "🫘 Seeds",
                utils::serialize_action(&CallbackAction::CmdSeeds)
            ),
            InlineKeyboardButton::callback(
                "🗓️ Planting",
                utils::serialize_action(&CallbackAction::CmdPlanting)
            ),
        ],
        vec![
            InlineKeyboardButton::callback(
                "📖 Stages",
                utils::serialize_action(&CallbackAction::CmdStages)
            ),
            InlineKeyboardButton::callback(
                "ℹ️ Help",
                utils::serialize_action(&CallbackAction::CmdHelp)
            ),
        ],
    ]);
}
