use serde::{Deserialize, Serialize};

/// Payload of an inline keyboard button. Serialized as JSON into the
/// callback data, which Telegram limits to 64 bytes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CallbackAction {
    // Command keyboard actions, handled as the matching commands.
    CmdHelp,
    CmdToday,
    CmdMyPlants,
    CmdSeeds,
    CmdPlanting,
    CmdStages,
    /// Plant one seed from the stock entry with this id.
    PlantStock(i64),
}
