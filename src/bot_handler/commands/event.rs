use chrono::NaiveDate;

use crate::{
    bot_handler::{BotHandlerResult, CommandState, Context},
    schedule::{GrowthStage, PlantEvent},
};

const USAGE: &str = "Usage: /event <plant_id> <stage> [YYYY-MM-DD] [comment]";

#[derive(Debug, PartialEq, Eq)]
struct EventArgs {
    plant_id: i64,
    stage: GrowthStage,
    date: Option<NaiveDate>,
    comment: Option<String>,
}

pub async fn handle(ctx: &Context<'_>, args: &str) -> BotHandlerResult<()> {
    if args.trim().is_empty() {
        return ctx.handler.prompt_and_wait_for_reply(ctx, CommandState::AwaitingEvent).await;
    }
    handle_reply(ctx, args).await
}

/// Records an event from `<plant_id> <stage> [YYYY-MM-DD] [comment]`. The date
/// defaults to the user's today.
pub async fn handle_reply(ctx: &Context<'_>, text: &str) -> BotHandlerResult<()> {
    let args = match parse_args(text) {
        Ok(args) => args,
        Err(reason) => return ctx.handler.reply_invalid_input(ctx.chat_id(), &reason).await,
    };

    let date = match args.date {
        Some(date) => date,
        None => ctx.handler.local_today(ctx).await?,
    };
    let event = PlantEvent { stage: args.stage, date, comment: args.comment };

    let result =
        ctx.handler.garden_service.record_event(ctx.user_id(), args.plant_id, event.clone()).await;

    if let Some(plant) = ctx.handler.reply_on_error(ctx.chat_id(), result).await? {
        ctx.handler.messaging_service.send_event_recorded_msg(ctx.chat_id(), plant, event).await?;
    }
    Ok(())
}

fn parse_args(text: &str) -> Result<EventArgs, String> {
    let mut parts = text.split_whitespace().peekable();

    let plant_id = parts.next().and_then(|id| id.trim_start_matches('#').parse::<i64>().ok());
    let (Some(plant_id), Some(stage)) = (plant_id, parts.next()) else {
        return Err(USAGE.to_string());
    };
    let stage = stage.parse::<GrowthStage>().map_err(|e| format!("{e}. See /stages"))?;

    let date = parts.peek().and_then(|d| NaiveDate::parse_from_str(d, "%Y-%m-%d").ok());
    if date.is_some() {
        parts.next();
    }

    let comment = parts.collect::<Vec<_>>().join(" ");
    let comment = (!comment.is_empty()).then_some(comment);

    Ok(EventArgs { plant_id, stage, date, comment })
}
