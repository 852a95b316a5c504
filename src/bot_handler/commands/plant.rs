use crate::bot_handler::{BotHandlerResult, CommandState, Context};

const USAGE: &str = "Usage: /plant <seed_stock_id>";

pub async fn handle(ctx: &Context<'_>, args: &str) -> BotHandlerResult<()> {
    if args.trim().is_empty() {
        return ctx.handler.prompt_and_wait_for_reply(ctx, CommandState::AwaitingPlant).await;
    }
    handle_reply(ctx, args).await
}

pub async fn handle_reply(ctx: &Context<'_>, text: &str) -> BotHandlerResult<()> {
    match text.trim().parse::<i64>() {
        Ok(stock_id) => plant_stock(ctx, stock_id).await,
        Err(_) => ctx.handler.reply_invalid_input(ctx.chat_id(), USAGE).await,
    }
}

/// Plants one seed from the stock entry, also used by the seed stock keyboard.
pub async fn plant_stock(ctx: &Context<'_>, stock_id: i64) -> BotHandlerResult<()> {
    let today = ctx.handler.local_today(ctx).await?;
    let result = ctx.handler.garden_service.plant_from_stock(ctx.user_id(), stock_id, today).await;

    if let Some((plant, stock)) = ctx.handler.reply_on_error(ctx.chat_id(), result).await? {
        ctx.handler.messaging_service.send_planted_msg(ctx.chat_id(), plant, stock).await?;
    }
    Ok(())
}
