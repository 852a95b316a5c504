use crate::bot_handler::{BotHandlerResult, Context};

pub async fn handle(ctx: &Context<'_>) -> BotHandlerResult<()> {
    let today = ctx.handler.local_today(ctx).await?;
    let plantings = ctx.handler.garden_service.future_plantings(ctx.user_id(), today).await?;

    ctx.handler.messaging_service.send_future_plantings_msg(ctx.chat_id(), plantings).await?;
    Ok(())
}
