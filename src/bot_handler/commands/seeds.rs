use crate::bot_handler::{BotHandlerResult, Context};

pub async fn handle(ctx: &Context<'_>) -> BotHandlerResult<()> {
    let stock = ctx.handler.garden_service.seed_stock(ctx.user_id()).await?;
    ctx.handler.messaging_service.send_seed_stock_msg(ctx.chat_id(), stock).await?;
    Ok(())
}
