use crate::bot_handler::{BotHandlerResult, Context};

pub async fn handle(ctx: &Context<'_>) -> BotHandlerResult<()> {
    let plants = ctx.handler.garden_service.my_plants(ctx.user_id()).await?;
    ctx.handler.messaging_service.send_plants_msg(ctx.chat_id(), plants).await?;
    Ok(())
}
