use crate::bot_handler::{BotHandlerResult, Context};

pub async fn handle(ctx: &Context<'_>) -> BotHandlerResult<()> {
    let today = ctx.handler.local_today(ctx).await?;
    let tasks = ctx.handler.garden_service.today_tasks(ctx.user_id(), today).await?;

    ctx.handler.messaging_service.send_today_tasks_msg(ctx.chat_id(), tasks).await?;
    Ok(())
}
