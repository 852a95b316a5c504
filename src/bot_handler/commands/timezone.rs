use crate::bot_handler::{BotHandlerResult, CommandState, Context};

/// Shows the current time zone and asks for a new one, or sets it directly.
pub async fn handle(ctx: &Context<'_>, args: &str) -> BotHandlerResult<()> {
    if args.trim().is_empty() {
        let current = ctx.handler.garden_service.user_timezone(ctx.user_id()).await?;
        ctx.handler.messaging_service.send_timezone_msg(ctx.chat_id(), current).await?;
        return ctx.handler.prompt_and_wait_for_reply(ctx, CommandState::AwaitingTimezone).await;
    }
    handle_reply(ctx, args).await
}

pub async fn handle_reply(ctx: &Context<'_>, text: &str) -> BotHandlerResult<()> {
    let result = ctx.handler.garden_service.set_timezone(ctx.user_id(), text.trim()).await;

    if let Some(tz) = ctx.handler.reply_on_error(ctx.chat_id(), result).await? {
        tracing::debug!("User {} switched to time zone {tz}", ctx.user_id());
        ctx.handler.messaging_service.send_timezone_msg(ctx.chat_id(), tz).await?;
    }
    Ok(())
}
