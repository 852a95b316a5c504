use crate::bot_handler::{BotHandlerResult, CommandState, Context};

const USAGE: &str = "Usage: /addseeds <type_slug> <quantity> [variety_slug]";

pub async fn handle(ctx: &Context<'_>, args: &str) -> BotHandlerResult<()> {
    if args.trim().is_empty() {
        return ctx.handler.prompt_and_wait_for_reply(ctx, CommandState::AwaitingAddSeeds).await;
    }
    handle_reply(ctx, args).await
}

/// Adds seeds from `<type_slug> <quantity> [variety_slug]`.
pub async fn handle_reply(ctx: &Context<'_>, text: &str) -> BotHandlerResult<()> {
    let Some((type_slug, quantity, variety_slug)) = parse_args(text) else {
        return ctx.handler.reply_invalid_input(ctx.chat_id(), USAGE).await;
    };

    let result = ctx
        .handler
        .garden_service
        .add_seeds(ctx.user_id(), type_slug, i64::from(quantity), variety_slug)
        .await;

    if let Some(stock) = ctx.handler.reply_on_error(ctx.chat_id(), result).await? {
        ctx.handler.messaging_service.send_seeds_added_msg(ctx.chat_id(), quantity, stock).await?;
    }
    Ok(())
}

fn parse_args(text: &str) -> Option<(String, u32, Option<String>)> {
    let parts: Vec<&str> = text.split_whitespace().collect();
    match parts.as_slice() {
        [type_slug, quantity] => Some((type_slug.to_lowercase(), quantity.parse().ok()?, None)),
        [type_slug, quantity, variety_slug] => Some((
            type_slug.to_lowercase(),
            quantity.parse().ok()?,
            Some(variety_slug.to_lowercase()),
        )),
        _ => None,
    }
}
