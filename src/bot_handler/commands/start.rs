use crate::{
    bot_handler::{BotHandlerError, BotHandlerResult, Context},
    storage::NewUser,
};

pub async fn handle(ctx: &Context<'_>) -> BotHandlerResult<()> {
    let chat_id = ctx.chat_id();

    match ctx.handler.garden_service.register(NewUser::from(ctx.user)).await {
        Ok((user, created)) => {
            if created {
                tracing::info!("Created new user {user}");
            } else {
                tracing::info!("Existing user {user} started the bot");
            }
            ctx.handler.messaging_service.send_start_msg(chat_id, user, created).await?;
        }
        Err(e) => {
            tracing::error!("Failed to create user {}: {e}", ctx.user_id());
            ctx.handler
                .messaging_service
                .send_error_msg(chat_id, BotHandlerError::RegistrationFailed)
                .await?;
        }
    }

    Ok(())
}
