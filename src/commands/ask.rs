use tracing::info;

use super::send_chunked;
use crate::answer::SEARCHING_NOTICE;
use crate::state::Context;

/// Задать юридический вопрос
#[poise::command(slash_command)]
pub async fn ask(
    ctx: Context<'_>,
    #[description = "Ваш вопрос"] question: String,
) -> Result<(), anyhow::Error> {
    // Acknowledge immediately so the interaction doesn't expire
    ctx.say(SEARCHING_NOTICE).await?;

    let user_id = ctx.author().id.get();
    info!(user = ctx.author().name, user_id, "question received");

    let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
    let assistant = ctx.data().assistant.clone();
    let pipeline = assistant.handle_question_with_progress(&question, user_id, Some(tx));
    let relay = async {
        while let Some(status) = rx.recv().await {
            ctx.say(status).await?;
        }
        Ok::<(), anyhow::Error>(())
    };
    let (reply, relayed) = tokio::join!(pipeline, relay);
    relayed?;

    let full = format!("<@{}>\n**Вопрос:** {}\n\n{}", user_id, question, reply.text);
    send_chunked(&ctx, &full).await
}
