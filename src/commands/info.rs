use crate::answer::HELP;
use crate::knowledge::types::SourceType;
use crate::state::Context;

/// Статистика базы знаний
#[poise::command(slash_command)]
pub async fn stats(ctx: Context<'_>) -> Result<(), anyhow::Error> {
    let store = &ctx.data().store;
    let stats = store.stats().await;
    let dynamic = store
        .documents_where(|d| d.meta.source_type == SourceType::ScrapeDynamic)
        .await
        .len();

    ctx.say(format!(
        "📊 **Статистика базы знаний**\n\n\
         📚 Всего документов: {}\n\
         🌐 Из них найдено на pravo.by по запросам: {}\n\
         🗂️ Коллекция: {}\n\
         💾 Путь к БД: {}",
        stats.total_documents, dynamic, stats.collection, stats.location
    ))
    .await?;
    Ok(())
}

/// Как пользоваться ботом
#[poise::command(slash_command)]
pub async fn help(ctx: Context<'_>) -> Result<(), anyhow::Error> {
    ctx.say(HELP).await?;
    Ok(())
}
