use tracing::info;

use super::{require_admin, send_chunked};
use crate::jobs::JobRecord;
use crate::state::Context;

/// Run a maintenance command in the background (admin only)
#[poise::command(slash_command, guild_only)]
pub async fn run(
    ctx: Context<'_>,
    #[description = "populate_db | scrape_websites | update_documents | stats"] command: String,
    #[description = "Extra arguments, space separated"] args: Option<String>,
) -> Result<(), anyhow::Error> {
    if !require_admin(&ctx).await? {
        return Ok(());
    }

    let args: Vec<String> = args
        .unwrap_or_default()
        .split_whitespace()
        .map(str::to_string)
        .collect();
    match ctx.data().jobs.launch(&command, &args).await {
        Ok(id) => {
            info!(user = ctx.author().name, job_id = %id, "admin launched job");
            ctx.say(format!("🚀 Задача запущена: `{}`\nСтатус: `/yurist job {}`", id, id))
                .await?;
        }
        Err(e) => {
            let allowed = ctx.data().jobs.allowed().join("`, `");
            ctx.say(format!("❌ {}. Доступны: `{}`", e, allowed)).await?;
        }
    }
    Ok(())
}

/// List background jobs (admin only)
#[poise::command(slash_command, guild_only)]
pub async fn jobs(ctx: Context<'_>) -> Result<(), anyhow::Error> {
    if !require_admin(&ctx).await? {
        return Ok(());
    }

    let jobs = ctx.data().jobs.list().await;
    if jobs.is_empty() {
        ctx.say("Задач пока не было.").await?;
        return Ok(());
    }
    let mut out = String::from("**Задачи:**\n");
    for job in jobs.iter().take(20) {
        out.push_str(&format!(
            "`{}` — {} ({})\n",
            job.id,
            job.status,
            job.started_at.format("%d.%m.%Y %H:%M:%S UTC")
        ));
    }
    send_chunked(&ctx, &out).await
}

/// Show one job with its output (admin only)
#[poise::command(slash_command, guild_only)]
pub async fn job(
    ctx: Context<'_>,
    #[description = "Job id from /yurist run"] id: String,
) -> Result<(), anyhow::Error> {
    if !require_admin(&ctx).await? {
        return Ok(());
    }

    match ctx.data().jobs.status(&id).await {
        Some(record) => send_chunked(&ctx, &render_job(&record)).await,
        None => {
            ctx.say(format!("Задача `{}` не найдена.", id)).await?;
            Ok(())
        }
    }
}

fn render_job(record: &JobRecord) -> String {
    let mut out = format!(
        "**Задача** `{}`\n**Команда:** {} {}\n**Статус:** {}\n**Начата:** {}",
        record.id,
        record.command,
        record.args.join(" "),
        record.status,
        record.started_at.format("%d.%m.%Y %H:%M:%S UTC")
    );
    if let Some(finished) = record.finished_at {
        out.push_str(&format!("\n**Завершена:** {}", finished.format("%d.%m.%Y %H:%M:%S UTC")));
    }
    if let Some(error) = &record.error {
        out.push_str(&format!("\n**Ошибка:** {}", error));
    }
    if !record.output.trim().is_empty() {
        out.push_str(&format!("\n**Результат:**\n```\n{}\n```", record.output.trim()));
    }
    out
}

/// Show gate and retrieval decisions for a question (admin only)
#[poise::command(slash_command, guild_only)]
pub async fn probe(
    ctx: Context<'_>,
    #[description = "Question to diagnose"] question: String,
) -> Result<(), anyhow::Error> {
    if !require_admin(&ctx).await? {
        return Ok(());
    }

    let report = ctx.data().assistant.probe(&question).await;
    send_chunked(&ctx, &report.render()).await
}
