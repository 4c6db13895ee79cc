mod admin;
mod ask;
mod config;
mod info;

use crate::state::Context;

/// Discord's limit is 2000 characters; stay under it.
const MESSAGE_LIMIT: usize = 1990;

/// ЮрПомощник: legal questions on the law of Belarus
#[poise::command(
    slash_command,
    subcommands(
        "ask::ask",
        "info::stats",
        "info::help",
        "admin::run",
        "admin::jobs",
        "admin::job",
        "admin::probe",
        "config::config"
    )
)]
pub async fn yurist(_ctx: Context<'_>) -> Result<(), anyhow::Error> {
    Ok(())
}

/// Tell non-admins off. Returns whether the caller may proceed.
async fn require_admin(ctx: &Context<'_>) -> Result<bool, anyhow::Error> {
    if ctx.data().is_admin(ctx.author().id.get()) {
        return Ok(true);
    }
    ctx.say("⛔ Эта команда доступна только администраторам.").await?;
    Ok(false)
}

/// Split `text` into pieces of at most `limit` characters, preferring to
/// break after a newline, then after a space.
fn split_chunks(text: &str, limit: usize) -> Vec<&str> {
    let mut chunks = Vec::new();
    let mut remaining = text;
    while !remaining.is_empty() {
        let hard_end = remaining
            .char_indices()
            .nth(limit)
            .map(|(i, _)| i)
            .unwrap_or(remaining.len());
        let split_at = if hard_end < remaining.len() {
            let window = &remaining[..hard_end];
            window
                .rfind('\n')
                .or_else(|| window.rfind(' '))
                .map(|i| i + 1)
                .unwrap_or(hard_end)
        } else {
            hard_end
        };
        chunks.push(&remaining[..split_at]);
        remaining = &remaining[split_at..];
    }
    chunks
}

/// Send a message in Discord-safe chunks.
/// Uses ctx.say() for all chunks; poise routes follow-ups through the
/// interaction webhook, which doesn't require Send Messages channel permission.
async fn send_chunked(ctx: &Context<'_>, text: &str) -> Result<(), anyhow::Error> {
    for chunk in split_chunks(text, MESSAGE_LIMIT) {
        ctx.say(chunk).await?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_respects_char_limit_on_cyrillic() {
        let text = "ж".repeat(4500);
        let chunks = split_chunks(&text, MESSAGE_LIMIT);
        assert_eq!(chunks.len(), 3);
        assert!(chunks.iter().all(|c| c.chars().count() <= MESSAGE_LIMIT));
        assert_eq!(chunks.concat(), text);
    }

    #[test]
    fn test_split_prefers_line_breaks() {
        let text = format!("{}\n{}", "а".repeat(10), "б".repeat(10));
        assert_eq!(split_chunks(&text, 15), vec![&text[..text.find('\n').unwrap() + 1], &"б".repeat(10)[..]]);
        assert_eq!(split_chunks("коротко", 15), vec!["коротко"]);
        assert!(split_chunks("", 15).is_empty());
    }
}
