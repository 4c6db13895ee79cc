use tracing::info;

use super::require_admin;
use crate::state::Context;

/// Show or change gate and retrieval thresholds (admin only)
#[poise::command(slash_command, guild_only)]
pub async fn config(
    ctx: Context<'_>,
    #[description = "stat_high_confidence | lexical_strong | good_distance | marginal_distance | retrieval_k"]
    param: Option<String>,
    #[description = "New value"] value: Option<String>,
) -> Result<(), anyhow::Error> {
    if !require_admin(&ctx).await? {
        return Ok(());
    }

    match (param.as_deref(), value) {
        (None, _) => {
            let tunables = ctx.data().tunables.read().await;
            ctx.say(tunables.describe()).await?;
        }
        (Some(key), Some(val)) => {
            let result = ctx.data().tunables.write().await.set(key, &val);
            match result {
                Ok(confirmation) => {
                    info!(user = ctx.author().name, key, value = %val, "tunable changed");
                    ctx.say(confirmation).await?;
                }
                Err(message) => {
                    ctx.say(message).await?;
                }
            }
        }
        (Some(_), None) => {
            ctx.say("Provide both `param` and `value`. Example: `/yurist config good_distance 0.45`")
                .await?;
        }
    }

    Ok(())
}
