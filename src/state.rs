use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::assistant::LegalAssistant;
use crate::config::Tunables;
use crate::jobs::JobTable;
use crate::knowledge::KnowledgeStore;

pub struct AppState {
    pub assistant: Arc<LegalAssistant>,
    pub store: Arc<KnowledgeStore>,
    pub jobs: Arc<JobTable>,
    pub admin_ids: HashSet<u64>,
    /// Shared with the assistant, which reads it on every question.
    pub tunables: Arc<RwLock<Tunables>>,
}

impl AppState {
    pub fn is_admin(&self, user_id: u64) -> bool {
        self.admin_ids.contains(&user_id)
    }
}

pub type Context<'a> = poise::Context<'a, AppState, anyhow::Error>;
