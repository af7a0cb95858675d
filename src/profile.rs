use std::collections::HashSet;
use std::sync::Arc;

use crate::context::Context;
use crate::error::ArcError;
use crate::models::{HistoryItem, UserProfile};
use crate::store::Store;

/// Activity counters achievements are computed from
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Stats {
    pub has_profile: bool,
    pub archives: usize,
    pub archived_tasks: u64,
    /// Distinct calendar days with at least one archive
    pub active_days: u64,
    pub anchored_notes: u64,
    pub encrypted_notes: u64,
    pub focus_minutes: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Achievement {
    pub title: &'static str,
    pub description: &'static str,
    pub progress: u64,
    pub total: u64,
}

impl Achievement {
    pub fn unlocked(&self) -> bool {
        self.progress >= self.total
    }
}

pub fn achievements(stats: &Stats) -> Vec<Achievement> {
    let achievement = |title, description, progress: u64, total| Achievement {
        title,
        description,
        progress: progress.min(total),
        total,
    };
    vec![
        achievement("Early Adopter", "Joined Arc Network", u64::from(stats.has_profile), 1),
        achievement("Task Master", "Complete 50 tasks", stats.archived_tasks, 50),
        achievement("Chain Anchor", "Anchor 10 documents", stats.anchored_notes, 10),
        achievement("Focus Warrior", "100 hours of focused work", stats.focus_minutes / 60, 100),
        achievement("Crypto Vault", "Secure 5 encrypted notes", stats.encrypted_notes, 5),
        achievement("Time Lord", "30 day streak", stats.active_days, 30),
    ]
}

/// Profile, archive history and focus time of the connected wallet.
/// Data is owned per wallet address and never merged across wallets.
pub struct ProfileManager {
    store: Arc<dyn Store>,
    ctx: Context,
}

impl ProfileManager {
    pub fn new(store: Arc<dyn Store>, ctx: Context) -> Self {
        Self { store, ctx }
    }

    /// The saved profile, or an empty one
    pub async fn load(&self) -> Result<UserProfile, ArcError> {
        let wallet = self.ctx.wallet()?;
        Ok(self.store.load_profile(wallet).await?.unwrap_or_default())
    }

    pub async fn save(&self, profile: &UserProfile) -> Result<(), ArcError> {
        let wallet = self.ctx.wallet()?;
        self.store.save_profile(wallet, profile).await?;
        Ok(())
    }

    pub async fn history(&self) -> Result<Vec<HistoryItem>, ArcError> {
        let wallet = self.ctx.wallet()?;
        Ok(self.store.load_history(wallet).await?)
    }

    pub async fn add_history(&self, tasks: Vec<String>) -> Result<HistoryItem, ArcError> {
        let wallet = self.ctx.wallet()?;
        let item = HistoryItem::new(tasks);
        self.store.append_history(wallet, &item).await?;
        Ok(item)
    }

    /// Add a finished focus session; returns total focus minutes
    pub async fn record_focus(&self, minutes: u32) -> Result<u64, ArcError> {
        let wallet = self.ctx.wallet()?;
        let total = self.store.add_focus_minutes(wallet, minutes).await?;
        tracing::info!(minutes, total, "focus session recorded");
        Ok(total)
    }

    pub async fn stats(&self) -> Result<Stats, ArcError> {
        let wallet = self.ctx.wallet()?;
        let has_profile = self.store.load_profile(wallet).await?.is_some();
        let history = self.store.load_history(wallet).await?;
        let notes = self.store.note_counts(wallet).await?;
        let focus_minutes = self.store.focus_minutes(wallet).await?;

        let days: HashSet<&str> = history.iter().map(|h| h.date.as_str()).collect();
        Ok(Stats {
            has_profile,
            archives: history.len(),
            archived_tasks: history.iter().map(|h| h.tasks.len() as u64).sum(),
            active_days: days.len() as u64,
            anchored_notes: notes.anchored,
            encrypted_notes: notes.encrypted,
            focus_minutes,
        })
    }
}
