use crate::chain::{ChainCall, ChainConnector, TxHandle};
use crate::confirm::Confirm;
use crate::error::ArcError;
use crate::models::HistoryItem;
use crate::profile::ProfileManager;
use crate::tasks::TaskManager;

pub const ARCHIVE_PROMPT: &str =
    "Only tasks in the 'Done' column will be permanently archived to the blockchain. Continue?";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ArchiveOutcome {
    Archived {
        tx: TxHandle,
        /// `None` when the chain call went through but the history write
        /// did not
        history: Option<HistoryItem>,
    },
    /// The user declined the confirmation
    Cancelled,
}

/// Submit the content of every completed task to `logTasks`.
///
/// Nothing reaches the chain when no wallet is connected, the done column is
/// empty, or the user declines. Task state is never modified; on success one
/// history record is appended to the wallet's profile.
pub async fn archive_completed(
    tasks: &TaskManager,
    profiles: &ProfileManager,
    chain: &dyn ChainConnector,
    confirm: &dyn Confirm,
) -> Result<ArchiveOutcome, ArcError> {
    let wallet = tasks.context().wallet()?;
    let done = tasks.done_contents();
    if done.is_empty() {
        return Err(ArcError::NothingToArchive);
    }
    if !confirm.confirm(ARCHIVE_PROMPT) {
        tracing::debug!("archive cancelled");
        return Ok(ArchiveOutcome::Cancelled);
    }

    let tx = chain.submit(wallet, ChainCall::LogTasks(done.clone())).await?;
    tracing::info!(count = done.len(), tx = %tx.hash, "archived completed tasks");

    // The archive is final once submitted; a failed history write is only logged
    let history = match profiles.add_history(done).await {
        Ok(item) => Some(item),
        Err(e) => {
            tracing::error!("Archive succeeded but history was not saved: {}", e);
            None
        }
    };
    Ok(ArchiveOutcome::Archived { tx, history })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::test_support::RecordingChain;
    use crate::config::FailurePolicy;
    use crate::context::Context;
    use crate::models::{ColumnId, Task, Workspace};
    use crate::store::{SqliteStore, Store};
    use std::sync::Arc;

    fn setup(wallet: Option<&str>) -> (TaskManager, ProfileManager) {
        let store: Arc<dyn Store> = Arc::new(SqliteStore::open_in_memory().unwrap());
        let ctx = Context::new(wallet.map(str::to_string), Workspace::default());
        (
            TaskManager::new(store.clone(), ctx.clone(), FailurePolicy::KeepLocal),
            ProfileManager::new(store, ctx),
        )
    }

    #[tokio::test]
    async fn test_empty_done_column_never_calls_chain() {
        let (mut tasks, profiles) = setup(Some("0xabc"));
        tasks.create(Task::new("Still going".to_string(), ColumnId::InProgress)).await.unwrap();
        let chain = RecordingChain::default();

        let err = archive_completed(&tasks, &profiles, &chain, &|_: &str| true).await.unwrap_err();
        assert!(matches!(err, ArcError::NothingToArchive));
        assert_eq!(chain.call_count(), 0);
    }

    #[tokio::test]
    async fn test_requires_wallet() {
        let (tasks, profiles) = setup(None);
        let chain = RecordingChain::default();
        let err = archive_completed(&tasks, &profiles, &chain, &|_: &str| true).await.unwrap_err();
        assert!(matches!(err, ArcError::WalletNotConnected));
    }

    #[tokio::test]
    async fn test_declined_confirmation_is_not_an_error() {
        let (mut tasks, profiles) = setup(Some("0xabc"));
        tasks.create(Task::new("Shipped".to_string(), ColumnId::Done)).await.unwrap();
        let chain = RecordingChain::default();

        let outcome = archive_completed(&tasks, &profiles, &chain, &|_: &str| false).await.unwrap();
        assert_eq!(outcome, ArchiveOutcome::Cancelled);
        assert_eq!(chain.call_count(), 0);
        assert!(profiles.history().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_chain_failure_surfaces_verbatim_and_keeps_state() {
        let (mut tasks, profiles) = setup(Some("0xabc"));
        tasks.create(Task::new("Shipped".to_string(), ColumnId::Done)).await.unwrap();
        let before = tasks.tasks().to_vec();
        let chain = RecordingChain::failing("User rejected the request.");

        let err = archive_completed(&tasks, &profiles, &chain, &|_: &str| true).await.unwrap_err();
        assert_eq!(err.to_string(), "User rejected the request.");
        assert_eq!(tasks.tasks(), before.as_slice());
        assert!(profiles.history().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_success_appends_one_history_record() {
        let (mut tasks, profiles) = setup(Some("0xabc"));
        tasks.create(Task::new("Shipped".to_string(), ColumnId::Done)).await.unwrap();
        tasks.create(Task::new("Next".to_string(), ColumnId::Todo)).await.unwrap();
        let chain = RecordingChain::default();

        let outcome = archive_completed(&tasks, &profiles, &chain, &|_: &str| true).await.unwrap();
        assert!(matches!(outcome, ArchiveOutcome::Archived { history: Some(_), .. }));
        assert_eq!(
            chain.calls.lock().unwrap().as_slice(),
            &[ChainCall::LogTasks(vec!["Shipped".to_string()])]
        );

        let history = profiles.history().await.unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].tasks, vec!["Shipped".to_string()]);
        assert_eq!(tasks.tasks().len(), 2);
    }
}
