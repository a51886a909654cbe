use std::{fmt, sync::Arc};

use chrono::Duration;
use serde::Serialize;
use uuid::Uuid;

use crate::{
    db::{DbPool, DbResult},
    lifecycle::ADMIN_EXTENSION_DAYS,
    models::Poll,
    observability::metrics,
};

/// Bulk lifecycle commands an operator can apply to a set of polls.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AdminAction {
    SoftDelete,
    Restore,
    Extend,
}

impl AdminAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            AdminAction::SoftDelete => "soft_delete",
            AdminAction::Restore => "restore",
            AdminAction::Extend => "extend",
        }
    }
}

impl fmt::Display for AdminAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What happened to one poll in a bulk action.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "outcome", content = "detail", rename_all = "snake_case")]
pub enum ActionOutcome {
    /// The transition committed; carries the updated poll.
    Applied(Poll),
    /// The poll was already in the target state.
    Skipped(String),
    /// The poll does not exist or the store failed.
    Failed(String),
}

impl ActionOutcome {
    fn from_result(result: DbResult<Poll>) -> Self {
        match result {
            Ok(poll) => ActionOutcome::Applied(poll),
            Err(e) if e.is_precondition_failure() => ActionOutcome::Skipped(e.to_string()),
            Err(e) => ActionOutcome::Failed(e.to_string()),
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            ActionOutcome::Applied(_) => "applied",
            ActionOutcome::Skipped(_) => "skipped",
            ActionOutcome::Failed(_) => "failed",
        }
    }
}

/// Per-id results of a bulk action, in request order.
#[derive(Debug, Clone, Serialize)]
pub struct BulkActionReport {
    pub action: AdminAction,
    pub results: Vec<(Uuid, ActionOutcome)>,
}

impl BulkActionReport {
    pub fn applied(&self) -> usize {
        self.count(|o| matches!(o, ActionOutcome::Applied(_)))
    }

    pub fn skipped(&self) -> usize {
        self.count(|o| matches!(o, ActionOutcome::Skipped(_)))
    }

    pub fn failed(&self) -> usize {
        self.count(|o| matches!(o, ActionOutcome::Failed(_)))
    }

    pub fn has_failures(&self) -> bool {
        self.failed() > 0
    }

    fn count(&self, pred: impl Fn(&ActionOutcome) -> bool) -> usize {
        self.results.iter().filter(|(_, o)| pred(o)).count()
    }
}

impl fmt::Display for BulkActionReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (id, outcome) in &self.results {
            match outcome {
                ActionOutcome::Applied(_) => writeln!(f, "{id}  {}", outcome.label())?,
                ActionOutcome::Skipped(reason) | ActionOutcome::Failed(reason) => {
                    writeln!(f, "{id}  {}: {reason}", outcome.label())?
                }
            }
        }
        write!(
            f,
            "{}: {} applied, {} skipped, {} failed",
            self.action,
            self.applied(),
            self.skipped(),
            self.failed()
        )
    }
}

/// Service layer for operator lifecycle actions.
///
/// Every action goes through the repository's conditional transitions; one
/// failing id never stops the batch.
#[derive(Clone)]
pub struct LifecycleAdminService {
    db: Arc<DbPool>,
}

impl LifecycleAdminService {
    pub fn new(db: Arc<DbPool>) -> Self {
        Self { db }
    }

    /// Soft-delete each poll.
    pub async fn soft_delete_many(&self, ids: &[Uuid]) -> BulkActionReport {
        let polls = self.db.polls();
        let mut results = Vec::with_capacity(ids.len());
        for &id in ids {
            let outcome = ActionOutcome::from_result(polls.soft_delete(id).await);
            results.push((id, self.record(AdminAction::SoftDelete, id, outcome)));
        }
        BulkActionReport {
            action: AdminAction::SoftDelete,
            results,
        }
    }

    /// Restore each soft-deleted poll.
    pub async fn restore_many(&self, ids: &[Uuid]) -> BulkActionReport {
        let polls = self.db.polls();
        let mut results = Vec::with_capacity(ids.len());
        for &id in ids {
            let outcome = ActionOutcome::from_result(polls.restore(id).await);
            results.push((id, self.record(AdminAction::Restore, id, outcome)));
        }
        BulkActionReport {
            action: AdminAction::Restore,
            results,
        }
    }

    /// Extend each poll's expiry by 90 days.
    pub async fn extend_many(&self, ids: &[Uuid]) -> BulkActionReport {
        let polls = self.db.polls();
        let increment = Duration::days(ADMIN_EXTENSION_DAYS);
        let mut results = Vec::with_capacity(ids.len());
        for &id in ids {
            let outcome = ActionOutcome::from_result(polls.extend_expiration(id, increment).await);
            results.push((id, self.record(AdminAction::Extend, id, outcome)));
        }
        BulkActionReport {
            action: AdminAction::Extend,
            results,
        }
    }

    fn record(&self, action: AdminAction, id: Uuid, outcome: ActionOutcome) -> ActionOutcome {
        match &outcome {
            ActionOutcome::Applied(poll) => tracing::info!(
                poll_id = %id,
                action = action.as_str(),
                expires_at = ?poll.expires_at,
                deleted_at = ?poll.deleted_at,
                "Admin action applied"
            ),
            ActionOutcome::Skipped(reason) => tracing::info!(
                poll_id = %id,
                action = action.as_str(),
                reason = %reason,
                "Admin action skipped"
            ),
            ActionOutcome::Failed(error) => tracing::warn!(
                poll_id = %id,
                action = action.as_str(),
                error = %error,
                "Admin action failed"
            ),
        }
        metrics::record_admin_action(action.as_str(), outcome.label());
        outcome
    }
}

#[cfg(test)]
mod tests {
    use chrono::Duration;

    use super::*;
    use crate::{
        db::tests::harness::{TestDb, create_test_db},
        lifecycle::{Clock, ExpirationChoice},
        models::CreatePoll,
    };

    async fn create_poll(t: &TestDb, expiration: ExpirationChoice) -> Poll {
        t.db.polls()
            .create(CreatePoll {
                question: "Retro format?".to_string(),
                choices: vec!["Start/Stop/Continue".to_string(), "4Ls".to_string()],
                expiration,
            })
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_soft_delete_many_collects_per_id_outcomes() {
        let t = create_test_db().await;
        let service = LifecycleAdminService::new(t.db.clone());
        let live = create_poll(&t, ExpirationChoice::Days30).await;
        let gone = create_poll(&t, ExpirationChoice::Days30).await;
        t.db.polls().soft_delete(gone.id).await.unwrap();
        let missing = Uuid::new_v4();

        let report = service.soft_delete_many(&[live.id, gone.id, missing]).await;

        assert_eq!(report.applied(), 1);
        assert_eq!(report.skipped(), 1);
        assert_eq!(report.failed(), 1);
        assert!(report.has_failures());
        assert_eq!(report.results[0].0, live.id);
        assert!(matches!(report.results[0].1, ActionOutcome::Applied(ref p) if p.deleted_at.is_some()));
        assert!(matches!(report.results[1].1, ActionOutcome::Skipped(_)));
        assert!(matches!(report.results[2].1, ActionOutcome::Failed(_)));
    }

    #[tokio::test]
    async fn test_restore_many() {
        let t = create_test_db().await;
        let service = LifecycleAdminService::new(t.db.clone());
        let a = create_poll(&t, ExpirationChoice::Days7).await;
        let b = create_poll(&t, ExpirationChoice::Days7).await;
        service.soft_delete_many(&[a.id]).await;

        let report = service.restore_many(&[a.id, b.id]).await;
        assert_eq!(report.applied(), 1);
        assert_eq!(report.skipped(), 1);
        assert!(!report.has_failures());

        let restored = t.db.polls().get_by_id(a.id).await.unwrap().unwrap();
        assert_eq!(restored.deleted_at, None);
    }

    #[tokio::test]
    async fn test_extend_many_adds_ninety_days() {
        let t = create_test_db().await;
        let service = LifecycleAdminService::new(t.db.clone());
        let finite = create_poll(&t, ExpirationChoice::Days7).await;
        let forever = create_poll(&t, ExpirationChoice::Never).await;

        t.clock.advance(Duration::days(5));
        let report = service.extend_many(&[finite.id, forever.id]).await;
        assert_eq!(report.applied(), 2);

        let now = t.clock.now();
        let finite = t.db.polls().get_by_id(finite.id).await.unwrap().unwrap();
        assert_eq!(finite.expires_at, Some(now + Duration::days(92)));
        let forever = t.db.polls().get_by_id(forever.id).await.unwrap().unwrap();
        assert_eq!(forever.expires_at, Some(now + Duration::days(90)));
    }

    #[tokio::test]
    async fn test_report_display_summary() {
        let t = create_test_db().await;
        let service = LifecycleAdminService::new(t.db.clone());
        let poll = create_poll(&t, ExpirationChoice::Days30).await;

        let text = service.restore_many(&[poll.id]).await.to_string();
        assert!(text.contains("skipped: Poll is not soft-deleted"));
        assert!(text.ends_with("restore: 0 applied, 1 skipped, 0 failed"));
    }

    #[test]
    fn test_outcome_serializes_with_tag() {
        let outcome = ActionOutcome::Skipped("already deleted".to_string());
        let json = serde_json::to_value(&outcome).unwrap();
        assert_eq!(json["outcome"], "skipped");
        assert_eq!(json["detail"], "already deleted");
    }
}
