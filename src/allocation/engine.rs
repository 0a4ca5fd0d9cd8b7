use std::collections::HashSet;
use std::sync::Arc;

use chrono::Duration;
use tokio::sync::RwLock;
use tracing::{debug, info};

use crate::allocation::selector;
use crate::allocation::session::SessionTracker;
use crate::allocation::{ParticipantId, ScopeId, SortOrder};
use crate::eligibility::{EligibilityResolver, Roster};
use crate::error::{AllocationError, Result};
use crate::store::models::parse_import_lines;
use crate::store::{CounterStore, ImportOutcome};

/// A selection ready for display, paired with the labels the resolver
/// supplied for it.
#[derive(Debug, Clone, PartialEq)]
pub struct Proposal {
    pub scope: ScopeId,
    pub selection: Vec<ParticipantId>,
    pub labels: Vec<String>,
}

impl Proposal {
    /// One-line display form of the selection.
    pub fn summary(&self) -> String {
        crate::utils::format_labels(&self.labels, 10)
    }
}

/// Ties the pieces together: validates input, resolves eligibility, runs
/// the selector, guards the propose/confirm handshake, and commits through
/// the counter store. Proposing never touches the store; only a confirmed
/// session does.
pub struct AllocationEngine {
    store: CounterStore,
    sessions: SessionTracker,
    resolver: Arc<dyn EligibilityResolver>,
}

impl AllocationEngine {
    pub fn new(
        store: CounterStore,
        resolver: Arc<dyn EligibilityResolver>,
        session_ttl: Duration,
    ) -> Self {
        Self {
            store,
            sessions: SessionTracker::new(session_ttl),
            resolver,
        }
    }

    /// Compute a selection and open a proposal for it.
    ///
    /// `mentioned` narrows the eligible set to an explicit candidate subset
    /// when non-empty; otherwise the full roster is used. Read-only with
    /// respect to the store.
    pub fn propose(
        &mut self,
        scope: ScopeId,
        requested: i64,
        mentioned: Option<&[ParticipantId]>,
    ) -> Result<Proposal> {
        if requested <= 0 {
            return Err(AllocationError::InvalidCount(requested.to_string()));
        }

        let roster = self.resolver.resolve(scope)?;
        let pool = match mentioned {
            Some(ids) if !ids.is_empty() => {
                let wanted: HashSet<ParticipantId> = ids.iter().copied().collect();
                roster.restrict(&wanted)
            }
            _ => roster,
        };
        if pool.is_empty() {
            return Err(AllocationError::NoEligibleMembers(scope));
        }

        let selection = selector::select(&pool.ids(), requested as usize, |id| {
            self.store.get(id)
        });
        self.sessions.open(scope, selection.clone())?;

        info!(
            "proposed {} of {} eligible in scope {}",
            selection.len(),
            pool.len(),
            scope
        );
        Ok(self.with_labels(scope, selection, &pool))
    }

    /// Commit the scope's pending proposal: every selected participant's
    /// count goes up by exactly 1, exactly once, persisted atomically.
    pub fn confirm(&mut self, scope: ScopeId) -> Result<Proposal> {
        let session = self.sessions.take(scope)?;
        self.store.increment_all(&session.selection)?;

        info!(
            "committed {} awards in scope {}",
            session.selection.len(),
            scope
        );
        let roster = self.resolver.resolve(scope).unwrap_or_default();
        Ok(self.with_labels(scope, session.selection, &roster))
    }

    /// Discard the scope's pending proposal, if any. Never touches the
    /// store; success either way.
    pub fn cancel(&mut self, scope: ScopeId) -> Result<()> {
        match self.sessions.cancel(scope) {
            Some(session) => {
                info!(
                    "cancelled proposal of {} in scope {}",
                    session.selection.len(),
                    scope
                );
            }
            None => debug!("cancel in scope {} with nothing pending", scope),
        }
        Ok(())
    }

    /// `(label, count)` for every currently eligible participant, zero
    /// counts included, sorted by count; ties keep roster order.
    pub fn stats(&self, scope: ScopeId, order: SortOrder) -> Result<Vec<(String, u64)>> {
        let roster = self.resolver.resolve(scope)?;
        let mut rows: Vec<(String, u64)> = roster
            .iter()
            .map(|m| (m.label.clone(), self.store.get(m.id)))
            .collect();

        match order {
            SortOrder::Ascending => rows.sort_by_key(|(_, count)| *count),
            SortOrder::Descending => rows.sort_by(|a, b| b.1.cmp(&a.1)),
        }
        Ok(rows)
    }

    /// Privileged: clear every counter.
    pub fn reset(&mut self, scope: ScopeId) -> Result<()> {
        info!("resetting all reward counters (requested from scope {})", scope);
        self.store.reset_all()
    }

    /// Parse `"label: count"` lines and overwrite matching participants'
    /// counts. Unmatched labels and malformed lines are tallied, never
    /// fatal.
    pub fn import(&mut self, scope: ScopeId, text: &str) -> Result<ImportOutcome> {
        let roster = self.resolver.resolve(scope)?;
        let (entries, malformed) = parse_import_lines(text);

        let mut outcome = self
            .store
            .import_overwrite(&entries, |label| roster.resolve_label(label))?;
        outcome.skipped += malformed;

        info!(
            "import in scope {}: {} updated, {} skipped",
            scope, outcome.updated, outcome.skipped
        );
        Ok(outcome)
    }

    fn with_labels(
        &self,
        scope: ScopeId,
        selection: Vec<ParticipantId>,
        roster: &Roster,
    ) -> Proposal {
        let labels = selection
            .iter()
            .map(|id| {
                roster
                    .label(*id)
                    .map(str::to_string)
                    .unwrap_or_else(|| id.to_string())
            })
            .collect();
        Proposal {
            scope,
            selection,
            labels,
        }
    }
}

/// Shared-process façade over the engine.
///
/// Mutating operations hold the write lock for their whole
/// propose-to-persist sequence, so no two of them interleave; `stats`
/// takes the read lock and sees a consistent snapshot while running
/// concurrently with other readers.
pub struct AllocationService {
    inner: RwLock<AllocationEngine>,
}

impl AllocationService {
    pub fn new(engine: AllocationEngine) -> Self {
        Self {
            inner: RwLock::new(engine),
        }
    }

    pub async fn propose(
        &self,
        scope: ScopeId,
        requested: i64,
        mentioned: Option<Vec<ParticipantId>>,
    ) -> Result<Proposal> {
        self.inner
            .write()
            .await
            .propose(scope, requested, mentioned.as_deref())
    }

    pub async fn confirm(&self, scope: ScopeId) -> Result<Proposal> {
        self.inner.write().await.confirm(scope)
    }

    pub async fn cancel(&self, scope: ScopeId) -> Result<()> {
        self.inner.write().await.cancel(scope)
    }

    pub async fn stats(&self, scope: ScopeId, order: SortOrder) -> Result<Vec<(String, u64)>> {
        self.inner.read().await.stats(scope, order)
    }

    pub async fn reset(&self, scope: ScopeId) -> Result<()> {
        self.inner.write().await.reset(scope)
    }

    pub async fn import(&self, scope: ScopeId, text: &str) -> Result<ImportOutcome> {
        self.inner.write().await.import(scope, text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::eligibility::{Member, MockEligibilityResolver};
    use mockall::predicate::eq;
    use tempfile::tempdir;

    const SCOPE: ScopeId = ScopeId(42);

    fn roster_of(entries: &[(u64, &str)]) -> Roster {
        Roster::new(
            entries
                .iter()
                .map(|(id, label)| Member {
                    id: ParticipantId(*id),
                    label: label.to_string(),
                })
                .collect(),
        )
    }

    fn resolver_with(entries: &'static [(u64, &'static str)]) -> Arc<dyn EligibilityResolver> {
        let mut resolver = MockEligibilityResolver::new();
        resolver
            .expect_resolve()
            .with(eq(SCOPE))
            .returning(move |_| Ok(roster_of(entries)));
        Arc::new(resolver)
    }

    fn engine_with(
        dir: &tempfile::TempDir,
        resolver: Arc<dyn EligibilityResolver>,
    ) -> AllocationEngine {
        let store = CounterStore::open(dir.path().join("counters.json")).unwrap();
        AllocationEngine::new(store, resolver, Duration::seconds(300))
    }

    #[test]
    fn test_propose_confirm_round() {
        let dir = tempdir().unwrap();
        let mut engine = engine_with(&dir, resolver_with(&[(1, "A"), (2, "B"), (3, "C")]));

        // seed: B has 2, C has 1
        engine
            .import(SCOPE, "B: 2\nC: 1")
            .unwrap();

        let proposal = engine.propose(SCOPE, 2, None).unwrap();
        assert_eq!(proposal.selection, vec![ParticipantId(1), ParticipantId(3)]);
        assert_eq!(proposal.labels, vec!["A".to_string(), "C".to_string()]);
        assert_eq!(proposal.summary(), "A, C");

        let committed = engine.confirm(SCOPE).unwrap();
        assert_eq!(committed.selection, proposal.selection);

        let rows = engine.stats(SCOPE, SortOrder::Ascending).unwrap();
        assert_eq!(
            rows,
            vec![
                ("A".to_string(), 1),
                ("B".to_string(), 2),
                ("C".to_string(), 2),
            ]
        );

        // next round: A is lowest, then B before C by roster order
        let next = engine.propose(SCOPE, 2, None).unwrap();
        assert_eq!(next.selection, vec![ParticipantId(1), ParticipantId(2)]);
    }

    #[test]
    fn test_second_confirm_does_not_double_count() {
        let dir = tempdir().unwrap();
        let mut engine = engine_with(&dir, resolver_with(&[(1, "A"), (2, "B")]));

        engine.propose(SCOPE, 1, None).unwrap();
        engine.confirm(SCOPE).unwrap();

        assert!(matches!(
            engine.confirm(SCOPE),
            Err(AllocationError::NoActiveSession(_))
        ));
        let rows = engine.stats(SCOPE, SortOrder::Descending).unwrap();
        assert_eq!(rows[0], ("A".to_string(), 1));
    }

    #[test]
    fn test_cancel_leaves_counts_untouched() {
        let dir = tempdir().unwrap();
        let mut engine = engine_with(&dir, resolver_with(&[(1, "A"), (2, "B")]));

        engine.propose(SCOPE, 2, None).unwrap();
        engine.cancel(SCOPE).unwrap();

        let rows = engine.stats(SCOPE, SortOrder::Ascending).unwrap();
        assert!(rows.iter().all(|(_, count)| *count == 0));

        // cancel with nothing pending is still success
        engine.cancel(SCOPE).unwrap();
    }

    #[test]
    fn test_propose_while_pending_rejected() {
        let dir = tempdir().unwrap();
        let mut engine = engine_with(&dir, resolver_with(&[(1, "A")]));

        engine.propose(SCOPE, 1, None).unwrap();
        assert!(matches!(
            engine.propose(SCOPE, 1, None),
            Err(AllocationError::SessionAlreadyActive(_))
        ));
    }

    #[test]
    fn test_invalid_count_rejected() {
        let dir = tempdir().unwrap();
        let mut engine = engine_with(&dir, resolver_with(&[(1, "A")]));

        assert!(matches!(
            engine.propose(SCOPE, 0, None),
            Err(AllocationError::InvalidCount(_))
        ));
        assert!(matches!(
            engine.propose(SCOPE, -3, None),
            Err(AllocationError::InvalidCount(_))
        ));
    }

    #[test]
    fn test_unresolvable_scope_surfaces_no_eligible_role() {
        let dir = tempdir().unwrap();
        let mut resolver = MockEligibilityResolver::new();
        resolver
            .expect_resolve()
            .returning(|scope| Err(AllocationError::NoEligibleRole(scope)));
        let mut engine = engine_with(&dir, Arc::new(resolver));

        assert!(matches!(
            engine.propose(SCOPE, 1, None),
            Err(AllocationError::NoEligibleRole(_))
        ));
    }

    #[test]
    fn test_empty_roster_surfaces_no_eligible_members() {
        let dir = tempdir().unwrap();
        let mut engine = engine_with(&dir, resolver_with(&[]));

        assert!(matches!(
            engine.propose(SCOPE, 1, None),
            Err(AllocationError::NoEligibleMembers(_))
        ));
    }

    #[test]
    fn test_mentioned_subset_narrows_pool() {
        let dir = tempdir().unwrap();
        let mut engine =
            engine_with(&dir, resolver_with(&[(1, "A"), (2, "B"), (3, "C")]));

        let proposal = engine
            .propose(SCOPE, 3, Some(&[ParticipantId(2), ParticipantId(3)]))
            .unwrap();
        assert_eq!(proposal.selection, vec![ParticipantId(2), ParticipantId(3)]);

        engine.cancel(SCOPE).unwrap();

        // a subset with no eligible overlap is an empty pool
        assert!(matches!(
            engine.propose(SCOPE, 1, Some(&[ParticipantId(99)])),
            Err(AllocationError::NoEligibleMembers(_))
        ));
    }

    #[test]
    fn test_import_normalized_matching_and_tally() {
        let dir = tempdir().unwrap();
        let mut engine = engine_with(&dir, resolver_with(&[(1, "Alice Smith"), (2, "Bob")]));

        let outcome = engine
            .import(SCOPE, "alice  smith: 5\nBOB: 2\nStranger: 4\nBob: oops")
            .unwrap();
        assert_eq!(outcome.updated, 2);
        assert_eq!(outcome.skipped, 2);

        let rows = engine.stats(SCOPE, SortOrder::Descending).unwrap();
        assert_eq!(
            rows,
            vec![("Alice Smith".to_string(), 5), ("Bob".to_string(), 2)]
        );
    }

    #[test]
    fn test_reset_clears_counts() {
        let dir = tempdir().unwrap();
        let mut engine = engine_with(&dir, resolver_with(&[(1, "A"), (2, "B")]));

        engine.import(SCOPE, "A: 3\nB: 1").unwrap();
        engine.reset(SCOPE).unwrap();

        let rows = engine.stats(SCOPE, SortOrder::Ascending).unwrap();
        assert_eq!(
            rows,
            vec![("A".to_string(), 0), ("B".to_string(), 0)]
        );
    }

    #[test]
    fn test_stats_orders_with_roster_tiebreak() {
        let dir = tempdir().unwrap();
        let mut engine =
            engine_with(&dir, resolver_with(&[(1, "A"), (2, "B"), (3, "C")]));
        engine.import(SCOPE, "B: 2").unwrap();

        let asc = engine.stats(SCOPE, SortOrder::Ascending).unwrap();
        assert_eq!(
            asc,
            vec![
                ("A".to_string(), 0),
                ("C".to_string(), 0),
                ("B".to_string(), 2),
            ]
        );

        let desc = engine.stats(SCOPE, SortOrder::Descending).unwrap();
        assert_eq!(
            desc,
            vec![
                ("B".to_string(), 2),
                ("A".to_string(), 0),
                ("C".to_string(), 0),
            ]
        );
    }

    #[tokio::test]
    async fn test_service_serializes_mutations() {
        let dir = tempdir().unwrap();
        let engine = engine_with(&dir, resolver_with(&[(1, "A"), (2, "B")]));
        let service = Arc::new(AllocationService::new(engine));

        let proposal = service.propose(SCOPE, 1, None).await.unwrap();
        assert_eq!(proposal.selection.len(), 1);

        // a concurrent second proposal is rejected, not interleaved
        let racing = {
            let service = Arc::clone(&service);
            tokio::spawn(async move { service.propose(SCOPE, 1, None).await })
        };
        assert!(matches!(
            racing.await.unwrap(),
            Err(AllocationError::SessionAlreadyActive(_))
        ));

        service.confirm(SCOPE).await.unwrap();
        let rows = service.stats(SCOPE, SortOrder::Descending).await.unwrap();
        assert_eq!(rows[0].1, 1);
    }
}
