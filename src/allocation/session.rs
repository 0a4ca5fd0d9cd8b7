use std::collections::HashMap;

use chrono::{DateTime, Duration, Utc};
use tracing::info;

use crate::allocation::{ParticipantId, ScopeId};
use crate::error::{AllocationError, Result};

/// Lifecycle of a proposal. A session exists only while `Proposed`; the
/// terminal states are reported on the resolved session and the scope
/// returns to idle (no session) immediately.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Proposed,
    Committed,
    Cancelled,
}

/// One in-flight proposal: the selection awaiting confirmation. Never
/// persisted; a crash loses the proposal but cannot touch counts.
#[derive(Debug, Clone, PartialEq)]
pub struct AllocationSession {
    pub scope: ScopeId,
    pub selection: Vec<ParticipantId>,
    pub opened_at: DateTime<Utc>,
    pub state: SessionState,
}

impl AllocationSession {
    fn is_expired(&self, now: DateTime<Utc>, ttl: Duration) -> bool {
        now - self.opened_at > ttl
    }
}

/// Per-scope session registry enforcing the at-most-one-open-proposal rule.
///
/// Expiry is checked passively at the start of every operation that touches
/// session state; an expired session is an implicit cancellation and is
/// swept without touching the store.
pub struct SessionTracker {
    sessions: HashMap<ScopeId, AllocationSession>,
    ttl: Duration,
}

impl SessionTracker {
    pub fn new(ttl: Duration) -> Self {
        Self {
            sessions: HashMap::new(),
            ttl,
        }
    }

    /// Open a proposal for the scope. Fails with `SessionAlreadyActive`
    /// while an unexpired proposal is pending; an expired leftover is swept
    /// first.
    pub fn open(&mut self, scope: ScopeId, selection: Vec<ParticipantId>) -> Result<()> {
        self.open_at(scope, selection, Utc::now())
    }

    pub(crate) fn open_at(
        &mut self,
        scope: ScopeId,
        selection: Vec<ParticipantId>,
        now: DateTime<Utc>,
    ) -> Result<()> {
        self.sweep(scope, now);
        if self.sessions.contains_key(&scope) {
            return Err(AllocationError::SessionAlreadyActive(scope));
        }
        self.sessions.insert(
            scope,
            AllocationSession {
                scope,
                selection,
                opened_at: now,
                state: SessionState::Proposed,
            },
        );
        Ok(())
    }

    /// Consume the scope's proposal for commit. `NoActiveSession` when
    /// nothing is pending, `SessionExpired` when the idle timeout elapsed;
    /// either way the scope is idle afterwards.
    pub fn take(&mut self, scope: ScopeId) -> Result<AllocationSession> {
        self.take_at(scope, Utc::now())
    }

    pub(crate) fn take_at(
        &mut self,
        scope: ScopeId,
        now: DateTime<Utc>,
    ) -> Result<AllocationSession> {
        match self.sessions.remove(&scope) {
            None => Err(AllocationError::NoActiveSession(scope)),
            Some(session) if session.is_expired(now, self.ttl) => {
                info!(
                    "proposal in scope {} expired after {}s unconfirmed, discarding",
                    scope,
                    (now - session.opened_at).num_seconds()
                );
                Err(AllocationError::SessionExpired(scope))
            }
            Some(mut session) => {
                session.state = SessionState::Committed;
                Ok(session)
            }
        }
    }

    /// Discard any proposal for the scope. Returns the cancelled session,
    /// or `None` when the scope was already idle; both count as success.
    pub fn cancel(&mut self, scope: ScopeId) -> Option<AllocationSession> {
        self.sessions.remove(&scope).map(|mut session| {
            session.state = SessionState::Cancelled;
            session
        })
    }

    /// The pending proposal for the scope, if one is open and unexpired.
    pub fn pending(&mut self, scope: ScopeId) -> Option<&AllocationSession> {
        self.sweep(scope, Utc::now());
        self.sessions.get(&scope)
    }

    fn sweep(&mut self, scope: ScopeId, now: DateTime<Utc>) {
        let expired = self
            .sessions
            .get(&scope)
            .map(|s| s.is_expired(now, self.ttl))
            .unwrap_or(false);
        if expired {
            self.sessions.remove(&scope);
            info!("proposal in scope {} expired unconfirmed, discarding", scope);
        }
    }
}
