use std::collections::HashSet;

use crate::allocation::{ParticipantId, ScopeId};
use crate::error::Result;
use crate::utils::normalize_name;

/// One eligible participant with their display label.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Member {
    pub id: ParticipantId,
    pub label: String,
}

/// The eligible participants of a scope, in the order the resolver supplied
/// them. That order is the selector's tie-break key, so it is preserved
/// through every roster operation.
#[derive(Debug, Clone, Default)]
pub struct Roster {
    members: Vec<Member>,
}

impl Roster {
    /// Build a roster, dropping duplicate ids (first occurrence wins).
    pub fn new(members: Vec<Member>) -> Self {
        let mut seen = HashSet::new();
        let members = members
            .into_iter()
            .filter(|m| seen.insert(m.id))
            .collect();
        Self { members }
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Member> {
        self.members.iter()
    }

    pub fn ids(&self) -> Vec<ParticipantId> {
        self.members.iter().map(|m| m.id).collect()
    }

    pub fn label(&self, id: ParticipantId) -> Option<&str> {
        self.members
            .iter()
            .find(|m| m.id == id)
            .map(|m| m.label.as_str())
    }

    /// Resolve a display name to a participant id, case and whitespace
    /// insensitive.
    pub fn resolve_label(&self, name: &str) -> Option<ParticipantId> {
        let wanted = normalize_name(name);
        self.members
            .iter()
            .find(|m| normalize_name(&m.label) == wanted)
            .map(|m| m.id)
    }

    /// Roster restricted to the given ids, keeping the roster's order.
    pub fn restrict(&self, ids: &HashSet<ParticipantId>) -> Roster {
        Roster {
            members: self
                .members
                .iter()
                .filter(|m| ids.contains(&m.id))
                .cloned()
                .collect(),
        }
    }
}

/// Membership lookup injected by the host. Implementations resolve the
/// scope's reward role to its current members and return
/// `AllocationError::NoEligibleRole` when the scope has no such role.
#[cfg_attr(test, mockall::automock)]
pub trait EligibilityResolver: Send + Sync {
    fn resolve(&self, scope: ScopeId) -> Result<Roster>;
}
