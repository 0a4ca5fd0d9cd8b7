use std::collections::HashSet;

use crate::allocation::ParticipantId;

/// Pick the participants who have been awarded least often.
///
/// The eligible list is ranked ascending by current count with a stable
/// sort, so ties keep the order the participants were supplied in; the
/// result is truncated to `min(requested, |eligible|)`. A zero request or
/// an empty pool yields an empty selection, never an error. Identical
/// inputs always yield identical output.
pub fn select<F>(eligible: &[ParticipantId], requested: usize, count_of: F) -> Vec<ParticipantId>
where
    F: Fn(ParticipantId) -> u64,
{
    if requested == 0 || eligible.is_empty() {
        return Vec::new();
    }

    let mut seen = HashSet::new();
    let mut ranked: Vec<ParticipantId> = eligible
        .iter()
        .copied()
        .filter(|id| seen.insert(*id))
        .collect();

    ranked.sort_by_key(|id| count_of(*id));
    ranked.truncate(requested.min(ranked.len()));
    ranked
}
