use crate::matcher::MatchPolicy;
use model::records::fields::FieldMap;

/// Override points consulted by the matcher.
pub trait MatchHooks: Send + Sync {
    /// Forces the match status of a row. `None` runs the regular lookup.
    fn match_status(&self, _fields: &FieldMap, _policy: &MatchPolicy) -> Option<bool> {
        None
    }

    /// Picks the record an `update` targets after an insert matched `matched_id`.
    fn matched_id(&self, _fields: &FieldMap, matched_id: u64) -> u64 {
        matched_id
    }
}

/// Hooks that change nothing.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoHooks;

impl MatchHooks for NoHooks {}
