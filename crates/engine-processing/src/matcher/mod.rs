use crate::{
    error::RecordStoreError,
    feedback::{Feedback, FieldIssue},
    records::RecordStore,
};
use model::{
    records::{action::RecordAction, fields::FieldMap},
    schema::{ID_FIELD, RecordSchema},
    session::DuplicateMode,
};
use tracing::debug;

pub mod hooks;
pub mod policy;

pub use hooks::{MatchHooks, NoHooks};
pub use policy::{FormPreferences, MatchPolicy, Submitter};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchStatus {
    Unknown,
    Matched,
    Unmatched,
}

/// Decides whether one row inserts, updates or skips.
///
/// The match status is resolved at most once per row; the store is only
/// queried when the mode needs it and no hook has forced a status.
pub struct Matcher<'a> {
    fields: &'a FieldMap,
    policy: &'a MatchPolicy,
    schema: &'a RecordSchema,
    store: &'a dyn RecordStore,
    hooks: &'a dyn MatchHooks,
    record_id: u64,
    status: MatchStatus,
    matched_id: Option<u64>,
    explicit_id: Option<u64>,
    feedback: Feedback,
}

impl<'a> Matcher<'a> {
    /// `record_id` is the record the row already belongs to, 0 for a new row.
    pub fn new(
        fields: &'a FieldMap,
        record_id: u64,
        policy: &'a MatchPolicy,
        schema: &'a RecordSchema,
        store: &'a dyn RecordStore,
        hooks: &'a dyn MatchHooks,
    ) -> Self {
        Matcher {
            fields,
            policy,
            schema,
            store,
            hooks,
            record_id,
            status: MatchStatus::Unknown,
            matched_id: None,
            explicit_id: None,
            feedback: Feedback::new(),
        }
    }

    pub async fn is_matched(&mut self) -> Result<bool, RecordStoreError> {
        if self.status == MatchStatus::Unknown {
            self.status = self.resolve_status().await?;

            if self.status == MatchStatus::Matched && self.policy.mode() == DuplicateMode::Skip {
                self.feedback
                    .add(self.policy.match_field(), FieldIssue::Duplicate);
            }
        }
        Ok(self.status == MatchStatus::Matched)
    }

    async fn resolve_status(&mut self) -> Result<MatchStatus, RecordStoreError> {
        if let Some(forced) = self.hooks.match_status(self.fields, self.policy) {
            return Ok(status_of(forced));
        }

        let mode = self.policy.mode();
        if mode == DuplicateMode::Add {
            return Ok(MatchStatus::Unmatched);
        }

        let field = self.policy.match_field();
        let Some(raw) = self.fields.get(field).filter(|v| !v.trim().is_empty()) else {
            return Ok(MatchStatus::Unmatched);
        };

        let key = self.schema.data_type(field).match_key(raw);
        let exclude = (mode == DuplicateMode::Skip && self.record_id != 0).then_some(self.record_id);

        self.matched_id = self.store.find_duplicate(field, &key, exclude).await?;
        debug!(
            field = field,
            value = %key,
            matched_id = ?self.matched_id,
            "Duplicate lookup"
        );

        Ok(status_of(self.matched_id.is_some()))
    }

    /// Rewrites the row's initial action according to the policy.
    pub async fn get_action(
        &mut self,
        initial: RecordAction,
    ) -> Result<RecordAction, RecordStoreError> {
        let mode = self.policy.mode();

        let action = match initial {
            RecordAction::Skip => RecordAction::Skip,
            RecordAction::Update => {
                if mode == DuplicateMode::Skip && self.is_matched().await? {
                    RecordAction::Skip
                } else {
                    RecordAction::Update
                }
            }
            RecordAction::Insert => {
                let matched = self.is_matched().await?;
                match (matched, mode) {
                    (true, DuplicateMode::Update) => {
                        let found = self.matched_id.unwrap_or(self.record_id);
                        self.record_id = self.hooks.matched_id(self.fields, found);
                        RecordAction::Update
                    }
                    (true, DuplicateMode::Skip) => RecordAction::Skip,
                    (false, DuplicateMode::Update) if self.matches_by_id() => {
                        self.explicit_id = self
                            .fields
                            .get(ID_FIELD)
                            .and_then(|raw| raw.trim().parse::<u64>().ok())
                            .filter(|id| *id != 0);
                        RecordAction::Insert
                    }
                    _ => RecordAction::Insert,
                }
            }
        };

        Ok(action)
    }

    fn matches_by_id(&self) -> bool {
        self.policy.match_field().eq_ignore_ascii_case(ID_FIELD)
    }

    pub fn status(&self) -> MatchStatus {
        self.status
    }

    /// Record the row resolves to, 0 while it is new.
    pub fn record_id(&self) -> u64 {
        self.record_id
    }

    /// Id a new record must be created under, if the row named one.
    pub fn explicit_id(&self) -> Option<u64> {
        self.explicit_id
    }

    pub fn feedback(&self) -> &Feedback {
        &self.feedback
    }

    pub fn into_feedback(self) -> Feedback {
        self.feedback
    }
}

fn status_of(matched: bool) -> MatchStatus {
    if matched {
        MatchStatus::Matched
    } else {
        MatchStatus::Unmatched
    }
}
