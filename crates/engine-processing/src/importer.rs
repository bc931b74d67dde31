use crate::{
    error::ImportError,
    feedback::{Feedback, FieldIssue},
    matcher::{MatchHooks, MatchPolicy, Matcher, NoHooks},
    records::{FieldWrites, RecordStore},
};
use engine_core::{
    event_bus::EventBus,
    tally::{Tally, TallyStatus},
};
use model::{
    core::value::Value,
    events::{FieldProcessed, RecordImported},
    records::{action::RecordAction, fields::FieldMap, row::Row},
    schema::{FieldDef, RecordSchema},
    session::ImportSession,
};
use std::sync::Arc;
use tracing::{debug, warn};

/// Per-call switches of an import.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ImportOptions {
    /// Blank cells clear stored values on update instead of being ignored.
    pub allow_blank_overwrite: bool,
}

/// What happened to one row.
#[derive(Debug, Clone, PartialEq)]
pub struct ImportOutcome {
    pub action: RecordAction,
    /// Record written, `None` when nothing was written.
    pub record_id: Option<u64>,
    pub feedback: Feedback,
}

impl ImportOutcome {
    pub fn is_written(&self) -> bool {
        self.record_id.is_some()
    }
}

/// Turns rows into records.
pub struct RecordImporter {
    store: Arc<dyn RecordStore>,
    schema: RecordSchema,
    events: EventBus,
    hooks: Arc<dyn MatchHooks>,
}

impl RecordImporter {
    pub fn new(store: Arc<dyn RecordStore>, schema: RecordSchema, events: EventBus) -> Self {
        RecordImporter {
            store,
            schema,
            events,
            hooks: Arc::new(NoHooks),
        }
    }

    pub fn with_hooks(mut self, hooks: Arc<dyn MatchHooks>) -> Self {
        self.hooks = hooks;
        self
    }

    /// Imports one positional row using the run's settings.
    pub async fn import(
        &self,
        row: &Row,
        session: &ImportSession,
        tally: &mut Tally,
        options: ImportOptions,
    ) -> Result<ImportOutcome, ImportError> {
        let fields = FieldMap::zip(session.column_names(), row);
        let policy = MatchPolicy::from_session(session);
        self.import_record(&fields, 0, &policy, tally, options).await
    }

    /// Imports named field values. `record_id` is the record being edited,
    /// 0 for a new row.
    pub async fn import_record(
        &self,
        fields: &FieldMap,
        record_id: u64,
        policy: &MatchPolicy,
        tally: &mut Tally,
        options: ImportOptions,
    ) -> Result<ImportOutcome, ImportError> {
        let initial = if record_id == 0 {
            RecordAction::Insert
        } else {
            RecordAction::Update
        };

        let schema = if self.schema.is_empty() {
            let columns: Vec<String> = fields.iter().map(|(name, _)| name.to_string()).collect();
            RecordSchema::text_columns(&columns)
        } else {
            self.schema.clone()
        };

        let mut matcher = Matcher::new(
            fields,
            record_id,
            policy,
            &schema,
            self.store.as_ref(),
            self.hooks.as_ref(),
        );
        let action = matcher.get_action(initial).await?;
        tally.add(TallyStatus::from(action), 1).await?;

        if action == RecordAction::Skip {
            debug!(match_field = policy.match_field(), "Row skipped");
            return Ok(ImportOutcome {
                action,
                record_id: None,
                feedback: matcher.into_feedback(),
            });
        }

        let target_id = matcher.record_id();
        let explicit_id = matcher.explicit_id();
        let mut feedback = matcher.into_feedback();

        if action == RecordAction::Update && target_id == 0 {
            feedback.add(
                policy.match_field(),
                FieldIssue::Invalid("no existing record to update".into()),
            );
        }

        let writes = self
            .collect_writes(&schema, fields, action, options, &mut feedback)
            .await;

        if feedback.has_validation_errors() {
            warn!(
                action = %action,
                issues = ?feedback.iter().map(ToString::to_string).collect::<Vec<_>>(),
                "Row failed validation, nothing written"
            );
            return Ok(ImportOutcome {
                action,
                record_id: None,
                feedback,
            });
        }

        let written_id = if action == RecordAction::Insert {
            self.store.insert(writes, explicit_id).await?
        } else {
            self.store.update(target_id, writes).await?;
            target_id
        };
        self.store.invalidate(written_id).await;

        self.events
            .publish(RecordImported {
                record_id: written_id,
                action,
                timestamp: chrono::Utc::now(),
            })
            .await;

        Ok(ImportOutcome {
            action,
            record_id: Some(written_id),
            feedback,
        })
    }

    /// Validates every field in column order and returns the ones that
    /// belong in the write. Issues are recorded on `feedback`.
    async fn collect_writes(
        &self,
        schema: &RecordSchema,
        fields: &FieldMap,
        action: RecordAction,
        options: ImportOptions,
        feedback: &mut Feedback,
    ) -> FieldWrites {
        let mut writes = FieldWrites::new();

        for (name, raw) in fields.iter() {
            let Some(def) = schema.get(name) else {
                continue;
            };

            let value = match def.coerce(raw) {
                Ok(value) => value,
                Err(e) => {
                    feedback.add(def.name.clone(), FieldIssue::Invalid(e.to_string()));
                    continue;
                }
            };

            if action == RecordAction::Insert && def.required && value.is_blank() {
                feedback.add(def.name.clone(), FieldIssue::Required);
                continue;
            }

            let written = qualifies(def, &value, action, options);

            self.events
                .publish(FieldProcessed {
                    field: def.name.clone(),
                    value: value.clone(),
                    action,
                    written,
                })
                .await;

            if written {
                writes.push((def.name.clone(), blank_to_null(value)));
            }
        }

        if action == RecordAction::Insert {
            for def in schema.fields().iter().filter(|d| d.required) {
                if !fields.contains(&def.name) {
                    feedback.add(def.name.clone(), FieldIssue::Required);
                }
            }
        }

        writes
    }
}

/// Whether a coerced value goes into the write for `action`.
fn qualifies(def: &FieldDef, value: &Value, action: RecordAction, options: ImportOptions) -> bool {
    if def.is_id() {
        return false;
    }
    if !value.is_blank() {
        return true;
    }
    action == RecordAction::Update && options.allow_blank_overwrite
}

fn blank_to_null(value: Value) -> Value {
    if value.is_blank() { Value::Null } else { value }
}
