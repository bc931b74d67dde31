use std::fmt;

/// Why a field was flagged.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldIssue {
    /// Another record already holds this value for the match field.
    Duplicate,
    /// The value could not be coerced to the field's type or bounds.
    Invalid(String),
    /// The field is required for new records but was left empty.
    Required,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldFeedback {
    pub field: String,
    pub issue: FieldIssue,
}

impl fmt::Display for FieldFeedback {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.issue {
            FieldIssue::Duplicate => write!(f, "{}: a record with this value already exists", self.field),
            FieldIssue::Invalid(reason) => write!(f, "{}: {reason}", self.field),
            FieldIssue::Required => write!(f, "{}: a value is required", self.field),
        }
    }
}

/// Field-level messages collected while a single row is imported.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Feedback {
    entries: Vec<FieldFeedback>,
}

impl Feedback {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, field: impl Into<String>, issue: FieldIssue) {
        self.entries.push(FieldFeedback {
            field: field.into(),
            issue,
        });
    }

    /// Issues recorded against `field`.
    pub fn for_field<'a>(&'a self, field: &'a str) -> impl Iterator<Item = &'a FieldIssue> + 'a {
        self.entries
            .iter()
            .filter(move |e| e.field.eq_ignore_ascii_case(field))
            .map(|e| &e.issue)
    }

    pub fn has_duplicate(&self, field: &str) -> bool {
        self.for_field(field).any(|issue| *issue == FieldIssue::Duplicate)
    }

    /// `true` if any entry blocks the write. Duplicates only explain a skip.
    pub fn has_validation_errors(&self) -> bool {
        self.entries
            .iter()
            .any(|e| e.issue != FieldIssue::Duplicate)
    }

    pub fn iter(&self) -> impl Iterator<Item = &FieldFeedback> {
        self.entries.iter()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn duplicates_do_not_count_as_validation_errors() {
        let mut feedback = Feedback::new();
        feedback.add("email", FieldIssue::Duplicate);
        assert!(feedback.has_duplicate("EMAIL"));
        assert!(!feedback.has_validation_errors());

        feedback.add("age", FieldIssue::Invalid("'x' is not a valid integer".into()));
        assert!(feedback.has_validation_errors());
        assert_eq!(
            feedback.iter().nth(1).unwrap().to_string(),
            "age: 'x' is not a valid integer"
        );
    }
}
