use crate::{core::data_type::DataType, core::value::Value, error::ModelError};
use serde::{Deserialize, Serialize};

/// The column holding a record's primary key.
pub const ID_FIELD: &str = "id";

/// Definition of one importable record field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldDef {
    pub name: String,
    #[serde(rename = "type", default)]
    pub data_type: DataType,
    #[serde(default)]
    pub required: bool,
    #[serde(default)]
    pub max_length: Option<usize>,
}

impl FieldDef {
    pub fn new(name: impl Into<String>, data_type: DataType) -> Self {
        FieldDef {
            name: name.into(),
            data_type,
            required: false,
            max_length: None,
        }
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn with_max_length(mut self, max: usize) -> Self {
        self.max_length = Some(max);
        self
    }

    pub fn is_id(&self) -> bool {
        self.name.eq_ignore_ascii_case(ID_FIELD)
    }

    /// Type coercion plus the length bound. Presence is checked by the caller
    /// because it depends on whether the row inserts or updates.
    pub fn coerce(&self, raw: &str) -> Result<Value, ModelError> {
        if let Some(max) = self.max_length {
            let len = raw.trim().chars().count();
            if len > max {
                return Err(ModelError::TooLong { max, len });
            }
        }
        self.data_type.coerce(raw)
    }
}

/// The set of fields an import may write.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordSchema {
    fields: Vec<FieldDef>,
}

impl RecordSchema {
    pub fn new(fields: Vec<FieldDef>) -> Self {
        RecordSchema { fields }
    }

    /// Treats every column as free text.
    pub fn text_columns(columns: &[String]) -> Self {
        RecordSchema {
            fields: columns
                .iter()
                .map(|name| FieldDef::new(name.clone(), DataType::Text))
                .collect(),
        }
    }

    pub fn get(&self, name: &str) -> Option<&FieldDef> {
        self.fields
            .iter()
            .find(|f| f.name.eq_ignore_ascii_case(name))
    }

    /// Type of `name`, defaulting to text for unknown fields.
    pub fn data_type(&self, name: &str) -> DataType {
        self.get(name).map(|f| f.data_type).unwrap_or_default()
    }

    pub fn fields(&self) -> &[FieldDef] {
        &self.fields
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn length_limit_counts_characters() {
        let field = FieldDef::new("code", DataType::Text).with_max_length(3);
        assert!(field.coerce("äöü").is_ok());
        assert_eq!(
            field.coerce("abcd").unwrap_err(),
            ModelError::TooLong { max: 3, len: 4 }
        );
    }

    #[test]
    fn deserializes_schema_entries() {
        let json = r#"[{"name":"email","type":"email","required":true},{"name":"joined"}]"#;
        let fields: Vec<FieldDef> = serde_json::from_str(json).unwrap();
        let schema = RecordSchema::new(fields);

        assert_eq!(schema.data_type("EMAIL"), DataType::Email);
        assert!(schema.get("email").unwrap().required);
        assert_eq!(schema.data_type("joined"), DataType::Text);
        assert_eq!(schema.data_type("missing"), DataType::Text);
    }
}
