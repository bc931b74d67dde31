use serde::{Deserialize, Serialize};

/// One line of source data, positionally aligned with the session's column names.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Row(Vec<String>);

impl Row {
    pub fn values(&self) -> &[String] {
        &self.0
    }

    pub fn get(&self, idx: usize) -> Option<&str> {
        self.0.get(idx).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn size_bytes(&self) -> usize {
        self.0.iter().map(String::len).sum()
    }
}

impl From<Vec<String>> for Row {
    fn from(values: Vec<String>) -> Self {
        Row(values)
    }
}

impl From<Vec<&str>> for Row {
    fn from(values: Vec<&str>) -> Self {
        Row(values.into_iter().map(str::to_string).collect())
    }
}

impl FromIterator<String> for Row {
    fn from_iter<I: IntoIterator<Item = String>>(iter: I) -> Self {
        Row(iter.into_iter().collect())
    }
}
