use crate::records::row::Row;
use serde::{Deserialize, Serialize};

/// Raw row values keyed by column name, in column order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldMap {
    entries: Vec<(String, String)>,
}

impl FieldMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pairs `columns` with `row` positionally. Surplus cells are dropped and
    /// columns without a cell are left out.
    pub fn zip(columns: &[String], row: &Row) -> Self {
        let entries = columns
            .iter()
            .zip(row.values())
            .map(|(name, value)| (name.clone(), value.clone()))
            .collect();
        FieldMap { entries }
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Replaces the value of an existing column or appends a new one.
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        let value = value.into();
        match self
            .entries
            .iter_mut()
            .find(|(n, _)| n.eq_ignore_ascii_case(&name))
        {
            Some(entry) => entry.1 = value,
            None => self.entries.push((name, value)),
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(n, v)| (n.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for FieldMap {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut map = FieldMap::new();
        for (k, v) in iter {
            map.insert(k, v);
        }
        map
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zips_positionally() {
        let columns = vec!["first_name".to_string(), "email".to_string()];
        let row = Row::from(vec!["Ada", "ada@example.com", "surplus"]);

        let fields = FieldMap::zip(&columns, &row);
        assert_eq!(fields.len(), 2);
        assert_eq!(fields.get("EMAIL"), Some("ada@example.com"));
        assert_eq!(fields.get("surplus"), None);
    }

    #[test]
    fn short_rows_leave_columns_out() {
        let columns = vec!["a".to_string(), "b".to_string()];
        let fields = FieldMap::zip(&columns, &Row::from(vec!["1"]));
        assert!(fields.contains("a"));
        assert!(!fields.contains("b"));
    }
}
