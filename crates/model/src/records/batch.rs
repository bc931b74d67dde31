use crate::records::row::Row;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A persisted, ordered set of rows processed as one durable unit.
///
/// A saved run is split into batches numbered by `sequence`. `id` is fixed
/// when the batch is first saved and names its storage slot. As rows are
/// consumed the remaining content is written back under the same id, so
/// [`ImportBatch::fingerprint`] moves while `id` stays put.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImportBatch {
    pub id: String,
    #[serde(default)]
    pub sequence: u64,
    pub rows: Vec<Row>,
    pub created_at: DateTime<Utc>,
}

impl ImportBatch {
    pub fn new(rows: Vec<Row>) -> Self {
        ImportBatch::numbered(0, rows)
    }

    /// Batch at position `sequence` within one save.
    pub fn numbered(sequence: u64, rows: Vec<Row>) -> Self {
        ImportBatch {
            id: fingerprint(sequence, &rows),
            sequence,
            rows,
            created_at: Utc::now(),
        }
    }

    /// Hash of the rows still left in this batch.
    pub fn fingerprint(&self) -> String {
        fingerprint(self.sequence, &self.rows)
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn size_bytes(&self) -> usize {
        self.rows.iter().map(Row::size_bytes).sum()
    }
}

/// Content hash of a numbered row sequence. Values are length-prefixed so
/// that `["ab", "c"]` and `["a", "bc"]` hash differently.
pub fn fingerprint(sequence: u64, rows: &[Row]) -> String {
    let mut h = blake3::Hasher::new();
    h.update(&sequence.to_le_bytes());
    h.update(&(rows.len() as u64).to_le_bytes());
    for row in rows {
        h.update(&(row.len() as u64).to_le_bytes());
        for value in row.values() {
            h.update(&(value.len() as u64).to_le_bytes());
            h.update(value.as_bytes());
        }
    }
    h.finalize().to_hex().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rows() -> Vec<Row> {
        vec![
            Row::from(vec!["1", "Ada", "ada@example.com"]),
            Row::from(vec!["2", "Grace", "grace@example.com"]),
            Row::from(vec!["3", "Edsger", "edsger@example.com"]),
        ]
    }

    #[test]
    fn same_rows_same_id() {
        assert_eq!(ImportBatch::new(rows()).id, ImportBatch::new(rows()).id);
    }

    #[test]
    fn altered_row_changes_id() {
        let mut altered = rows();
        altered[1] = Row::from(vec!["2", "Grace", "hopper@example.com"]);
        assert_ne!(ImportBatch::new(rows()).id, ImportBatch::new(altered).id);
    }

    #[test]
    fn cell_boundaries_are_part_of_the_hash() {
        let a = fingerprint(0, &[Row::from(vec!["ab", "c"])]);
        let b = fingerprint(0, &[Row::from(vec!["a", "bc"])]);
        assert_ne!(a, b);
    }

    #[test]
    fn identical_rows_in_different_slots_get_distinct_ids() {
        let first = ImportBatch::numbered(0, rows());
        let second = ImportBatch::numbered(1, rows());
        assert_ne!(first.id, second.id);
        assert_eq!(first.id, ImportBatch::new(rows()).id);
    }

    #[test]
    fn fingerprint_tracks_remaining_rows() {
        let mut batch = ImportBatch::new(rows());
        assert_eq!(batch.fingerprint(), batch.id);

        batch.rows.remove(0);
        assert_ne!(batch.fingerprint(), batch.id);
    }
}
