use crate::error::CliError;
use model::records::row::Row;
use std::{fs::File, path::Path};

/// Rows of a CSV file whose first record holds the column names.
pub struct CsvSource {
    headers: Vec<String>,
    records: csv::StringRecordsIntoIter<File>,
}

impl CsvSource {
    pub fn open(path: &Path, delimiter: char) -> Result<Self, CliError> {
        if !delimiter.is_ascii() {
            return Err(CliError::InvalidArgument(format!(
                "delimiter '{delimiter}' is not a single-byte character"
            )));
        }

        let mut reader = csv::ReaderBuilder::new()
            .delimiter(delimiter as u8)
            .has_headers(true)
            .flexible(true)
            .trim(csv::Trim::Headers)
            .from_path(path)?;

        let headers: Vec<String> = reader.headers()?.iter().map(String::from).collect();
        if headers.iter().all(|h| h.is_empty()) {
            return Err(CliError::MissingHeader);
        }

        Ok(CsvSource {
            headers,
            records: reader.into_records(),
        })
    }

    pub fn headers(&self) -> &[String] {
        &self.headers
    }
}

impl Iterator for CsvSource {
    type Item = Result<Row, CliError>;

    fn next(&mut self) -> Option<Self::Item> {
        self.records.next().map(|record| {
            record
                .map(|r| r.iter().map(String::from).collect())
                .map_err(CliError::from)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_headers_and_rows() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("people.csv");
        std::fs::write(&path, "email; name\na@example.com;Ada\nb@example.com\n").unwrap();

        let source = CsvSource::open(&path, ';').unwrap();
        assert_eq!(source.headers(), ["email", "name"]);

        let rows: Vec<Row> = source.collect::<Result<_, _>>().unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].get(1), Some("Ada"));
        assert_eq!(rows[1].len(), 1);
    }

    #[test]
    fn empty_file_has_no_header() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("empty.csv");
        std::fs::write(&path, "").unwrap();

        assert!(matches!(
            CsvSource::open(&path, ','),
            Err(CliError::MissingHeader)
        ));
    }
}
