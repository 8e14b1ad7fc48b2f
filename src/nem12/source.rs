//! Reading raw NEM12 rows from disk.
//!
//! The file itself is produced by an external download step; this module
//! only locates it and streams its rows in file order.

use sha2::{Digest, Sha256};
use std::fs::File;
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SourceError {
    #[error("io error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("csv read error: {0}")]
    Csv(#[from] csv::Error),
    #[error("no .csv files found in {0}")]
    NoCsvFiles(PathBuf),
    /// One row holds bytes that are not UTF-8. Other rows are unaffected;
    /// `row` carries the fields decoded lossily.
    #[error("line {}: field {field} is not valid UTF-8", .row.line)]
    InvalidUtf8 { row: SourceRow, field: usize },
}

impl SourceError {
    fn io(path: &Path, source: io::Error) -> Self {
        SourceError::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}

/// One row as read from the file, fields trimmed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceRow {
    /// 1-based line number of the row in the source.
    pub line: u64,
    pub fields: Vec<String>,
}

/// Ordered iterator over the rows of a NEM12 CSV.
///
/// Rows are variable-width and the file has no header line.
pub struct RowSource<R> {
    records: csv::ByteRecordsIntoIter<R>,
}

impl RowSource<File> {
    pub fn open(path: &Path) -> Result<Self, SourceError> {
        let file = File::open(path).map_err(|e| SourceError::io(path, e))?;
        Ok(Self::from_reader(file))
    }
}

impl<R: Read> RowSource<R> {
    pub fn from_reader(reader: R) -> Self {
        let reader = csv::ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .trim(csv::Trim::All)
            .from_reader(reader);
        Self {
            records: reader.into_byte_records(),
        }
    }
}

impl<R: Read> Iterator for RowSource<R> {
    type Item = Result<SourceRow, SourceError>;

    fn next(&mut self) -> Option<Self::Item> {
        let record = match self.records.next()? {
            Ok(record) => record,
            Err(e) => return Some(Err(SourceError::from(e))),
        };
        let line = record.position().map(|p| p.line()).unwrap_or_default();

        let mut fields = Vec::with_capacity(record.len());
        let mut invalid = None;
        for (i, raw) in record.iter().enumerate() {
            match std::str::from_utf8(raw) {
                Ok(field) => fields.push(field.to_string()),
                Err(_) => {
                    invalid.get_or_insert(i);
                    fields.push(String::from_utf8_lossy(raw).into_owned());
                }
            }
        }

        let row = SourceRow { line, fields };
        Some(match invalid {
            None => Ok(row),
            Some(field) => Err(SourceError::InvalidUtf8 { row, field }),
        })
    }
}

/// Most recently modified `*.csv` file directly inside `dir`.
pub fn latest_csv_in(dir: &Path) -> Result<PathBuf, SourceError> {
    let entries = std::fs::read_dir(dir).map_err(|e| SourceError::io(dir, e))?;

    let mut newest: Option<(std::time::SystemTime, PathBuf)> = None;
    for entry in entries {
        let entry = entry.map_err(|e| SourceError::io(dir, e))?;
        let path = entry.path();
        let is_csv = path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case("csv"));
        if !is_csv || !path.is_file() {
            continue;
        }

        let modified = entry
            .metadata()
            .and_then(|m| m.modified())
            .map_err(|e| SourceError::io(&path, e))?;
        if newest.as_ref().map_or(true, |(t, _)| modified > *t) {
            newest = Some((modified, path));
        }
    }

    newest
        .map(|(_, path)| path)
        .ok_or_else(|| SourceError::NoCsvFiles(dir.to_path_buf()))
}

/// Hex-encoded SHA-256 of a file's contents.
pub fn file_sha256(path: &Path) -> Result<String, SourceError> {
    let mut file = File::open(path).map_err(|e| SourceError::io(path, e))?;
    let mut hasher = Sha256::new();
    io::copy(&mut file, &mut hasher).map_err(|e| SourceError::io(path, e))?;
    Ok(hex::encode(hasher.finalize()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::TempDir;

    #[test]
    fn test_rows_are_trimmed_and_keep_line_numbers() {
        let data = "100,NEM12,201909130908,CITIPOWER,URS\n\n200, 6102920472, E1 ,E1,E1,,A0804565,KWH,30,\n";
        let rows: Vec<SourceRow> = RowSource::from_reader(data.as_bytes())
            .collect::<Result<_, _>>()
            .unwrap();

        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].line, 1);
        assert_eq!(rows[0].fields[0], "100");
        assert_eq!(rows[1].line, 3);
        assert_eq!(rows[1].fields[1], "6102920472");
        assert_eq!(rows[1].fields[2], "E1");
        assert_eq!(rows[1].fields.len(), 10);
    }

    #[test]
    fn test_rows_may_differ_in_width() {
        let data = "900\n300,20190809,1,2,3,A,,,20190810040147,\n";
        let widths: Vec<usize> = RowSource::from_reader(data.as_bytes())
            .map(|r| r.unwrap().fields.len())
            .collect();
        assert_eq!(widths, vec![1, 10]);
    }

    #[test]
    fn test_invalid_utf8_is_confined_to_its_row() {
        let data: &[u8] = b"200,1\n400,1,48,caf\xe9,\n900\n";
        let rows: Vec<Result<SourceRow, SourceError>> = RowSource::from_reader(data).collect();

        assert_eq!(rows.len(), 3);
        assert!(rows[0].is_ok());
        match rows[1].as_ref().unwrap_err() {
            SourceError::InvalidUtf8 { row, field } => {
                assert_eq!(row.line, 2);
                assert_eq!(*field, 3);
                assert_eq!(row.fields[3], "caf\u{fffd}");
            }
            other => panic!("Expected InvalidUtf8, got {other:?}"),
        }
        assert_eq!(rows[2].as_ref().unwrap().fields, vec!["900".to_string()]);
    }

    #[test]
    fn test_latest_csv_in_picks_newest() {
        let dir = TempDir::new().unwrap();
        let older = dir.path().join("older.csv");
        let newer = dir.path().join("newer.CSV");
        std::fs::write(&older, "900\n").unwrap();
        std::fs::write(dir.path().join("notes.txt"), "ignored").unwrap();

        let earlier = std::time::SystemTime::now() - std::time::Duration::from_secs(3600);
        File::options()
            .write(true)
            .open(&older)
            .unwrap()
            .set_modified(earlier)
            .unwrap();
        let mut f = File::create(&newer).unwrap();
        f.write_all(b"900\n").unwrap();

        assert_eq!(latest_csv_in(dir.path()).unwrap(), newer);
    }

    #[test]
    fn test_latest_csv_in_empty_dir() {
        let dir = TempDir::new().unwrap();
        assert!(matches!(
            latest_csv_in(dir.path()),
            Err(SourceError::NoCsvFiles(_))
        ));
    }

    #[test]
    fn test_file_sha256_is_stable() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("a.csv");
        std::fs::write(&path, "abc").unwrap();
        assert_eq!(
            file_sha256(&path).unwrap(),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }
}
