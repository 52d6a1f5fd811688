//! Tab-separated triples.
//!
//! Three columns, no header: `head<TAB>relation<TAB>tail`. Fields containing
//! tabs, quotes or newlines are quoted, matching what pandas and most
//! spreadsheet tools emit.

use crate::{Error, Result, Triple, TripleStore};
use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;

/// TSV format handler.
pub struct Tsv;

impl Tsv {
    /// Read triples from a reader.
    ///
    /// Blank lines are skipped. Any row with other than three fields is an
    /// error rather than a silently dropped fact.
    pub fn read<R: Read>(reader: R) -> Result<TripleStore> {
        let mut reader = csv::ReaderBuilder::new()
            .delimiter(b'\t')
            .has_headers(false)
            .flexible(true)
            .from_reader(reader);

        let mut store = TripleStore::new();
        for result in reader.records() {
            let record = result?;
            if record.len() != 3 {
                let line = record.position().map_or(0, csv::Position::line);
                return Err(Error::MalformedRow {
                    line,
                    fields: record.len(),
                });
            }
            store.push(Triple::new(&record[0], &record[1], &record[2]));
        }

        Ok(store)
    }

    /// Read triples from a file path.
    pub fn read_path(path: impl AsRef<Path>) -> Result<TripleStore> {
        let file = File::open(path)?;
        Self::read(BufReader::new(file))
    }

    /// Write triples to a writer.
    pub fn write<'a, W, I>(writer: W, triples: I) -> Result<()>
    where
        W: Write,
        I: IntoIterator<Item = &'a Triple>,
    {
        let mut writer = csv::WriterBuilder::new()
            .delimiter(b'\t')
            .has_headers(false)
            .from_writer(writer);

        for t in triples {
            writer.write_record([&t.head, &t.relation, &t.tail])?;
        }
        writer.flush()?;
        Ok(())
    }

    /// Write triples to a file path, creating or truncating it.
    pub fn write_path<'a, I>(path: impl AsRef<Path>, triples: I) -> Result<()>
    where
        I: IntoIterator<Item = &'a Triple>,
    {
        let file = File::create(path)?;
        Self::write(BufWriter::new(file), triples)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_read_three_columns() {
        let data = "a\tknows\tb\nb\tknows\tc\n\nc\tname\tCharlie Brown\n";
        let store = Tsv::read(data.as_bytes()).unwrap();
        assert_eq!(store.len(), 3);
        assert_eq!(store.as_slice()[2], Triple::new("c", "name", "Charlie Brown"));
    }

    #[test]
    fn test_malformed_row_reports_line() {
        let data = "a\tknows\tb\nbroken\trow\n";
        match Tsv::read(data.as_bytes()) {
            Err(Error::MalformedRow { line, fields }) => {
                assert_eq!(line, 2);
                assert_eq!(fields, 2);
            }
            other => panic!("expected MalformedRow, got {:?}", other),
        }
    }

    #[test]
    fn test_write_then_read_preserves_tabs_in_literals() {
        let triples = vec![
            Triple::new("a", "note", "has\ta tab"),
            Triple::new("a", "quote", "say \"hi\""),
        ];
        let mut buf = Vec::new();
        Tsv::write(&mut buf, &triples).unwrap();

        let back = Tsv::read(buf.as_slice()).unwrap();
        assert_eq!(back.into_inner(), triples);
    }
}
