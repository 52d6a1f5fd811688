//! Result table output.
//!
//! The table is a CSV file with header `model,dim,negs,mrr,hits_at_10`, one
//! row per trial in enumeration order.

use std::fs::File;
use std::io::{BufWriter, Read, Write};
use std::path::Path;

use crate::error::Result;
use crate::grid::TrialResult;

/// Write `trials` as CSV with a header row.
pub fn write_trials<W: Write>(writer: W, trials: &[TrialResult]) -> Result<()> {
    let mut csv_writer = csv::Writer::from_writer(writer);
    for trial in trials {
        csv_writer.serialize(trial)?;
    }
    csv_writer.flush()?;
    Ok(())
}

pub fn write_trials_path(path: impl AsRef<Path>, trials: &[TrialResult]) -> Result<()> {
    let file = File::create(path)?;
    write_trials(BufWriter::new(file), trials)
}

/// Read a table written by [`write_trials`].
pub fn read_trials<R: Read>(reader: R) -> Result<Vec<TrialResult>> {
    let mut csv_reader = csv::Reader::from_reader(reader);
    let mut trials = Vec::new();
    for row in csv_reader.deserialize() {
        trials.push(row?);
    }
    Ok(trials)
}

/// Fixed-width text table for terminal display.
pub fn format_table<'a, I>(rows: I) -> String
where
    I: IntoIterator<Item = &'a TrialResult>,
{
    let mut out = format!(
        "{:<10} {:>5} {:>5} {:>8} {:>8}\n",
        "model", "dim", "negs", "MRR", "Hits@10"
    );
    for r in rows {
        out.push_str(&format!(
            "{:<10} {:>5} {:>5} {:>8.4} {:>8.4}\n",
            r.model.to_string(),
            r.dim,
            r.negs,
            r.mrr,
            r.hits_at_10
        ));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scoring::ModelFamily;

    fn rows() -> Vec<TrialResult> {
        vec![
            TrialResult {
                model: ModelFamily::TransE,
                dim: 50,
                negs: 5,
                mrr: 0.25,
                hits_at_10: 0.5,
            },
            TrialResult {
                model: ModelFamily::ComplEx,
                dim: 100,
                negs: 20,
                mrr: 0.125,
                hits_at_10: 0.75,
            },
        ]
    }

    #[test]
    fn test_csv_layout() {
        let mut buf = Vec::new();
        write_trials(&mut buf, &rows()).unwrap();
        let text = String::from_utf8(buf).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "model,dim,negs,mrr,hits_at_10");
        assert_eq!(lines[1], "TransE,50,5,0.25,0.5");
        assert_eq!(lines[2], "ComplEx,100,20,0.125,0.75");
        assert_eq!(read_trials(text.as_bytes()).unwrap(), rows());
    }

    #[test]
    fn test_format_table() {
        let table = format_table(&rows());
        assert!(table.starts_with("model"));
        assert!(table.contains("ComplEx"));
        assert!(table.contains("0.2500"));
        assert_eq!(table.lines().count(), 3);
    }
}
