use thiserror::Error;

/// Errors that can occur in strata-core.
#[derive(Error, Debug)]
pub enum Error {
    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    /// Delimited-file read/write error.
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
    /// A row that is not exactly (head, relation, tail).
    #[error("Malformed row at line {line}: expected 3 fields, found {fields}")]
    MalformedRow {
        /// 1-based line number in the source file.
        line: u64,
        /// Number of fields found on that line.
        fields: usize,
    },
    /// Split fractions outside (0, 1).
    #[error("Invalid split ratio: {0}")]
    InvalidRatio(String),
    /// A stratum cannot be spread over the target partitions.
    #[error(
        "Partition infeasible: stratum '{stratum}' has {members} member(s), needs at least {required}"
    )]
    PartitionInfeasible {
        /// Stratum key (a relation, `rare`, or `*` for the whole stage).
        stratum: String,
        /// Members available.
        members: usize,
        /// Members required.
        required: usize,
    },
}

/// Result type alias for strata-core.
pub type Result<T> = std::result::Result<T, Error>;
