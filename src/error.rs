/// Errors raised while loading a recorded sensor trace
#[derive(Debug, thiserror::Error)]
pub enum TraceError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("record {record}: unknown kind '{kind}'")]
    UnknownKind { record: usize, kind: String },

    #[error("record {record}: missing field '{field}'")]
    MissingField { record: usize, field: &'static str },

    #[error("record {record}: invalid {field} '{value}'")]
    InvalidValue {
        record: usize,
        field: &'static str,
        value: String,
    },

    #[error("record {record}: at_secs {at_secs} is earlier than the previous record")]
    OutOfOrder { record: usize, at_secs: f64 },
}
