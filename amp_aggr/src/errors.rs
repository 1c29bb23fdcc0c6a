use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum AggregationError {
    #[error("The result table {path:?} of sample {sample} does not exist. Did its job finish?")]
    MissingTable { sample: String, path: PathBuf },

    #[error("The result table {path:?} is empty, expected at least a header line.")]
    EmptyTable { path: PathBuf },

    #[error(
        "The header of {path:?} does not match the header of the other tables.\n\
         expected: {expected}\n\
         found:    {found}"
    )]
    HeaderMismatch {
        path: PathBuf,
        expected: String,
        found: String,
    },

    #[error("`{command}` failed ({status})")]
    ToolFailed { command: String, status: String },

    #[error(transparent)]
    Io(#[from] anyhow::Error),
}

/// Aggregation of one target site failed. Other sites are unaffected.
#[derive(Debug, thiserror::Error)]
#[error("Aggregating target site {site} failed")]
pub struct SiteAggregationError {
    pub site: String,
    #[source]
    pub source: AggregationError,
}
