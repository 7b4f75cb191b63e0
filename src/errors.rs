use thiserror::Error;

/// Failure kinds reported by the sketch engine. The payload keeps the
/// diagnostic text of whatever lower layer originally failed, so callers
/// match on the variant instead of parsing messages.
#[derive(Debug, Error)]
pub enum SketchError {
    /// Bad seed, bad record, or mismatched dimensions.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Distributed storage layout the dense apply path does not handle.
    #[error("unsupported layout: {0}")]
    UnsupportedLayout(String),

    /// A collective operation failed, or a peer aborted before one.
    #[error("communication error: {0}")]
    Communication(String),

    /// Malformed compressed-column structure, or an internal fault while
    /// accumulating a sparse result.
    #[error("sparse operation error: {0}")]
    SparseOperation(String),
}
