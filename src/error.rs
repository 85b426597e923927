use thiserror::Error;

/// Result type used throughout the library.
pub type Result<T> = std::result::Result<T, AudiogramError>;

/// Errors raised while loading, summarising, rendering, caching or logging
/// audiogram records.
#[derive(Error, Debug)]
pub enum AudiogramError {
    /// Patient index outside `0..len`.
    #[error("patient index {index} out of range (table holds {len} records)")]
    IndexOutOfRange { index: usize, len: usize },

    /// Annotation submitted without a reviewer identity.
    #[error("no reviewer selected; choose an audiologist name before submitting")]
    MissingReviewer,

    /// The archive could not be opened or decompressed.
    #[error("archive error: {0}")]
    Archive(String),

    /// The decoded archive does not follow the patient table layout.
    #[error("schema error: {0}")]
    Schema(String),

    /// Chart rasterisation failed.
    #[error("render error: {0}")]
    Render(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("image error: {0}")]
    Image(#[from] image::ImageError),

    #[error("parquet error: {0}")]
    Parquet(#[from] parquet::errors::ParquetError),

    #[error("arrow error: {0}")]
    Arrow(#[from] arrow::error::ArrowError),
}
