use thiserror::Error;

/// Errors surfaced by the annotation pipeline.
///
/// End of stream is not an error; sources report it as `None`.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// The configured source cannot be opened. Fatal at startup.
    #[error("source unavailable: {descriptor}: {reason}")]
    SourceUnavailable { descriptor: String, reason: String },

    /// The detector could not be readied before the first frame.
    #[error("detector '{backend}' failed to start: {cause:#}")]
    DetectorStartup {
        backend: String,
        cause: anyhow::Error,
    },

    /// The detector failed on a frame. Fatal for the run.
    #[error("detector '{backend}' failed on frame {frame_index}: {cause:#}")]
    OracleFailure {
        backend: String,
        frame_index: u64,
        cause: anyhow::Error,
    },

    /// The output stream could not be opened.
    #[error("output unavailable: {path}: {reason}")]
    OutputUnavailable { path: String, reason: String },

    /// A frame does not match the dimensions the output stream was opened with.
    #[error("frame {frame_index} is {actual_width}x{actual_height}, output expects {expected_width}x{expected_height}")]
    DimensionMismatch {
        frame_index: u64,
        expected_width: u32,
        expected_height: u32,
        actual_width: u32,
        actual_height: u32,
    },

    /// Writing an annotated frame to the output stream failed.
    #[error("output write failed: {0:#}")]
    Output(anyhow::Error),

    /// Presenting an annotated frame failed.
    #[error("display failed: {0:#}")]
    Display(anyhow::Error),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}
