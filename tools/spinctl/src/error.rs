use miette::Diagnostic;
use thiserror::Error;

/// Type alias for [`std::result::Result`] containing a spinctl [`enum@Error`].
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while running a spinctl command.
#[derive(Error, Diagnostic, Debug)]
pub enum Error {
    #[error(transparent)]
    #[diagnostic(transparent)]
    Spincams(#[from] spincams::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error("No camera backend available")]
    #[diagnostic(
        code(spinctl::no_backend),
        help(
            "- Pass `--simulate <N>` to use simulated cameras
- Or build spinctl with `--features spinnaker` to use the Spinnaker runtime"
        )
    )]
    NoBackend,

    #[error("Acquisition worker stopped unexpectedly")]
    Worker(#[from] tokio::task::JoinError),

    #[error("{failed} camera(s) failed to {operation}")]
    #[diagnostic(code(spinctl::batch))]
    Batch {
        operation: &'static str,
        failed: usize,
    },
}
