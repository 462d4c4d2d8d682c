//! Result and Error types for the crate.
use std::path::PathBuf;

use miette::Diagnostic;
use thiserror::Error;

/// Result containing an error variant from this module.
pub type Result<T> = std::result::Result<T, Error>;

/// Camera error variants.
#[derive(Error, Debug, Diagnostic)]
pub enum Error {
    /// No camera in the collection has the requested serial number.
    #[error("no camera with serial number `{serial}`")]
    #[diagnostic(
        code(spincams::not_found),
        help("use `Cameras::camera_info` to list the connected serial numbers")
    )]
    NotFound { serial: String },

    /// Index is out of range for the collection.
    #[error("camera index {index} is out of range for {len} camera(s)")]
    #[diagnostic(code(spincams::index))]
    Index { index: usize, len: usize },

    /// A setter received a value outside its accepted set.
    #[error("invalid value `{value}` for {parameter}, expected {expected}")]
    #[diagnostic(code(spincams::invalid_parameter))]
    InvalidParameter {
        parameter: &'static str,
        value: String,
        expected: String,
    },

    /// The camera is not in a state that allows the operation.
    #[error("invalid camera state: {reason}")]
    #[diagnostic(
        code(spincams::invalid_state),
        help("call `initialise_cameras()` first, and stop acquisition before changing parameters")
    )]
    InvalidState { reason: String },

    /// A GenICam node is missing, or not readable and writable.
    #[error("node `{node}` is not available for reading and writing")]
    #[diagnostic(code(spincams::node_access))]
    NodeAccess { node: String },

    /// The SDK delivered an incomplete frame.
    #[error("image incomplete with image status {status}")]
    #[diagnostic(code(spincams::incomplete_image))]
    IncompleteImage { status: i32 },

    /// The configured save folder does not exist.
    #[error("save folder {} not found", path.display())]
    #[diagnostic(
        code(spincams::save_folder),
        help("create the folder before constructing the camera collection")
    )]
    SaveFolderNotFound { path: PathBuf },

    /// Opaque failure surfaced from the vendor SDK.
    #[error("Spinnaker: {message} [{code}]")]
    #[diagnostic(code(spincams::sdk))]
    Sdk { code: i32, message: String },

    /// IO error, this wraps a [`std::io::Error`]
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// Image encoding error, this wraps a [`image::ImageError`]
    #[error(transparent)]
    Image(#[from] image::ImageError),

    /// Video encoding error, this wraps a [`ffmpeg_next::Error`]
    #[cfg(feature = "video")]
    #[error("video encoding failed: {0}")]
    #[diagnostic(code(spincams::video))]
    Video(#[from] ffmpeg_next::Error),

    /// Deserialize error, this wraps a [`toml::de::Error`]
    #[error(transparent)]
    Config(#[from] toml::de::Error),
}

impl Error {
    pub(crate) fn invalid_state(reason: impl Into<String>) -> Self {
        Error::InvalidState {
            reason: reason.into(),
        }
    }

    pub(crate) fn sdk(code: i32, message: impl Into<String>) -> Self {
        Error::Sdk {
            code,
            message: message.into(),
        }
    }

    /// Returns the SDK message if this is an SDK failure.
    #[must_use]
    pub fn sdk_message(&self) -> Option<&str> {
        match self {
            Error::Sdk { message, .. } => Some(message),
            _ => None,
        }
    }
}
