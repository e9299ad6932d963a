use thiserror::Error;

#[derive(Error, Debug)]
pub enum SubvoiceError {
    #[error("Invalid subtitle format: {0}")]
    Format(String),

    #[error("Empty input: {0}")]
    EmptyInput(String),

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Synthesis backend failed: {0}")]
    Backend(String),

    #[error("Audio processing failed: {0}")]
    Processing(String),

    #[error("File not found: {0}")]
    FileNotFound(String),

    #[error("Cue {index}: {error}")]
    Cue {
        index: u32,
        error: Box<SubvoiceError>,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl SubvoiceError {
    /// Attach the index of the cue being processed when this error was raised.
    pub fn for_cue(self, index: u32) -> Self {
        match self {
            already @ SubvoiceError::Cue { .. } => already,
            other => SubvoiceError::Cue {
                index,
                error: Box::new(other),
            },
        }
    }

    /// The underlying error with any cue wrapper removed.
    pub fn root_cause(&self) -> &SubvoiceError {
        match self {
            SubvoiceError::Cue { error, .. } => error.root_cause(),
            other => other,
        }
    }

    /// Index of the cue this error belongs to, if any.
    pub fn cue_index(&self) -> Option<u32> {
        match self {
            SubvoiceError::Cue { index, .. } => Some(*index),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, SubvoiceError>;
