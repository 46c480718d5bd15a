use thiserror::Error;

#[derive(Error, Debug)]
pub enum ParseError {
    /// The log name does not follow `<identifier>-YYYY-MM-DDTHH:MM.log`.
    #[error("Format error in '{name}': {reason}")]
    Format { name: String, reason: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl ParseError {
    pub fn format(name: impl Into<String>, reason: impl Into<String>) -> Self {
        ParseError::Format {
            name: name.into(),
            reason: reason.into(),
        }
    }

    pub fn is_format(&self) -> bool {
        matches!(self, ParseError::Format { .. })
    }
}

pub type Result<T> = std::result::Result<T, ParseError>;
