use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FiscalError {
    #[error("Invalid input for {field}: {reason}")]
    InvalidInput { field: String, reason: String },

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Parameters error: {0}")]
    Parameters(String),
}

impl FiscalError {
    pub fn invalid_input(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidInput {
            field: field.into(),
            reason: reason.into(),
        }
    }

    /// True for errors caused by the caller's wiring rather than by user data.
    pub fn is_configuration(&self) -> bool {
        matches!(self, FiscalError::Configuration(_) | FiscalError::Parameters(_))
    }
}

pub type FiscalResult<T> = Result<T, FiscalError>;
