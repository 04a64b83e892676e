use thiserror::Error;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErrorKind {
    Configuration,
    Introspection,
    Execution,
}

#[derive(Debug, Error)]
pub enum ModelError {
    #[error("configuration error: {left} and {right} disagree in length: {left_len} vs {right_len}")]
    LengthMismatch {
        left: &'static str,
        left_len: usize,
        right: &'static str,
        right_len: usize,
    },
    #[error("configuration error: {0}")]
    Configuration(String),
    #[error("introspection error: tensor `{name}`: {message}")]
    Introspection { name: String, message: String },
    #[error("execution error: {message}")]
    Execution {
        message: String,
        report: Option<String>,
    },
}

pub type ModelResult<T> = std::result::Result<T, ModelError>;

impl ModelError {
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration(message.into())
    }

    pub fn introspection(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Introspection {
            name: name.into(),
            message: message.into(),
        }
    }

    pub fn execution(message: impl Into<String>) -> Self {
        Self::Execution {
            message: message.into(),
            report: None,
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::LengthMismatch { .. } | Self::Configuration(_) => ErrorKind::Configuration,
            Self::Introspection { .. } => ErrorKind::Introspection,
            Self::Execution { .. } => ErrorKind::Execution,
        }
    }

    /// Debug report attached to an execution error, if any.
    pub fn report(&self) -> Option<&str> {
        match self {
            Self::Execution { report, .. } => report.as_deref(),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn length_mismatch_names_both_lists() {
        let err = ModelError::LengthMismatch {
            left: "input images",
            left_len: 2,
            right: "input placeholders",
            right_len: 1,
        };
        assert_eq!(err.kind(), ErrorKind::Configuration);
        assert_eq!(
            err.to_string(),
            "configuration error: input images and input placeholders disagree in length: 2 vs 1"
        );
    }
}
