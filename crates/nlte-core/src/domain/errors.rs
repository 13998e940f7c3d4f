use std::error::Error;
use std::fmt::{Display, Formatter};

pub type NlteResult<T> = Result<T, NlteError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NlteErrorCategory {
    InputValidationError,
    IoSystemError,
    ComputationError,
    InternalError,
}

impl NlteErrorCategory {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::InputValidationError => "InputValidationError",
            Self::IoSystemError => "IoSystemError",
            Self::ComputationError => "ComputationError",
            Self::InternalError => "InternalError",
        }
    }
}

impl Display for NlteErrorCategory {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str((*self).as_str())
    }
}

/// Run-fatal failure. Per-point problems never take this path; they are
/// collected as [`crate::solver::PointIssue`]s in the run report.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NlteError {
    category: NlteErrorCategory,
    placeholder: &'static str,
    message: String,
}

impl NlteError {
    pub fn new(
        category: NlteErrorCategory,
        placeholder: &'static str,
        message: impl Into<String>,
    ) -> Self {
        Self {
            category,
            placeholder,
            message: message.into(),
        }
    }

    pub fn input_validation(placeholder: &'static str, message: impl Into<String>) -> Self {
        Self::new(
            NlteErrorCategory::InputValidationError,
            placeholder,
            message,
        )
    }

    pub fn io_system(placeholder: &'static str, message: impl Into<String>) -> Self {
        Self::new(NlteErrorCategory::IoSystemError, placeholder, message)
    }

    pub fn computation(placeholder: &'static str, message: impl Into<String>) -> Self {
        Self::new(NlteErrorCategory::ComputationError, placeholder, message)
    }

    pub fn internal(placeholder: &'static str, message: impl Into<String>) -> Self {
        Self::new(NlteErrorCategory::InternalError, placeholder, message)
    }

    pub const fn category(&self) -> NlteErrorCategory {
        self.category
    }

    pub const fn placeholder(&self) -> &'static str {
        self.placeholder
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn diagnostic_line(&self) -> String {
        format!("ERROR: [{}] {}", self.placeholder, self.message)
    }
}

impl Display for NlteError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} [{}] {}",
            self.category, self.placeholder, self.message
        )
    }
}

impl Error for NlteError {}
