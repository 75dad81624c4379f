//! CLI error types and exit codes

use scim_mediator::{ConfigError, MediatorError};
use thiserror::Error;

/// Exit codes for the CLI
/// - 0: Success
/// - 1: General error (including runs that finished with failed items)
/// - 2: Configuration error
/// - 3: Remote directory or transport error
/// - 4: Precondition error
/// - 5: Persistence error
/// - 130: Interrupted by a shutdown signal
pub type CliResult<T> = Result<T, CliError>;

#[derive(Debug, Error)]
pub enum CliError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Directory error: {0}")]
    Remote(String),

    #[error("Precondition failed: {0}")]
    Precondition(String),

    #[error("Persistence error: {0}")]
    Persistence(String),

    #[error("Interrupted by shutdown signal; progress has been saved")]
    Interrupted,

    #[error("Invalid input: {0}")]
    Input(String),

    #[error("{0}")]
    Incomplete(String),
}

impl CliError {
    /// Get the exit code for this error
    pub fn exit_code(&self) -> i32 {
        match self {
            CliError::Input(_) | CliError::Incomplete(_) => 1,
            CliError::Config(_) => 2,
            CliError::Remote(_) => 3,
            CliError::Precondition(_) => 4,
            CliError::Persistence(_) => 5,
            CliError::Interrupted => 130,
        }
    }

    /// Print the error to stderr with appropriate formatting
    pub fn print(&self) {
        let use_color = std::env::var("NO_COLOR").is_err();

        if use_color {
            eprintln!("\x1b[31mError:\x1b[0m {}", self);
        } else {
            eprintln!("Error: {}", self);
        }

        if let Some(suggestion) = self.suggestion() {
            if use_color {
                eprintln!("\n\x1b[33mSuggestion:\x1b[0m {}", suggestion);
            } else {
                eprintln!("\nSuggestion: {}", suggestion);
            }
        }
    }

    fn suggestion(&self) -> Option<&'static str> {
        match self {
            CliError::Config(_) => Some(
                "Set SCIM_MEDIATOR_API_URL and SCIM_MEDIATOR_API_KEY in the environment or a .env file.",
            ),
            CliError::Interrupted => Some("Re-run the same command to resume."),
            CliError::Precondition(msg) if msg.contains("local mirror") => {
                Some("Run 'scim-mediator refresh' to bring the local mirror up to date.")
            }
            _ => None,
        }
    }
}

impl From<MediatorError> for CliError {
    fn from(e: MediatorError) -> Self {
        match e {
            MediatorError::Cancelled => CliError::Interrupted,
            MediatorError::Precondition(msg) => CliError::Precondition(msg),
            MediatorError::Persistence(msg) => CliError::Persistence(msg),
            MediatorError::Config(msg) => CliError::Config(msg),
            other => CliError::Remote(other.to_string()),
        }
    }
}

impl From<ConfigError> for CliError {
    fn from(e: ConfigError) -> Self {
        CliError::Config(e.to_string())
    }
}

impl From<std::io::Error> for CliError {
    fn from(e: std::io::Error) -> Self {
        CliError::Input(format!("I/O error: {}", e))
    }
}

impl From<serde_json::Error> for CliError {
    fn from(e: serde_json::Error) -> Self {
        CliError::Input(format!("JSON error: {}", e))
    }
}
