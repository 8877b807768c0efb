use thiserror::Error;

/// Failures surfaced by an automation driver.
///
/// None of these prove the app under test is broken; the engine logs them as
/// automation-channel noise and leaves health decisions to the guard.
#[derive(Debug, Error)]
pub enum DriverError {
    /// Transport failure talking to the automation server
    #[error("request to {endpoint} failed: {source}")]
    Http {
        endpoint: String,
        #[source]
        source: reqwest::Error,
    },

    /// The server answered with a W3C error payload
    #[error("{command} failed ({error}): {message}")]
    Command {
        command: String,
        error: String,
        message: String,
    },

    /// Response body could not be decoded
    #[error("JSON parse error ({context}): {source}")]
    JsonParse {
        context: String,
        #[source]
        source: serde_json::Error,
    },

    /// Response decoded but did not carry what the command promised
    #[error("unexpected response to {command}: {detail}")]
    Protocol { command: String, detail: String },

    /// No live session (never created, or already deleted)
    #[error("no active automation session")]
    NoSession,

    /// A handle or selector no longer resolves
    #[error("element not found: {0}")]
    ElementNotFound(String),

    /// Failure injected by the mock driver
    #[error("scripted driver failure: {0}")]
    Scripted(String),
}

impl DriverError {
    /// Whether the server reported that the target element is gone.
    pub fn is_missing_element(&self) -> bool {
        match self {
            DriverError::ElementNotFound(_) => true,
            DriverError::Command { error, .. } => {
                error == "no such element" || error == "stale element reference"
            }
            _ => false,
        }
    }
}
