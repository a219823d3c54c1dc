use std::time::Duration;

/// Failures of a single analysis request. None of these are retried by the
/// client; the orchestrator records them on the report.
#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    #[error("Provider returned HTTP {0}")]
    Status(u16),

    #[error("Provider transport error: {0}")]
    Transport(String),

    #[error("Provider did not answer within {0:?}")]
    Timeout(Duration),

    #[error("Provider output could not be parsed: {0}")]
    Parse(String),
}

impl ProviderError {
    /// The message stored on a failed report and shown to the user.
    pub fn user_message(&self) -> &'static str {
        match self {
            Self::Timeout(_) => "Report generation timed out, please try again",
            Self::Parse(_) => "Report generation failed, please try again",
            Self::Status(_) | Self::Transport(_) => {
                "Analysis service is temporarily unavailable, please try again"
            }
        }
    }
}

pub type Result<T> = std::result::Result<T, ProviderError>;
