use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CoachError {
    #[error("Missing API key: {env_var} environment variable is not set")]
    MissingApiKey { env_var: String },

    #[error("Invalid configuration: {reason}")]
    InvalidConfig { reason: String },

    #[error("Download failed for {url}: {reason}")]
    DownloadFailed { url: String, reason: String },

    #[error("Could not load video from {path}: {reason}")]
    LoadFailed { path: PathBuf, reason: String },

    #[error("No video is loaded")]
    NoVideoLoaded,

    #[error("Analysis has not completed yet")]
    AnalysisNotComplete,

    #[error("Message is empty")]
    EmptyMessage,

    #[error("Remote file {name} is {state} and cannot be used")]
    HandleUnusable { name: String, state: String },

    #[error("Remote processing of {name} timed out after {waited_secs}s")]
    ProcessingTimeout { name: String, waited_secs: u64 },

    #[error("Remote processing of {name} failed")]
    RemoteProcessingFailed { name: String },

    #[error("Request rejected ({status}): {message}")]
    ClientFault { status: u16, message: String },

    #[error("Service unavailable ({status}): {message}")]
    ServiceFault { status: u16, message: String },

    #[error("Malformed response: {reason}")]
    MalformedResponse { reason: String, raw: String },

    #[error("Transcode failed for {input}: {reason}")]
    TranscodeFailed { input: PathBuf, reason: String },

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("JSON parse error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("API request failed: {0}")]
    ApiError(#[from] reqwest::Error),
}

/// Coarse grouping used by front ends to pick what to tell the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Configuration,
    Acquisition,
    Timeout,
    ClientFault,
    ServiceFault,
    MalformedResponse,
    InvalidState,
    Generic,
}

impl CoachError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            CoachError::MissingApiKey { .. } | CoachError::InvalidConfig { .. } => {
                ErrorCategory::Configuration
            }
            CoachError::DownloadFailed { .. } | CoachError::LoadFailed { .. } => {
                ErrorCategory::Acquisition
            }
            CoachError::ProcessingTimeout { .. } => ErrorCategory::Timeout,
            CoachError::ClientFault { .. } => ErrorCategory::ClientFault,
            CoachError::ServiceFault { .. } => ErrorCategory::ServiceFault,
            CoachError::ApiError(e) if e.is_connect() || e.is_timeout() => {
                ErrorCategory::ServiceFault
            }
            CoachError::MalformedResponse { .. } => ErrorCategory::MalformedResponse,
            CoachError::NoVideoLoaded
            | CoachError::AnalysisNotComplete
            | CoachError::EmptyMessage
            | CoachError::HandleUnusable { .. } => ErrorCategory::InvalidState,
            CoachError::RemoteProcessingFailed { .. }
            | CoachError::TranscodeFailed { .. }
            | CoachError::IoError(_)
            | CoachError::JsonError(_)
            | CoachError::ApiError(_) => ErrorCategory::Generic,
        }
    }

    pub fn user_message(&self) -> &'static str {
        match self.category() {
            ErrorCategory::Configuration => {
                "Please provide a valid Gemini API key before running remote actions."
            }
            ErrorCategory::Acquisition => {
                "Could not load this video. Please check the source and try again."
            }
            ErrorCategory::Timeout => {
                "Video processing timed out. Please try a shorter or smaller video."
            }
            ErrorCategory::ClientFault => {
                "Invalid API key or request error. Please check your Gemini API key and try again."
            }
            ErrorCategory::ServiceFault => {
                "The Gemini API is temporarily unavailable. Please try again in a few minutes."
            }
            ErrorCategory::MalformedResponse => {
                "The analysis came back in an unexpected format. The raw response is shown below."
            }
            ErrorCategory::InvalidState => "That action is not available right now.",
            ErrorCategory::Generic => {
                "An unexpected error occurred. Please try again with a different video or check your API key."
            }
        }
    }

    /// Raw response text for diagnosis, when the failure carries one.
    pub fn raw_response(&self) -> Option<&str> {
        match self {
            CoachError::MalformedResponse { raw, .. } => Some(raw),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, CoachError>;
