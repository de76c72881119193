//! Rollcoach Core Library
//!
//! Session and resource lifecycle for sending sparring videos to a hosted
//! multimodal model: local scratch files, the remote file handle and its
//! processing poll, the analysis run, follow-up chat, and caption burning.

pub mod acquire;
pub mod captions;
pub mod coach;
pub mod config;
pub mod error;
pub mod format;
pub mod gemini;
pub mod history;
pub mod prompt;
pub mod provider;
pub mod remote;
pub mod session;
pub mod tracker;
pub mod transcode;
pub mod types;

// Re-export commonly used items at crate root
pub use acquire::{MediaFetcher, YtDlpFetcher};
pub use captions::parse_timestamp;
pub use coach::{AnalysisOutcome, Coach, NoProgress, ProgressSink, Stage};
pub use config::{CoachConfig, CompressionProfile, ReportMode};
pub use error::{CoachError, ErrorCategory, Result};
pub use format::{format_report_readable, format_timestamp};
pub use gemini::GeminiClient;
pub use history::ConversationHistory;
pub use provider::ApiCredentials;
pub use remote::{GenerateRequest, InferenceService, RemoteJobHandle};
pub use session::Session;
pub use tracker::LocalResourceTracker;
pub use transcode::{Compression, FfmpegTranscoder, Transcoder};
pub use types::{
    AnalysisReport, BeltLevel, CaptionEntry, ChatMessage, JobState, Profile, RemoteFile, Role,
};
