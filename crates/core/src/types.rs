use std::fmt;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

/// One entry of the conversation. Never mutated after it is appended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub text: String,
}

impl ChatMessage {
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            text: text.into(),
        }
    }

    pub fn assistant(text: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            text: text.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum BeltLevel {
    #[default]
    White,
    Blue,
    Purple,
    Brown,
    Black,
}

impl BeltLevel {
    pub fn name(&self) -> &'static str {
        match self {
            BeltLevel::White => "White",
            BeltLevel::Blue => "Blue",
            BeltLevel::Purple => "Purple",
            BeltLevel::Brown => "Brown",
            BeltLevel::Black => "Black",
        }
    }
}

impl fmt::Display for BeltLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// User-supplied settings passed through to the prompt as-is.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Profile {
    pub belt: BeltLevel,
    pub favorite_moves: String,
    pub concerns: String,
    pub identity: String,
    pub language: String,
}

impl Default for Profile {
    fn default() -> Self {
        Self {
            belt: BeltLevel::default(),
            favorite_moves: String::new(),
            concerns: String::new(),
            identity: String::new(),
            language: "English".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CaptionEntry {
    /// Timestamp text as the model wrote it.
    pub timestamp: String,
    pub start_secs: f64,
    pub duration_secs: f64,
    pub text: String,
}

impl CaptionEntry {
    pub fn end_secs(&self) -> f64 {
        self.start_secs + self.duration_secs
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum AnalysisReport {
    Plain {
        text: String,
    },
    Structured {
        captions: Vec<CaptionEntry>,
        report: String,
    },
}

impl AnalysisReport {
    pub fn report_text(&self) -> &str {
        match self {
            AnalysisReport::Plain { text } => text,
            AnalysisReport::Structured { report, .. } => report,
        }
    }

    pub fn captions(&self) -> &[CaptionEntry] {
        match self {
            AnalysisReport::Plain { .. } => &[],
            AnalysisReport::Structured { captions, .. } => captions,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum JobState {
    Uploading,
    Processing,
    Ready,
    Failed,
    Deleted,
}

impl JobState {
    pub fn name(&self) -> &'static str {
        match self {
            JobState::Uploading => "UPLOADING",
            JobState::Processing => "PROCESSING",
            JobState::Ready => "READY",
            JobState::Failed => "FAILED",
            JobState::Deleted => "DELETED",
        }
    }
}

impl fmt::Display for JobState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// File metadata as reported by the inference service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteFile {
    pub name: String,
    pub uri: String,
    pub mime_type: String,
    pub state: JobState,
}
