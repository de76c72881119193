use std::path::{Path, PathBuf};

use tracing::info;
use uuid::Uuid;

use crate::{
    history::ConversationHistory,
    remote::{InferenceService, RemoteJobHandle},
    tracker::LocalResourceTracker,
    types::{AnalysisReport, Profile},
};

/// Everything one user interaction owns: the loaded video, its remote
/// handle, the conversation and the scratch files behind them.
///
/// At most one video and one remote handle are live at a time. Replacing
/// either goes through [`Session::retire`] first.
#[derive(Debug)]
pub struct Session {
    id: Uuid,
    pub profile: Profile,
    pub(crate) video: Option<PathBuf>,
    pub(crate) work_dir: Option<PathBuf>,
    pub(crate) remote: Option<RemoteJobHandle>,
    pub(crate) analysis_complete: bool,
    pub(crate) history: ConversationHistory,
    pub(crate) tracker: LocalResourceTracker,
    pub(crate) report: Option<AnalysisReport>,
    pub(crate) captioned_video: Option<PathBuf>,
}

impl Session {
    pub fn new(profile: Profile, history_cap: usize) -> Self {
        Self {
            id: Uuid::new_v4(),
            profile,
            video: None,
            work_dir: None,
            remote: None,
            analysis_complete: false,
            history: ConversationHistory::new(history_cap),
            tracker: LocalResourceTracker::new(),
            report: None,
            captioned_video: None,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn video(&self) -> Option<&Path> {
        self.video.as_deref()
    }

    pub fn remote(&self) -> Option<&RemoteJobHandle> {
        self.remote.as_ref()
    }

    pub fn is_analysis_complete(&self) -> bool {
        self.analysis_complete
    }

    pub fn history(&self) -> &ConversationHistory {
        &self.history
    }

    pub fn tracker(&self) -> &LocalResourceTracker {
        &self.tracker
    }

    pub fn report(&self) -> Option<&AnalysisReport> {
        self.report.as_ref()
    }

    pub fn captioned_video(&self) -> Option<&Path> {
        self.captioned_video.as_deref()
    }

    pub(crate) fn reset_analysis(&mut self) {
        self.analysis_complete = false;
        self.history.clear();
        self.report = None;
        self.captioned_video = None;
    }

    /// Delete the remote handle and every tracked local file, then reset the
    /// analysis. The profile survives.
    pub async fn retire<S>(&mut self, service: &S)
    where
        S: InferenceService + ?Sized,
    {
        if let Some(mut handle) = self.remote.take() {
            handle.release(service).await;
        }
        self.tracker.release_all().await;
        self.video = None;
        self.work_dir = None;
        self.reset_analysis();
        info!(session_id = %self.id, "session resources released");
    }
}
