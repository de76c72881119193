//! Analysis session state machine.
//!
//! `Coach` owns the collaborators and drives one [`Session`] through
//! load → compress → upload → poll → generate → chat → clear. Every
//! operation takes `&mut Session`, so a session never has two actions in
//! flight.

use std::path::{Path, PathBuf};

use tokio::fs;
use tracing::{info, instrument, warn};

use crate::{
    acquire::{MediaFetcher, create_work_dir, upload_file_name},
    captions::{CaptionOutcome, burn_captions},
    config::{CoachConfig, ReportMode},
    error::{CoachError, Result},
    prompt::{build_analysis_prompt, chat_system_instruction, parse_structured},
    remote::{GenerateRequest, InferenceService, Part, RemoteJobHandle, ResponseFormat, Turn},
    session::Session,
    transcode::Transcoder,
    types::{AnalysisReport, ChatMessage, Profile, Role},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Compressing,
    Uploading,
    Processing,
    Generating,
    Captioning,
}

impl Stage {
    pub fn description(&self) -> &'static str {
        match self {
            Stage::Compressing => "Compressing video...",
            Stage::Uploading => "Uploading video to Gemini...",
            Stage::Processing => "Waiting for AI to process the video...",
            Stage::Generating => "Generating personalized analysis report...",
            Stage::Captioning => "Burning captions into the video...",
        }
    }
}

/// Receives stage changes and degraded-mode warnings during `analyze`.
pub trait ProgressSink: Send + Sync {
    fn stage(&self, stage: Stage);
    fn warning(&self, message: &str);
}

pub struct NoProgress;

impl ProgressSink for NoProgress {
    fn stage(&self, _stage: Stage) {}
    fn warning(&self, _message: &str) {}
}

#[derive(Debug, Clone)]
pub struct AnalysisOutcome {
    pub report: AnalysisReport,
    pub warnings: Vec<String>,
    pub captioned_video: Option<PathBuf>,
}

/// Remove a work directory that never made it into a session.
async fn discard_work_dir(dir: &Path) {
    if let Err(e) = fs::remove_dir_all(dir).await {
        warn!(path = %dir.display(), error = %e, "failed to remove work directory");
    }
}

pub struct Coach<S, T, F> {
    service: S,
    transcoder: T,
    fetcher: F,
    config: CoachConfig,
}

impl<S, T, F> Coach<S, T, F>
where
    S: InferenceService,
    T: Transcoder,
    F: MediaFetcher,
{
    pub fn new(service: S, transcoder: T, fetcher: F, config: CoachConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            service,
            transcoder,
            fetcher,
            config,
        })
    }

    pub fn config(&self) -> &CoachConfig {
        &self.config
    }

    pub fn service(&self) -> &S {
        &self.service
    }

    pub fn new_session(&self, profile: Profile) -> Session {
        Session::new(profile, self.config.history_cap)
    }

    /// Store uploaded bytes as the session's video.
    #[instrument(skip_all, fields(session_id = %session.id(), size = bytes.len()))]
    pub async fn load_bytes(
        &self,
        session: &mut Session,
        bytes: &[u8],
        file_name: Option<&str>,
    ) -> Result<PathBuf> {
        let dir = create_work_dir(&self.config.work_root)
            .await
            .map_err(|e| CoachError::LoadFailed {
                path: self.config.work_root.clone(),
                reason: format!("could not create work directory: {e}"),
            })?;
        let path = dir.join(upload_file_name(file_name));

        let written = if bytes.is_empty() {
            Err("uploaded file is empty".to_string())
        } else {
            fs::write(&path, bytes).await.map_err(|e| e.to_string())
        };
        if let Err(reason) = written {
            discard_work_dir(&dir).await;
            return Err(CoachError::LoadFailed { path, reason });
        }

        self.supersede(session, dir, path.clone()).await;
        Ok(path)
    }

    /// Copy a local video into the session's scratch space.
    #[instrument(skip_all, fields(session_id = %session.id(), source = %source.display()))]
    pub async fn load_file(&self, session: &mut Session, source: &Path) -> Result<PathBuf> {
        let is_file = fs::metadata(source)
            .await
            .map(|m| m.is_file())
            .unwrap_or(false);
        if !is_file {
            return Err(CoachError::LoadFailed {
                path: source.to_path_buf(),
                reason: "not a readable file".to_string(),
            });
        }

        let dir = create_work_dir(&self.config.work_root)
            .await
            .map_err(|e| CoachError::LoadFailed {
                path: source.to_path_buf(),
                reason: format!("could not create work directory: {e}"),
            })?;
        let name = source.file_name().map(|n| n.to_string_lossy().to_string());
        let path = dir.join(upload_file_name(name.as_deref()));
        if let Err(e) = fs::copy(source, &path).await {
            discard_work_dir(&dir).await;
            return Err(CoachError::LoadFailed {
                path: source.to_path_buf(),
                reason: e.to_string(),
            });
        }

        self.supersede(session, dir, path.clone()).await;
        Ok(path)
    }

    /// Download a video. On failure the session is left exactly as it was.
    #[instrument(skip_all, fields(session_id = %session.id(), url = %url))]
    pub async fn fetch_url(&self, session: &mut Session, url: &str) -> Result<PathBuf> {
        let url = url.trim();
        if url.is_empty() {
            return Err(CoachError::DownloadFailed {
                url: String::new(),
                reason: "no URL given".to_string(),
            });
        }

        let dir = create_work_dir(&self.config.work_root)
            .await
            .map_err(|e| CoachError::DownloadFailed {
                url: url.to_string(),
                reason: format!("could not create work directory: {e}"),
            })?;
        match self.fetcher.fetch(url, &dir.join("remote.mp4")).await {
            Ok(path) => {
                self.supersede(session, dir, path.clone()).await;
                Ok(path)
            }
            Err(e) => {
                warn!(error = %e, "fetch failed, keeping current video");
                discard_work_dir(&dir).await;
                Err(e)
            }
        }
    }

    async fn supersede(&self, session: &mut Session, work_dir: PathBuf, video: PathBuf) {
        session.retire(&self.service).await;
        session.tracker.track(&work_dir);
        session.tracker.track(&video);
        info!(session_id = %session.id(), video = %video.display(), "video loaded");
        session.video = Some(video);
        session.work_dir = Some(work_dir);
    }

    pub async fn analyze(&self, session: &mut Session) -> Result<AnalysisOutcome> {
        self.analyze_with_progress(session, &NoProgress).await
    }

    /// Run the full analysis for the loaded video.
    ///
    /// Any earlier remote handle and analysis are retired first. On failure
    /// the session keeps its video, analysis stays incomplete, and whatever
    /// was created so far remains tracked for cleanup.
    #[instrument(skip_all, fields(session_id = %session.id()))]
    pub async fn analyze_with_progress(
        &self,
        session: &mut Session,
        progress: &dyn ProgressSink,
    ) -> Result<AnalysisOutcome> {
        let (video, work_dir) = match (&session.video, &session.work_dir) {
            (Some(video), Some(dir)) => (video.clone(), dir.clone()),
            _ => return Err(CoachError::NoVideoLoaded),
        };

        if let Some(mut previous) = session.remote.take() {
            previous.release(&self.service).await;
        }
        session.reset_analysis();

        let mut warnings = Vec::new();

        progress.stage(Stage::Compressing);
        let optimized = work_dir.join("optimized.mp4");
        session.tracker.track(&optimized);
        let compression = self.transcoder.compress(&video, &optimized).await;
        if let Some(warning) = &compression.warning {
            progress.warning(warning);
            warnings.push(warning.clone());
        }

        progress.stage(Stage::Uploading);
        let handle = RemoteJobHandle::upload(&self.service, &compression.path).await?;
        let handle = session.remote.insert(handle);

        progress.stage(Stage::Processing);
        handle
            .wait_until_ready(
                &self.service,
                self.config.poll_interval,
                self.config.processing_timeout,
            )
            .await?;

        progress.stage(Stage::Generating);
        let mode = self.config.report_mode;
        let (system, user) = build_analysis_prompt(&session.profile, mode);
        let request = GenerateRequest {
            model: self.config.model.clone(),
            system_instruction: Some(system),
            contents: vec![Turn {
                role: Role::User,
                parts: vec![handle.file_part()?, Part::Text(user)],
            }],
            response_format: match mode {
                ReportMode::Plain => ResponseFormat::Markdown,
                ReportMode::Captioned => ResponseFormat::CaptionedJson,
            },
        };
        let raw = self.service.generate(&request).await?;

        let report = match mode {
            ReportMode::Plain => AnalysisReport::Plain { text: raw },
            ReportMode::Captioned => parse_structured(&raw, self.config.caption_duration_secs)?,
        };

        let mut captioned_video = None;
        if let AnalysisReport::Structured { captions, .. } = &report {
            progress.stage(Stage::Captioning);
            match burn_captions(
                &self.transcoder,
                &mut session.tracker,
                &compression.path,
                captions,
                &work_dir,
            )
            .await
            {
                CaptionOutcome::Burned(path) => captioned_video = Some(path),
                CaptionOutcome::Skipped { warning } => {
                    progress.warning(&warning);
                    warnings.push(warning);
                }
            }
        }

        session
            .history
            .push(ChatMessage::assistant(report.report_text()));
        session.report = Some(report.clone());
        session.captioned_video = captioned_video.clone();
        session.analysis_complete = true;
        info!(session_id = %session.id(), "analysis complete");

        Ok(AnalysisOutcome {
            report,
            warnings,
            captioned_video,
        })
    }

    /// Ask a follow-up question about the analyzed video.
    ///
    /// The request carries the video, the last `chat_window` messages and the
    /// new question. Both messages are appended only once the reply arrives,
    /// so a failed turn leaves the history untouched.
    #[instrument(skip_all, fields(session_id = %session.id()))]
    pub async fn ask(&self, session: &mut Session, message: &str) -> Result<String> {
        if !session.analysis_complete {
            return Err(CoachError::AnalysisNotComplete);
        }
        let message = message.trim();
        if message.is_empty() {
            return Err(CoachError::EmptyMessage);
        }
        let handle = session
            .remote
            .as_ref()
            .ok_or(CoachError::AnalysisNotComplete)?;

        let mut contents = vec![Turn {
            role: Role::User,
            parts: vec![
                handle.file_part()?,
                Part::Text("This is the sparring video you analyzed.".to_string()),
            ],
        }];
        contents.extend(
            session
                .history
                .trailing(self.config.chat_window)
                .into_iter()
                .map(|m| Turn::text(m.role, m.text)),
        );
        contents.push(Turn::text(Role::User, message));

        let request = GenerateRequest {
            model: self.config.model.clone(),
            system_instruction: Some(chat_system_instruction(&session.profile)),
            contents,
            response_format: ResponseFormat::Markdown,
        };
        let reply = self.service.generate(&request).await?;

        session.history.push(ChatMessage::user(message));
        session.history.push(ChatMessage::assistant(reply.clone()));
        Ok(reply)
    }

    /// Release everything the session holds. Never fails.
    #[instrument(skip_all, fields(session_id = %session.id()))]
    pub async fn clear(&self, session: &mut Session) {
        session.retire(&self.service).await;
    }
}
