//! Remote side of a session: the inference service contract and the handle
//! that tracks one uploaded video through its processing lifecycle.

use std::{path::Path, time::Duration};

use async_trait::async_trait;
use tracing::{debug, info, warn};

use crate::{
    error::{CoachError, Result},
    types::{JobState, RemoteFile, Role},
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Part {
    Text(String),
    File { uri: String, mime_type: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Turn {
    pub role: Role,
    pub parts: Vec<Part>,
}

impl Turn {
    pub fn text(role: Role, text: impl Into<String>) -> Self {
        Self {
            role,
            parts: vec![Part::Text(text.into())],
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ResponseFormat {
    #[default]
    Markdown,
    /// JSON object with `captions` and `report`.
    CaptionedJson,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerateRequest {
    pub model: String,
    pub system_instruction: Option<String>,
    pub contents: Vec<Turn>,
    pub response_format: ResponseFormat,
}

/// Hosted multimodal model with a file store.
#[async_trait]
pub trait InferenceService: Send + Sync {
    async fn upload(&self, path: &Path) -> Result<RemoteFile>;
    async fn get_status(&self, name: &str) -> Result<RemoteFile>;
    async fn generate(&self, request: &GenerateRequest) -> Result<String>;
    /// Deleting a file that no longer exists succeeds.
    async fn delete(&self, name: &str) -> Result<()>;
}

/// Local proxy for one file held by the inference service.
#[derive(Debug, Clone)]
pub struct RemoteJobHandle {
    name: String,
    uri: String,
    mime_type: String,
    state: JobState,
}

impl RemoteJobHandle {
    /// Upload `path` and wrap whatever the service reports back.
    pub async fn upload<S>(service: &S, path: &Path) -> Result<Self>
    where
        S: InferenceService + ?Sized,
    {
        info!(path = %path.display(), "uploading video");
        let file = service.upload(path).await?;
        let mut handle = Self {
            name: file.name.clone(),
            uri: String::new(),
            mime_type: String::new(),
            state: JobState::Uploading,
        };
        handle.apply(file);
        info!(remote_name = %handle.name, state = %handle.state, "upload finished");
        Ok(handle)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn state(&self) -> JobState {
        self.state
    }

    fn apply(&mut self, file: RemoteFile) {
        if !file.uri.is_empty() {
            self.uri = file.uri;
        }
        if !file.mime_type.is_empty() {
            self.mime_type = file.mime_type;
        }
        self.state = match file.state {
            JobState::Ready => JobState::Ready,
            JobState::Failed => JobState::Failed,
            JobState::Deleted => JobState::Deleted,
            JobState::Uploading | JobState::Processing => JobState::Processing,
        };
    }

    /// Poll until the service reports the file ready.
    ///
    /// Sleeps `interval` between polls. Once `timeout` worth of waiting has
    /// accumulated the handle becomes FAILED, a best-effort remote delete is
    /// attempted and `ProcessingTimeout` is returned.
    pub async fn wait_until_ready<S>(
        &mut self,
        service: &S,
        interval: Duration,
        timeout: Duration,
    ) -> Result<()>
    where
        S: InferenceService + ?Sized,
    {
        let mut elapsed = Duration::ZERO;

        loop {
            match self.state {
                JobState::Ready => return Ok(()),
                JobState::Failed => {
                    return Err(CoachError::RemoteProcessingFailed {
                        name: self.name.clone(),
                    });
                }
                JobState::Deleted => return Err(self.unusable()),
                JobState::Uploading | JobState::Processing => {}
            }

            if elapsed >= timeout {
                warn!(
                    remote_name = %self.name,
                    waited_secs = elapsed.as_secs(),
                    "remote processing timed out"
                );
                self.state = JobState::Failed;
                if let Err(e) = service.delete(&self.name).await {
                    warn!(remote_name = %self.name, error = %e, "failed to delete timed out file");
                }
                return Err(CoachError::ProcessingTimeout {
                    name: self.name.clone(),
                    waited_secs: elapsed.as_secs(),
                });
            }

            tokio::time::sleep(interval).await;
            elapsed += interval;

            let status = service.get_status(&self.name).await?;
            self.apply(status);
            debug!(remote_name = %self.name, state = %self.state, elapsed_secs = elapsed.as_secs(), "polled remote file");
        }
    }

    /// Reference to the file for use inside a request. Only READY handles qualify.
    pub fn file_part(&self) -> Result<Part> {
        if self.state != JobState::Ready {
            return Err(self.unusable());
        }
        Ok(Part::File {
            uri: self.uri.clone(),
            mime_type: self.mime_type.clone(),
        })
    }

    /// Delete the remote file. Never fails: errors are logged and the handle
    /// is DELETED afterwards either way.
    pub async fn release<S>(&mut self, service: &S)
    where
        S: InferenceService + ?Sized,
    {
        if self.state == JobState::Deleted {
            return;
        }

        if self.state != JobState::Uploading {
            match service.delete(&self.name).await {
                Ok(()) => info!(remote_name = %self.name, "deleted remote file"),
                Err(e) => {
                    warn!(remote_name = %self.name, error = %e, "failed to delete remote file")
                }
            }
        }
        self.state = JobState::Deleted;
    }

    fn unusable(&self) -> CoachError {
        CoachError::HandleUnusable {
            name: self.name.clone(),
            state: self.state.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;

    /// Reports PROCESSING for the first `ready_after` polls, then READY.
    struct ScriptedService {
        ready_after: Option<usize>,
        polls: Mutex<usize>,
        deleted: Mutex<Vec<String>>,
        fail_delete: bool,
    }

    impl ScriptedService {
        fn new(ready_after: Option<usize>) -> Self {
            Self {
                ready_after,
                polls: Mutex::new(0),
                deleted: Mutex::new(Vec::new()),
                fail_delete: false,
            }
        }

        fn file(&self, state: JobState) -> RemoteFile {
            RemoteFile {
                name: "files/abc".into(),
                uri: "https://files/abc".into(),
                mime_type: "video/mp4".into(),
                state,
            }
        }
    }

    #[async_trait]
    impl InferenceService for ScriptedService {
        async fn upload(&self, _path: &Path) -> Result<RemoteFile> {
            Ok(self.file(JobState::Processing))
        }

        async fn get_status(&self, _name: &str) -> Result<RemoteFile> {
            let mut polls = self.polls.lock().unwrap();
            *polls += 1;
            let state = match self.ready_after {
                Some(n) if *polls >= n => JobState::Ready,
                _ => JobState::Processing,
            };
            Ok(self.file(state))
        }

        async fn generate(&self, _request: &GenerateRequest) -> Result<String> {
            Ok(String::new())
        }

        async fn delete(&self, name: &str) -> Result<()> {
            self.deleted.lock().unwrap().push(name.to_string());
            if self.fail_delete {
                return Err(CoachError::ServiceFault {
                    status: 503,
                    message: "down".into(),
                });
            }
            Ok(())
        }
    }

    #[tokio::test(start_paused = true)]
    async fn becomes_ready_after_several_polls() {
        let service = ScriptedService::new(Some(7));
        let mut handle = RemoteJobHandle::upload(&service, Path::new("v.mp4"))
            .await
            .unwrap();
        assert_eq!(handle.state(), JobState::Processing);

        handle
            .wait_until_ready(&service, Duration::from_secs(2), Duration::from_secs(300))
            .await
            .unwrap();

        assert_eq!(handle.state(), JobState::Ready);
        assert_eq!(*service.polls.lock().unwrap(), 7);
        assert!(handle.file_part().is_ok());
    }

    #[tokio::test(start_paused = true)]
    async fn timeout_marks_failed_and_attempts_delete() {
        let service = ScriptedService::new(None);
        let mut handle = RemoteJobHandle::upload(&service, Path::new("v.mp4"))
            .await
            .unwrap();

        let err = handle
            .wait_until_ready(&service, Duration::from_secs(2), Duration::from_secs(10))
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            CoachError::ProcessingTimeout { waited_secs: 10, .. }
        ));
        assert_eq!(handle.state(), JobState::Failed);
        assert_eq!(*service.polls.lock().unwrap(), 5);
        assert_eq!(service.deleted.lock().unwrap().as_slice(), ["files/abc"]);
        assert!(handle.file_part().is_err());
    }

    #[tokio::test]
    async fn release_swallows_delete_errors() {
        let mut service = ScriptedService::new(Some(1));
        service.fail_delete = true;
        let mut handle = RemoteJobHandle::upload(&service, Path::new("v.mp4"))
            .await
            .unwrap();

        handle.release(&service).await;
        handle.release(&service).await;

        assert_eq!(handle.state(), JobState::Deleted);
        assert_eq!(service.deleted.lock().unwrap().len(), 1);
        assert!(matches!(
            handle.file_part(),
            Err(CoachError::HandleUnusable { .. })
        ));
    }
}
