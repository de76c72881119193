//! Gemini Files + generateContent client.

use std::path::Path;

use async_trait::async_trait;
use reqwest::{Client, Response, StatusCode};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::{
    error::{CoachError, Result},
    provider::{ApiCredentials, GEMINI_BASE_URL},
    remote::{GenerateRequest, InferenceService, Part, ResponseFormat, Turn},
    types::{JobState, RemoteFile, Role},
};

pub struct GeminiClient {
    credentials: ApiCredentials,
    base_url: String,
    client: Client,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiRequest {
    contents: Vec<Content>,
    #[serde(skip_serializing_if = "Option::is_none")]
    system_instruction: Option<Content>,
    #[serde(skip_serializing_if = "Option::is_none")]
    generation_config: Option<GenerationConfig>,
}

#[derive(Debug, Serialize)]
struct Content {
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<&'static str>,
    parts: Vec<ContentPart>,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
enum ContentPart {
    Text {
        text: String,
    },
    File {
        #[serde(rename = "fileData")]
        file_data: FileData,
    },
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct FileData {
    mime_type: String,
    file_uri: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    response_mime_type: String,
    response_schema: serde_json::Value,
}

#[derive(Debug, Deserialize)]
struct GeminiResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<ResponseContent>,
}

#[derive(Debug, Deserialize)]
struct ResponseContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Debug, Deserialize)]
struct ResponsePart {
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct UploadResponse {
    file: FileResource,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FileResource {
    name: String,
    #[serde(default)]
    uri: String,
    #[serde(default)]
    mime_type: String,
    #[serde(default)]
    state: String,
}

impl From<FileResource> for RemoteFile {
    fn from(file: FileResource) -> Self {
        let state = match file.state.as_str() {
            "ACTIVE" => JobState::Ready,
            "FAILED" => JobState::Failed,
            _ => JobState::Processing,
        };
        RemoteFile {
            name: file.name,
            uri: file.uri,
            mime_type: file.mime_type,
            state,
        }
    }
}

impl GeminiClient {
    pub fn new(credentials: ApiCredentials) -> Self {
        Self::with_base_url(credentials, GEMINI_BASE_URL)
    }

    pub fn with_base_url(credentials: ApiCredentials, base_url: impl Into<String>) -> Self {
        Self {
            credentials,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client: Client::new(),
        }
    }

    fn api_url(&self, path: &str) -> String {
        format!("{}/v1beta/{}", self.base_url, path)
    }

    async fn check(response: Response) -> Result<Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let message = response.text().await.unwrap_or_default();
        if status.is_client_error() {
            Err(CoachError::ClientFault {
                status: status.as_u16(),
                message,
            })
        } else {
            Err(CoachError::ServiceFault {
                status: status.as_u16(),
                message,
            })
        }
    }
}

/// MIME type for an uploaded video, by extension.
pub fn guess_mime_type(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .map(|e| e.to_string_lossy().to_lowercase())
        .unwrap_or_default();
    match ext.as_str() {
        "mov" => "video/quicktime",
        "avi" => "video/x-msvideo",
        "mkv" => "video/x-matroska",
        "webm" => "video/webm",
        _ => "video/mp4",
    }
}

fn caption_schema() -> serde_json::Value {
    serde_json::json!({
        "type": "OBJECT",
        "properties": {
            "captions": {
                "type": "ARRAY",
                "items": {
                    "type": "OBJECT",
                    "properties": {
                        "timestamp": { "type": "STRING" },
                        "text": { "type": "STRING" }
                    },
                    "required": ["timestamp", "text"]
                }
            },
            "report": { "type": "STRING" }
        },
        "required": ["captions", "report"]
    })
}

fn to_content(turn: &Turn) -> Content {
    let role = match turn.role {
        Role::User => "user",
        Role::Assistant => "model",
    };
    Content {
        role: Some(role),
        parts: turn
            .parts
            .iter()
            .map(|part| match part {
                Part::Text(text) => ContentPart::Text { text: text.clone() },
                Part::File { uri, mime_type } => ContentPart::File {
                    file_data: FileData {
                        mime_type: mime_type.clone(),
                        file_uri: uri.clone(),
                    },
                },
            })
            .collect(),
    }
}

#[async_trait]
impl InferenceService for GeminiClient {
    async fn upload(&self, path: &Path) -> Result<RemoteFile> {
        let bytes = tokio::fs::read(path).await?;
        let mime_type = guess_mime_type(path);
        debug!(path = %path.display(), size = bytes.len(), mime_type, "sending upload");

        let response = self
            .client
            .post(format!("{}/upload/v1beta/files", self.base_url))
            .query(&[("uploadType", "media")])
            .header("x-goog-api-key", self.credentials.api_key())
            .header("X-Goog-Upload-Protocol", "raw")
            .header("Content-Type", mime_type)
            .body(bytes)
            .send()
            .await?;

        let upload: UploadResponse = Self::check(response).await?.json().await?;
        Ok(upload.file.into())
    }

    async fn get_status(&self, name: &str) -> Result<RemoteFile> {
        let response = self
            .client
            .get(self.api_url(name))
            .header("x-goog-api-key", self.credentials.api_key())
            .send()
            .await?;

        let file: FileResource = Self::check(response).await?.json().await?;
        Ok(file.into())
    }

    async fn generate(&self, request: &GenerateRequest) -> Result<String> {
        let generation_config = match request.response_format {
            ResponseFormat::Markdown => None,
            ResponseFormat::CaptionedJson => Some(GenerationConfig {
                response_mime_type: "application/json".to_string(),
                response_schema: caption_schema(),
            }),
        };

        let body = GeminiRequest {
            contents: request.contents.iter().map(to_content).collect(),
            system_instruction: request.system_instruction.as_ref().map(|text| Content {
                role: None,
                parts: vec![ContentPart::Text { text: text.clone() }],
            }),
            generation_config,
        };

        info!(model = %request.model, turns = body.contents.len(), "requesting generation");
        let response = self
            .client
            .post(self.api_url(&format!("models/{}:generateContent", request.model)))
            .header("x-goog-api-key", self.credentials.api_key())
            .json(&body)
            .send()
            .await?;

        let raw = Self::check(response).await?.text().await?;
        let parsed: GeminiResponse =
            serde_json::from_str(&raw).map_err(|e| CoachError::MalformedResponse {
                reason: format!("Failed to parse Gemini response: {}", e),
                raw: raw.clone(),
            })?;

        let text: String = parsed
            .candidates
            .first()
            .and_then(|c| c.content.as_ref())
            .map(|c| {
                c.parts
                    .iter()
                    .filter_map(|p| p.text.as_deref())
                    .collect::<Vec<_>>()
                    .join("")
            })
            .unwrap_or_default();

        if text.trim().is_empty() {
            return Err(CoachError::MalformedResponse {
                reason: "No content in Gemini response".to_string(),
                raw,
            });
        }
        Ok(text)
    }

    async fn delete(&self, name: &str) -> Result<()> {
        let response = self
            .client
            .delete(self.api_url(name))
            .header("x-goog-api-key", self.credentials.api_key())
            .send()
            .await?;

        if response.status() == StatusCode::NOT_FOUND {
            return Ok(());
        }
        Self::check(response).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use wiremock::{
        Mock, MockServer, ResponseTemplate,
        matchers::{body_partial_json, header, method, path},
    };

    use super::*;

    fn client(server: &MockServer) -> GeminiClient {
        GeminiClient::with_base_url(ApiCredentials::new("test-key").unwrap(), server.uri())
    }

    #[tokio::test]
    async fn upload_reports_processing_file() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/upload/v1beta/files"))
            .and(header("x-goog-api-key", "test-key"))
            .and(header("content-type", "video/quicktime"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "file": {
                    "name": "files/abc",
                    "uri": "https://example/files/abc",
                    "mimeType": "video/quicktime",
                    "state": "PROCESSING"
                }
            })))
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let video = dir.path().join("clip.mov");
        std::fs::write(&video, b"fake video").unwrap();

        let file = client(&server).upload(&video).await.unwrap();
        assert_eq!(file.name, "files/abc");
        assert_eq!(file.state, JobState::Processing);
        assert_eq!(file.mime_type, "video/quicktime");
    }

    #[tokio::test]
    async fn active_status_maps_to_ready() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1beta/files/abc"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "name": "files/abc",
                "uri": "https://example/files/abc",
                "mimeType": "video/mp4",
                "state": "ACTIVE"
            })))
            .mount(&server)
            .await;

        let file = client(&server).get_status("files/abc").await.unwrap();
        assert_eq!(file.state, JobState::Ready);
    }

    #[tokio::test]
    async fn generate_joins_text_parts_and_maps_roles() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1beta/models/gemini-2.5-pro:generateContent"))
            .and(body_partial_json(serde_json::json!({
                "contents": [
                    { "role": "user", "parts": [
                        { "fileData": { "mimeType": "video/mp4", "fileUri": "u" } },
                        { "text": "analyze" }
                    ]},
                    { "role": "model", "parts": [{ "text": "earlier reply" }] }
                ]
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "candidates": [
                    { "content": { "parts": [{ "text": "Hips " }, { "text": "rose." }] } }
                ]
            })))
            .mount(&server)
            .await;

        let request = GenerateRequest {
            model: "gemini-2.5-pro".into(),
            system_instruction: Some("coach".into()),
            contents: vec![
                Turn {
                    role: Role::User,
                    parts: vec![
                        Part::File {
                            uri: "u".into(),
                            mime_type: "video/mp4".into(),
                        },
                        Part::Text("analyze".into()),
                    ],
                },
                Turn::text(Role::Assistant, "earlier reply"),
            ],
            response_format: ResponseFormat::Markdown,
        };

        let text = client(&server).generate(&request).await.unwrap();
        assert_eq!(text, "Hips rose.");
    }

    #[tokio::test]
    async fn http_errors_split_into_client_and_service_faults() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1beta/files/forbidden"))
            .respond_with(ResponseTemplate::new(403).set_body_string("API key not valid"))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/v1beta/files/down"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let gemini = client(&server);
        assert!(matches!(
            gemini.get_status("files/forbidden").await,
            Err(CoachError::ClientFault { status: 403, .. })
        ));
        assert!(matches!(
            gemini.get_status("files/down").await,
            Err(CoachError::ServiceFault { status: 503, .. })
        ));
    }

    #[tokio::test]
    async fn empty_candidates_are_malformed() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1beta/models/m:generateContent"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(serde_json::json!({ "candidates": [] })),
            )
            .mount(&server)
            .await;

        let request = GenerateRequest {
            model: "m".into(),
            system_instruction: None,
            contents: vec![Turn::text(Role::User, "hi")],
            response_format: ResponseFormat::CaptionedJson,
        };
        let err = client(&server).generate(&request).await.unwrap_err();
        assert!(matches!(err, CoachError::MalformedResponse { .. }));
    }

    #[tokio::test]
    async fn deleting_a_missing_file_succeeds() {
        let server = MockServer::start().await;
        Mock::given(method("DELETE"))
            .and(path("/v1beta/files/gone"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        client(&server).delete("files/gone").await.unwrap();
    }

    #[test]
    fn mime_type_follows_extension() {
        assert_eq!(guess_mime_type(Path::new("a.MOV")), "video/quicktime");
        assert_eq!(guess_mime_type(Path::new("a.mp4")), "video/mp4");
        assert_eq!(guess_mime_type(Path::new("noext")), "video/mp4");
    }
}
