//! Boundary to the study backend: the [`StudyBackend`] trait and its
//! HTTP implementation.

use std::path::Path;

use async_trait::async_trait;
use reqwest::{multipart, Client, Response};
use serde::de::DeserializeOwned;
use shared::{
    domain::{FlashcardItem, QuizItem},
    protocol::{
        AskRequest, AskResponse, FlashcardsResponse, QuizResponse, CHAT_ROUTE, FLASHCARDS_ROUTE,
        QUIZ_ROUTE, UPLOAD_FIELD, UPLOAD_ROUTE,
    },
};
use tracing::debug;
use url::Url;

use crate::{config::ClientConfig, error::BackendError};

#[derive(Debug, Clone)]
pub struct UploadFile {
    pub name: String,
    pub bytes: Vec<u8>,
    pub mime_type: Option<String>,
}

impl UploadFile {
    pub fn new(name: impl Into<String>, bytes: Vec<u8>) -> Self {
        let name = name.into();
        let mime_type = mime_type_for(&name);
        Self {
            name,
            bytes,
            mime_type,
        }
    }

    /// Reads a file from disk; the upload name is the file's own name.
    pub async fn from_path(path: &Path) -> std::io::Result<Self> {
        let bytes = tokio::fs::read(path).await?;
        let name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();
        Ok(Self::new(name, bytes))
    }
}

fn mime_type_for(name: &str) -> Option<String> {
    let extension = Path::new(name).extension()?.to_str()?.to_ascii_lowercase();
    match extension.as_str() {
        "pdf" => Some("application/pdf".to_string()),
        "txt" => Some("text/plain".to_string()),
        "md" => Some("text/markdown".to_string()),
        _ => None,
    }
}

#[async_trait]
pub trait StudyBackend: Send + Sync {
    async fn upload_document(&self, file: UploadFile) -> Result<(), BackendError>;
    async fn ask(&self, query: &str) -> Result<String, BackendError>;
    async fn generate_flashcards(&self) -> Result<Vec<FlashcardItem>, BackendError>;
    async fn generate_quiz(&self) -> Result<Vec<QuizItem>, BackendError>;
}

pub struct MissingStudyBackend;

#[async_trait]
impl StudyBackend for MissingStudyBackend {
    async fn upload_document(&self, _file: UploadFile) -> Result<(), BackendError> {
        Err(BackendError::Transport("study backend is unavailable".into()))
    }

    async fn ask(&self, _query: &str) -> Result<String, BackendError> {
        Err(BackendError::Transport("study backend is unavailable".into()))
    }

    async fn generate_flashcards(&self) -> Result<Vec<FlashcardItem>, BackendError> {
        Err(BackendError::Transport("study backend is unavailable".into()))
    }

    async fn generate_quiz(&self) -> Result<Vec<QuizItem>, BackendError> {
        Err(BackendError::Transport("study backend is unavailable".into()))
    }
}

pub struct HttpBackend {
    http: Client,
    server_url: Url,
}

impl HttpBackend {
    pub fn new(config: &ClientConfig) -> Result<Self, BackendError> {
        let http = Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|err| BackendError::Transport(err.to_string()))?;
        Ok(Self {
            http,
            server_url: config.server_url.clone(),
        })
    }

    pub fn server_url(&self) -> &Url {
        &self.server_url
    }

    fn endpoint(&self, route: &str) -> String {
        format!("{}{route}", self.server_url.as_str().trim_end_matches('/'))
    }

    async fn post_without_body<T: DeserializeOwned>(&self, route: &str) -> Result<T, BackendError> {
        let res = self
            .http
            .post(self.endpoint(route))
            .send()
            .await
            .map_err(transport_error)?;
        decode_json(ensure_success(res)?).await
    }
}

fn transport_error(err: reqwest::Error) -> BackendError {
    BackendError::Transport(err.to_string())
}

fn ensure_success(res: Response) -> Result<Response, BackendError> {
    let status = res.status();
    if status.is_success() {
        Ok(res)
    } else {
        debug!(status = status.as_u16(), url = %res.url(), "study server returned error status");
        Err(BackendError::Status {
            status: status.as_u16(),
        })
    }
}

async fn decode_json<T: DeserializeOwned>(res: Response) -> Result<T, BackendError> {
    let body = res.bytes().await.map_err(transport_error)?;
    serde_json::from_slice(&body).map_err(|err| BackendError::Decode(err.to_string()))
}

#[async_trait]
impl StudyBackend for HttpBackend {
    async fn upload_document(&self, file: UploadFile) -> Result<(), BackendError> {
        let mut part = multipart::Part::bytes(file.bytes).file_name(file.name);
        if let Some(mime_type) = file.mime_type.as_deref() {
            part = part
                .mime_str(mime_type)
                .map_err(|err| BackendError::Transport(err.to_string()))?;
        }
        let form = multipart::Form::new().part(UPLOAD_FIELD, part);

        let res = self
            .http
            .post(self.endpoint(UPLOAD_ROUTE))
            .multipart(form)
            .send()
            .await
            .map_err(transport_error)?;
        ensure_success(res)?;
        Ok(())
    }

    async fn ask(&self, query: &str) -> Result<String, BackendError> {
        let res = self
            .http
            .post(self.endpoint(CHAT_ROUTE))
            .json(&AskRequest {
                query: query.to_string(),
            })
            .send()
            .await
            .map_err(transport_error)?;
        let body: AskResponse = decode_json(ensure_success(res)?).await?;
        Ok(body.response)
    }

    async fn generate_flashcards(&self) -> Result<Vec<FlashcardItem>, BackendError> {
        let body: FlashcardsResponse = self.post_without_body(FLASHCARDS_ROUTE).await?;
        Ok(body.flashcards)
    }

    async fn generate_quiz(&self) -> Result<Vec<QuizItem>, BackendError> {
        let body: QuizResponse = self.post_without_body(QUIZ_ROUTE).await?;
        Ok(body.quiz)
    }
}

#[cfg(test)]
#[path = "tests/transport_tests.rs"]
mod tests;
