use std::sync::Arc;

use shared::domain::Document;
use tokio::sync::{broadcast, RwLock};
use tracing::{debug, info, warn};

use crate::{
    error::UploadError,
    events::SessionEvent,
    transport::{StudyBackend, UploadFile},
};

/// Documents the backend has acknowledged, in upload order.
///
/// Uploads are not serialized here; callers that need one upload at a time
/// go through the controller's upload orchestrator.
pub struct CorpusRegistry {
    backend: Arc<dyn StudyBackend>,
    documents: RwLock<Vec<Document>>,
    events: broadcast::Sender<SessionEvent>,
}

impl CorpusRegistry {
    pub fn new(backend: Arc<dyn StudyBackend>, events: broadcast::Sender<SessionEvent>) -> Self {
        Self {
            backend,
            documents: RwLock::new(Vec::new()),
            events,
        }
    }

    pub async fn list_documents(&self) -> Vec<String> {
        self.documents
            .read()
            .await
            .iter()
            .map(|document| document.name.clone())
            .collect()
    }

    pub async fn documents(&self) -> Vec<Document> {
        self.documents.read().await.clone()
    }

    pub async fn has_document(&self, name: &str) -> bool {
        self.documents
            .read()
            .await
            .iter()
            .any(|document| document.name == name)
    }

    pub async fn is_empty(&self) -> bool {
        self.documents.read().await.is_empty()
    }

    /// Rejects names that can never be registered, without touching the
    /// network.
    pub async fn check_new(&self, name: &str) -> Result<(), UploadError> {
        if name.trim().is_empty() {
            debug!("upload rejected: empty document name");
            return Err(UploadError::EmptyName);
        }
        if self.has_document(name).await {
            debug!(document = name, "upload rejected: already in corpus");
            return Err(UploadError::Duplicate(name.to_string()));
        }
        Ok(())
    }

    pub async fn register_upload(&self, file: UploadFile) -> Result<Document, UploadError> {
        let name = file.name.clone();
        self.check_new(&name).await?;

        self.backend
            .upload_document(file)
            .await
            .map_err(UploadError::Request)?;

        let document = {
            let mut documents = self.documents.write().await;
            // Another upload of the same name may have landed while this one
            // was on the wire.
            if documents.iter().any(|document| document.name == name) {
                warn!(document = %name, "upload acknowledged but name was registered concurrently");
                return Err(UploadError::Duplicate(name));
            }
            let document = Document::new(name);
            documents.push(document.clone());
            info!(
                document = %document.name,
                total = documents.len(),
                "document added to corpus"
            );
            document
        };

        let _ = self
            .events
            .send(SessionEvent::DocumentAdded(document.clone()));
        Ok(document)
    }
}

#[cfg(test)]
#[path = "tests/corpus_tests.rs"]
mod tests;
