//! Document collaborators: metadata source, classifier and text loader.

use async_trait::async_trait;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;
use vouch_core::{Classification, DocumentRef};

/// Separator placed between pages of loaded text.
pub const PAGE_SEPARATOR: &str = "   ";

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DocumentError {
    #[error("Document {0} not found")]
    NotFound(String),

    #[error("Document service failed: {0}")]
    Service(String),

    #[error("Document text could not be read: {0}")]
    Unreadable(String),
}

/// Looks documents up by id.
#[async_trait]
pub trait DocumentSource: Send + Sync {
    async fn fetch(&self, document_id: &str) -> Result<DocumentRef, DocumentError>;
}

/// Assigns a document its analysis tier.
#[async_trait]
pub trait Classifier: Send + Sync {
    async fn classify(&self, document_id: &str) -> Result<Classification, DocumentError>;
}

/// Turns a document URL into plain text.
#[async_trait]
pub trait TextLoader: Send + Sync {
    async fn load_text(&self, url: &str) -> Result<String, DocumentError>;
}

/// Join extracted pages into one text, dropping blank pages.
pub fn join_pages<I, S>(pages: I) -> String
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    pages
        .into_iter()
        .filter(|p| !p.as_ref().trim().is_empty())
        .map(|p| p.as_ref().trim().to_string())
        .collect::<Vec<_>>()
        .join(PAGE_SEPARATOR)
}

/// A document known to [`InMemoryDocuments`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredDocument {
    #[serde(flatten)]
    pub document: DocumentRef,

    /// Raw tier as the classifier would report it
    pub tier: i64,

    /// Pages of text behind `document.url`
    #[serde(default)]
    pub pages: Vec<String>,
}

/// Documents held in memory, serving all three collaborator roles.
///
/// Loaded from a YAML list of [`StoredDocument`]s for local runs.
#[derive(Default)]
pub struct InMemoryDocuments {
    documents: RwLock<HashMap<String, StoredDocument>>,
}

impl InMemoryDocuments {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_yaml(yaml: &str) -> Result<Self, serde_yaml::Error> {
        let documents: Vec<StoredDocument> = serde_yaml::from_str(yaml)?;
        let store = Self::new();
        for doc in documents {
            store.insert(doc);
        }
        Ok(store)
    }

    pub fn insert(&self, document: StoredDocument) {
        self.documents
            .write()
            .insert(document.document.id.clone(), document);
    }

    pub fn len(&self) -> usize {
        self.documents.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.read().is_empty()
    }

    fn get(&self, document_id: &str) -> Result<StoredDocument, DocumentError> {
        self.documents
            .read()
            .get(document_id)
            .cloned()
            .ok_or_else(|| DocumentError::NotFound(document_id.to_string()))
    }
}

#[async_trait]
impl DocumentSource for InMemoryDocuments {
    async fn fetch(&self, document_id: &str) -> Result<DocumentRef, DocumentError> {
        self.get(document_id).map(|d| d.document)
    }
}

#[async_trait]
impl Classifier for InMemoryDocuments {
    async fn classify(&self, document_id: &str) -> Result<Classification, DocumentError> {
        let doc = self.get(document_id)?;
        Ok(Classification {
            tier: doc.tier,
            url: doc.document.url,
        })
    }
}

#[async_trait]
impl TextLoader for InMemoryDocuments {
    async fn load_text(&self, url: &str) -> Result<String, DocumentError> {
        let documents = self.documents.read();
        let doc = documents
            .values()
            .find(|d| d.document.url == url)
            .ok_or_else(|| DocumentError::NotFound(url.to_string()))?;

        let text = join_pages(&doc.pages);
        if text.is_empty() {
            return Err(DocumentError::Unreadable(url.to_string()));
        }
        Ok(text)
    }
}

#[cfg(feature = "http")]
pub use http::{HttpDocumentService, HttpTextLoader};

#[cfg(feature = "http")]
mod http {
    use super::*;
    use serde_json::json;
    use std::time::Duration;

    fn client(timeout: Duration) -> Result<reqwest::Client, DocumentError> {
        reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| DocumentError::Service(e.to_string()))
    }

    async fn get_json<T: serde::de::DeserializeOwned>(
        client: &reqwest::Client,
        url: &str,
        document_id: &str,
    ) -> Result<T, DocumentError> {
        let response = client
            .get(url)
            .send()
            .await
            .map_err(|e| DocumentError::Service(e.to_string()))?;

        match response.status().as_u16() {
            200..=299 => response
                .json()
                .await
                .map_err(|e| DocumentError::Service(e.to_string())),
            404 => Err(DocumentError::NotFound(document_id.to_string())),
            status => Err(DocumentError::Service(format!("HTTP {status} from {url}"))),
        }
    }

    /// Document metadata and classification over HTTP.
    pub struct HttpDocumentService {
        client: reqwest::Client,
        base_url: String,
    }

    impl HttpDocumentService {
        pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, DocumentError> {
            Ok(Self {
                client: client(timeout)?,
                base_url: base_url.into().trim_end_matches('/').to_string(),
            })
        }
    }

    #[async_trait]
    impl DocumentSource for HttpDocumentService {
        async fn fetch(&self, document_id: &str) -> Result<DocumentRef, DocumentError> {
            let url = format!("{}/documents/{}", self.base_url, document_id);
            get_json(&self.client, &url, document_id).await
        }
    }

    #[async_trait]
    impl Classifier for HttpDocumentService {
        async fn classify(&self, document_id: &str) -> Result<Classification, DocumentError> {
            let url = format!("{}/documents/{}/classification", self.base_url, document_id);
            get_json(&self.client, &url, document_id).await
        }
    }

    #[derive(Deserialize)]
    struct TextResponse {
        pages: Vec<String>,
    }

    /// Text extraction delegated to a service that reads the file at a URL.
    pub struct HttpTextLoader {
        client: reqwest::Client,
        endpoint: String,
    }

    impl HttpTextLoader {
        pub fn new(endpoint: impl Into<String>, timeout: Duration) -> Result<Self, DocumentError> {
            Ok(Self {
                client: client(timeout)?,
                endpoint: endpoint.into(),
            })
        }
    }

    #[async_trait]
    impl TextLoader for HttpTextLoader {
        async fn load_text(&self, url: &str) -> Result<String, DocumentError> {
            let response = self
                .client
                .post(&self.endpoint)
                .json(&json!({ "url": url }))
                .send()
                .await
                .map_err(|e| DocumentError::Service(e.to_string()))?;

            if !response.status().is_success() {
                return Err(DocumentError::Service(format!(
                    "HTTP {} from text service",
                    response.status()
                )));
            }

            let body: TextResponse = response
                .json()
                .await
                .map_err(|e| DocumentError::Service(e.to_string()))?;

            let text = join_pages(body.pages);
            if text.is_empty() {
                return Err(DocumentError::Unreadable(url.to_string()));
            }
            Ok(text)
        }
    }
}
