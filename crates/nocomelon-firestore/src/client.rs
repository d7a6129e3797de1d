//! Firestore REST API client.
//!
//! Thin document client used by the checkpoint and library stores:
//! - Token caching with refresh margin and one refresh on expired tokens
//! - HTTP client tuning (pooling, timeouts)
//! - Exponential backoff with jitter around every call
//! - Tracing spans and request metrics
//!
//! Setting `FIRESTORE_EMULATOR_HOST` points the client at a local emulator
//! with a fixed bearer token.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use reqwest::{Client, RequestBuilder, Response, StatusCode};
use tracing::{debug, info_span, Instrument};

use crate::error::{FirestoreError, FirestoreResult};
use crate::metrics::record_request;
use crate::retry::{with_retry, RetryConfig};
use crate::token::{GcpTokenSource, StaticToken, TokenCache, TokenSource};
use crate::types::{Document, ListDocumentsResponse, Value};

/// Firestore client configuration.
#[derive(Debug, Clone)]
pub struct FirestoreConfig {
    /// GCP project ID
    pub project_id: String,
    /// Database ID (usually "(default)")
    pub database_id: String,
    /// Request timeout
    pub timeout: Duration,
    /// Connect timeout
    pub connect_timeout: Duration,
    /// Retry configuration
    pub retry: RetryConfig,
    /// `host:port` of a Firestore emulator
    pub emulator_host: Option<String>,
}

impl FirestoreConfig {
    /// Create config from environment variables.
    pub fn from_env() -> FirestoreResult<Self> {
        let project_id = std::env::var("GCP_PROJECT_ID")
            .or_else(|_| std::env::var("FIREBASE_PROJECT_ID"))
            .map_err(|_| {
                FirestoreError::auth_error(
                    "GCP_PROJECT_ID or FIREBASE_PROJECT_ID must be set to access Firestore",
                )
            })?;

        if project_id.is_empty() {
            return Err(FirestoreError::auth_error(
                "GCP_PROJECT_ID or FIREBASE_PROJECT_ID cannot be empty",
            ));
        }

        let connect_timeout_secs: u64 = std::env::var("FIRESTORE_CONNECT_TIMEOUT_SECS")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(5);

        Ok(Self {
            project_id,
            database_id: std::env::var("FIRESTORE_DATABASE_ID")
                .unwrap_or_else(|_| "(default)".to_string()),
            timeout: Duration::from_secs(30),
            connect_timeout: Duration::from_secs(connect_timeout_secs),
            retry: RetryConfig::from_env(),
            emulator_host: std::env::var("FIRESTORE_EMULATOR_HOST")
                .ok()
                .filter(|h| !h.is_empty()),
        })
    }

    /// Config for a project with default timeouts.
    pub fn for_project(project_id: impl Into<String>) -> Self {
        Self {
            project_id: project_id.into(),
            database_id: "(default)".to_string(),
            timeout: Duration::from_secs(30),
            connect_timeout: Duration::from_secs(5),
            retry: RetryConfig::default(),
            emulator_host: None,
        }
    }

    fn documents_url(&self, origin: &str) -> String {
        format!(
            "{}/v1/projects/{}/databases/{}/documents",
            origin.trim_end_matches('/'),
            self.project_id,
            self.database_id
        )
    }
}

/// Firestore REST API client.
#[derive(Clone)]
pub struct FirestoreClient {
    http: Client,
    config: FirestoreConfig,
    base_url: String,
    token_cache: Arc<TokenCache>,
}

impl FirestoreClient {
    /// Create a client against Google Cloud, or the emulator when configured.
    pub async fn new(config: FirestoreConfig) -> FirestoreResult<Self> {
        match config.emulator_host.clone() {
            Some(host) => {
                let origin = format!("http://{}", host);
                Self::with_origin(config, &origin, Arc::new(StaticToken("owner".to_string())))
            }
            None => {
                let source = GcpTokenSource::from_env().await?;
                Self::with_origin(config, "https://firestore.googleapis.com", Arc::new(source))
            }
        }
    }

    /// Create from environment variables.
    pub async fn from_env() -> FirestoreResult<Self> {
        let config = FirestoreConfig::from_env()?;
        Self::new(config).await
    }

    /// Create a client for an explicit origin and token source.
    pub fn with_origin(
        config: FirestoreConfig,
        origin: &str,
        tokens: Arc<dyn TokenSource>,
    ) -> FirestoreResult<Self> {
        let http = Client::builder()
            .timeout(config.timeout)
            .connect_timeout(config.connect_timeout)
            .pool_idle_timeout(Duration::from_secs(90))
            .pool_max_idle_per_host(10)
            .user_agent(concat!("nocomelon-firestore/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(FirestoreError::Network)?;

        let base_url = config.documents_url(origin);

        Ok(Self {
            http,
            config,
            base_url,
            token_cache: Arc::new(TokenCache::new(tokens)),
        })
    }

    pub fn config(&self) -> &FirestoreConfig {
        &self.config
    }

    fn is_access_token_expired(body: &str) -> bool {
        body.contains("ACCESS_TOKEN_EXPIRED") || body.contains("\"UNAUTHENTICATED\"")
    }

    fn document_path(&self, collection: &str, doc_id: &str) -> String {
        format!("{}/{}/{}", self.base_url, collection, doc_id)
    }

    /// Send a request, refreshing the token once if the server reports it
    /// expired.
    async fn send<B>(&self, url: &str, build: B) -> FirestoreResult<Response>
    where
        B: Fn(&str) -> RequestBuilder,
    {
        let token = self.token_cache.get_token().await?;
        let response = build(token.as_str()).send().await?;
        if response.status() != StatusCode::UNAUTHORIZED {
            return Ok(response);
        }

        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        if !Self::is_access_token_expired(&body) {
            return Err(FirestoreError::from_http_status(
                status.as_u16(),
                format!("{} failed: {}", url, body),
            ));
        }

        debug!("Firestore token rejected as expired, refreshing");
        self.token_cache.invalidate().await;
        let token = self.token_cache.get_token().await?;
        Ok(build(token.as_str()).send().await?)
    }

    /// Get a document. Missing documents are `None`.
    pub async fn get_document(
        &self,
        collection: &str,
        doc_id: &str,
    ) -> FirestoreResult<Option<Document>> {
        let url = self.document_path(collection, doc_id);

        self.with_retry("get_document", || {
            self.execute_request("get_document", collection, Some(doc_id), async {
                let response = self
                    .send(&url, |token| self.http.get(&url).bearer_auth(token))
                    .await?;

                match response.status() {
                    StatusCode::OK => Ok(Some(response.json::<Document>().await?)),
                    StatusCode::NOT_FOUND => Ok(None),
                    status => Err(Self::handle_error_response(status, &url, response).await),
                }
            })
        })
        .await
    }

    /// Create or replace a document.
    ///
    /// Without an update mask Firestore replaces the whole field map, which
    /// is what callers that merge client-side want.
    pub async fn upsert_document(
        &self,
        collection: &str,
        doc_id: &str,
        fields: HashMap<String, Value>,
    ) -> FirestoreResult<Document> {
        let url = self.document_path(collection, doc_id);
        let body = Document::new(fields);

        self.with_retry("upsert_document", || {
            self.execute_request("upsert_document", collection, Some(doc_id), async {
                let response = self
                    .send(&url, |token| self.http.patch(&url).bearer_auth(token).json(&body))
                    .await?;

                match response.status() {
                    StatusCode::OK => Ok(response.json::<Document>().await?),
                    status => Err(Self::handle_error_response(status, &url, response).await),
                }
            })
        })
        .await
    }

    /// Delete a document. Deleting a missing document succeeds.
    pub async fn delete_document(&self, collection: &str, doc_id: &str) -> FirestoreResult<()> {
        let url = self.document_path(collection, doc_id);

        self.with_retry("delete_document", || {
            self.execute_request("delete_document", collection, Some(doc_id), async {
                let response = self
                    .send(&url, |token| self.http.delete(&url).bearer_auth(token))
                    .await?;

                match response.status() {
                    StatusCode::OK | StatusCode::NO_CONTENT => Ok(()),
                    StatusCode::NOT_FOUND => {
                        debug!("Document {}/{} already deleted (idempotent)", collection, doc_id);
                        Ok(())
                    }
                    status => Err(Self::handle_error_response(status, &url, response).await),
                }
            })
        })
        .await
    }

    /// List one page of documents in a collection.
    pub async fn list_documents(
        &self,
        collection: &str,
        page_size: Option<u32>,
        page_token: Option<&str>,
    ) -> FirestoreResult<ListDocumentsResponse> {
        let url = format!("{}/{}", self.base_url, collection);
        let mut params: Vec<(&str, String)> = Vec::new();
        if let Some(size) = page_size {
            params.push(("pageSize", size.to_string()));
        }
        if let Some(token) = page_token {
            params.push(("pageToken", token.to_string()));
        }

        self.with_retry("list_documents", || {
            self.execute_request("list_documents", collection, None, async {
                let response = self
                    .send(&url, |token| {
                        self.http.get(&url).query(&params).bearer_auth(token)
                    })
                    .await?;

                match response.status() {
                    StatusCode::OK => Ok(response.json::<ListDocumentsResponse>().await?),
                    status => Err(Self::handle_error_response(status, &url, response).await),
                }
            })
        })
        .await
    }

    /// Every document in a collection, following page tokens.
    pub async fn list_all_documents(
        &self,
        collection: &str,
        page_size: u32,
    ) -> FirestoreResult<Vec<Document>> {
        let mut documents = Vec::new();
        let mut page_token: Option<String> = None;

        loop {
            let page = self
                .list_documents(collection, Some(page_size), page_token.as_deref())
                .await?;
            documents.extend(page.documents.unwrap_or_default());
            match page.next_page_token.filter(|t| !t.is_empty()) {
                Some(next) => page_token = Some(next),
                None => break,
            }
        }

        Ok(documents)
    }

    /// Reachability probe used by status endpoints.
    pub async fn check_connectivity(&self) -> FirestoreResult<()> {
        self.list_documents("users", Some(1), None).await.map(|_| ())
    }

    async fn with_retry<T, F, Fut>(&self, operation: &str, op: F) -> FirestoreResult<T>
    where
        F: Fn() -> Fut,
        Fut: std::future::Future<Output = FirestoreResult<T>>,
    {
        with_retry(&self.config.retry, operation, op).await
    }

    /// Execute a request with tracing and metrics.
    async fn execute_request<T, F>(
        &self,
        operation: &str,
        collection: &str,
        doc_id: Option<&str>,
        fut: F,
    ) -> FirestoreResult<T>
    where
        F: std::future::Future<Output = FirestoreResult<T>>,
    {
        let span = match doc_id {
            Some(id) => info_span!(
                "firestore_request",
                operation = %operation,
                collection = %collection,
                doc_id = %id
            ),
            None => info_span!("firestore_request", operation = %operation, collection = %collection),
        };

        let start = Instant::now();
        let result = fut.instrument(span).await;
        let latency_ms = start.elapsed().as_millis() as f64;

        let status = match &result {
            Ok(_) => 200,
            Err(e) => e.http_status().unwrap_or(500),
        };
        record_request(operation, status, latency_ms);

        result
    }

    async fn handle_error_response(
        status: StatusCode,
        url: &str,
        response: Response,
    ) -> FirestoreError {
        let body = response.text().await.unwrap_or_default();
        FirestoreError::from_http_status(status.as_u16(), format!("{} failed: {}", url, body))
    }
}
