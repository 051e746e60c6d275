/// Remote snapshot loading for the viewer.
///
/// The snapshot document (`{ "games": [...] }`) is fetched once per call.
/// Any failure along the way falls back to the local Library, then to
/// an empty catalog. Nothing here returns an error to the caller.
use reqwest::header::{CACHE_CONTROL, PRAGMA};
use serde_json::Value;
use std::future::Future;
use std::time::Duration;
use thiserror::Error;

use super::catalog::{games_array, sanitize_games, IdGenerator};
use super::data::CatalogEntry;
use super::library::{KeyValueStore, Library};

#[derive(Error, Debug)]
pub enum TransportError {
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),
}

/// What came back from the transport, before any interpretation
#[derive(Debug, Clone)]
pub struct SnapshotResponse {
    pub success: bool,
    pub body: String,
}

/// One GET of the snapshot document with caching disabled
pub trait SnapshotTransport {
    fn get(&self) -> impl Future<Output = Result<SnapshotResponse, TransportError>> + Send;
}

/// reqwest-backed transport
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
    url: String,
}

impl HttpTransport {
    pub fn new(url: impl Into<String>, timeout: Option<Duration>) -> Result<Self, TransportError> {
        let mut builder = reqwest::Client::builder();
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }

        Ok(Self {
            client: builder.build()?,
            url: url.into(),
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

impl SnapshotTransport for HttpTransport {
    fn get(&self) -> impl Future<Output = Result<SnapshotResponse, TransportError>> + Send {
        let request = self
            .client
            .get(&self.url)
            .header(CACHE_CONTROL, "no-store")
            .header(PRAGMA, "no-cache");

        async move {
            let response = request.send().await?;
            let success = response.status().is_success();
            let body = response.text().await?;
            Ok(SnapshotResponse { success, body })
        }
    }
}

/// Parse a snapshot body. `None` unless it is JSON with a `games` array.
pub fn parse_snapshot(body: &str) -> Option<Vec<CatalogEntry>> {
    let document: Value = match serde_json::from_str(body) {
        Ok(document) => document,
        Err(e) => {
            tracing::debug!("Snapshot body is not JSON: {}", e);
            return None;
        }
    };

    let Some(games) = games_array(&document) else {
        tracing::debug!("Snapshot document has no games array");
        return None;
    };

    Some(sanitize_games(games, &mut IdGenerator::new()))
}

/// Pick the freshest available catalog: snapshot, then Library, then empty
pub fn resolve<S: KeyValueStore>(
    fetched: Option<Vec<CatalogEntry>>,
    library: &Library<S>,
) -> Vec<CatalogEntry> {
    if let Some(entries) = fetched {
        return entries;
    }

    match library.read_catalog() {
        Ok(Some(entries)) => {
            tracing::debug!("Using {} locally stored entries", entries.len());
            entries
        }
        Ok(None) => Vec::new(),
        Err(e) => {
            tracing::warn!("⚠️  Local catalog unreadable, showing nothing: {}", e);
            Vec::new()
        }
    }
}

#[derive(Debug, Clone)]
pub struct RemoteSnapshotLoader<T> {
    transport: T,
}

impl<T: SnapshotTransport> RemoteSnapshotLoader<T> {
    pub fn new(transport: T) -> Self {
        Self { transport }
    }

    /// Single attempt at the remote snapshot. Never fails, only comes back empty-handed.
    pub async fn fetch(&self) -> Option<Vec<CatalogEntry>> {
        let response = match self.transport.get().await {
            Ok(response) => response,
            Err(e) => {
                tracing::debug!("Snapshot fetch failed, falling back: {}", e);
                return None;
            }
        };

        if !response.success {
            tracing::debug!("Snapshot request was not successful, falling back");
            return None;
        }

        let entries = parse_snapshot(&response.body)?;
        tracing::info!("🌐 Loaded {} entries from snapshot", entries.len());
        Some(entries)
    }
}
