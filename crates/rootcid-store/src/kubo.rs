use std::time::Duration;

use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use rootcid_crypto::ContentHasher;
use rootcid_types::Fingerprint;

use crate::error::{StoreError, StoreResult};
use crate::traits::ContentStore;

/// Kubo RPC endpoint paths.
pub mod endpoints {
    pub const ADD: &str = "/api/v0/add";
    pub const CAT: &str = "/api/v0/cat";
    pub const PIN_RM: &str = "/api/v0/pin/rm";
    pub const PIN_LS: &str = "/api/v0/pin/ls";
}

/// Largest chunk Kubo accepts; documents up to this size are stored as one raw block.
pub const MAX_BLOCK_BYTES: usize = 1024 * 1024;

/// Connection settings for a Kubo node.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct KuboConfig {
    /// Base URL of the RPC API, e.g. `http://127.0.0.1:5001`.
    pub api_url: String,
    /// Per-request timeout.
    #[serde(with = "rootcid_types::duration::millis")]
    pub timeout: Duration,
    /// Documents larger than this are rejected before upload.
    pub max_document_bytes: usize,
    /// Issue `cat` with `offline=true` so missing content fails fast.
    pub offline_reads: bool,
}

impl Default for KuboConfig {
    fn default() -> Self {
        Self {
            api_url: "http://127.0.0.1:5001".into(),
            timeout: Duration::from_secs(10),
            max_document_bytes: MAX_BLOCK_BYTES,
            offline_reads: true,
        }
    }
}

#[derive(Deserialize)]
struct AddResponse {
    #[serde(rename = "Hash")]
    hash: String,
}

#[derive(Deserialize)]
struct KuboErrorBody {
    #[serde(rename = "Message")]
    message: String,
}

/// Content store backed by the IPFS Kubo RPC API.
///
/// Documents are added as a single raw leaf with a BLAKE3 multihash so the
/// CID returned by the node equals the locally computed [`Fingerprint`].
pub struct KuboContentStore {
    client: reqwest::Client,
    config: KuboConfig,
}

impl KuboContentStore {
    pub fn new(config: KuboConfig) -> StoreResult<Self> {
        if config.max_document_bytes > MAX_BLOCK_BYTES {
            return Err(StoreError::rejected(format!(
                "max_document_bytes {} exceeds single-block limit {MAX_BLOCK_BYTES}",
                config.max_document_bytes
            )));
        }
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| StoreError::unavailable(format!("http client: {e}")))?;
        Ok(Self { client, config })
    }

    pub fn config(&self) -> &KuboConfig {
        &self.config
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.config.api_url.trim_end_matches('/'), path)
    }

    async fn call(&self, path: &str, query: &[(&str, String)]) -> StoreResult<reqwest::Response> {
        debug!(endpoint = path, "kubo rpc");
        self.client
            .post(self.url(path))
            .query(query)
            .send()
            .await
            .map_err(transport_error)
    }

    /// Best-effort removal of a pin we did not intend to create.
    async fn unpin_cid(&self, cid: &str) {
        let result = self.call(endpoints::PIN_RM, &[("arg", cid.to_string())]).await;
        if let Err(e) = result {
            warn!(cid, error = %e, "failed to release stray pin");
        }
    }
}

#[async_trait]
impl ContentStore for KuboContentStore {
    fn name(&self) -> &'static str {
        "kubo"
    }

    async fn put(&self, data: &[u8]) -> StoreResult<Fingerprint> {
        if data.len() > self.config.max_document_bytes {
            return Err(StoreError::rejected(format!(
                "document of {} bytes exceeds limit of {}",
                data.len(),
                self.config.max_document_bytes
            )));
        }
        let expected = ContentHasher::fingerprint(data);

        let part = Part::bytes(data.to_vec())
            .file_name("data.json")
            .mime_str("application/json")
            .map_err(|e| StoreError::rejected(e.to_string()))?;
        let query = [
            ("pin", "true".to_string()),
            ("cid-version", "1".to_string()),
            ("raw-leaves", "true".to_string()),
            ("hash", "blake3".to_string()),
            ("cid-base", "base16".to_string()),
            ("chunker", format!("size-{MAX_BLOCK_BYTES}")),
        ];
        debug!(endpoint = endpoints::ADD, bytes = data.len(), "kubo rpc");
        let response = self
            .client
            .post(self.url(endpoints::ADD))
            .query(&query)
            .multipart(Form::new().part("file", part))
            .send()
            .await
            .map_err(transport_error)?;

        let status = response.status();
        if status == StatusCode::BAD_REQUEST {
            return Err(StoreError::rejected(error_message(response).await));
        }
        if !status.is_success() {
            return Err(StoreError::unavailable(format!(
                "add returned {status}: {}",
                error_message(response).await
            )));
        }

        let body: AddResponse = response
            .json()
            .await
            .map_err(|e| StoreError::unavailable(format!("malformed add response: {e}")))?;
        match Fingerprint::parse(&body.hash) {
            Ok(actual) if actual == expected => Ok(actual),
            Ok(actual) => {
                self.unpin_cid(&body.hash).await;
                Err(StoreError::rejected(format!(
                    "store addressed content as {actual}, expected {expected}"
                )))
            }
            Err(e) => {
                self.unpin_cid(&body.hash).await;
                Err(StoreError::rejected(format!(
                    "store returned unsupported CID: {e}"
                )))
            }
        }
    }

    async fn get(&self, fingerprint: &Fingerprint) -> StoreResult<Vec<u8>> {
        let mut query = vec![("arg", fingerprint.to_cid_string())];
        if self.config.offline_reads {
            query.push(("offline", "true".to_string()));
        }
        let response = self.call(endpoints::CAT, &query).await?;

        let status = response.status();
        if status.is_success() {
            let bytes = response.bytes().await.map_err(transport_error)?;
            return Ok(bytes.to_vec());
        }
        let message = error_message(response).await;
        if status == StatusCode::INTERNAL_SERVER_ERROR && is_missing(&message) {
            return Err(StoreError::NotFound(*fingerprint));
        }
        Err(StoreError::unavailable(format!("cat returned {status}: {message}")))
    }

    async fn unpin(&self, fingerprint: &Fingerprint) -> StoreResult<()> {
        let response = self
            .call(endpoints::PIN_RM, &[("arg", fingerprint.to_cid_string())])
            .await?;

        let status = response.status();
        if status.is_success() {
            return Ok(());
        }
        let message = error_message(response).await;
        if status == StatusCode::INTERNAL_SERVER_ERROR && is_unpinned(&message) {
            debug!(%fingerprint, "already unpinned");
            return Ok(());
        }
        Err(StoreError::unavailable(format!("pin/rm returned {status}: {message}")))
    }

    async fn is_pinned(&self, fingerprint: &Fingerprint) -> StoreResult<bool> {
        let query = [
            ("arg", fingerprint.to_cid_string()),
            ("type", "recursive".to_string()),
        ];
        let response = self.call(endpoints::PIN_LS, &query).await?;

        let status = response.status();
        if status.is_success() {
            return Ok(true);
        }
        let message = error_message(response).await;
        if status == StatusCode::INTERNAL_SERVER_ERROR
            && (is_unpinned(&message) || is_missing(&message))
        {
            return Ok(false);
        }
        Err(StoreError::unavailable(format!("pin/ls returned {status}: {message}")))
    }
}

fn transport_error(e: reqwest::Error) -> StoreError {
    if e.is_timeout() {
        StoreError::unavailable(format!("request timed out: {e}"))
    } else {
        StoreError::unavailable(e.to_string())
    }
}

async fn error_message(response: reqwest::Response) -> String {
    let text = response.text().await.unwrap_or_default();
    match serde_json::from_str::<KuboErrorBody>(&text) {
        Ok(body) => body.message,
        Err(_) => text,
    }
}

fn is_missing(message: &str) -> bool {
    let message = message.to_ascii_lowercase();
    message.contains("not found") || message.contains("no link named")
}

fn is_unpinned(message: &str) -> bool {
    message.to_ascii_lowercase().contains("not pinned")
}
