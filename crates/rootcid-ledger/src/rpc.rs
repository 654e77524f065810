use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::debug;

use crate::error::{LedgerError, LedgerResult};

#[derive(Deserialize)]
struct RpcResponse {
    #[serde(default)]
    result: Option<Value>,
    #[serde(default)]
    error: Option<RpcErrorObject>,
}

#[derive(Debug, Deserialize)]
struct RpcErrorObject {
    code: i64,
    message: String,
}

/// JSON-RPC 2.0 client over HTTP.
///
/// Transport failures and non-success statuses are `Unavailable`; error
/// objects returned by the node (reverts, invalid parameters) are `Rejected`.
pub struct JsonRpcClient {
    client: reqwest::Client,
    url: String,
    next_id: AtomicU64,
}

impl JsonRpcClient {
    pub fn new(url: impl Into<String>, timeout: Duration) -> LedgerResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| LedgerError::unavailable(format!("http client: {e}")))?;
        Ok(Self {
            client,
            url: url.into(),
            next_id: AtomicU64::new(1),
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Invoke `method` and decode its `result`.
    pub async fn call<T: DeserializeOwned>(&self, method: &str, params: Value) -> LedgerResult<T> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let request = json!({
            "jsonrpc": "2.0",
            "id": id,
            "method": method,
            "params": params,
        });
        debug!(method, id, "json-rpc call");

        let response = self
            .client
            .post(&self.url)
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    LedgerError::unavailable(format!("{method} timed out: {e}"))
                } else {
                    LedgerError::unavailable(format!("{method}: {e}"))
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(LedgerError::unavailable(format!(
                "{method} returned HTTP {status}"
            )));
        }

        let body: RpcResponse = response
            .json()
            .await
            .map_err(|e| LedgerError::unavailable(format!("{method}: malformed response: {e}")))?;
        if let Some(error) = body.error {
            return Err(LedgerError::rejected(format!(
                "{method} failed ({}): {}",
                error.code, error.message
            )));
        }
        serde_json::from_value(body.result.unwrap_or(Value::Null))
            .map_err(|e| LedgerError::unavailable(format!("{method}: unexpected result: {e}")))
    }
}
