use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{debug, info, warn};

use rootcid_types::{CommitReceipt, Fingerprint, RootEvent, RootPointer};

use crate::abi;
use crate::error::{LedgerError, LedgerResult};
use crate::rpc::JsonRpcClient;
use crate::traits::RootLedger;

/// Connection settings for the `Registry` contract.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ContractConfig {
    /// JSON-RPC endpoint of the node, e.g. `http://127.0.0.1:8545`.
    pub rpc_url: String,
    /// Address of the deployed `Registry` contract.
    pub contract_address: String,
    /// Unlocked node account that signs `setRootCID` transactions.
    pub from: String,
    /// Gas limit for `setRootCID`.
    pub gas: u64,
    /// Per-request timeout.
    #[serde(with = "rootcid_types::duration::millis")]
    pub timeout: Duration,
    /// How long to wait for a submitted transaction to be mined.
    #[serde(with = "rootcid_types::duration::millis")]
    pub confirmation_timeout: Duration,
    /// Interval between receipt polls.
    #[serde(with = "rootcid_types::duration::millis")]
    pub poll_interval: Duration,
}

impl Default for ContractConfig {
    fn default() -> Self {
        Self {
            rpc_url: "http://127.0.0.1:8545".into(),
            contract_address: String::new(),
            from: String::new(),
            gas: 3_000_000,
            timeout: Duration::from_secs(10),
            confirmation_timeout: Duration::from_secs(60),
            poll_interval: Duration::from_millis(500),
        }
    }
}

/// Deployment record written by the contract deploy script.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Deployment {
    pub address: String,
    #[serde(default)]
    pub abi: Value,
}

impl Deployment {
    pub fn from_json_str(s: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(s)
    }

    /// Load `deployed-contract.json`.
    pub fn load(path: &Path) -> std::io::Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json_str(&text)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TransactionReceipt {
    transaction_hash: String,
    block_number: Option<String>,
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    logs: Vec<Log>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Log {
    address: String,
    #[serde(default)]
    topics: Vec<String>,
    data: String,
    #[serde(default)]
    block_number: Option<String>,
    #[serde(default)]
    transaction_hash: Option<String>,
}

impl Log {
    fn is_root_set(&self, contract: &str) -> bool {
        self.address.eq_ignore_ascii_case(contract)
            && self
                .topics
                .first()
                .is_some_and(|t| t.eq_ignore_ascii_case(abi::ROOT_CID_SET_TOPIC))
    }

    fn fingerprint(&self) -> LedgerResult<Fingerprint> {
        let value = abi::decode_string(&self.data)
            .map_err(|e| LedgerError::rejected(format!("undecodable RootCIDSet event: {e}")))?;
        Fingerprint::parse(&value)
            .map_err(|e| LedgerError::rejected(format!("RootCIDSet carried {value:?}: {e}")))
    }
}

/// The `Registry` smart contract accessed over Ethereum JSON-RPC.
///
/// Reads use `eth_call`; writes use `eth_sendTransaction` from an unlocked
/// node account and then poll `eth_getTransactionReceipt` until the
/// transaction is mined, so a returned receipt is always durable.
pub struct RegistryContract {
    rpc: JsonRpcClient,
    config: ContractConfig,
}

impl RegistryContract {
    pub fn new(config: ContractConfig) -> LedgerResult<Self> {
        let rpc = JsonRpcClient::new(config.rpc_url.clone(), config.timeout)?;
        Ok(Self { rpc, config })
    }

    pub fn config(&self) -> &ContractConfig {
        &self.config
    }

    async fn wait_for_receipt(&self, tx_hash: &str) -> LedgerResult<TransactionReceipt> {
        let poll = async {
            loop {
                let receipt: Option<TransactionReceipt> = self
                    .rpc
                    .call("eth_getTransactionReceipt", json!([tx_hash]))
                    .await?;
                match receipt {
                    Some(receipt) if receipt.block_number.is_some() => return Ok(receipt),
                    _ => tokio::time::sleep(self.config.poll_interval).await,
                }
            }
        };
        tokio::time::timeout(self.config.confirmation_timeout, poll)
            .await
            .map_err(|_| {
                LedgerError::unavailable(format!(
                    "transaction {tx_hash} not confirmed within {:?}",
                    self.config.confirmation_timeout
                ))
            })?
    }
}

fn block_of(quantity: Option<&str>) -> LedgerResult<u64> {
    let quantity = quantity.ok_or_else(|| LedgerError::unavailable("log without block number"))?;
    abi::parse_quantity(quantity)
        .map_err(|e| LedgerError::unavailable(format!("bad block number {quantity:?}: {e}")))
}

#[async_trait]
impl RootLedger for RegistryContract {
    fn name(&self) -> &'static str {
        "registry-contract"
    }

    async fn read_current(&self) -> LedgerResult<RootPointer> {
        let call = json!({
            "to": self.config.contract_address,
            "data": abi::encode_call(abi::GET_ROOT_CID),
        });
        let data: String = self.rpc.call("eth_call", json!([call, "latest"])).await?;
        let slot = abi::decode_string(&data).map_err(|e| {
            LedgerError::rejected(format!(
                "getRootCID returned undecodable data (is {} a Registry?): {e}",
                self.config.contract_address
            ))
        })?;
        RootPointer::from_slot(&slot)
            .map_err(|e| LedgerError::rejected(format!("malformed root pointer {slot:?}: {e}")))
    }

    async fn set_current(&self, fingerprint: &Fingerprint) -> LedgerResult<CommitReceipt> {
        if self.config.from.is_empty() {
            return Err(LedgerError::rejected("no sending account configured"));
        }
        let tx = json!({
            "from": self.config.from,
            "to": self.config.contract_address,
            "gas": abi::quantity(self.config.gas),
            "data": abi::encode_set_root_cid(&fingerprint.to_cid_string()),
        });
        let tx_hash: String = self.rpc.call("eth_sendTransaction", json!([tx])).await?;
        debug!(tx = %tx_hash, %fingerprint, "setRootCID submitted");

        let receipt = self.wait_for_receipt(&tx_hash).await?;
        if receipt.status.as_deref() == Some("0x0") {
            return Err(LedgerError::rejected(format!(
                "transaction {tx_hash} reverted"
            )));
        }
        let block = block_of(receipt.block_number.as_deref())?;

        let mut commit = CommitReceipt::new(*fingerprint, receipt.transaction_hash.clone(), block);
        if let Some(log) = receipt
            .logs
            .iter()
            .find(|l| l.is_root_set(&self.config.contract_address))
        {
            match log.fingerprint() {
                Ok(emitted) if emitted == *fingerprint => commit = commit.with_event(),
                Ok(emitted) => {
                    warn!(tx = %tx_hash, %emitted, "RootCIDSet names a different fingerprint")
                }
                Err(e) => warn!(tx = %tx_hash, error = %e, "undecodable RootCIDSet log"),
            }
        } else {
            warn!(tx = %tx_hash, "confirmed without RootCIDSet event");
        }

        info!(block, tx = %commit.transaction, %fingerprint, "root pointer committed");
        Ok(commit)
    }

    async fn events_since(&self, from_block: u64) -> LedgerResult<Vec<RootEvent>> {
        let filter = json!({
            "address": self.config.contract_address,
            "fromBlock": abi::quantity(from_block),
            "toBlock": "latest",
            "topics": [abi::ROOT_CID_SET_TOPIC],
        });
        let logs: Vec<Log> = self.rpc.call("eth_getLogs", json!([filter])).await?;

        let mut events = Vec::with_capacity(logs.len());
        for log in logs {
            if !log.is_root_set(&self.config.contract_address) {
                continue;
            }
            match log.fingerprint() {
                Ok(fingerprint) => events.push(RootEvent {
                    fingerprint,
                    block: block_of(log.block_number.as_deref())?,
                    transaction: log.transaction_hash.clone().unwrap_or_default(),
                }),
                Err(e) => warn!(error = %e, "skipping undecodable RootCIDSet log"),
            }
        }
        Ok(events)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    use axum::extract::State;
    use axum::http::StatusCode;
    use axum::response::{IntoResponse, Response};
    use axum::routing::post;
    use axum::{Json, Router};

    const CONTRACT: &str = "0x5FbDB2315678afecb367f032d93F642f64180aa3";
    const ACCOUNT: &str = "0xf39Fd6e51aad88F6F4ce6aB8827279cffFb92266";

    #[derive(Default)]
    struct Chain {
        slot: String,
        block: u64,
        logs: Vec<Value>,
        receipts: Vec<(String, Value)>,
        /// Receipt polls answered with `null` before the receipt appears.
        pending_polls: u32,
        never_mine: bool,
        revert: bool,
        /// Emit a `RootCIDSet` log whose data is not the value that was set.
        garble_event: bool,
        reject_rpc: bool,
        down: bool,
    }

    #[derive(Clone, Default)]
    struct FakeNode(Arc<Mutex<Chain>>);

    fn rpc_ok(id: &Value, result: Value) -> Response {
        Json(json!({"jsonrpc": "2.0", "id": id, "result": result})).into_response()
    }

    async fn handle(State(node): State<FakeNode>, Json(req): Json<Value>) -> Response {
        let mut chain = node.0.lock().unwrap();
        if chain.down {
            return StatusCode::BAD_GATEWAY.into_response();
        }
        let id = req["id"].clone();
        let params = &req["params"];
        match req["method"].as_str().unwrap_or_default() {
            "eth_call" => {
                assert_eq!(params[0]["data"], "0xea373564");
                let data = format!("0x{}", hex::encode(abi::encode_string(&chain.slot)));
                rpc_ok(&id, json!(data))
            }
            "eth_sendTransaction" => {
                if chain.reject_rpc {
                    return Json(json!({
                        "jsonrpc": "2.0",
                        "id": id,
                        "error": {"code": -32603, "message": "execution reverted"}
                    }))
                    .into_response();
                }
                let data = params[0]["data"].as_str().unwrap().to_string();
                assert!(data.starts_with("0x7c0cf836"));
                let value = abi::decode_string(&format!("0x{}", &data[10..])).unwrap();

                chain.block += 1;
                let block = chain.block;
                let tx_hash = format!("0x{block:064x}");
                let status = if chain.revert { "0x0" } else { "0x1" };
                let mut logs = Vec::new();
                if !chain.revert {
                    chain.slot = value.clone();
                    let emitted = if chain.garble_event { "garbled" } else { value.as_str() };
                    let log = json!({
                        "address": CONTRACT.to_lowercase(),
                        "topics": [abi::ROOT_CID_SET_TOPIC],
                        "data": format!("0x{}", hex::encode(abi::encode_string(emitted))),
                        "blockNumber": abi::quantity(block),
                        "transactionHash": tx_hash,
                    });
                    chain.logs.push(log.clone());
                    logs.push(log);
                }
                let receipt = json!({
                    "transactionHash": tx_hash,
                    "blockNumber": abi::quantity(block),
                    "status": status,
                    "logs": logs,
                });
                chain.receipts.push((tx_hash.clone(), receipt));
                rpc_ok(&id, json!(tx_hash))
            }
            "eth_getTransactionReceipt" => {
                if chain.never_mine {
                    return rpc_ok(&id, Value::Null);
                }
                if chain.pending_polls > 0 {
                    chain.pending_polls -= 1;
                    return rpc_ok(&id, Value::Null);
                }
                let wanted = params[0].as_str().unwrap_or_default();
                let receipt = chain
                    .receipts
                    .iter()
                    .find(|(h, _)| h == wanted)
                    .map(|(_, r)| r.clone())
                    .unwrap_or(Value::Null);
                rpc_ok(&id, receipt)
            }
            "eth_getLogs" => {
                let from = abi::parse_quantity(params[0]["fromBlock"].as_str().unwrap()).unwrap();
                let logs: Vec<Value> = chain
                    .logs
                    .iter()
                    .filter(|l| {
                        abi::parse_quantity(l["blockNumber"].as_str().unwrap()).unwrap() >= from
                    })
                    .cloned()
                    .collect();
                rpc_ok(&id, json!(logs))
            }
            other => panic!("unexpected method {other}"),
        }
    }

    async fn spawn_node() -> (FakeNode, String) {
        let node = FakeNode::default();
        let app = Router::new()
            .route("/", post(handle))
            .with_state(node.clone());
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        (node, format!("http://{addr}"))
    }

    fn contract_for(rpc_url: String) -> RegistryContract {
        RegistryContract::new(ContractConfig {
            rpc_url,
            contract_address: CONTRACT.into(),
            from: ACCOUNT.into(),
            timeout: Duration::from_secs(5),
            confirmation_timeout: Duration::from_secs(2),
            poll_interval: Duration::from_millis(10),
            ..Default::default()
        })
        .unwrap()
    }

    #[tokio::test]
    async fn unset_registry_reads_unset() {
        let (_node, url) = spawn_node().await;
        let contract = contract_for(url);
        assert_eq!(contract.read_current().await.unwrap(), RootPointer::Unset);
    }

    #[tokio::test]
    async fn set_waits_for_mining_and_reads_back() {
        let (node, url) = spawn_node().await;
        node.0.lock().unwrap().pending_polls = 3;
        let contract = contract_for(url);
        let fp = Fingerprint::compute(br#"{"x":"this is a test","y":1234}"#);

        let receipt = contract.set_current(&fp).await.unwrap();
        assert_eq!(receipt.fingerprint, fp);
        assert_eq!(receipt.block, 1);
        assert!(receipt.event_observed);
        assert_eq!(node.0.lock().unwrap().pending_polls, 0);

        assert_eq!(contract.read_current().await.unwrap(), RootPointer::Set(fp));
    }

    #[tokio::test]
    async fn reverted_transaction_is_rejected() {
        let (node, url) = spawn_node().await;
        node.0.lock().unwrap().revert = true;
        let contract = contract_for(url);

        let err = contract
            .set_current(&Fingerprint::compute(b"x"))
            .await
            .unwrap_err();
        assert!(matches!(err, LedgerError::Rejected(_)));
        assert_eq!(contract.read_current().await.unwrap(), RootPointer::Unset);
    }

    #[tokio::test]
    async fn mined_write_with_unexpected_event_still_commits() {
        let (node, url) = spawn_node().await;
        node.0.lock().unwrap().garble_event = true;
        let contract = contract_for(url);
        let fp = Fingerprint::compute(b"x");

        let receipt = contract.set_current(&fp).await.unwrap();
        assert_eq!(receipt.fingerprint, fp);
        assert_eq!(receipt.block, 1);
        assert!(!receipt.event_observed);
        assert_eq!(contract.read_current().await.unwrap(), RootPointer::Set(fp));
    }

    #[tokio::test]
    async fn rpc_error_object_is_rejected() {
        let (node, url) = spawn_node().await;
        node.0.lock().unwrap().reject_rpc = true;
        let contract = contract_for(url);
        assert!(matches!(
            contract.set_current(&Fingerprint::compute(b"x")).await,
            Err(LedgerError::Rejected(_))
        ));
    }

    #[tokio::test]
    async fn unmined_transaction_is_unavailable() {
        let (node, url) = spawn_node().await;
        node.0.lock().unwrap().never_mine = true;
        let mut config = contract_for(url).config().clone();
        config.confirmation_timeout = Duration::from_millis(100);
        let contract = RegistryContract::new(config).unwrap();

        let err = contract
            .set_current(&Fingerprint::compute(b"x"))
            .await
            .unwrap_err();
        assert!(matches!(err, LedgerError::Unavailable(_)));
    }

    #[tokio::test]
    async fn writes_need_a_sending_account() {
        let (node, url) = spawn_node().await;
        let mut config = contract_for(url).config().clone();
        config.from.clear();
        let contract = RegistryContract::new(config).unwrap();

        assert!(matches!(
            contract.set_current(&Fingerprint::compute(b"x")).await,
            Err(LedgerError::Rejected(_))
        ));
        assert_eq!(node.0.lock().unwrap().block, 0);
    }

    #[tokio::test]
    async fn node_outage_is_unavailable() {
        let (node, url) = spawn_node().await;
        node.0.lock().unwrap().down = true;
        let contract = contract_for(url);
        assert!(matches!(
            contract.read_current().await,
            Err(LedgerError::Unavailable(_))
        ));
    }

    #[tokio::test]
    async fn malformed_slot_is_rejected() {
        let (node, url) = spawn_node().await;
        node.0.lock().unwrap().slot = "QmLegacyCidV0".into();
        let contract = contract_for(url);
        assert!(matches!(
            contract.read_current().await,
            Err(LedgerError::Rejected(_))
        ));
    }

    #[tokio::test]
    async fn events_are_read_from_logs() {
        let (_node, url) = spawn_node().await;
        let contract = contract_for(url);
        let a = Fingerprint::compute(b"a");
        let b = Fingerprint::compute(b"b");
        contract.set_current(&a).await.unwrap();
        contract.set_current(&b).await.unwrap();

        let all = contract.events_since(0).await.unwrap();
        assert_eq!(
            all.iter().map(|e| e.fingerprint).collect::<Vec<_>>(),
            vec![a, b]
        );
        let later = contract.events_since(2).await.unwrap();
        assert_eq!(later.len(), 1);
        assert_eq!(later[0].fingerprint, b);
        assert_eq!(later[0].block, 2);
    }

    #[test]
    fn deployment_file_loads() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("deployed-contract.json");
        std::fs::write(
            &path,
            json!({
                "address": CONTRACT,
                "abi": [{"type": "function", "name": "getRootCID"}],
            })
            .to_string(),
        )
        .unwrap();

        let deployment = Deployment::load(&path).unwrap();
        assert_eq!(deployment.address, CONTRACT);
        assert!(deployment.abi.is_array());
    }

    #[test]
    fn deployment_file_must_be_json() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("deployed-contract.json");
        std::fs::write(&path, "not json").unwrap();
        let err = Deployment::load(&path).unwrap_err();
        assert_eq!(err.kind(), std::io::ErrorKind::InvalidData);
    }
}
