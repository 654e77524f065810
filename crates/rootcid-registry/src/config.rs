use std::path::{Path, PathBuf};
use std::time::Duration;

use rootcid_ledger::{ContractConfig, Deployment};
use rootcid_store::kubo::MAX_BLOCK_BYTES;
use rootcid_store::KuboConfig;
use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, ConfigResult};

/// Environment variables read by [`RegistryConfig::apply_env`].
pub mod env {
    pub const STORE_URL: &str = "ROOTCID_STORE_URL";
    pub const LEDGER_URL: &str = "ROOTCID_LEDGER_URL";
    pub const CONTRACT: &str = "ROOTCID_CONTRACT";
    pub const FROM: &str = "ROOTCID_FROM";
}

/// Complete registry configuration.
///
/// Built once and passed to [`Registry::connect`](crate::Registry::connect);
/// nothing reads the environment after construction.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RegistryConfig {
    pub store: StoreConfig,
    pub ledger: LedgerConfig,
    pub timeouts: Timeouts,
    pub retire: RetireMode,
    /// Local directory of verified documents keyed by fingerprint.
    pub cache_dir: Option<PathBuf>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StoreConfig {
    /// Base URL of the Kubo RPC API.
    pub api_url: String,
    pub max_document_bytes: usize,
    /// Never let `cat` block on network lookups for content the node lacks.
    pub offline_reads: bool,
}

impl Default for StoreConfig {
    fn default() -> Self {
        let kubo = KuboConfig::default();
        Self {
            api_url: kubo.api_url,
            max_document_bytes: kubo.max_document_bytes,
            offline_reads: kubo.offline_reads,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LedgerConfig {
    /// Ethereum JSON-RPC endpoint.
    pub rpc_url: String,
    /// Address of the `Registry` contract. Takes precedence over `deployment_file`.
    pub contract_address: String,
    /// `deployed-contract.json` written by the deploy script.
    pub deployment_file: Option<PathBuf>,
    /// Unlocked account used for `setRootCID`. Only needed to publish.
    pub from: String,
    pub gas: u64,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        let contract = ContractConfig::default();
        Self {
            rpc_url: contract.rpc_url,
            contract_address: contract.contract_address,
            deployment_file: None,
            from: contract.from,
            gas: contract.gas,
        }
    }
}

/// Per-boundary timeouts, in milliseconds when serialized.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Timeouts {
    /// Each content store call.
    #[serde(with = "rootcid_types::duration::millis")]
    pub store: Duration,
    /// Each ledger read, and the submission of a write.
    #[serde(with = "rootcid_types::duration::millis")]
    pub ledger: Duration,
    /// Waiting for a submitted write to become durable.
    #[serde(with = "rootcid_types::duration::millis")]
    pub confirmation: Duration,
    /// Receipt polling and root watching interval.
    #[serde(with = "rootcid_types::duration::millis")]
    pub poll_interval: Duration,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            store: Duration::from_secs(10),
            ledger: Duration::from_secs(10),
            confirmation: Duration::from_secs(60),
            poll_interval: Duration::from_millis(500),
        }
    }
}

impl Timeouts {
    /// Upper bound for a full `set_current`: submission plus confirmation.
    pub fn commit(&self) -> Duration {
        self.ledger + self.confirmation
    }
}

/// How superseded documents are unpinned after a commit.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RetireMode {
    /// Await the unpin and report its outcome in the receipt.
    #[default]
    Inline,
    /// Spawn the unpin and return as soon as the commit is durable.
    Background,
}

impl RegistryConfig {
    pub fn from_toml_str(s: &str) -> ConfigResult<Self> {
        Ok(toml::from_str(s)?)
    }

    pub fn load(path: &Path) -> ConfigResult<Self> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&text)
    }

    /// Overlay `ROOTCID_*` variables from the process environment.
    pub fn apply_env(self) -> Self {
        self.apply_env_from(|key| std::env::var(key).ok())
    }

    /// Overlay `ROOTCID_*` variables resolved through `lookup`.
    pub fn apply_env_from(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        let lookup = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        if let Some(url) = lookup(env::STORE_URL) {
            self.store.api_url = url;
        }
        if let Some(url) = lookup(env::LEDGER_URL) {
            self.ledger.rpc_url = url;
        }
        if let Some(address) = lookup(env::CONTRACT) {
            self.ledger.contract_address = address;
        }
        if let Some(from) = lookup(env::FROM) {
            self.ledger.from = from;
        }
        self
    }

    pub fn validate(&self) -> ConfigResult<()> {
        if self.store.api_url.trim().is_empty() {
            return Err(ConfigError::Invalid("store.api_url is empty".into()));
        }
        if self.ledger.rpc_url.trim().is_empty() {
            return Err(ConfigError::Invalid("ledger.rpc_url is empty".into()));
        }
        if self.ledger.contract_address.trim().is_empty() && self.ledger.deployment_file.is_none()
        {
            return Err(ConfigError::Invalid(
                "ledger.contract_address or ledger.deployment_file is required".into(),
            ));
        }
        if self.store.max_document_bytes == 0 || self.store.max_document_bytes > MAX_BLOCK_BYTES {
            return Err(ConfigError::Invalid(format!(
                "store.max_document_bytes must be between 1 and {MAX_BLOCK_BYTES}"
            )));
        }
        let t = &self.timeouts;
        for (name, value) in [
            ("store", t.store),
            ("ledger", t.ledger),
            ("confirmation", t.confirmation),
            ("poll_interval", t.poll_interval),
        ] {
            if value.is_zero() {
                return Err(ConfigError::Invalid(format!("timeouts.{name} must be non-zero")));
            }
        }
        Ok(())
    }

    pub fn kubo_config(&self) -> KuboConfig {
        KuboConfig {
            api_url: self.store.api_url.clone(),
            timeout: self.timeouts.store,
            max_document_bytes: self.store.max_document_bytes,
            offline_reads: self.store.offline_reads,
        }
    }

    /// Contract settings, reading the deployment file when no address is given.
    pub fn contract_config(&self) -> ConfigResult<ContractConfig> {
        let address = self.ledger.contract_address.trim();
        let contract_address = match (&self.ledger.deployment_file, address) {
            (Some(path), "") => {
                Deployment::load(path)
                    .map_err(|source| ConfigError::Read {
                        path: path.clone(),
                        source,
                    })?
                    .address
            }
            (_, address) => address.to_string(),
        };
        Ok(ContractConfig {
            rpc_url: self.ledger.rpc_url.clone(),
            contract_address,
            from: self.ledger.from.clone(),
            gas: self.ledger.gas,
            timeout: self.timeouts.ledger,
            confirmation_timeout: self.timeouts.confirmation,
            poll_interval: self.timeouts.poll_interval,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn defaults_target_local_nodes() {
        let c = RegistryConfig::default();
        assert_eq!(c.store.api_url, "http://127.0.0.1:5001");
        assert_eq!(c.ledger.rpc_url, "http://127.0.0.1:8545");
        assert_eq!(c.store.max_document_bytes, MAX_BLOCK_BYTES);
        assert_eq!(c.retire, RetireMode::Inline);
        assert!(c.cache_dir.is_none());
        assert_eq!(c.timeouts.commit(), Duration::from_secs(70));
    }

    #[test]
    fn parses_partial_toml() {
        let c = RegistryConfig::from_toml_str(
            r#"
            retire = "background"
            cache_dir = "/tmp/rootcid"

            [ledger]
            contract_address = "0x5FbDB2315678afecb367f032d93F642f64180aa3"

            [timeouts]
            store = 2500
            poll_interval = 100
            "#,
        )
        .unwrap();
        assert_eq!(c.retire, RetireMode::Background);
        assert_eq!(c.cache_dir, Some(PathBuf::from("/tmp/rootcid")));
        assert_eq!(c.timeouts.store, Duration::from_millis(2500));
        assert_eq!(c.timeouts.poll_interval, Duration::from_millis(100));
        assert_eq!(c.timeouts.ledger, Duration::from_secs(10));
        assert_eq!(c.store.api_url, "http://127.0.0.1:5001");
        c.validate().unwrap();
    }

    #[test]
    fn unknown_keys_are_rejected() {
        let err = RegistryConfig::from_toml_str("[store]\napi = \"http://x\"\n").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn load_reports_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = RegistryConfig::load(&dir.path().join("absent.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
    }

    #[test]
    fn load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("rootcid.toml");
        std::fs::write(&path, "[store]\napi_url = \"http://ipfs:5001\"\n").unwrap();
        let c = RegistryConfig::load(&path).unwrap();
        assert_eq!(c.store.api_url, "http://ipfs:5001");
    }

    #[test]
    fn env_overlay_replaces_endpoints() {
        let vars: HashMap<&str, &str> = [
            (env::STORE_URL, "http://ipfs:5001"),
            (env::LEDGER_URL, "http://geth:8545"),
            (env::CONTRACT, "0xabc"),
            (env::FROM, "   "),
        ]
        .into_iter()
        .collect();
        let c = RegistryConfig::default()
            .apply_env_from(|k| vars.get(k).map(|v| v.to_string()));
        assert_eq!(c.store.api_url, "http://ipfs:5001");
        assert_eq!(c.ledger.rpc_url, "http://geth:8545");
        assert_eq!(c.ledger.contract_address, "0xabc");
        assert!(c.ledger.from.is_empty());
    }

    #[test]
    fn validation_rules() {
        let mut c = RegistryConfig::default();
        assert!(c.validate().is_err());

        c.ledger.contract_address = "0xabc".into();
        c.validate().unwrap();

        c.timeouts.confirmation = Duration::ZERO;
        assert!(c.validate().is_err());
        c.timeouts = Timeouts::default();

        c.store.max_document_bytes = MAX_BLOCK_BYTES + 1;
        assert!(c.validate().is_err());
        c.store.max_document_bytes = MAX_BLOCK_BYTES;

        c.store.api_url = " ".into();
        assert!(c.validate().is_err());
    }

    #[test]
    fn backend_configs_share_timeouts() {
        let mut c = RegistryConfig::default();
        c.ledger.contract_address = "0xabc".into();
        c.timeouts.store = Duration::from_millis(1500);
        c.timeouts.poll_interval = Duration::from_millis(50);

        assert_eq!(c.kubo_config().timeout, Duration::from_millis(1500));
        let contract = c.contract_config().unwrap();
        assert_eq!(contract.contract_address, "0xabc");
        assert_eq!(contract.poll_interval, Duration::from_millis(50));
        assert_eq!(contract.confirmation_timeout, c.timeouts.confirmation);
    }

    #[test]
    fn contract_address_from_deployment_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("deployed-contract.json");
        std::fs::write(&path, r#"{"address": "0xdeployed", "abi": []}"#).unwrap();

        let mut c = RegistryConfig::default();
        c.ledger.deployment_file = Some(path);
        c.validate().unwrap();
        assert_eq!(c.contract_config().unwrap().contract_address, "0xdeployed");

        c.ledger.contract_address = "0xexplicit".into();
        assert_eq!(c.contract_config().unwrap().contract_address, "0xexplicit");
    }
}
