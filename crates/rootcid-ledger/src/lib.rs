//! Root pointer ledger client for rootcid.
//!
//! The ledger owns exactly one mutable binding: the root slot naming the
//! fingerprint of the current document. This crate provides:
//! - The [`RootLedger`] trait boundary (`read_current` / `set_current` / `events_since`)
//! - [`InMemoryRootLedger`], an append-only in-process ledger for tests and embedding
//! - [`RegistryContract`], the `Registry` smart contract over Ethereum JSON-RPC
//! - [`abi`], the minimal Solidity ABI codec the contract needs
//!
//! `set_current` returns only after the transition is durably recorded; a
//! submitted-but-unconfirmed write is reported as unavailable, never as success.

pub mod abi;
pub mod contract;
pub mod error;
pub mod memory;
pub mod rpc;
pub mod traits;

pub use contract::{ContractConfig, Deployment, RegistryContract};
pub use error::{LedgerError, LedgerResult};
pub use memory::InMemoryRootLedger;
pub use rpc::JsonRpcClient;
pub use traits::RootLedger;
