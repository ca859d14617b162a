use std::collections::HashMap;

use async_trait::async_trait;
use codec::Decode;
use frame_metadata::{RuntimeMetadata, RuntimeMetadataPrefixed};
use scale_info::TypeDef;
use serde::Deserialize;

use crate::Error;

/// Runtime versions that a signed extrinsic commits to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RuntimeVersion {
    pub spec_version: u32,
    pub transaction_version: u32,
}

/// Call indices of the destination runtime, keyed by `(module, call)`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Metadata {
    calls: HashMap<(String, String), [u8; 2]>,
}

impl Metadata {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_call(mut self, module: &str, call: &str, pallet_index: u8, call_index: u8) -> Self {
        self.calls
            .insert((module.to_string(), call.to_string()), [pallet_index, call_index]);
        self
    }

    pub fn call_index(&self, module: &str, call: &str) -> Option<[u8; 2]> {
        self.calls
            .get(&(module.to_string(), call.to_string()))
            .copied()
    }

    /// Builds the call table from SCALE encoded runtime metadata.
    pub fn from_scale(bytes: &[u8]) -> Result<Self, Error> {
        let prefixed = RuntimeMetadataPrefixed::decode(&mut &bytes[..])
            .map_err(|e| Error::MetadataFetch(format!("Failed to decode metadata: {}", e)))?;

        let metadata = match prefixed.1 {
            RuntimeMetadata::V14(metadata) => metadata,
            _ => {
                return Err(Error::MetadataFetch(
                    "Unsupported metadata version, expected V14".to_string(),
                ))
            }
        };

        let mut table = Metadata::new();
        for pallet in &metadata.pallets {
            let Some(calls) = &pallet.calls else {
                continue;
            };
            let Some(ty) = metadata.types.resolve(calls.ty.id) else {
                continue;
            };
            if let TypeDef::Variant(variant) = &ty.type_def {
                for call in &variant.variants {
                    table = table.with_call(&pallet.name, &call.name, pallet.index, call.index);
                }
            }
        }
        Ok(table)
    }
}

/// Every destination chain query a submission needs.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait DestinationClient: Send + Sync {
    async fn metadata(&self) -> Result<Metadata, Error>;

    async fn genesis_hash(&self) -> Result<[u8; 32], Error>;

    async fn runtime_version(&self) -> Result<RuntimeVersion, Error>;

    /// Nonce in finalized account storage, `None` when the account does not
    /// exist on chain.
    async fn account_nonce(&self, public_key: [u8; 32]) -> Result<Option<u32>, Error>;

    /// Next usable nonce as the node sees it, counting transactions already
    /// waiting in its pool.
    async fn account_next_index(&self, public_key: [u8; 32]) -> Result<u32, Error>;

    /// Hands a signed extrinsic to the transaction pool and returns its hash.
    async fn submit_extrinsic(&self, extrinsic: Vec<u8>) -> Result<[u8; 32], Error>;
}

pub mod substrate;

pub use substrate::SubstrateRpcClient;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_call_lookup() {
        let metadata = Metadata::new()
            .with_call("Bridge", "send", 8, 0)
            .with_call("Balances", "transfer", 5, 0);
        assert_eq!(metadata.call_index("Bridge", "send"), Some([8, 0]));
        assert_eq!(metadata.call_index("Bridge", "receive"), None);
    }

    #[test]
    fn test_garbage_metadata_rejected() {
        assert!(matches!(
            Metadata::from_scale(&[0x00, 0x01, 0x02]),
            Err(Error::MetadataFetch(_))
        ));
    }

    #[test]
    fn test_runtime_version_from_rpc_json() {
        let version: RuntimeVersion = serde_json::from_str(
            r#"{"specName":"node","specVersion":12,"transactionVersion":3,"apis":[]}"#,
        )
        .unwrap();
        assert_eq!(version.spec_version, 12);
        assert_eq!(version.transaction_version, 3);
    }
}
