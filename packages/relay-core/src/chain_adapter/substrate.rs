use async_trait::async_trait;
use blake2::{Blake2b512, Digest};
use codec::Decode;
use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use tracing::debug;

use super::{DestinationClient, Metadata, RuntimeVersion};
use crate::{encoding::blake2_128, Error};

/// twox128("System") ++ twox128("Account")
const SYSTEM_ACCOUNT_PREFIX: &str =
    "26aa394eea5630e07c48ae0c9558cef7b99d880ec681799c0cf30e8886371da9";

/// Generic Substrate address format.
const SS58_PREFIX: u8 = 42;

/// JSON-RPC client for a Substrate node over HTTP.
pub struct SubstrateRpcClient {
    rpc_url: String,
    client: reqwest::Client,
}

impl SubstrateRpcClient {
    pub fn new(rpc_url: &str) -> Self {
        Self {
            rpc_url: rpc_url.to_string(),
            client: reqwest::Client::new(),
        }
    }

    async fn call<T: DeserializeOwned>(&self, method: &str, params: Value) -> Result<T, Error> {
        debug!(method, "Substrate RPC request");
        let response = self
            .client
            .post(&self.rpc_url)
            .json(&json!({
                "jsonrpc": "2.0",
                "method": method,
                "params": params,
                "id": 1
            }))
            .send()
            .await
            .map_err(|e| Error::Network(e.to_string()))?;

        let mut body: Value = response
            .json()
            .await
            .map_err(|e| Error::Network(e.to_string()))?;

        if let Some(error) = body.get("error").filter(|e| !e.is_null()) {
            return Err(Error::Network(format!("{} failed: {}", method, error)));
        }

        let result = body.get_mut("result").map(Value::take).unwrap_or(Value::Null);
        serde_json::from_value(result)
            .map_err(|e| Error::Serialization(format!("{} returned unexpected result: {}", method, e)))
    }
}

fn hex_to_bytes(value: &str) -> Result<Vec<u8>, Error> {
    hex::decode(value.trim_start_matches("0x")).map_err(|e| Error::Serialization(e.to_string()))
}

fn hex_to_hash(value: &str) -> Result<[u8; 32], Error> {
    let bytes = hex_to_bytes(value)?;
    <[u8; 32]>::try_from(bytes.as_slice())
        .map_err(|_| Error::Serialization(format!("expected 32 byte hash, got {} bytes", bytes.len())))
}

/// Storage key of `System.Account(public_key)`.
pub fn account_storage_key(public_key: &[u8; 32]) -> String {
    format!(
        "0x{}{}{}",
        SYSTEM_ACCOUNT_PREFIX,
        hex::encode(blake2_128(public_key)),
        hex::encode(public_key)
    )
}

/// SS58 address of an account, as RPC methods taking an `AccountId` expect.
pub fn ss58_address(public_key: &[u8; 32]) -> String {
    let mut raw = Vec::with_capacity(35);
    raw.push(SS58_PREFIX);
    raw.extend_from_slice(public_key);

    let mut hasher = Blake2b512::new();
    hasher.update(b"SS58PRE");
    hasher.update(&raw);
    let checksum = hasher.finalize();
    raw.extend_from_slice(&checksum[..2]);

    bs58::encode(raw).into_string()
}

#[async_trait]
impl DestinationClient for SubstrateRpcClient {
    async fn metadata(&self) -> Result<Metadata, Error> {
        let encoded: String = self
            .call("state_getMetadata", json!([]))
            .await
            .map_err(|e| Error::MetadataFetch(e.to_string()))?;
        let bytes = hex_to_bytes(&encoded).map_err(|e| Error::MetadataFetch(e.to_string()))?;
        Metadata::from_scale(&bytes)
    }

    async fn genesis_hash(&self) -> Result<[u8; 32], Error> {
        let hash: String = self
            .call("chain_getBlockHash", json!([0]))
            .await
            .map_err(|e| Error::MetadataFetch(e.to_string()))?;
        hex_to_hash(&hash).map_err(|e| Error::MetadataFetch(e.to_string()))
    }

    async fn runtime_version(&self) -> Result<RuntimeVersion, Error> {
        self.call("state_getRuntimeVersion", json!([]))
            .await
            .map_err(|e| Error::MetadataFetch(e.to_string()))
    }

    async fn account_nonce(&self, public_key: [u8; 32]) -> Result<Option<u32>, Error> {
        let key = account_storage_key(&public_key);
        let value: Option<String> = self
            .call("state_getStorage", json!([key]))
            .await
            .map_err(|e| Error::AccountState(e.to_string()))?;

        match value {
            None => Ok(None),
            Some(value) => {
                let bytes = hex_to_bytes(&value).map_err(|e| Error::AccountState(e.to_string()))?;
                // AccountInfo starts with the nonce
                let nonce = u32::decode(&mut &bytes[..])
                    .map_err(|e| Error::AccountState(format!("Invalid account info: {}", e)))?;
                Ok(Some(nonce))
            }
        }
    }

    async fn account_next_index(&self, public_key: [u8; 32]) -> Result<u32, Error> {
        self.call("system_accountNextIndex", json!([ss58_address(&public_key)]))
            .await
            .map_err(|e| Error::AccountState(e.to_string()))
    }

    async fn submit_extrinsic(&self, extrinsic: Vec<u8>) -> Result<[u8; 32], Error> {
        let hash: String = self
            .call(
                "author_submitExtrinsic",
                json!([format!("0x{}", hex::encode(extrinsic))]),
            )
            .await
            .map_err(|e| Error::Submission(e.to_string()))?;
        hex_to_hash(&hash).map_err(|e| Error::Submission(e.to_string()))
    }
}
