use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::{
    chain_adapter::DestinationClient,
    types::{AttestedMessage, SubmissionReceipt},
    Error,
};

pub mod extrinsic;

pub use extrinsic::{AccountKey, SignedExtrinsic, SigningContext};

/// Per-account critical sections, shared by every submitter that may sign
/// for the same account. Nothing about the nonce is kept here; it is read
/// from the node on every attempt while the section is held.
#[derive(Debug, Clone, Default)]
pub struct AccountLocks {
    accounts: Arc<DashMap<[u8; 32], Arc<Mutex<()>>>>,
}

impl AccountLocks {
    pub fn new() -> Self {
        Self::default()
    }

    fn slot(&self, account: [u8; 32]) -> Arc<Mutex<()>> {
        Arc::clone(&*self.accounts.entry(account).or_default())
    }
}

/// Keeps errors already of the expected kind and re-labels anything else.
fn classify(err: Error, kind: fn(String) -> Error) -> Error {
    let expected = kind(String::new());
    if std::mem::discriminant(&err) == std::mem::discriminant(&expected) {
        err
    } else {
        kind(err.to_string())
    }
}

/// What the coordinator needs from a submitter.
#[async_trait]
pub trait MessageSubmitter: Send + Sync {
    async fn submit(&self, message: &AttestedMessage) -> Result<SubmissionReceipt, Error>;
}

/// Builds, signs and submits one destination transaction per message.
pub struct Submitter {
    client: Arc<dyn DestinationClient>,
    account: AccountKey,
    locks: AccountLocks,
    call_module: String,
    call_name: String,
}

impl Submitter {
    pub fn new(
        client: Arc<dyn DestinationClient>,
        account: AccountKey,
        locks: AccountLocks,
        call_module: &str,
        call_name: &str,
    ) -> Self {
        Self {
            client,
            account,
            locks,
            call_module: call_module.to_string(),
            call_name: call_name.to_string(),
        }
    }

    pub fn account(&self) -> [u8; 32] {
        self.account.public_key()
    }

    /// One attempt, no retries. Returns once the pool accepted the transaction.
    pub async fn submit(&self, message: &AttestedMessage) -> Result<SubmissionReceipt, Error> {
        // metadata may change between submissions
        let metadata = self
            .client
            .metadata()
            .await
            .map_err(|e| classify(e, Error::MetadataFetch))?;
        let call_index = metadata
            .call_index(&self.call_module, &self.call_name)
            .ok_or_else(|| {
                Error::MetadataFetch(format!(
                    "Call {}.{} not found in runtime metadata",
                    self.call_module, self.call_name
                ))
            })?;
        let genesis_hash = self
            .client
            .genesis_hash()
            .await
            .map_err(|e| classify(e, Error::MetadataFetch))?;
        let version = self
            .client
            .runtime_version()
            .await
            .map_err(|e| classify(e, Error::MetadataFetch))?;

        let call = extrinsic::encode_call(call_index, &message.app_id, &message.payload);
        let account = self.account.public_key();

        let slot = self.locks.slot(account);
        let _guard = slot.lock().await;

        let chain_nonce = self
            .client
            .account_nonce(account)
            .await
            .map_err(|e| classify(e, Error::AccountState))?
            .ok_or_else(|| {
                Error::AccountState(format!("Account {} not found", hex::encode(account)))
            })?;
        let pool_nonce = self
            .client
            .account_next_index(account)
            .await
            .map_err(|e| classify(e, Error::AccountState))?;
        let nonce = chain_nonce.max(pool_nonce);
        debug!(
            chain_nonce,
            pool_nonce,
            nonce,
            app_id = %message.app_id_hex(),
            "Acquired account nonce"
        );

        let context = SigningContext {
            genesis_hash,
            spec_version: version.spec_version,
            transaction_version: version.transaction_version,
            nonce,
        };
        let signed = SignedExtrinsic::sign(&self.account, call, &context)?;

        match self.client.submit_extrinsic(signed.encode()).await {
            Ok(tx_hash) => {
                if tx_hash != signed.hash() {
                    warn!(
                        nonce,
                        tx_hash = %hex::encode(tx_hash),
                        expected = %hex::encode(signed.hash()),
                        "Node reported an unexpected transaction hash"
                    );
                }
                info!(
                    app_id = %message.app_id_hex(),
                    nonce,
                    tx_hash = %hex::encode(tx_hash),
                    "Submitted message to destination chain"
                );
                Ok(SubmissionReceipt {
                    tx_hash,
                    nonce,
                    app_id: message.app_id,
                })
            }
            Err(e) => {
                warn!(nonce, error = %e, "Destination pool rejected extrinsic");
                Err(classify(e, Error::Submission))
            }
        }
    }
}

#[async_trait]
impl MessageSubmitter for Submitter {
    async fn submit(&self, message: &AttestedMessage) -> Result<SubmissionReceipt, Error> {
        Submitter::submit(self, message).await
    }
}
