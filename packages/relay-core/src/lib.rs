pub mod attest;
pub mod chain_adapter;
pub mod config;
pub mod encoding;
pub mod relayer;
pub mod submitter;
pub mod transform;
pub mod types;

pub use attest::AttestationSigner;
pub use config::Config;
pub use relayer::{Coordinator, Ingestor, RelayQueue, RetryPolicy, Shutdown};
pub use submitter::{AccountKey, AccountLocks, MessageSubmitter, Submitter};
pub use transform::MessageTransformer;
pub use types::{AppId, AttestedMessage, Proof, SourceEvent, SubmissionReceipt};

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Config error: {0}")]
    Config(String),

    #[error("Encoding error: {0}")]
    Encoding(String),

    #[error("Signing error: {0}")]
    Signing(String),

    #[error("Metadata fetch error: {0}")]
    MetadataFetch(String),

    #[error("Account state error: {0}")]
    AccountState(String),

    #[error("Submission error: {0}")]
    Submission(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Relay queue closed")]
    QueueClosed,
}

impl Error {
    /// Short label used as the `kind` field when a failure is logged.
    pub fn kind(&self) -> &'static str {
        match self {
            Error::Config(_) => "config",
            Error::Encoding(_) => "encoding",
            Error::Signing(_) => "signing",
            Error::MetadataFetch(_) => "metadata_fetch",
            Error::AccountState(_) => "account_state",
            Error::Submission(_) => "submission",
            Error::Network(_) => "network",
            Error::Serialization(_) => "serialization",
            Error::QueueClosed => "queue_closed",
        }
    }

    /// Destination RPC failures are transient; everything else needs a
    /// different input or operator intervention.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Error::MetadataFetch(_) | Error::AccountState(_) | Error::Submission(_) | Error::Network(_)
        )
    }

    /// Configuration-class failures stop the whole pipeline instead of a
    /// single message.
    pub fn is_pipeline_fatal(&self) -> bool {
        matches!(self, Error::Config(_))
    }
}

pub type Result<T> = std::result::Result<T, Error>;
