use codec::{Decode, Encode};
use serde::{Deserialize, Serialize};

/// Width of a source-chain contract address.
pub const ADDRESS_LEN: usize = 20;
/// Width of a single log topic.
pub const TOPIC_LEN: usize = 32;

/// Identifies the destination-chain application a message is routed to.
pub type AppId = [u8; 32];

/// A log record observed on the source chain.
///
/// Widths are validated when the event is transformed, not when it is
/// deserialized, so listeners can hand over whatever they observed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceEvent {
    #[serde(with = "hex_bytes")]
    pub address: Vec<u8>,
    #[serde(with = "hex_list")]
    pub topics: Vec<Vec<u8>>,
    #[serde(with = "hex_bytes")]
    pub data: Vec<u8>,
    #[serde(default)]
    pub block_number: Option<u64>,
    #[serde(default, with = "hex_opt")]
    pub transaction_hash: Option<Vec<u8>>,
}

impl SourceEvent {
    pub fn new(address: Vec<u8>, topics: Vec<Vec<u8>>, data: Vec<u8>) -> Self {
        Self {
            address,
            topics,
            data,
            block_number: None,
            transaction_hash: None,
        }
    }

    pub fn with_provenance(mut self, block_number: u64, transaction_hash: Vec<u8>) -> Self {
        self.block_number = Some(block_number);
        self.transaction_hash = Some(transaction_hash);
        self
    }
}

/// The unit handed from the transformer to the submitter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttestedMessage {
    pub app_id: AppId,
    pub payload: Vec<u8>,
}

impl AttestedMessage {
    pub fn app_id_hex(&self) -> String {
        hex::encode(self.app_id)
    }
}

/// Digest of an encoded event and the attestation signature over it.
#[derive(Clone, PartialEq, Eq)]
pub struct Proof {
    pub digest: [u8; 64],
    pub signature: [u8; 64],
}

impl std::fmt::Debug for Proof {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Proof")
            .field("digest", &hex::encode(self.digest))
            .field("signature", &hex::encode(self.signature))
            .finish()
    }
}

/// Body of `AttestedMessage::payload`, SCALE encoded as two
/// compact-length-prefixed byte vectors.
#[derive(Debug, Clone, PartialEq, Eq, Encode, Decode)]
pub struct Payload {
    /// RLP encoding of the source event.
    pub data: Vec<u8>,
    pub signature: Vec<u8>,
}

/// Returned once the destination transaction pool accepted an extrinsic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmissionReceipt {
    pub tx_hash: [u8; 32],
    pub nonce: u32,
    pub app_id: AppId,
}

fn decode_hex(s: &str) -> Result<Vec<u8>, hex::FromHexError> {
    hex::decode(s.strip_prefix("0x").unwrap_or(s))
}

mod hex_bytes {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&format!("0x{}", hex::encode(bytes)))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Vec<u8>, D::Error> {
        let s = String::deserialize(d)?;
        super::decode_hex(&s).map_err(serde::de::Error::custom)
    }
}

mod hex_list {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(items: &[Vec<u8>], s: S) -> Result<S::Ok, S::Error> {
        s.collect_seq(items.iter().map(|b| format!("0x{}", hex::encode(b))))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Vec<Vec<u8>>, D::Error> {
        let items = Vec::<String>::deserialize(d)?;
        items
            .iter()
            .map(|s| super::decode_hex(s).map_err(serde::de::Error::custom))
            .collect()
    }
}

mod hex_opt {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &Option<Vec<u8>>, s: S) -> Result<S::Ok, S::Error> {
        match bytes {
            Some(b) => s.serialize_some(&format!("0x{}", hex::encode(b))),
            None => s.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Option<Vec<u8>>, D::Error> {
        Option::<String>::deserialize(d)?
            .map(|s| super::decode_hex(&s).map_err(serde::de::Error::custom))
            .transpose()
    }
}
