//! Wire formats shared with the destination chain.
//!
//! Events are RLP encoded as `[address, [topic, ...], data]`, the same layout
//! an Ethereum log uses, so the destination decoder can recover every field
//! without a schema. The payload wrapping an encoded event and its signature
//! is SCALE encoded.

use blake2::{digest::consts::{U16, U32}, Blake2b, Digest};
use codec::{DecodeAll, Encode};
use rlp::{Rlp, RlpStream};

use crate::types::{Payload, SourceEvent, ADDRESS_LEN, TOPIC_LEN};
use crate::Error;

/// Fields recovered from an RLP encoded event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedEvent {
    pub address: [u8; ADDRESS_LEN],
    pub topics: Vec<[u8; TOPIC_LEN]>,
    pub data: Vec<u8>,
}

fn check_widths(event: &SourceEvent) -> Result<(), Error> {
    if event.address.len() != ADDRESS_LEN {
        return Err(Error::Encoding(format!(
            "address must be {} bytes, got {}",
            ADDRESS_LEN,
            event.address.len()
        )));
    }
    if let Some((i, topic)) = event
        .topics
        .iter()
        .enumerate()
        .find(|(_, t)| t.len() != TOPIC_LEN)
    {
        return Err(Error::Encoding(format!(
            "topic {} must be {} bytes, got {}",
            i,
            TOPIC_LEN,
            topic.len()
        )));
    }
    Ok(())
}

pub fn encode_event(event: &SourceEvent) -> Result<Vec<u8>, Error> {
    check_widths(event)?;

    let mut stream = RlpStream::new_list(3);
    stream.append(&event.address);
    stream.begin_list(event.topics.len());
    for topic in &event.topics {
        stream.append(topic);
    }
    stream.append(&event.data);
    Ok(stream.out().to_vec())
}

pub fn decode_event(bytes: &[u8]) -> Result<DecodedEvent, Error> {
    let rlp = Rlp::new(bytes);
    let info = rlp
        .payload_info()
        .map_err(|e| Error::Encoding(format!("invalid event header: {}", e)))?;
    if info.total() != bytes.len() {
        return Err(Error::Encoding("trailing bytes after encoded event".to_string()));
    }
    if !rlp.is_list() {
        return Err(Error::Encoding("encoded event is not a list".to_string()));
    }
    let count = rlp
        .item_count()
        .map_err(|e| Error::Encoding(e.to_string()))?;
    if count != 3 {
        return Err(Error::Encoding(format!("expected 3 event fields, got {}", count)));
    }

    let address: Vec<u8> = rlp
        .val_at(0)
        .map_err(|e| Error::Encoding(format!("invalid address: {}", e)))?;
    let topics: Vec<Vec<u8>> = rlp
        .list_at(1)
        .map_err(|e| Error::Encoding(format!("invalid topics: {}", e)))?;
    let data: Vec<u8> = rlp
        .val_at(2)
        .map_err(|e| Error::Encoding(format!("invalid data: {}", e)))?;

    let address = <[u8; ADDRESS_LEN]>::try_from(address.as_slice())
        .map_err(|_| Error::Encoding(format!("address must be {} bytes", ADDRESS_LEN)))?;
    let topics = topics
        .iter()
        .map(|t| {
            <[u8; TOPIC_LEN]>::try_from(t.as_slice())
                .map_err(|_| Error::Encoding(format!("topic must be {} bytes", TOPIC_LEN)))
        })
        .collect::<Result<Vec<_>, _>>()?;

    Ok(DecodedEvent {
        address,
        topics,
        data,
    })
}

pub fn encode_payload(payload: &Payload) -> Vec<u8> {
    payload.encode()
}

pub fn decode_payload(bytes: &[u8]) -> Result<Payload, Error> {
    Payload::decode_all(&mut &bytes[..])
        .map_err(|e| Error::Encoding(format!("invalid payload: {}", e)))
}

pub fn blake2_128(bytes: &[u8]) -> [u8; 16] {
    let mut out = [0u8; 16];
    out.copy_from_slice(&Blake2b::<U16>::digest(bytes));
    out
}

pub fn blake2_256(bytes: &[u8]) -> [u8; 32] {
    let mut out = [0u8; 32];
    out.copy_from_slice(&Blake2b::<U32>::digest(bytes));
    out
}
