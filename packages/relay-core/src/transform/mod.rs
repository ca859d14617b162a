use std::sync::Arc;

use tracing::debug;

use crate::{
    attest::AttestationSigner,
    encoding,
    types::{AppId, AttestedMessage, Payload, SourceEvent, ADDRESS_LEN},
    Error,
};

/// The source address occupies the leading bytes of the app id and the
/// remaining bytes are zero.
pub fn app_id_from_address(address: &[u8]) -> Result<AppId, Error> {
    if address.len() != ADDRESS_LEN {
        return Err(Error::Encoding(format!(
            "address must be {} bytes, got {}",
            ADDRESS_LEN,
            address.len()
        )));
    }
    let mut app_id = [0u8; 32];
    app_id[..ADDRESS_LEN].copy_from_slice(address);
    Ok(app_id)
}

/// Turns source events into attested messages.
#[derive(Debug, Clone)]
pub struct MessageTransformer {
    signer: Arc<AttestationSigner>,
}

impl MessageTransformer {
    pub fn new(signer: Arc<AttestationSigner>) -> Self {
        Self { signer }
    }

    pub fn signer(&self) -> &AttestationSigner {
        &self.signer
    }

    pub fn transform(&self, event: &SourceEvent) -> Result<AttestedMessage, Error> {
        let app_id = app_id_from_address(&event.address)?;
        let encoded = encoding::encode_event(event)?;
        let proof = self.signer.prove(&encoded)?;

        let payload = encoding::encode_payload(&Payload {
            data: encoded,
            signature: proof.signature.to_vec(),
        });

        debug!(
            app_id = %hex::encode(app_id),
            block = ?event.block_number,
            topics = event.topics.len(),
            "Transformed source event"
        );

        Ok(AttestedMessage { app_id, payload })
    }
}
