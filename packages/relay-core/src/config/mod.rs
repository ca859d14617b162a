use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::{attest::AttestationSigner, submitter::AccountKey, Error};

fn default_call_module() -> String {
    "Bridge".to_string()
}

fn default_call_name() -> String {
    "send".to_string()
}

fn default_queue_capacity() -> usize {
    256
}

fn default_retry_delay_ms() -> u64 {
    1000
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct DestinationConfig {
    pub rpc_url: String,
    #[serde(default = "default_call_module")]
    pub call_module: String,
    #[serde(default = "default_call_name")]
    pub call_name: String,
}

/// Hex encoded 32 byte Ed25519 secrets.
#[derive(Deserialize, Serialize, Clone)]
pub struct KeyConfig {
    pub attestation_secret: String,
    pub account_secret: String,
}

impl std::fmt::Debug for KeyConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("KeyConfig { .. }")
    }
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct RelayerConfig {
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,
    #[serde(default)]
    pub max_retries: u32,
    #[serde(default = "default_retry_delay_ms")]
    pub retry_delay_ms: u64,
}

impl Default for RelayerConfig {
    fn default() -> Self {
        Self {
            queue_capacity: default_queue_capacity(),
            max_retries: 0,
            retry_delay_ms: default_retry_delay_ms(),
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct Config {
    pub destination: DestinationConfig,
    pub keys: KeyConfig,
    #[serde(default)]
    pub relayer: RelayerConfig,
}

impl Config {
    /// Parses `.toml` files as TOML and anything else as JSON.
    pub fn load<P: AsRef<Path>>(config_path: P) -> Result<Self, Error> {
        let path = config_path.as_ref();
        let config_str = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("Failed to read config file: {}", e)))?;

        let config: Config = match path.extension().and_then(|ext| ext.to_str()) {
            Some("toml") => toml::from_str(&config_str)
                .map_err(|e| Error::Config(format!("Failed to parse config file: {}", e)))?,
            _ => serde_json::from_str(&config_str)
                .map_err(|e| Error::Config(format!("Failed to parse config file: {}", e)))?,
        };

        config.validate()?;

        Ok(config)
    }

    pub fn validate(&self) -> Result<(), Error> {
        if !self.destination.rpc_url.starts_with("http://")
            && !self.destination.rpc_url.starts_with("https://")
        {
            return Err(Error::Config(format!(
                "Invalid destination rpc url: {}",
                self.destination.rpc_url
            )));
        }
        if self.destination.call_module.is_empty() || self.destination.call_name.is_empty() {
            return Err(Error::Config("Destination call must be named".to_string()));
        }

        // both keys must parse and differ
        let attestation = self.attestation_signer()?;
        let account = self.account_key()?;
        if attestation.public_key() == account.public_key() {
            return Err(Error::Config(
                "Attestation key and account key must differ".to_string(),
            ));
        }

        if self.relayer.queue_capacity == 0 {
            return Err(Error::Config("Relay queue capacity must be greater than 0".to_string()));
        }

        Ok(())
    }

    pub fn attestation_signer(&self) -> Result<AttestationSigner, Error> {
        AttestationSigner::from_hex(&self.keys.attestation_secret)
            .map_err(|e| Error::Config(e.to_string()))
    }

    pub fn account_key(&self) -> Result<AccountKey, Error> {
        AccountKey::from_hex(&self.keys.account_secret).map_err(|e| Error::Config(e.to_string()))
    }
}
