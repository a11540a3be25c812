use crate::types::{address_from_pubkey, Address, PublicKey};
use hex::FromHex;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct GenesisConfig {
    pub registry_id: String,
    pub admin_pubkey_hex: String,
    #[serde(default = "default_registration_deposit")]
    pub registration_deposit: u64,
    #[serde(default = "default_registration_wait_secs")]
    pub registration_wait_secs: u64,
    /// Initial account funding; anything not listed starts empty.
    #[serde(default)]
    pub allocations: Vec<AllocationConfig>,
    #[serde(default)]
    pub client: ClientConfig,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AllocationConfig {
    pub pubkey_hex: String,
    pub balance: u64,
}

fn default_registration_deposit() -> u64 {
    100
}

fn default_registration_wait_secs() -> u64 {
    1_000
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ClientConfig {
    #[serde(default)]
    pub listen_addr: String,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            listen_addr: "127.0.0.1:7300".to_string(),
        }
    }
}

impl GenesisConfig {
    pub fn admin_address(&self) -> Result<Address, String> {
        Ok(address_from_pubkey(&parse_pubkey(&self.admin_pubkey_hex)?))
    }

    pub fn allocation_balances(&self) -> Result<Vec<(Address, u64)>, String> {
        let mut out = Vec::with_capacity(self.allocations.len());
        for allocation in &self.allocations {
            let pubkey = parse_pubkey(&allocation.pubkey_hex)?;
            out.push((address_from_pubkey(&pubkey), allocation.balance));
        }
        Ok(out)
    }
}

fn parse_pubkey(hex_str: &str) -> Result<PublicKey, String> {
    <[u8; 32]>::from_hex(hex_str)
        .map_err(|_| "invalid pubkey hex (expected 32 bytes)".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn genesis_defaults_fill_in() {
        let raw = r#"{
            "registry_id": "reg-test",
            "admin_pubkey_hex": "0101010101010101010101010101010101010101010101010101010101010101"
        }"#;
        let genesis: GenesisConfig = serde_json::from_str(raw).expect("parse genesis");
        assert_eq!(genesis.registration_deposit, 100);
        assert_eq!(genesis.registration_wait_secs, 1_000);
        assert!(genesis.allocations.is_empty());
        assert_eq!(genesis.client.listen_addr, "127.0.0.1:7300");
        genesis.admin_address().expect("admin address");
    }

    #[test]
    fn bad_pubkey_hex_is_an_error() {
        let genesis = GenesisConfig {
            registry_id: "reg-test".to_string(),
            admin_pubkey_hex: "zz".to_string(),
            registration_deposit: 100,
            registration_wait_secs: 1_000,
            allocations: Vec::new(),
            client: ClientConfig::default(),
        };
        assert!(genesis.admin_address().is_err());
    }
}
