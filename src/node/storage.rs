// Snapshot persistence. Addresses are hex strings on disk; JSON objects cannot
// key on byte arrays.

use crate::accounts::Accounts;
use crate::ledger::{LedgerConfig, LedgerState, Participant, SlashRecord};
use crate::types::Address;
use hex::FromHex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PersistedRegistry {
    pub version: u64,
    pub config: Option<PersistedConfig>,
    pub participants: Vec<PersistedParticipant>,
    pub slashes: Vec<PersistedSlash>,
    pub accounts: Vec<PersistedAccount>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PersistedConfig {
    pub admin_hex: String,
    pub registration_deposit: u64,
    pub registration_wait_secs: u64,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PersistedParticipant {
    pub address_hex: String,
    pub registered: bool,
    pub stake_balance: u64,
    pub registered_at: u64,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PersistedSlash {
    pub target_hex: String,
    pub amount: u64,
    pub at: u64,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PersistedAccount {
    pub address_hex: String,
    pub balance: u64,
}

impl PersistedRegistry {
    pub fn from_parts(state: &LedgerState, accounts: &Accounts) -> Self {
        let mut participants: Vec<PersistedParticipant> = state
            .participants
            .iter()
            .map(|(address, p)| PersistedParticipant {
                address_hex: hex::encode(address),
                registered: p.registered,
                stake_balance: p.stake_balance,
                registered_at: p.registered_at,
            })
            .collect();
        participants.sort_by(|a, b| a.address_hex.cmp(&b.address_hex));

        let mut account_rows: Vec<PersistedAccount> = accounts
            .iter()
            .map(|(address, balance)| PersistedAccount {
                address_hex: hex::encode(address),
                balance: *balance,
            })
            .collect();
        account_rows.sort_by(|a, b| a.address_hex.cmp(&b.address_hex));

        PersistedRegistry {
            version: state.version,
            config: state.config.map(|c| PersistedConfig {
                admin_hex: hex::encode(c.admin),
                registration_deposit: c.registration_deposit,
                registration_wait_secs: c.registration_wait_secs,
            }),
            participants,
            slashes: state
                .slashes
                .iter()
                .map(|s| PersistedSlash {
                    target_hex: hex::encode(s.target),
                    amount: s.amount,
                    at: s.at,
                })
                .collect(),
            accounts: account_rows,
        }
    }

    pub fn into_parts(self) -> Result<(LedgerState, Accounts), String> {
        let config = match self.config {
            Some(c) => Some(LedgerConfig {
                admin: parse_address(&c.admin_hex)?,
                registration_deposit: c.registration_deposit,
                registration_wait_secs: c.registration_wait_secs,
            }),
            None => None,
        };

        let mut participants = HashMap::with_capacity(self.participants.len());
        for row in &self.participants {
            participants.insert(
                parse_address(&row.address_hex)?,
                Participant {
                    registered: row.registered,
                    stake_balance: row.stake_balance,
                    registered_at: row.registered_at,
                },
            );
        }

        let mut slashes = Vec::with_capacity(self.slashes.len());
        for row in &self.slashes {
            slashes.push(SlashRecord {
                target: parse_address(&row.target_hex)?,
                amount: row.amount,
                at: row.at,
            });
        }

        let mut balances = Vec::with_capacity(self.accounts.len());
        for row in &self.accounts {
            balances.push((parse_address(&row.address_hex)?, row.balance));
        }

        let state = LedgerState {
            participants,
            config,
            version: self.version,
            slashes,
        };
        Ok((state, Accounts::with_allocations(balances)))
    }
}

fn parse_address(hex_str: &str) -> Result<Address, String> {
    <[u8; 32]>::from_hex(hex_str)
        .map_err(|_| "invalid address hex (expected 32 bytes)".to_string())
}

pub struct SnapshotStore {
    path: PathBuf,
}

impl SnapshotStore {
    pub fn new<P: AsRef<Path>>(data_dir: P) -> Result<Self, String> {
        fs::create_dir_all(&data_dir).map_err(|e| format!("{}", e))?;
        Ok(Self {
            path: data_dir.as_ref().join("registry_snapshot.json"),
        })
    }

    pub fn load(&self) -> Result<Option<PersistedRegistry>, String> {
        if !self.path.exists() {
            return Ok(None);
        }
        let data = fs::read(&self.path).map_err(|e| format!("{}", e))?;
        let snap =
            serde_json::from_slice::<PersistedRegistry>(&data).map_err(|e| format!("{}", e))?;
        Ok(Some(snap))
    }

    pub fn save(&self, snapshot: &PersistedRegistry) -> Result<(), String> {
        let data = serde_json::to_vec_pretty(snapshot).map_err(|e| format!("{}", e))?;
        let tmp_path = self.path.with_extension("json.tmp");
        fs::write(&tmp_path, data).map_err(|e| format!("{}", e))?;
        fs::rename(&tmp_path, &self.path).map_err(|e| format!("{}", e))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::StakeLedger;

    #[test]
    fn persisted_form_round_trips() {
        let admin = [0xAD; 32];
        let user = [1u8; 32];
        let mut ledger = StakeLedger::new();
        ledger.initialize(admin, 100, 1_000).expect("initialize");
        let mut accounts = Accounts::with_allocations([(user, 1_000)]);
        ledger
            .register(&mut accounts, user, 150, 3)
            .expect("register");
        ledger.slash(admin, user, 20, 5).expect("slash");

        let persisted = PersistedRegistry::from_parts(ledger.state(), &accounts);
        let json = serde_json::to_string(&persisted).expect("serialize");
        let decoded: PersistedRegistry = serde_json::from_str(&json).expect("deserialize");
        let (state, restored_accounts) = decoded.into_parts().expect("into_parts");

        assert_eq!(&state, ledger.state());
        assert_eq!(restored_accounts, accounts);
    }

    #[test]
    fn corrupt_address_hex_is_an_error() {
        let persisted = PersistedRegistry {
            version: 1,
            config: None,
            participants: vec![PersistedParticipant {
                address_hex: "nothex".to_string(),
                registered: true,
                stake_balance: 1,
                registered_at: 0,
            }],
            slashes: Vec::new(),
            accounts: Vec::new(),
        };
        assert!(persisted.into_parts().is_err());
    }
}
