// Single-writer service loop: one thread owns the ledger and the account book,
// so every operation is one indivisible read-modify-write and payouts settle in
// the same frame as the state change.

use crate::accounts::Accounts;
use crate::auth::{verify_operation, AuthError};
use crate::ledger::{LedgerState, StakeError, StakeLedger};
use crate::node::config::GenesisConfig;
use crate::node::storage::{PersistedRegistry, SnapshotStore};
use crate::op::{Operation, SignedOperation};
use crate::types::Address;
use crate::upgrade::UpgradeController;
use std::fmt;
use std::sync::{mpsc, Arc, RwLock};
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::{info, warn};

/// Injected time source; the ledger core never reads a clock.
pub trait Clock: Send {
    fn now_secs(&self) -> u64;
}

/// Wall clock for production use.
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_secs(&self) -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_secs()
    }
}

#[derive(Debug, PartialEq)]
pub enum ServiceError {
    Auth(AuthError),
    Stake(StakeError),
}

impl fmt::Display for ServiceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ServiceError::Auth(AuthError::InvalidSignature) => f.write_str("Invalid signature"),
            ServiceError::Stake(err) => write!(f, "{}", err),
        }
    }
}

/// Result of a committed operation.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Receipt {
    /// Funds credited back to the caller (unregister/unstake), zero otherwise.
    pub payout: u64,
}

pub enum ServiceCommand {
    Apply {
        signed: SignedOperation,
        reply: mpsc::Sender<Result<Receipt, ServiceError>>,
    },
    Shutdown,
}

/// Read view published after every committed operation; queries never touch
/// the writer.
#[derive(Clone, Debug, Default)]
pub struct RegistrySnapshot {
    pub registry_id: String,
    pub version: u64,
    pub ledger: LedgerState,
    pub accounts: Accounts,
}

impl RegistrySnapshot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stake_balance(&self, identity: &Address) -> u64 {
        self.ledger
            .participants
            .get(identity)
            .map(|p| p.stake_balance)
            .unwrap_or(0)
    }

    pub fn is_registered(&self, identity: &Address) -> bool {
        self.ledger
            .participants
            .get(identity)
            .map(|p| p.registered)
            .unwrap_or(false)
    }

    pub fn account_balance(&self, identity: &Address) -> u64 {
        self.accounts.balance(identity)
    }
}

pub struct ServiceConfig {
    pub data_dir: Option<String>,
}

pub struct Service {
    registry_id: String,
    ledger: StakeLedger,
    accounts: Accounts,
    snapshot: Arc<RwLock<RegistrySnapshot>>,
    store: Option<SnapshotStore>,
    clock: Box<dyn Clock>,
}

impl Service {
    pub fn new(
        genesis: GenesisConfig,
        cfg: ServiceConfig,
        snapshot: Arc<RwLock<RegistrySnapshot>>,
        upgrades: UpgradeController,
        clock: Box<dyn Clock>,
    ) -> Result<Self, String> {
        let admin = genesis.admin_address()?;
        let store = match cfg.data_dir {
            Some(dir) => Some(SnapshotStore::new(dir)?),
            None => None,
        };

        let restored = match &store {
            Some(store) => store.load()?,
            None => None,
        };

        let (mut ledger, accounts) = match restored {
            Some(persisted) => {
                let (state, accounts) = persisted.into_parts()?;
                info!(version = state.version, "restored registry snapshot");
                (StakeLedger::restore(state), accounts)
            }
            None => {
                let mut ledger = StakeLedger::new();
                ledger
                    .initialize(
                        admin,
                        genesis.registration_deposit,
                        genesis.registration_wait_secs,
                    )
                    .map_err(|e| format!("{}", e))?;
                let accounts = Accounts::with_allocations(genesis.allocation_balances()?);
                info!(registry_id = %genesis.registry_id, "initialized fresh registry");
                (ledger, accounts)
            }
        };

        // Migrations compiled into this build run as the configured admin.
        let version = upgrades
            .install(admin, &mut ledger)
            .map_err(|e| format!("{}", e))?;
        info!(version, "registry logic installed");

        let service = Self {
            registry_id: genesis.registry_id,
            ledger,
            accounts,
            snapshot,
            store,
            clock,
        };
        service.publish_snapshot();
        service.persist();
        Ok(service)
    }

    /// Single-writer loop: every mutation is serialized through this thread.
    pub fn run(mut self, rx_cmd: mpsc::Receiver<ServiceCommand>) {
        for cmd in rx_cmd {
            match cmd {
                ServiceCommand::Apply { signed, reply } => {
                    let _ = reply.send(self.apply(signed));
                }
                ServiceCommand::Shutdown => break,
            }
        }
        info!("service loop stopped");
    }

    fn apply(&mut self, signed: SignedOperation) -> Result<Receipt, ServiceError> {
        let op_label = signed.op.label();
        let caller = match verify_operation(&signed) {
            Ok(caller) => caller,
            Err(err) => {
                warn!(op = op_label, "rejected unauthenticated operation");
                return Err(ServiceError::Auth(err));
            }
        };

        let now = self.clock.now_secs();
        let result = self.dispatch(caller, &signed.op, now);
        match &result {
            Ok(receipt) => {
                info!(
                    caller = %hex::encode(caller),
                    op = op_label,
                    payout = receipt.payout,
                    "operation committed"
                );
                self.publish_snapshot();
                self.persist();
            }
            Err(err) => {
                warn!(
                    caller = %hex::encode(caller),
                    op = op_label,
                    error = %err,
                    "operation rejected"
                );
            }
        }
        result
    }

    fn dispatch(
        &mut self,
        caller: Address,
        op: &Operation,
        now: u64,
    ) -> Result<Receipt, ServiceError> {
        let result = match op {
            Operation::Register { deposit } => self
                .ledger
                .register(&mut self.accounts, caller, *deposit, now)
                .map(|_| Receipt { payout: 0 }),
            Operation::Unregister => self
                .ledger
                .unregister(&mut self.accounts, caller, now)
                .map(|payout| Receipt { payout }),
            Operation::Stake { amount } => self
                .ledger
                .stake(&mut self.accounts, caller, *amount)
                .map(|_| Receipt { payout: 0 }),
            Operation::Unstake => self
                .ledger
                .unstake(&mut self.accounts, caller)
                .map(|payout| Receipt { payout }),
            Operation::Slash { target, amount } => self
                .ledger
                .slash(caller, *target, *amount, now)
                .map(|_| Receipt { payout: 0 }),
        };
        result.map_err(ServiceError::Stake)
    }

    fn publish_snapshot(&self) {
        if let Ok(mut snap) = self.snapshot.write() {
            snap.registry_id = self.registry_id.clone();
            snap.version = self.ledger.version();
            snap.ledger = self.ledger.state().clone();
            snap.accounts = self.accounts.clone();
        }
    }

    fn persist(&self) {
        if let Some(store) = &self.store {
            let persisted = PersistedRegistry::from_parts(self.ledger.state(), &self.accounts);
            if let Err(e) = store.save(&persisted) {
                warn!(error = %e, "snapshot save failed");
            }
        }
    }
}
