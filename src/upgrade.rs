// Behavior upgrades over preserved state: version the logic, keep the storage.
// Each logic build ships its migration list; install applies the pending tail
// atomically and bumps the recorded version.

use crate::ledger::{LedgerState, StakeLedger};
use crate::types::Address;
use std::fmt;

pub trait Migration {
    /// Version the state records after this migration runs.
    fn target_version(&self) -> u64;
    /// Schema/data adjustments for the new logic. Must leave LedgerConfig alone.
    fn apply(&self, state: &mut LedgerState) -> Result<(), String>;
}

#[derive(Debug, PartialEq, Eq)]
pub enum UpgradeError {
    NotInitialized,
    NotAdmin,
    NonMonotonicVersion { previous: u64, target: u64 },
    ConfigAltered,
    MigrationFailed(String),
}

impl fmt::Display for UpgradeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UpgradeError::NotInitialized => f.write_str("Not initialized"),
            UpgradeError::NotAdmin => f.write_str("Not an admin"),
            UpgradeError::NonMonotonicVersion { previous, target } => write!(
                f,
                "migration targets must increase: {} then {}",
                previous, target
            ),
            UpgradeError::ConfigAltered => f.write_str("migration altered the ledger config"),
            UpgradeError::MigrationFailed(msg) => write!(f, "migration failed: {}", msg),
        }
    }
}

#[derive(Default)]
pub struct UpgradeController {
    migrations: Vec<Box<dyn Migration>>,
}

impl UpgradeController {
    pub fn new() -> Self {
        UpgradeController {
            migrations: Vec::new(),
        }
    }

    /// Migrations must be registered in ascending target order.
    pub fn register(&mut self, migration: Box<dyn Migration>) {
        self.migrations.push(migration);
    }

    /// Apply every migration past the state's current version. The live state
    /// is replaced only if the whole tail succeeds; any failure leaves the
    /// ledger exactly as it was. Returns the installed version.
    pub fn install(
        &self,
        caller: Address,
        ledger: &mut StakeLedger,
    ) -> Result<u64, UpgradeError> {
        let config = match ledger.state().config {
            Some(config) => config,
            None => return Err(UpgradeError::NotInitialized),
        };
        if caller != config.admin {
            return Err(UpgradeError::NotAdmin);
        }

        let mut previous = 0u64;
        for migration in &self.migrations {
            let target = migration.target_version();
            if target <= previous {
                return Err(UpgradeError::NonMonotonicVersion { previous, target });
            }
            previous = target;
        }

        let mut working = ledger.state().clone();
        for migration in &self.migrations {
            let target = migration.target_version();
            if target <= working.version {
                continue; // already installed
            }
            migration
                .apply(&mut working)
                .map_err(UpgradeError::MigrationFailed)?;
            if working.config != Some(config) {
                return Err(UpgradeError::ConfigAltered);
            }
            working.version = target;
        }

        let version = working.version;
        *ledger = StakeLedger::restore(working);
        Ok(version)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::accounts::Accounts;
    use crate::ledger::LedgerConfig;

    struct LogicOnly {
        target: u64,
    }

    impl Migration for LogicOnly {
        fn target_version(&self) -> u64 {
            self.target
        }
        fn apply(&self, _state: &mut LedgerState) -> Result<(), String> {
            Ok(())
        }
    }

    struct PruneSlashHistory {
        target: u64,
    }

    impl Migration for PruneSlashHistory {
        fn target_version(&self) -> u64 {
            self.target
        }
        fn apply(&self, state: &mut LedgerState) -> Result<(), String> {
            state.slashes.clear();
            Ok(())
        }
    }

    struct Failing;

    impl Migration for Failing {
        fn target_version(&self) -> u64 {
            2
        }
        fn apply(&self, state: &mut LedgerState) -> Result<(), String> {
            state.participants.clear();
            Err("boom".to_string())
        }
    }

    struct ConfigTamper;

    impl Migration for ConfigTamper {
        fn target_version(&self) -> u64 {
            2
        }
        fn apply(&self, state: &mut LedgerState) -> Result<(), String> {
            if let Some(config) = &mut state.config {
                config.registration_deposit += 1;
            }
            Ok(())
        }
    }

    fn admin() -> Address {
        [0xAD; 32]
    }

    fn populated_ledger() -> StakeLedger {
        let mut ledger = StakeLedger::new();
        ledger.initialize(admin(), 100, 1_000).expect("initialize");
        let mut accounts = Accounts::with_allocations([([1u8; 32], 1_000)]);
        ledger
            .register(&mut accounts, [1u8; 32], 100, 0)
            .expect("register");
        ledger
    }

    #[test]
    fn install_bumps_version_and_preserves_state() {
        let mut ledger = populated_ledger();
        let before = ledger.state().clone();

        let mut upgrades = UpgradeController::new();
        upgrades.register(Box::new(LogicOnly { target: 2 }));
        upgrades.register(Box::new(LogicOnly { target: 3 }));

        let version = upgrades.install(admin(), &mut ledger).expect("install");
        assert_eq!(version, 3);
        assert_eq!(ledger.version(), 3);
        assert_eq!(ledger.state().participants, before.participants);
        assert_eq!(ledger.state().config, before.config);
    }

    #[test]
    fn install_is_idempotent_for_applied_versions() {
        let mut ledger = populated_ledger();
        let mut upgrades = UpgradeController::new();
        upgrades.register(Box::new(PruneSlashHistory { target: 2 }));

        assert_eq!(upgrades.install(admin(), &mut ledger), Ok(2));
        assert_eq!(upgrades.install(admin(), &mut ledger), Ok(2));
    }

    #[test]
    fn install_is_operator_gated() {
        let mut ledger = populated_ledger();
        let upgrades = UpgradeController::new();
        assert_eq!(
            upgrades.install([9u8; 32], &mut ledger),
            Err(UpgradeError::NotAdmin)
        );
    }

    #[test]
    fn install_requires_an_initialized_ledger() {
        let mut ledger = StakeLedger::new();
        let upgrades = UpgradeController::new();
        assert_eq!(
            upgrades.install(admin(), &mut ledger),
            Err(UpgradeError::NotInitialized)
        );
    }

    #[test]
    fn failed_migration_leaves_state_untouched() {
        let mut ledger = populated_ledger();
        let before = ledger.state().clone();

        let mut upgrades = UpgradeController::new();
        upgrades.register(Box::new(Failing));

        assert_eq!(
            upgrades.install(admin(), &mut ledger),
            Err(UpgradeError::MigrationFailed("boom".to_string()))
        );
        assert_eq!(ledger.state(), &before);
        assert_eq!(ledger.version(), crate::GENESIS_VERSION);
    }

    #[test]
    fn config_altering_migration_is_rejected() {
        let mut ledger = populated_ledger();
        let before = ledger.state().clone();

        let mut upgrades = UpgradeController::new();
        upgrades.register(Box::new(ConfigTamper));

        assert_eq!(
            upgrades.install(admin(), &mut ledger),
            Err(UpgradeError::ConfigAltered)
        );
        assert_eq!(ledger.state(), &before);
        assert_eq!(
            ledger.state().config,
            Some(LedgerConfig {
                admin: admin(),
                registration_deposit: 100,
                registration_wait_secs: 1_000,
            })
        );
    }

    #[test]
    fn out_of_order_migrations_are_rejected() {
        let mut ledger = populated_ledger();
        let mut upgrades = UpgradeController::new();
        upgrades.register(Box::new(LogicOnly { target: 3 }));
        upgrades.register(Box::new(LogicOnly { target: 2 }));

        assert_eq!(
            upgrades.install(admin(), &mut ledger),
            Err(UpgradeError::NonMonotonicVersion {
                previous: 3,
                target: 2
            })
        );
        assert_eq!(ledger.version(), crate::GENESIS_VERSION);
    }
}
