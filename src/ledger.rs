// Stake registry ledger: deposit-gated registration, time-locked exit, admin slashing.
// Deterministic and settlement-explicit: time arrives as a parameter, and funds move
// through the Accounts book in the same call frame as the state change.

use crate::accounts::{AccountError, Accounts};
use crate::types::Address;
use crate::GENESIS_VERSION;
use std::collections::HashMap;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StakeError {
    NotInitialized,
    AlreadyInitialized,
    InsufficientDeposit,
    InsufficientFunds,
    NotAStaker,
    CooldownNotElapsed,
    NotAdmin,
    InsufficientBalance,
    BalanceOverflow,
}

impl fmt::Display for StakeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let msg = match self {
            StakeError::NotInitialized => "Not initialized",
            StakeError::AlreadyInitialized => "Already initialized",
            StakeError::InsufficientDeposit => "Deposit below registration minimum",
            StakeError::InsufficientFunds => "Insufficient account funds",
            StakeError::NotAStaker => "Not a staker",
            StakeError::CooldownNotElapsed => "Registration period not ended",
            StakeError::NotAdmin => "Not an admin",
            StakeError::InsufficientBalance => "Slash exceeds stake balance",
            StakeError::BalanceOverflow => "Balance overflow",
        };
        f.write_str(msg)
    }
}

impl From<AccountError> for StakeError {
    fn from(err: AccountError) -> Self {
        match err {
            AccountError::InsufficientFunds => StakeError::InsufficientFunds,
            AccountError::BalanceOverflow => StakeError::BalanceOverflow,
        }
    }
}

/// Per-identity record. Default-zero for identities the ledger has never seen;
/// a reset record is indistinguishable from one, except that the map entry stays.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Participant {
    pub registered: bool,
    pub stake_balance: u64,
    /// Set on register; basis for the unregister cooldown. Reset only when
    /// unregister succeeds.
    pub registered_at: u64,
}

/// Fixed at initialization; upgrades must carry it over untouched.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct LedgerConfig {
    pub admin: Address,
    pub registration_deposit: u64,
    pub registration_wait_secs: u64,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SlashRecord {
    pub target: Address,
    pub amount: u64,
    pub at: u64,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct LedgerState {
    pub participants: HashMap<Address, Participant>,
    /// None until initialize runs.
    pub config: Option<LedgerConfig>,
    /// 0 while uninitialized, GENESIS_VERSION afterwards, bumped by upgrades.
    pub version: u64,
    /// Audit trail of admin slashes; slashed funds are burned.
    pub slashes: Vec<SlashRecord>,
}

#[derive(Debug)]
pub struct StakeLedger {
    state: LedgerState,
}

impl StakeLedger {
    pub fn new() -> Self {
        StakeLedger {
            state: LedgerState::default(),
        }
    }

    /// Rebuild over previously persisted state.
    pub fn restore(state: LedgerState) -> Self {
        StakeLedger { state }
    }

    pub fn state(&self) -> &LedgerState {
        &self.state
    }

    pub fn version(&self) -> u64 {
        self.state.version
    }

    pub fn slashes(&self) -> &[SlashRecord] {
        &self.state.slashes
    }

    /// One-time setup gate; everything it sets is immutable afterwards.
    pub fn initialize(
        &mut self,
        admin: Address,
        registration_deposit: u64,
        registration_wait_secs: u64,
    ) -> Result<(), StakeError> {
        if self.state.config.is_some() {
            return Err(StakeError::AlreadyInitialized);
        }
        self.state.config = Some(LedgerConfig {
            admin,
            registration_deposit,
            registration_wait_secs,
        });
        self.state.version = GENESIS_VERSION;
        Ok(())
    }

    fn require_config(&self) -> Result<LedgerConfig, StakeError> {
        self.state.config.ok_or(StakeError::NotInitialized)
    }

    /// Registers the caller, crediting the entire submitted deposit to their
    /// stake. Calling again while registered re-credits and restarts the
    /// cooldown.
    pub fn register(
        &mut self,
        accounts: &mut Accounts,
        caller: Address,
        deposit: u64,
        now: u64,
    ) -> Result<(), StakeError> {
        let config = self.require_config()?;
        if deposit < config.registration_deposit {
            return Err(StakeError::InsufficientDeposit);
        }
        let current = self.participant(&caller);
        let next_balance = current
            .stake_balance
            .checked_add(deposit)
            .ok_or(StakeError::BalanceOverflow)?;
        accounts.debit(&caller, deposit)?;
        let record = self.state.participants.entry(caller).or_default();
        record.registered = true;
        record.stake_balance = next_balance;
        record.registered_at = now;
        Ok(())
    }

    /// Exits the registry after the cooldown and pays the full balance back.
    /// Returns the payout.
    pub fn unregister(
        &mut self,
        accounts: &mut Accounts,
        caller: Address,
        now: u64,
    ) -> Result<u64, StakeError> {
        let config = self.require_config()?;
        let current = self.participant(&caller);
        if !current.registered {
            return Err(StakeError::NotAStaker);
        }
        if now.saturating_sub(current.registered_at) < config.registration_wait_secs {
            return Err(StakeError::CooldownNotElapsed);
        }
        let payout = current.stake_balance;
        // The credit must not be able to fail once the record is reset.
        accounts.ensure_credit(&caller, payout)?;
        let record = self.state.participants.entry(caller).or_default();
        *record = Participant::default();
        accounts.credit(caller, payout);
        Ok(payout)
    }

    /// Adds to the caller's stake. No upper bound short of the u64 range.
    pub fn stake(
        &mut self,
        accounts: &mut Accounts,
        caller: Address,
        amount: u64,
    ) -> Result<(), StakeError> {
        self.require_config()?;
        let current = self.participant(&caller);
        if !current.registered {
            return Err(StakeError::NotAStaker);
        }
        let next_balance = current
            .stake_balance
            .checked_add(amount)
            .ok_or(StakeError::BalanceOverflow)?;
        accounts.debit(&caller, amount)?;
        let record = self.state.participants.entry(caller).or_default();
        record.stake_balance = next_balance;
        Ok(())
    }

    /// Zeroes the stake and pays it out; the caller stays registered and the
    /// cooldown timestamp is untouched. Returns the payout.
    pub fn unstake(&mut self, accounts: &mut Accounts, caller: Address) -> Result<u64, StakeError> {
        self.require_config()?;
        let current = self.participant(&caller);
        if !current.registered {
            return Err(StakeError::NotAStaker);
        }
        let payout = current.stake_balance;
        accounts.ensure_credit(&caller, payout)?;
        let record = self.state.participants.entry(caller).or_default();
        record.stake_balance = 0;
        accounts.credit(caller, payout);
        Ok(payout)
    }

    /// Admin penalty: removes `amount` from the target's stake and burns it.
    /// Over-draw is rejected, not clamped.
    pub fn slash(
        &mut self,
        caller: Address,
        target: Address,
        amount: u64,
        now: u64,
    ) -> Result<(), StakeError> {
        let config = self.require_config()?;
        if caller != config.admin {
            return Err(StakeError::NotAdmin);
        }
        let current = self.participant(&target);
        if !current.registered {
            return Err(StakeError::NotAStaker);
        }
        if amount > current.stake_balance {
            return Err(StakeError::InsufficientBalance);
        }
        let record = self.state.participants.entry(target).or_default();
        record.stake_balance -= amount;
        self.state.slashes.push(SlashRecord { target, amount, at: now });
        Ok(())
    }

    /// Zero for identities the ledger has never seen.
    pub fn stake_balance(&self, identity: &Address) -> u64 {
        self.participant(identity).stake_balance
    }

    pub fn is_registered(&self, identity: &Address) -> bool {
        self.participant(identity).registered
    }

    /// Current record, default-zeroed for unknown identities.
    pub fn participant(&self, identity: &Address) -> Participant {
        self.state
            .participants
            .get(identity)
            .copied()
            .unwrap_or_default()
    }
}

impl Default for StakeLedger {
    fn default() -> Self {
        Self::new()
    }
}
