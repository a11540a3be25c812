// Stake registry core: deterministic, in-memory, settlement-explicit.

pub mod accounts;
pub mod auth;
pub mod ledger;
#[cfg(feature = "node")]
pub mod node;
pub mod op;
pub mod types;
pub mod upgrade;

/// Version a freshly initialized ledger starts at; upgrades only move it up.
pub const GENESIS_VERSION: u64 = 1;

// No randomness or wall clock access in the core; time is injected explicitly.

/*
The core intentionally avoids:
- async
- threads
- external IO
Those live behind the `node` feature.
*/
