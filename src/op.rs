// Operation vocabulary and canonical signing bytes.
// Signatures cover exactly op_bytes: a tag byte followed by little-endian fields.

use crate::types::{Address, PublicKey};

#[cfg(feature = "node")]
use serde::{Deserialize, Serialize};

#[cfg_attr(feature = "node", derive(Serialize, Deserialize))]
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Operation {
    Register { deposit: u64 },
    Unregister,
    Stake { amount: u64 },
    Unstake,
    Slash { target: Address, amount: u64 },
}

impl Operation {
    pub fn label(&self) -> &'static str {
        match self {
            Operation::Register { .. } => "register",
            Operation::Unregister => "unregister",
            Operation::Stake { .. } => "stake",
            Operation::Unstake => "unstake",
            Operation::Slash { .. } => "slash",
        }
    }
}

/// Envelope carried by the RPC layer: the operation, the caller's public key,
/// and a hex ed25519 signature over `op_bytes`.
#[cfg_attr(feature = "node", derive(Serialize, Deserialize))]
#[derive(Clone, Debug)]
pub struct SignedOperation {
    pub op: Operation,
    pub pubkey: PublicKey,
    pub signature: String,
}

pub fn op_bytes(op: &Operation) -> Vec<u8> {
    match op {
        Operation::Register { deposit } => {
            let mut out = Vec::with_capacity(1 + 8);
            out.push(1);
            out.extend_from_slice(&deposit.to_le_bytes());
            out
        }
        Operation::Unregister => vec![2],
        Operation::Stake { amount } => {
            let mut out = Vec::with_capacity(1 + 8);
            out.push(3);
            out.extend_from_slice(&amount.to_le_bytes());
            out
        }
        Operation::Unstake => vec![4],
        Operation::Slash { target, amount } => {
            let mut out = Vec::with_capacity(1 + 32 + 8);
            out.push(5);
            out.extend_from_slice(target);
            out.extend_from_slice(&amount.to_le_bytes());
            out
        }
    }
}
