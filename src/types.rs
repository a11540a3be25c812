// Identity primitives shared by the ledger core and the node layer.

use sha2::{Digest, Sha256};

pub type PublicKey = [u8; 32];
pub type Address = [u8; 32];

/// Stable caller identity: SHA-256 of the ed25519 public key.
pub fn address_from_pubkey(pubkey: &PublicKey) -> Address {
    let mut h = Sha256::new();
    h.update(pubkey);
    h.finalize().into()
}
