// Caller authentication: ed25519 over canonical operation bytes.
// The registry never sees a raw identity claim, only a verified public key.

use crate::op::{op_bytes, Operation, SignedOperation};
use crate::types::{address_from_pubkey, Address};
use ed25519_dalek::{Keypair, PublicKey, SecretKey, Signature, Signer, Verifier};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthError {
    InvalidSignature,
}

fn to_verifying_key(pk: &[u8; 32]) -> Option<PublicKey> {
    PublicKey::from_bytes(pk).ok()
}

fn to_signature(sig_hex: &str) -> Option<Signature> {
    let bytes = hex::decode(sig_hex).ok()?;
    Signature::from_bytes(&bytes).ok()
}

/// Verify a signed operation and resolve the caller address.
pub fn verify_operation(signed: &SignedOperation) -> Result<Address, AuthError> {
    let vk = to_verifying_key(&signed.pubkey).ok_or(AuthError::InvalidSignature)?;
    let sig = to_signature(&signed.signature).ok_or(AuthError::InvalidSignature)?;
    vk.verify(&op_bytes(&signed.op), &sig)
        .map_err(|_| AuthError::InvalidSignature)?;
    Ok(address_from_pubkey(&signed.pubkey))
}

/// Sign an operation with a raw 32-byte secret; used by tests and client tooling.
pub fn sign_operation_with_secret(op: Operation, secret: &[u8; 32]) -> SignedOperation {
    let secret = SecretKey::from_bytes(secret).expect("secret key must be 32 bytes");
    let public: PublicKey = (&secret).into();
    let kp = Keypair { secret, public };
    let sig = kp.sign(&op_bytes(&op));
    SignedOperation {
        op,
        pubkey: public.to_bytes(),
        signature: hex::encode(sig.to_bytes()),
    }
}
