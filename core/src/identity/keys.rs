// Cryptographic identity material

use anyhow::Result;
use ed25519_dalek::{Signature as Ed25519Signature, Signer, SigningKey, Verifier, VerifyingKey};
use sha2::{Digest, Sha256};
use x25519_dalek::{PublicKey as X25519PublicKey, StaticSecret};
use zeroize::{Zeroize, Zeroizing};

/// Length of a truncated destination hash in bytes
pub const DESTINATION_HASH_LEN: usize = 16;

const SIGNING_KEY_LEN: usize = 32;
const ENCRYPTION_KEY_LEN: usize = 32;

/// Node identity keys: ed25519 for signing announces, x25519 for the
/// encryption half of the dual keypair peers address messages to.
#[derive(Clone)]
pub struct IdentityKeys {
    pub signing_key: SigningKey,
    encryption_key: StaticSecret,
}

impl IdentityKeys {
    /// Generate a fresh identity
    pub fn generate() -> Self {
        use rand::RngCore;

        let mut signing_bytes = [0u8; SIGNING_KEY_LEN];
        rand::rngs::OsRng.fill_bytes(&mut signing_bytes);
        let signing_key = SigningKey::from_bytes(&signing_bytes);
        signing_bytes.zeroize();

        let mut encryption_bytes = [0u8; ENCRYPTION_KEY_LEN];
        rand::rngs::OsRng.fill_bytes(&mut encryption_bytes);
        let encryption_key = StaticSecret::from(encryption_bytes);
        encryption_bytes.zeroize();

        Self {
            signing_key,
            encryption_key,
        }
    }

    /// Public signing key as hex
    pub fn public_key_hex(&self) -> String {
        hex::encode(self.signing_key.verifying_key().to_bytes())
    }

    /// Public encryption key
    pub fn encryption_public_key(&self) -> X25519PublicKey {
        X25519PublicKey::from(&self.encryption_key)
    }

    /// Destination hash: truncated SHA-256 over both public keys.
    ///
    /// This is the address peers resolve an announce to, so it must be stable
    /// for the lifetime of the keys.
    pub fn destination_hash(&self) -> [u8; DESTINATION_HASH_LEN] {
        let mut hasher = Sha256::new();
        hasher.update(self.signing_key.verifying_key().to_bytes());
        hasher.update(self.encryption_public_key().to_bytes());
        let digest = hasher.finalize();

        let mut hash = [0u8; DESTINATION_HASH_LEN];
        hash.copy_from_slice(&digest[..DESTINATION_HASH_LEN]);
        hash
    }

    /// Destination hash as hex
    pub fn destination_hash_hex(&self) -> String {
        hex::encode(self.destination_hash())
    }

    /// Sign data with the identity's signing key
    pub fn sign(&self, data: &[u8]) -> Result<Vec<u8>> {
        let signature = self.signing_key.sign(data);
        Ok(signature.to_bytes().to_vec())
    }

    /// Verify a signature against a public signing key
    pub fn verify(data: &[u8], signature: &[u8], public_key: &[u8]) -> Result<bool> {
        let verifying_key = VerifyingKey::from_bytes(
            public_key
                .try_into()
                .map_err(|_| anyhow::anyhow!("Invalid public key"))?,
        )?;

        let sig = Ed25519Signature::from_bytes(
            signature
                .try_into()
                .map_err(|_| anyhow::anyhow!("Invalid signature"))?,
        );

        Ok(verifying_key.verify(data, &sig).is_ok())
    }

    /// Serialize both secret keys to bytes.
    /// Returns a `Zeroizing<Vec<u8>>` that wipes the material on drop.
    pub fn to_bytes(&self) -> Zeroizing<Vec<u8>> {
        let mut bytes = Vec::with_capacity(SIGNING_KEY_LEN + ENCRYPTION_KEY_LEN);
        bytes.extend_from_slice(&self.signing_key.to_bytes());
        bytes.extend_from_slice(&self.encryption_key.to_bytes());
        Zeroizing::new(bytes)
    }

    /// Deserialize keys from bytes
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes.len() != SIGNING_KEY_LEN + ENCRYPTION_KEY_LEN {
            return Err(anyhow::anyhow!("Invalid key bytes"));
        }

        let signing_bytes: [u8; SIGNING_KEY_LEN] = bytes[..SIGNING_KEY_LEN]
            .try_into()
            .map_err(|_| anyhow::anyhow!("Invalid signing key bytes"))?;
        let encryption_bytes: [u8; ENCRYPTION_KEY_LEN] = bytes[SIGNING_KEY_LEN..]
            .try_into()
            .map_err(|_| anyhow::anyhow!("Invalid encryption key bytes"))?;

        Ok(Self {
            signing_key: SigningKey::from_bytes(&signing_bytes),
            encryption_key: StaticSecret::from(encryption_bytes),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_generation() {
        let keys = IdentityKeys::generate();

        assert_eq!(keys.public_key_hex().len(), 64); // 32 bytes = 64 hex chars
        assert_eq!(keys.destination_hash_hex().len(), DESTINATION_HASH_LEN * 2);
    }

    #[test]
    fn test_signing() {
        let keys = IdentityKeys::generate();
        let data = b"announce payload";

        let signature = keys.sign(data).unwrap();
        assert_eq!(signature.len(), 64); // Ed25519 signature = 64 bytes
    }

    #[test]
    fn test_verification() {
        let keys = IdentityKeys::generate();
        let data = b"announce payload";

        let signature = keys.sign(data).unwrap();
        let public_key = keys.signing_key.verifying_key().to_bytes();

        let valid = IdentityKeys::verify(data, &signature, &public_key).unwrap();
        assert!(valid);

        let invalid = IdentityKeys::verify(b"wrong data", &signature, &public_key).unwrap();
        assert!(!invalid);
    }

    #[test]
    fn test_destination_hash_stable() {
        let keys = IdentityKeys::generate();
        assert_eq!(keys.destination_hash(), keys.destination_hash());

        let other = IdentityKeys::generate();
        assert_ne!(keys.destination_hash(), other.destination_hash());
    }

    #[test]
    fn test_serialization() {
        let keys = IdentityKeys::generate();
        let bytes = keys.to_bytes();

        let restored = IdentityKeys::from_bytes(&bytes).unwrap();

        assert_eq!(keys.public_key_hex(), restored.public_key_hex());
        assert_eq!(keys.destination_hash(), restored.destination_hash());
    }

    #[test]
    fn test_from_bytes_rejects_bad_length() {
        assert!(IdentityKeys::from_bytes(&[0u8; 32]).is_err());
        assert!(IdentityKeys::from_bytes(&[0u8; 65]).is_err());
    }
}
