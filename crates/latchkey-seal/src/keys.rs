//! platform signing keypair and channel public keys.
//!
//! the platform holds one long-lived ed25519 keypair used to sign issued
//! licenses. channel public keys are registered out of band as spki pem and
//! resolved per request through the channel registry - never through the
//! platform key holder.

use ed25519_dalek::pkcs8::spki::der::pem::LineEnding;
use ed25519_dalek::pkcs8::{
    DecodePrivateKey, DecodePublicKey, EncodePrivateKey, EncodePublicKey,
};
use ed25519_dalek::{SigningKey, VerifyingKey};
use zeroize::Zeroizing;

use crate::Error;

/// the platform's long-lived signing keypair.
///
/// constructed explicitly and injected at the composition root so tests can
/// supply ephemeral keys.
pub struct PlatformKeys {
    signing: SigningKey,
}

impl PlatformKeys {
    /// generate a fresh keypair.
    pub fn generate() -> Self {
        Self {
            signing: SigningKey::generate(&mut rand::rngs::OsRng),
        }
    }

    /// parse a keypair from a pkcs#8 pem private key.
    pub fn from_pkcs8_pem(pem: &str) -> Result<Self, Error> {
        let signing =
            SigningKey::from_pkcs8_pem(pem).map_err(|e| Error::InvalidKey(e.to_string()))?;
        Ok(Self { signing })
    }

    /// the signing key, for license issuance.
    pub fn signing_key(&self) -> &SigningKey {
        &self.signing
    }

    /// the corresponding verification key.
    pub fn verifying_key(&self) -> VerifyingKey {
        self.signing.verifying_key()
    }

    /// export the private key as pkcs#8 pem.
    ///
    /// warning: handle with care - this is sensitive key material.
    pub fn private_key_pem(&self) -> Result<Zeroizing<String>, Error> {
        self.signing
            .to_pkcs8_pem(LineEnding::LF)
            .map_err(|e| Error::InvalidKey(e.to_string()))
    }

    /// export the public key as spki pem, for distribution.
    pub fn public_key_pem(&self) -> Result<String, Error> {
        self.signing
            .verifying_key()
            .to_public_key_pem(LineEnding::LF)
            .map_err(|e| Error::InvalidKey(e.to_string()))
    }
}

impl std::fmt::Debug for PlatformKeys {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // never print private key material
        write!(
            f,
            "PlatformKeys({})",
            hex::encode(self.signing.verifying_key().as_bytes())
        )
    }
}

/// parse a channel's registered public key from spki pem.
pub fn channel_key_from_pem(pem: &str) -> Result<VerifyingKey, Error> {
    VerifyingKey::from_public_key_pem(pem).map_err(|e| Error::InvalidKey(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use ed25519_dalek::{Signer, Verifier};

    #[test]
    fn test_generate_and_pem_roundtrip() {
        let keys = PlatformKeys::generate();
        let pem = keys.private_key_pem().unwrap();

        let restored = PlatformKeys::from_pkcs8_pem(&pem).unwrap();
        assert_eq!(
            keys.verifying_key().as_bytes(),
            restored.verifying_key().as_bytes()
        );
    }

    #[test]
    fn test_public_pem_parses_as_channel_key() {
        let keys = PlatformKeys::generate();
        let pem = keys.public_key_pem().unwrap();
        assert!(pem.starts_with("-----BEGIN PUBLIC KEY-----"));

        let verifying = channel_key_from_pem(&pem).unwrap();
        let signature = keys.signing_key().sign(b"message");
        assert!(verifying.verify(b"message", &signature).is_ok());
    }

    #[test]
    fn test_invalid_pem_rejected() {
        assert!(PlatformKeys::from_pkcs8_pem("not a pem").is_err());
        assert!(channel_key_from_pem("not a pem").is_err());
    }

    #[test]
    fn test_debug_does_not_leak_private_key() {
        let keys = PlatformKeys::generate();
        let debug = format!("{:?}", keys);
        let private_hex = hex::encode(keys.signing_key().to_bytes());
        assert!(!debug.contains(&private_hex));
    }
}
