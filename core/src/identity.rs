use crate::error::{Error, TrustResult};
use base64::Engine;
use ed25519_dalek::{Signature, Signer, SigningKey, Verifier, VerifyingKey};
use multibase::Base;
use rand::rngs::OsRng;
use sha2::{Digest, Sha256};

const ED25519_MULTICODEC: [u8; 2] = [0xed, 0x01];

/// An agent's signing key, addressed by a `did:key` identifier.
#[derive(Debug, Clone)]
pub struct AgentIdentity {
    signing_key: SigningKey,
}

impl AgentIdentity {
    pub fn generate() -> Self {
        Self {
            signing_key: SigningKey::generate(&mut OsRng),
        }
    }

    pub fn from_bytes(bytes: &[u8]) -> TrustResult<Self> {
        let bytes: &[u8; 32] = bytes
            .try_into()
            .map_err(|_| Error::ValidationFailed("Invalid key bytes".to_string()))?;
        Ok(Self {
            signing_key: SigningKey::from_bytes(bytes),
        })
    }

    pub fn to_bytes(&self) -> [u8; 32] {
        self.signing_key.to_bytes()
    }

    pub fn did(&self) -> String {
        let mut bytes = ED25519_MULTICODEC.to_vec();
        bytes.extend_from_slice(self.signing_key.verifying_key().as_bytes());
        format!("did:key:{}", multibase::encode(Base::Base58Btc, bytes))
    }

    pub fn public_key(&self) -> VerifyingKey {
        self.signing_key.verifying_key()
    }

    pub fn public_key_multibase(&self) -> String {
        multibase::encode(Base::Base58Btc, self.signing_key.verifying_key().as_bytes())
    }

    pub fn sign(&self, message: &[u8]) -> Signature {
        self.signing_key.sign(message)
    }

    pub fn sign_base64(&self, message: &[u8]) -> String {
        base64::engine::general_purpose::STANDARD.encode(self.sign(message).to_bytes())
    }

    pub fn fingerprint(&self) -> String {
        let hash = Sha256::digest(self.signing_key.verifying_key().as_bytes());
        hex::encode(&hash[..8]).to_uppercase()
    }
}

/// Decodes a multibase ed25519 public key, with or without the multicodec prefix.
pub fn decode_public_key(encoded: &str) -> Option<VerifyingKey> {
    let (_, bytes) = multibase::decode(encoded).ok()?;
    let raw = match bytes.len() {
        32 => &bytes[..],
        34 if bytes[..2] == ED25519_MULTICODEC => &bytes[2..],
        _ => return None,
    };
    let raw: &[u8; 32] = raw.try_into().ok()?;
    VerifyingKey::from_bytes(raw).ok()
}

pub fn verify_signature_base64(public_key: &VerifyingKey, message: &[u8], signature: &str) -> bool {
    let Ok(bytes) = base64::engine::general_purpose::STANDARD.decode(signature) else {
        return false;
    };
    let Ok(bytes) = <[u8; 64]>::try_from(bytes.as_slice()) else {
        return false;
    };
    public_key
        .verify(message, &Signature::from_bytes(&bytes))
        .is_ok()
}
