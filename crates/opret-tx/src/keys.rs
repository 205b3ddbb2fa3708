use std::fmt;

use bitcoin::{
    Address, CompressedPublicKey, NetworkKind, PrivateKey, ScriptBuf,
    address::KnownHrp,
    secp256k1::{Secp256k1, SecretKey},
};

use crate::error::{TxError, TxResult};

/// A secp256k1 key pair owning P2WPKH outputs.
///
/// Passed explicitly into every build and sign call. The `Debug` impl only
/// shows the public half.
#[derive(Clone, PartialEq, Eq)]
pub struct KeyPair {
    secret: SecretKey,
    public: CompressedPublicKey,
}

impl KeyPair {
    /// Derives the key pair from a secret key.
    pub fn from_secret_key(secret: SecretKey) -> Self {
        let secp = Secp256k1::signing_only();
        let public = CompressedPublicKey(secret.public_key(&secp));
        Self { secret, public }
    }

    /// Derives the key pair from a raw 32-byte scalar.
    pub fn from_secret_bytes(bytes: &[u8; 32]) -> TxResult<Self> {
        let secret = SecretKey::from_slice(bytes).map_err(|e| TxError::InvalidKey(e.to_string()))?;
        Ok(Self::from_secret_key(secret))
    }

    /// Parses a WIF-encoded private key. Only compressed keys can own P2WPKH
    /// outputs, so uncompressed ones are rejected.
    pub fn from_wif(wif: &str) -> TxResult<Self> {
        let key = PrivateKey::from_wif(wif).map_err(|e| TxError::InvalidKey(e.to_string()))?;
        if !key.compressed {
            return Err(TxError::InvalidKey("uncompressed WIF key".to_string()));
        }

        Ok(Self::from_secret_key(key.inner))
    }

    /// Encodes the secret as WIF for the given network kind.
    pub fn to_wif(&self, network: impl Into<NetworkKind>) -> String {
        PrivateKey::new(self.secret, network).to_wif()
    }

    /// Gets the compressed public key.
    pub fn public_key(&self) -> CompressedPublicKey {
        self.public
    }

    pub(crate) fn secret_key(&self) -> &SecretKey {
        &self.secret
    }

    /// The P2WPKH script paying to this key, used for change.
    pub fn p2wpkh_script(&self) -> ScriptBuf {
        ScriptBuf::new_p2wpkh(&self.public.wpubkey_hash())
    }

    /// The P2WPKH address of this key.
    pub fn address(&self, hrp: impl Into<KnownHrp>) -> Address {
        Address::p2wpkh(&self.public, hrp)
    }
}

impl fmt::Debug for KeyPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyPair")
            .field("public", &self.public)
            .finish_non_exhaustive()
    }
}
