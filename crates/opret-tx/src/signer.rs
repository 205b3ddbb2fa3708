//! Signing and finalization through a partially-signed transaction.
//!
//! ```text
//! UnsignedTransaction --wrap--> WrappedTransaction --sign--> PartiallySignedTransaction --finalize--> SignedTransaction
//! ```
//!
//! Each step produces a new value. Finalization borrows the partially-signed
//! transaction so it can be retried, and either produces a transaction with a
//! witness on every input or fails without producing anything.

use bitcoin::{
    Amount, CompressedPublicKey, EcdsaSighashType, Psbt, PublicKey, ScriptBuf, Transaction, Txid,
    Witness, Wtxid, consensus, ecdsa,
    hashes::Hash,
    psbt,
    secp256k1::{Message, Secp256k1, Verification},
    sighash::SighashCache,
};
use tracing::*;

use crate::builder::UnsignedTransaction;
use crate::error::{TxError, TxResult};
use crate::fee::FeeRate;
use crate::keys::KeyPair;
use crate::types::PreviousOutput;

/// Only `SIGHASH_ALL` signatures are produced.
const SIGHASH_TYPE: EcdsaSighashType = EcdsaSighashType::All;

/// Builds, signs and finalizes in one go.
pub fn sign(
    unsigned: UnsignedTransaction,
    previous_output: PreviousOutput,
    key: &KeyPair,
) -> TxResult<SignedTransaction> {
    unsigned.wrap(previous_output)?.sign(key)?.finalize()
}

impl UnsignedTransaction {
    /// Wraps the transaction in a PSBT recording the output being spent.
    ///
    /// The previous output must carry the value the unspent output declared.
    pub fn wrap(self, previous_output: PreviousOutput) -> TxResult<WrappedTransaction> {
        let declared = self.input().value();
        if previous_output.value() != declared {
            return Err(TxError::ValueMismatch {
                declared,
                previous: previous_output.value(),
            });
        }

        let fee = self.fee();
        let mut psbt = Psbt::from_unsigned_tx(self.into_tx())?;
        for input in psbt.inputs.iter_mut() {
            input.witness_utxo = Some(previous_output.to_txout());
            input.sighash_type = Some(SIGHASH_TYPE.into());
        }

        Ok(WrappedTransaction { psbt, fee })
    }
}

/// An unsigned transaction wrapped in a PSBT with its spent outputs recorded.
#[derive(Clone, Debug)]
pub struct WrappedTransaction {
    psbt: Psbt,
    fee: Amount,
}

impl WrappedTransaction {
    /// Gets the underlying PSBT.
    pub fn psbt(&self) -> &Psbt {
        &self.psbt
    }

    /// Signs every input spending a P2WPKH output of `key`.
    ///
    /// Inputs the key does not own are left unsigned; finalization reports
    /// them. Nonces are derived per RFC 6979, so signing is deterministic.
    pub fn sign(self, key: &KeyPair) -> TxResult<PartiallySignedTransaction> {
        let secp = Secp256k1::signing_only();
        let own_script = key.p2wpkh_script();
        let pubkey = PublicKey::new(key.public_key().0);

        let mut psbt = self.psbt;
        let mut cache = SighashCache::new(&psbt.unsigned_tx);
        for (index, input) in psbt.inputs.iter_mut().enumerate() {
            let Some(utxo) = input.witness_utxo.as_ref() else {
                debug!(%index, "input has no witness utxo, not signing");
                continue;
            };

            if utxo.script_pubkey != own_script {
                debug!(%index, "key does not own spent output, not signing");
                continue;
            }

            let sighash =
                cache.p2wpkh_signature_hash(index, &utxo.script_pubkey, utxo.value, SIGHASH_TYPE)?;
            let msg = Message::from_digest(sighash.to_byte_array());
            let signature = ecdsa::Signature {
                signature: secp.sign_ecdsa(&msg, key.secret_key()),
                sighash_type: SIGHASH_TYPE,
            };

            input.partial_sigs.insert(pubkey, signature);
            debug!(%index, "signed input");
        }

        Ok(PartiallySignedTransaction {
            psbt,
            fee: self.fee,
        })
    }
}

/// A PSBT carrying whatever signatures the signer could attach.
#[derive(Clone, Debug)]
pub struct PartiallySignedTransaction {
    psbt: Psbt,
    fee: Amount,
}

impl PartiallySignedTransaction {
    /// Gets the underlying PSBT.
    pub fn psbt(&self) -> &Psbt {
        &self.psbt
    }

    /// Checks every input for a valid signature over the P2WPKH output it
    /// spends, then extracts the transaction with each witness set to
    /// `[signature, pubkey]`.
    pub fn finalize(&self) -> TxResult<SignedTransaction> {
        let secp = Secp256k1::verification_only();
        let mut cache = SighashCache::new(&self.psbt.unsigned_tx);

        let witnesses = self
            .psbt
            .inputs
            .iter()
            .enumerate()
            .map(|(index, input)| finalize_input(&secp, &mut cache, index, input))
            .collect::<TxResult<Vec<_>>>()?;

        let mut psbt = self.psbt.clone();
        for (input, witness) in psbt.inputs.iter_mut().zip(witnesses) {
            input.final_script_witness = Some(witness);
            input.partial_sigs.clear();
            input.sighash_type = None;
        }

        // The fee was set by our own policy, so the PSBT's absurd-fee check
        // does not apply.
        let tx = psbt.extract_tx_unchecked_fee_rate();
        debug!(txid = %tx.compute_txid(), "finalized transaction");

        Ok(SignedTransaction { tx, fee: self.fee })
    }
}

fn finalize_input<C: Verification>(
    secp: &Secp256k1<C>,
    cache: &mut SighashCache<&Transaction>,
    index: usize,
    input: &psbt::Input,
) -> TxResult<Witness> {
    let fail = |reason: &str| TxError::FinalizationFailed {
        input: index,
        reason: reason.to_string(),
    };

    let utxo = input
        .witness_utxo
        .as_ref()
        .ok_or_else(|| fail("spent output not recorded"))?;
    if !utxo.script_pubkey.is_p2wpkh() {
        return Err(fail("spent output is not P2WPKH"));
    }

    let (pubkey, signature) = input
        .partial_sigs
        .iter()
        .find(|(pk, _)| pk.compressed && p2wpkh_script(pk) == utxo.script_pubkey)
        .ok_or(TxError::MissingSignature { input: index })?;

    let sighash = cache.p2wpkh_signature_hash(
        index,
        &utxo.script_pubkey,
        utxo.value,
        signature.sighash_type,
    )?;
    let msg = Message::from_digest(sighash.to_byte_array());
    secp.verify_ecdsa(&msg, &signature.signature, &pubkey.inner)
        .map_err(|e| fail(&format!("signature does not verify: {e}")))?;

    let mut witness = Witness::new();
    witness.push(signature.to_vec());
    witness.push(pubkey.to_bytes());
    Ok(witness)
}

fn p2wpkh_script(pubkey: &PublicKey) -> ScriptBuf {
    ScriptBuf::new_p2wpkh(&CompressedPublicKey(pubkey.inner).wpubkey_hash())
}

/// A fully witnessed transaction, ready to broadcast.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SignedTransaction {
    tx: Transaction,
    fee: Amount,
}

impl SignedTransaction {
    /// Gets the transaction.
    pub fn tx(&self) -> &Transaction {
        &self.tx
    }

    /// Converts to the inner transaction.
    pub fn into_tx(self) -> Transaction {
        self.tx
    }

    /// Fee paid, including any absorbed dust.
    pub fn fee(&self) -> Amount {
        self.fee
    }

    /// Gets the txid.
    pub fn txid(&self) -> Txid {
        self.tx.compute_txid()
    }

    /// Gets the witness txid.
    pub fn wtxid(&self) -> Wtxid {
        self.tx.compute_wtxid()
    }

    /// Actual virtual size of the signed transaction.
    pub fn vsize(&self) -> usize {
        self.tx.vsize()
    }

    /// Fee rate actually paid, measured on the signed transaction.
    pub fn effective_fee_rate(&self) -> FeeRate {
        FeeRate::achieved(self.fee, self.vsize() as u64)
    }

    /// Serializes to consensus wire format.
    pub fn to_bytes(&self) -> Vec<u8> {
        consensus::serialize(&self.tx)
    }

    /// Serializes to consensus wire format as lowercase hex.
    pub fn to_hex(&self) -> String {
        consensus::encode::serialize_hex(&self.tx)
    }
}

#[cfg(test)]
mod tests {
    use bitcoin::{Network, secp256k1::ecdsa::Signature as SecpSignature};

    use super::*;
    use crate::builder::TxBuilder;
    use crate::config::BuildConfig;
    use crate::types::UnspentOutput;

    const TXID_HEX: &str = "ac59228a274c628cb9142fb50f39df911ccecd3f71192dbb25730731b0846565";

    fn key() -> KeyPair {
        KeyPair::from_secret_bytes(&[0x44; 32]).unwrap()
    }

    fn unsigned(key: &KeyPair, value: u64) -> UnsignedTransaction {
        let utxo = UnspentOutput::from_parts(TXID_HEX, 0, value).unwrap();
        TxBuilder::new(BuildConfig::default())
            .build_for_key(&utxo, &[b"Hello, world!"], key)
            .unwrap()
    }

    fn prev_out(key: &KeyPair, value: u64) -> PreviousOutput {
        PreviousOutput::new(Amount::from_sat(value), key.p2wpkh_script())
    }

    #[test]
    fn test_wrap_records_witness_utxo() {
        let key = key();
        let wrapped = unsigned(&key, 100_000).wrap(prev_out(&key, 100_000)).unwrap();
        let input = &wrapped.psbt().inputs[0];

        assert_eq!(input.witness_utxo, Some(prev_out(&key, 100_000).to_txout()));
        assert_eq!(input.sighash_type, Some(EcdsaSighashType::All.into()));
        assert!(input.partial_sigs.is_empty());
    }

    #[test]
    fn test_wrap_value_mismatch() {
        let key = key();
        let res = unsigned(&key, 100_000).wrap(prev_out(&key, 99_999));
        assert!(matches!(res, Err(TxError::ValueMismatch { .. })));
    }

    #[test]
    fn test_sign_attaches_verifiable_signature() {
        let key = key();
        let signed = unsigned(&key, 100_000)
            .wrap(prev_out(&key, 100_000))
            .unwrap()
            .sign(&key)
            .unwrap();

        let input = &signed.psbt().inputs[0];
        assert_eq!(input.partial_sigs.len(), 1);
        let (pk, sig) = input.partial_sigs.iter().next().unwrap();
        assert_eq!(pk.inner, key.public_key().0);
        assert_eq!(sig.sighash_type, EcdsaSighashType::All);

        let mut cache = SighashCache::new(&signed.psbt().unsigned_tx);
        let sighash = cache
            .p2wpkh_signature_hash(0, &key.p2wpkh_script(), Amount::from_sat(100_000), EcdsaSighashType::All)
            .unwrap();
        let msg = Message::from_digest(sighash.to_byte_array());
        Secp256k1::verification_only()
            .verify_ecdsa(&msg, &sig.signature, &pk.inner)
            .unwrap();
    }

    #[test]
    fn test_sign_with_foreign_key_leaves_input_unsigned() {
        let owner = key();
        let stranger = KeyPair::from_secret_bytes(&[0x55; 32]).unwrap();
        let partial = unsigned(&owner, 100_000)
            .wrap(prev_out(&owner, 100_000))
            .unwrap()
            .sign(&stranger)
            .unwrap();

        assert!(partial.psbt().inputs[0].partial_sigs.is_empty());
        assert!(matches!(
            partial.finalize(),
            Err(TxError::MissingSignature { input: 0 })
        ));
    }

    #[test]
    fn test_finalize_rejects_non_p2wpkh_output() {
        let key = key();
        let prev = PreviousOutput::new(
            Amount::from_sat(100_000),
            key.address(Network::Regtest).script_pubkey().to_p2sh(),
        );
        let partial = unsigned(&key, 100_000).wrap(prev).unwrap().sign(&key).unwrap();
        assert!(matches!(
            partial.finalize(),
            Err(TxError::FinalizationFailed { input: 0, .. })
        ));
    }

    #[test]
    fn test_finalize_rejects_bad_signature() {
        let key = key();
        let mut partial = unsigned(&key, 100_000)
            .wrap(prev_out(&key, 100_000))
            .unwrap()
            .sign(&key)
            .unwrap();

        // Swap in a signature over a different message.
        let secp = Secp256k1::signing_only();
        let bogus: SecpSignature = secp.sign_ecdsa(&Message::from_digest([7; 32]), key.secret_key());
        for sig in partial.psbt.inputs[0].partial_sigs.values_mut() {
            sig.signature = bogus;
        }

        assert!(matches!(
            partial.finalize(),
            Err(TxError::FinalizationFailed { input: 0, .. })
        ));
    }

    #[test]
    fn test_finalize_builds_witness() {
        let key = key();
        let signed = sign(unsigned(&key, 100_000), prev_out(&key, 100_000), &key).unwrap();
        let witness = &signed.tx().input[0].witness;

        assert_eq!(witness.len(), 2);
        let sig = witness.nth(0).unwrap();
        assert_eq!(*sig.last().unwrap(), EcdsaSighashType::All as u8);
        assert_eq!(witness.nth(1).unwrap(), &key.public_key().to_bytes()[..]);
        assert!(signed.tx().input[0].script_sig.is_empty());
        assert_eq!(signed.fee(), Amount::from_sat(264));
    }

    #[test]
    fn test_finalize_is_retryable() {
        let key = key();
        let partial = unsigned(&key, 100_000)
            .wrap(prev_out(&key, 100_000))
            .unwrap()
            .sign(&key)
            .unwrap();

        let first = partial.finalize().unwrap();
        let second = partial.finalize().unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_effective_fee_rate_close_to_requested() {
        let key = key();
        let signed = sign(unsigned(&key, 100_000), prev_out(&key, 100_000), &key).unwrap();
        let rate = signed.effective_fee_rate().as_sat_per_vb();
        assert!(rate > 1.8 && rate < 2.2, "rate {rate}");
    }
}
