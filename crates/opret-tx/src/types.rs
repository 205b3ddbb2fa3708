use std::fmt;
use std::str::FromStr;

use bitcoin::{Amount, OutPoint, Script, ScriptBuf, Transaction, TxOut, Txid};

use crate::error::{TxError, TxResult};

/// A spendable output: outpoint plus the value its owner claims it holds.
///
/// The value is always nonzero.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(
    feature = "serde",
    derive(serde::Serialize, serde::Deserialize),
    serde(try_from = "UnspentOutputRecord", into = "UnspentOutputRecord")
)]
pub struct UnspentOutput {
    outpoint: OutPoint,
    value: Amount,
}

impl UnspentOutput {
    /// Constructs a new instance, rejecting zero-value outputs.
    pub fn new(txid: Txid, vout: u32, value: Amount) -> TxResult<Self> {
        if value == Amount::ZERO {
            return Err(TxError::ZeroValueInput);
        }

        Ok(Self {
            outpoint: OutPoint::new(txid, vout),
            value,
        })
    }

    /// Constructs a new instance from the fields external sources report: the
    /// txid in display (byte-reversed) hex, the output index and the value in
    /// satoshis.
    pub fn from_parts(txid_hex: &str, vout: u32, value_sat: u64) -> TxResult<Self> {
        let txid = Txid::from_str(txid_hex)
            .map_err(|e| TxError::InvalidTxid(format!("{txid_hex}: {e}")))?;
        Self::new(txid, vout, Amount::from_sat(value_sat))
    }

    /// Gets the outpoint.
    pub fn outpoint(&self) -> OutPoint {
        self.outpoint
    }

    /// Gets the txid of the funding transaction.
    pub fn txid(&self) -> Txid {
        self.outpoint.txid
    }

    /// Gets the output index.
    pub fn vout(&self) -> u32 {
        self.outpoint.vout
    }

    /// Gets the value.
    pub fn value(&self) -> Amount {
        self.value
    }
}

impl fmt::Display for UnspentOutput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.outpoint)
    }
}

/// Unvalidated shape of [`UnspentOutput`] used for deserialization.
#[cfg(feature = "serde")]
#[derive(serde::Serialize, serde::Deserialize)]
struct UnspentOutputRecord {
    txid: Txid,
    vout: u32,
    value: Amount,
}

#[cfg(feature = "serde")]
impl TryFrom<UnspentOutputRecord> for UnspentOutput {
    type Error = TxError;

    fn try_from(r: UnspentOutputRecord) -> Result<Self, Self::Error> {
        Self::new(r.txid, r.vout, r.value)
    }
}

#[cfg(feature = "serde")]
impl From<UnspentOutput> for UnspentOutputRecord {
    fn from(u: UnspentOutput) -> Self {
        Self {
            txid: u.txid(),
            vout: u.vout(),
            value: u.value(),
        }
    }
}

/// The output actually committed on-chain for the outpoint being spent.
///
/// Segwit signature hashes commit to the spent value and script, so these
/// must come from the funding transaction, not from the spender's claim.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PreviousOutput {
    value: Amount,
    script_pubkey: ScriptBuf,
}

impl PreviousOutput {
    /// Constructs a new instance.
    pub fn new(value: Amount, script_pubkey: ScriptBuf) -> Self {
        Self {
            value,
            script_pubkey,
        }
    }

    /// Picks the output `utxo` refers to out of its funding transaction.
    pub fn from_funding_tx(tx: &Transaction, utxo: &UnspentOutput) -> TxResult<Self> {
        let found = tx.compute_txid();
        if found != utxo.txid() {
            return Err(TxError::FundingTxMismatch {
                expected: utxo.txid(),
                found,
            });
        }

        let vout = utxo.vout();
        let out = tx
            .output
            .get(vout as usize)
            .ok_or(TxError::MissingPrevOutput { vout })?;

        Ok(out.clone().into())
    }

    /// Gets the committed value.
    pub fn value(&self) -> Amount {
        self.value
    }

    /// Gets the committed script.
    pub fn script_pubkey(&self) -> &Script {
        &self.script_pubkey
    }

    /// Converts to a [`TxOut`].
    pub fn to_txout(&self) -> TxOut {
        TxOut {
            value: self.value,
            script_pubkey: self.script_pubkey.clone(),
        }
    }
}

impl From<TxOut> for PreviousOutput {
    fn from(out: TxOut) -> Self {
        Self {
            value: out.value,
            script_pubkey: out.script_pubkey,
        }
    }
}

#[cfg(test)]
mod tests {
    use bitcoin::{TxIn, absolute, transaction::Version};

    use super::*;

    const TXID_HEX: &str = "63611617ee33c761c2c9586d0f998baa16bfd876b703921a6a1b31c2933abf64";

    fn funding_tx(values: &[u64]) -> Transaction {
        Transaction {
            version: Version::TWO,
            lock_time: absolute::LockTime::ZERO,
            input: vec![TxIn::default()],
            output: values
                .iter()
                .map(|v| TxOut {
                    value: Amount::from_sat(*v),
                    script_pubkey: ScriptBuf::from_bytes(vec![0x6a, 0x01, 0xab]),
                })
                .collect(),
        }
    }

    #[test]
    fn test_from_parts() {
        let utxo = UnspentOutput::from_parts(TXID_HEX, 1, 5000).unwrap();
        assert_eq!(utxo.txid().to_string(), TXID_HEX);
        assert_eq!(utxo.vout(), 1);
        assert_eq!(utxo.value(), Amount::from_sat(5000));
        assert_eq!(utxo.to_string(), format!("{TXID_HEX}:1"));
    }

    #[test]
    fn test_zero_value_rejected() {
        assert!(matches!(
            UnspentOutput::from_parts(TXID_HEX, 0, 0),
            Err(TxError::ZeroValueInput)
        ));
    }

    #[test]
    fn test_malformed_txid_rejected() {
        assert!(matches!(
            UnspentOutput::from_parts("abcd", 0, 1),
            Err(TxError::InvalidTxid(_))
        ));
        assert!(matches!(
            UnspentOutput::from_parts(&"zz".repeat(32), 0, 1),
            Err(TxError::InvalidTxid(_))
        ));
    }

    #[test]
    fn test_previous_output_from_funding_tx() {
        let tx = funding_tx(&[1000, 2000]);
        let utxo = UnspentOutput::new(tx.compute_txid(), 1, Amount::from_sat(2000)).unwrap();

        let prev = PreviousOutput::from_funding_tx(&tx, &utxo).unwrap();
        assert_eq!(prev.value(), Amount::from_sat(2000));
        assert_eq!(prev.to_txout(), tx.output[1]);
    }

    #[test]
    fn test_previous_output_wrong_funding_tx() {
        let tx = funding_tx(&[1000]);
        let utxo = UnspentOutput::from_parts(TXID_HEX, 0, 1000).unwrap();
        assert!(matches!(
            PreviousOutput::from_funding_tx(&tx, &utxo),
            Err(TxError::FundingTxMismatch { .. })
        ));
    }

    #[test]
    fn test_previous_output_missing_vout() {
        let tx = funding_tx(&[1000]);
        let utxo = UnspentOutput::new(tx.compute_txid(), 3, Amount::from_sat(1000)).unwrap();
        assert!(matches!(
            PreviousOutput::from_funding_tx(&tx, &utxo),
            Err(TxError::MissingPrevOutput { vout: 3 })
        ));
    }
}
