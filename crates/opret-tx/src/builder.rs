//! Assembly of unsigned data-carrier transactions.
//!
//! Output order is fixed: the data-carrier outputs in payload order, then the
//! change output if there is one. Callers may rely on vout 0 being the first
//! payload.

use bitcoin::{
    Amount, ScriptBuf, Sequence, Transaction, TxIn, TxOut, Witness, absolute, transaction::Version,
};
use opret_fmt::{OpretFmtError, RelayWarning, encode_data_carrier};
use tracing::*;

use crate::config::BuildConfig;
use crate::error::{TxError, TxResult};
use crate::fee::{ChangeOutput, estimate_vsize};
use crate::keys::KeyPair;
use crate::types::UnspentOutput;

/// Builds unsigned data-carrier transactions spending one output.
#[derive(Clone, Debug, Default)]
pub struct TxBuilder {
    config: BuildConfig,
}

impl TxBuilder {
    /// Constructs a new instance.
    pub fn new(config: BuildConfig) -> Self {
        Self { config }
    }

    /// Gets the config.
    pub fn config(&self) -> &BuildConfig {
        &self.config
    }

    /// Builds a transaction spending `input` into one zero-value data-carrier
    /// output per payload, returning any change above the dust limit to
    /// `change_script`.
    ///
    /// Relay policy is only evaluated, never enforced; the warnings are
    /// recorded on the result.
    pub fn build<P: AsRef<[u8]>>(
        &self,
        input: &UnspentOutput,
        payloads: &[P],
        change_script: ScriptBuf,
    ) -> TxResult<UnsignedTransaction> {
        if payloads.is_empty() {
            return Err(TxError::NoPayloads);
        }

        let mut outputs = Vec::with_capacity(payloads.len() + 1);
        for (index, payload) in payloads.iter().enumerate() {
            let script_pubkey =
                encode_data_carrier(payload.as_ref()).map_err(|e| match e {
                    OpretFmtError::PayloadTooLarge { len } => TxError::PayloadTooLarge { index, len },
                    e => TxError::DataCarrier(e),
                })?;

            outputs.push(TxOut {
                value: Amount::ZERO,
                script_pubkey,
            });
        }

        let relay_warnings = self.config.relay_policy().evaluate(payloads);
        for warning in &relay_warnings {
            warn!(%warning, "transaction is likely not to relay");
        }

        let estimated_vsize = estimate_vsize(payloads);
        let nominal_fee = self.config.fee_rate().fee_for_vsize(estimated_vsize);
        let (fee, change) = ChangeOutput::split(input.value(), nominal_fee)?;
        debug!(
            %input,
            %estimated_vsize,
            fee_rate = %self.config.fee_rate(),
            nominal_fee = nominal_fee.to_sat(),
            "estimated fee"
        );

        match change {
            ChangeOutput::Created(value) => {
                outputs.push(TxOut {
                    value,
                    script_pubkey: change_script,
                });
            }
            ChangeOutput::AbsorbedAsFee(dust) => {
                warn!(
                    change = dust.to_sat(),
                    fee = fee.to_sat(),
                    nominal_fee = nominal_fee.to_sat(),
                    "change below dust limit, adding it to the fee"
                );
            }
        }

        let tx = Transaction {
            version: Version::TWO,
            lock_time: absolute::LockTime::ZERO,
            input: vec![TxIn {
                previous_output: input.outpoint(),
                script_sig: ScriptBuf::new(),
                sequence: Sequence::MAX,
                witness: Witness::new(),
            }],
            output: outputs,
        };

        Ok(UnsignedTransaction {
            tx,
            input: *input,
            estimated_vsize,
            nominal_fee,
            fee,
            change,
            relay_warnings,
        })
    }

    /// Like [`Self::build`], returning change to the key's P2WPKH script.
    pub fn build_for_key<P: AsRef<[u8]>>(
        &self,
        input: &UnspentOutput,
        payloads: &[P],
        key: &KeyPair,
    ) -> TxResult<UnsignedTransaction> {
        self.build(input, payloads, key.p2wpkh_script())
    }
}

/// An unsigned transaction together with the decisions made while building
/// it. Read-only; consumed by [`UnsignedTransaction::wrap`].
#[derive(Clone, Debug, PartialEq)]
pub struct UnsignedTransaction {
    tx: Transaction,
    input: UnspentOutput,
    estimated_vsize: u64,
    nominal_fee: Amount,
    fee: Amount,
    change: ChangeOutput,
    relay_warnings: Vec<RelayWarning>,
}

impl UnsignedTransaction {
    /// Gets the unsigned transaction.
    pub fn tx(&self) -> &Transaction {
        &self.tx
    }

    pub(crate) fn into_tx(self) -> Transaction {
        self.tx
    }

    /// Gets the output being spent.
    pub fn input(&self) -> &UnspentOutput {
        &self.input
    }

    /// Virtual size the fee was computed for.
    pub fn estimated_vsize(&self) -> u64 {
        self.estimated_vsize
    }

    /// Fee the configured rate asks for.
    pub fn nominal_fee(&self) -> Amount {
        self.nominal_fee
    }

    /// Fee actually paid, which is the whole input when change was dust.
    pub fn fee(&self) -> Amount {
        self.fee
    }

    /// What happened to the remainder after the fee.
    pub fn change(&self) -> ChangeOutput {
        self.change
    }

    /// Whether the remainder was dust and went to the fee.
    pub fn dust_absorbed(&self) -> bool {
        matches!(self.change, ChangeOutput::AbsorbedAsFee(_))
    }

    /// Relay-policy warnings raised for the payloads.
    pub fn relay_warnings(&self) -> &[RelayWarning] {
        &self.relay_warnings
    }

    /// Number of data-carrier outputs, which come first in output order.
    pub fn data_output_count(&self) -> usize {
        self.tx.output.len() - usize::from(self.change.value().is_some())
    }
}
