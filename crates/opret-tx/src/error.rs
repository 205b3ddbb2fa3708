use bitcoin::{Amount, Txid, psbt, sighash::P2wpkhError};
use opret_fmt::{MAX_DATA_CARRIER_LEN, OpretFmtError};
use thiserror::Error;

/// Errors for building and signing data-carrier transactions.
#[derive(Debug, Error)]
pub enum TxError {
    /// No payloads were given, so there is nothing to carry.
    #[error("no data payloads supplied")]
    NoPayloads,

    /// A payload does not fit in one data-carrier push. Never truncated.
    #[error("payload {index} too large ({len} bytes, max {max})", max = MAX_DATA_CARRIER_LEN)]
    PayloadTooLarge {
        /// Position of the payload in output order.
        index: usize,
        /// Length of the payload.
        len: usize,
    },

    /// Error from the data-carrier encoder. The builder always reports
    /// oversized payloads as [`TxError::PayloadTooLarge`] instead.
    #[error("data carrier: {0}")]
    DataCarrier(#[from] OpretFmtError),

    /// The input cannot cover the fee, so no outputs can be funded.
    #[error("insufficient funds (input {available}, fee {required})")]
    InsufficientFunds {
        /// Value of the spent output.
        available: Amount,
        /// Fee the transaction needs.
        required: Amount,
    },

    /// Fee rate is negative or not finite.
    #[error("invalid fee rate {0} sat/vB")]
    InvalidFeeRate(f64),

    /// An unspent output declared a zero value.
    #[error("unspent output has zero value")]
    ZeroValueInput,

    /// Txid hex could not be parsed.
    #[error("invalid txid: {0}")]
    InvalidTxid(String),

    /// Secret key or WIF could not be parsed, or the WIF is uncompressed.
    #[error("invalid key: {0}")]
    InvalidKey(String),

    /// The funding transaction supplied for a previous output is not the one
    /// the outpoint refers to.
    #[error("funding tx mismatch (expected {expected}, found {found})")]
    FundingTxMismatch {
        /// Txid of the outpoint.
        expected: Txid,
        /// Txid of the transaction that was supplied.
        found: Txid,
    },

    /// The funding transaction has no output at the referenced index.
    #[error("funding tx has no output {vout}")]
    MissingPrevOutput {
        /// The missing output index.
        vout: u32,
    },

    /// The previous output and the unspent output disagree on the value.
    #[error("previous output value {previous} does not match declared value {declared}")]
    ValueMismatch {
        /// Value declared by the unspent output.
        declared: Amount,
        /// Value committed by the previous output.
        previous: Amount,
    },

    /// No signature satisfying the spent script was attached to an input.
    #[error("input {input} has no usable signature")]
    MissingSignature {
        /// Index of the unsigned input.
        input: usize,
    },

    /// An input's material cannot be turned into a valid witness.
    #[error("cannot finalize input {input}: {reason}")]
    FinalizationFailed {
        /// Index of the failing input.
        input: usize,
        /// What was wrong with it.
        reason: String,
    },

    /// Error from the PSBT container.
    #[error("psbt: {0}")]
    Psbt(#[from] psbt::Error),

    /// Error computing a P2WPKH signature hash.
    #[error("sighash: {0}")]
    Sighash(#[from] P2wpkhError),
}

/// Wrapper result type.
pub type TxResult<T> = Result<T, TxError>;
