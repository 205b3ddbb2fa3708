use bitcoin::script::PushBytesError;
use thiserror::Error;

use crate::policy::RelayWarning;
use crate::script::MAX_DATA_CARRIER_LEN;

/// Errors for encoding, decoding and policy-checking data-carrier scripts.
#[derive(Debug, Error)]
pub enum OpretFmtError {
    /// The payload does not fit in a single `OP_PUSHDATA2` push.
    #[error("data carrier payload too large ({len} bytes, max {max})", max = MAX_DATA_CARRIER_LEN)]
    PayloadTooLarge {
        /// Length of the rejected payload.
        len: usize,
    },

    /// The script does not start with `OP_RETURN`.
    #[error("script is not an OP_RETURN output")]
    NotOpReturn,

    /// The script is `OP_RETURN` but not followed by exactly one data push.
    #[error("malformed OP_RETURN script")]
    MalformedOpReturn,

    /// The payloads break the configured relay policy and nonstandard
    /// transactions are not permitted.
    #[error("payloads violate relay policy ({} warnings)", .warnings.len())]
    NonStandard {
        /// Every policy violation that was found.
        warnings: Vec<RelayWarning>,
    },

    /// Error while converting data to `PushBytesBuf`, typically due to invalid length.
    #[error("pushbytes: {0}")]
    PushBytes(#[from] PushBytesError),
}

/// Wrapper result type.
pub type OpretFmtResult<T> = Result<T, OpretFmtError>;
