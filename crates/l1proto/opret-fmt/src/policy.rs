//! Relay-policy checks for data-carrier outputs.
//!
//! Consensus accepts any payload up to [`MAX_DATA_CARRIER_LEN`](crate::MAX_DATA_CARRIER_LEN)
//! bytes, but default node policy (`-datacarriersize=80`) only relays a single
//! `OP_RETURN` output carrying at most 80 bytes. These checks let callers
//! find out before broadcasting.

use std::fmt;

use crate::error::{OpretFmtError, OpretFmtResult};

/// Payload size relayed by default node policy.
pub const DEFAULT_MAX_RELAY_DATA_LEN: usize = 80;

/// A reason a set of data-carrier payloads is likely not to relay.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum RelayWarning {
    /// A payload is larger than the relay limit.
    OversizedDataCarrier {
        /// Position of the payload in output order.
        index: usize,
        /// Payload length in bytes.
        len: usize,
        /// The limit it exceeds.
        limit: usize,
    },

    /// More than one data-carrier output was requested.
    MultipleDataCarriers {
        /// Number of data-carrier outputs.
        count: usize,
    },
}

impl fmt::Display for RelayWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::OversizedDataCarrier { index, len, limit } => write!(
                f,
                "data carrier {index} is {len} bytes, above the {limit} byte relay limit"
            ),
            Self::MultipleDataCarriers { count } => write!(
                f,
                "{count} data carrier outputs, default policy relays only one"
            ),
        }
    }
}

/// Caller-side relay policy for data-carrier payloads.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(
    feature = "serde",
    derive(serde::Serialize, serde::Deserialize),
    serde(default)
)]
pub struct RelayPolicy {
    max_data_carrier_len: usize,
    permit_nonstandard: bool,
}

impl Default for RelayPolicy {
    fn default() -> Self {
        Self {
            max_data_carrier_len: DEFAULT_MAX_RELAY_DATA_LEN,
            permit_nonstandard: true,
        }
    }
}

impl RelayPolicy {
    /// Constructs a new instance.
    pub fn new(max_data_carrier_len: usize, permit_nonstandard: bool) -> Self {
        Self {
            max_data_carrier_len,
            permit_nonstandard,
        }
    }

    /// Policy under which [`Self::enforce`] rejects oversized payloads.
    pub fn strict() -> Self {
        Self {
            permit_nonstandard: false,
            ..Self::default()
        }
    }

    /// Gets the per-payload relay limit.
    pub fn max_data_carrier_len(&self) -> usize {
        self.max_data_carrier_len
    }

    /// Whether oversized payloads pass [`Self::enforce`].
    pub fn permit_nonstandard(&self) -> bool {
        self.permit_nonstandard
    }

    /// Lists every reason the payloads are likely not to relay.
    pub fn evaluate<P: AsRef<[u8]>>(&self, payloads: &[P]) -> Vec<RelayWarning> {
        let mut warnings: Vec<_> = payloads
            .iter()
            .enumerate()
            .filter(|(_, p)| p.as_ref().len() > self.max_data_carrier_len)
            .map(|(index, p)| RelayWarning::OversizedDataCarrier {
                index,
                len: p.as_ref().len(),
                limit: self.max_data_carrier_len,
            })
            .collect();

        if payloads.len() > 1 {
            warnings.push(RelayWarning::MultipleDataCarriers {
                count: payloads.len(),
            });
        }

        warnings
    }

    /// Fails if a payload exceeds the relay limit and nonstandard
    /// transactions are not permitted.
    ///
    /// [`RelayWarning::MultipleDataCarriers`] stays advisory and never fails
    /// here.
    pub fn enforce<P: AsRef<[u8]>>(&self, payloads: &[P]) -> OpretFmtResult<()> {
        if self.permit_nonstandard {
            return Ok(());
        }

        let warnings: Vec<_> = self
            .evaluate(payloads)
            .into_iter()
            .filter(|w| matches!(w, RelayWarning::OversizedDataCarrier { .. }))
            .collect();
        if !warnings.is_empty() {
            return Err(OpretFmtError::NonStandard { warnings });
        }

        Ok(())
    }
}
