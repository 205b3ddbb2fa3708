use opret_fmt::RelayPolicy;

use crate::fee::FeeRate;

/// Config for building data-carrier transactions.
#[derive(Clone, Debug, Default, PartialEq)]
#[cfg_attr(
    feature = "serde",
    derive(serde::Serialize, serde::Deserialize),
    serde(default)
)]
pub struct BuildConfig {
    fee_rate: FeeRate,
    relay_policy: RelayPolicy,
}

impl BuildConfig {
    /// Constructs a new instance.
    pub fn new(fee_rate: FeeRate, relay_policy: RelayPolicy) -> Self {
        Self {
            fee_rate,
            relay_policy,
        }
    }

    /// Replaces the fee rate.
    pub fn with_fee_rate(mut self, fee_rate: FeeRate) -> Self {
        self.fee_rate = fee_rate;
        self
    }

    /// Replaces the relay policy.
    pub fn with_relay_policy(mut self, relay_policy: RelayPolicy) -> Self {
        self.relay_policy = relay_policy;
        self
    }

    /// Gets the fee rate.
    pub fn fee_rate(&self) -> FeeRate {
        self.fee_rate
    }

    /// Gets the relay policy payloads are checked against.
    pub fn relay_policy(&self) -> &RelayPolicy {
        &self.relay_policy
    }
}
