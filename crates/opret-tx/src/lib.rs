//! Builds, fee-adjusts and signs Bitcoin transactions that embed data in
//! `OP_RETURN` outputs.
//!
//! A transaction spends a single P2WPKH output, carries one zero-value
//! data-carrier output per payload and returns change above the dust limit to
//! the spender:
//!
//! ```no_run
//! use bitcoin::Amount;
//! use opret_tx::{BuildConfig, KeyPair, PreviousOutput, TxBuilder, UnspentOutput, sign};
//!
//! # fn main() -> Result<(), opret_tx::TxError> {
//! let key = KeyPair::from_secret_bytes(&[0x11; 32])?;
//! let utxo = UnspentOutput::from_parts(
//!     "ac59228a274c628cb9142fb50f39df911ccecd3f71192dbb25730731b0846565",
//!     1,
//!     100_000,
//! )?;
//! let prev = PreviousOutput::new(Amount::from_sat(100_000), key.p2wpkh_script());
//!
//! let unsigned = TxBuilder::new(BuildConfig::default())
//!     .build_for_key(&utxo, &[b"Hello, world!"], &key)?;
//! let signed = sign(unsigned, prev, &key)?;
//! println!("{}", signed.to_hex());
//! # Ok(())
//! # }
//! ```
//!
//! Nothing here touches the network or the filesystem; finding the output to
//! spend and broadcasting the result are up to the caller.

mod builder;
mod config;
mod error;
mod fee;
mod keys;
mod signer;
mod types;

// Used by the serde tests, which only build with the `serde` feature.
#[cfg(all(test, not(feature = "serde")))]
use serde_json as _;

pub use builder::{TxBuilder, UnsignedTransaction};
pub use config::BuildConfig;
pub use error::{TxError, TxResult};
pub use fee::{
    ChangeOutput, DATA_CARRIER_OVERHEAD_VBYTES, DUST_LIMIT, FeeRate, MIN_FEE, P2WPKH_INPUT_VBYTES,
    P2WPKH_OUTPUT_VBYTES, TX_OVERHEAD_VBYTES, estimate_vsize,
};
pub use keys::KeyPair;
pub use signer::{PartiallySignedTransaction, SignedTransaction, WrappedTransaction, sign};
pub use types::{PreviousOutput, UnspentOutput};

// Re-exported so callers can encode or inspect payloads without a direct dependency.
pub use opret_fmt::{
    DataCarrier, MAX_DATA_CARRIER_LEN, RelayPolicy, RelayWarning, decode_data_carrier,
    encode_data_carrier,
};
