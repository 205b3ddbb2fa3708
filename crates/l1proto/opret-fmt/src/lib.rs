//! This crate contains the encoding, decoding and relay-policy logic for
//! Bitcoin data-carrier (`OP_RETURN`) outputs.

mod error;
mod policy;
mod script;
#[cfg(feature = "serde")]
mod serde;

// Used by the serde roundtrip tests, which only build with the `serde` feature.
#[cfg(all(test, not(feature = "serde")))]
use serde_json as _;

pub use error::{OpretFmtError, OpretFmtResult};
pub use policy::{DEFAULT_MAX_RELAY_DATA_LEN, RelayPolicy, RelayWarning};
pub use script::{DataCarrier, MAX_DATA_CARRIER_LEN, decode_data_carrier, encode_data_carrier};
