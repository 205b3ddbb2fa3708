//! Serde support for [`DataCarrier`].
//!
//! Human-readable formats carry the payload as a lowercase hex string, binary
//! formats as raw bytes. Both paths re-check the payload bound.

use bitcoin::hex::{DisplayHex, FromHex};
use serde::de;
use serde::{Deserialize, Serialize};

use crate::script::MAX_DATA_CARRIER_LEN;
use crate::DataCarrier;

impl Serialize for DataCarrier {
    fn serialize<S: serde::Serializer>(&self, s: S) -> Result<S::Ok, S::Error> {
        if s.is_human_readable() {
            s.serialize_str(&self.as_bytes().to_lower_hex_string())
        } else {
            s.serialize_bytes(self.as_bytes())
        }
    }
}

impl<'de> Deserialize<'de> for DataCarrier {
    fn deserialize<D: serde::Deserializer<'de>>(d: D) -> Result<Self, D::Error> {
        if d.is_human_readable() {
            struct HexVisitor;

            impl de::Visitor<'_> for HexVisitor {
                type Value = DataCarrier;

                fn expecting(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                    write!(f, "a hex string of at most {MAX_DATA_CARRIER_LEN} bytes")
                }

                fn visit_str<E: de::Error>(self, v: &str) -> Result<DataCarrier, E> {
                    let bytes = Vec::<u8>::from_hex(v).map_err(E::custom)?;
                    DataCarrier::new(bytes).map_err(E::custom)
                }
            }

            d.deserialize_str(HexVisitor)
        } else {
            struct BytesVisitor;

            impl<'de> de::Visitor<'de> for BytesVisitor {
                type Value = DataCarrier;

                fn expecting(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                    write!(f, "at most {MAX_DATA_CARRIER_LEN} bytes")
                }

                fn visit_bytes<E: de::Error>(self, v: &[u8]) -> Result<DataCarrier, E> {
                    DataCarrier::new(v.to_vec()).map_err(E::custom)
                }

                fn visit_byte_buf<E: de::Error>(self, v: Vec<u8>) -> Result<DataCarrier, E> {
                    DataCarrier::new(v).map_err(E::custom)
                }
            }

            d.deserialize_byte_buf(BytesVisitor)
        }
    }
}
