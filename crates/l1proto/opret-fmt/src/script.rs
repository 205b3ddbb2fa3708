//! Encoding and decoding of data-carrier scripts.
//!
//! A data-carrier script is an `OP_RETURN` followed by exactly one data push,
//! using the smallest push opcode that fits the payload:
//!
//! ```text
//! len 0..=75        6a <len> <data>
//! len 76..=255      6a 4c <len> <data>
//! len 256..=65535   6a 4d <len_lo> <len_hi> <data>
//! ```

use bitcoin::{
    Script, ScriptBuf,
    opcodes::all::OP_RETURN,
    script::{Instruction, PushBytesBuf},
};

use crate::error::{OpretFmtError, OpretFmtResult};

/// Largest payload a single data-carrier output can hold (one `OP_PUSHDATA2` push).
pub const MAX_DATA_CARRIER_LEN: usize = u16::MAX as usize;

/// Encodes `data` as an `OP_RETURN <push>` script.
///
/// Payloads of any length up to [`MAX_DATA_CARRIER_LEN`] are accepted; relay
/// policy is not checked here, see [`RelayPolicy`](crate::RelayPolicy).
pub fn encode_data_carrier(data: &[u8]) -> OpretFmtResult<ScriptBuf> {
    check_payload_len(data.len())?;
    let push_bytes = PushBytesBuf::try_from(data.to_vec())?;

    let script = ScriptBuf::builder()
        .push_opcode(OP_RETURN)
        .push_slice(push_bytes)
        .into_script();

    Ok(script)
}

/// Extracts the embedded payload from a data-carrier script.
///
/// The script must be exactly `OP_RETURN` followed by a single data push.
pub fn decode_data_carrier(script: &Script) -> OpretFmtResult<&[u8]> {
    let mut instrs = script.instructions();
    match instrs.next() {
        Some(Ok(Instruction::Op(op))) if op == OP_RETURN => {}
        _ => return Err(OpretFmtError::NotOpReturn),
    }

    let data = match instrs.next() {
        Some(Ok(Instruction::PushBytes(d))) => d,
        _ => return Err(OpretFmtError::MalformedOpReturn),
    };

    if instrs.next().is_some() {
        return Err(OpretFmtError::MalformedOpReturn);
    }

    Ok(data.as_bytes())
}

fn check_payload_len(len: usize) -> OpretFmtResult<()> {
    if len > MAX_DATA_CARRIER_LEN {
        return Err(OpretFmtError::PayloadTooLarge { len });
    }

    Ok(())
}

/// Owned payload for one data-carrier output, checked against
/// [`MAX_DATA_CARRIER_LEN`] on construction.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct DataCarrier {
    data: Vec<u8>,
}

impl DataCarrier {
    /// Constructs a new instance, rejecting payloads that cannot be pushed.
    pub fn new(data: Vec<u8>) -> OpretFmtResult<Self> {
        check_payload_len(data.len())?;
        Ok(Self { data })
    }

    /// Gets the payload bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    /// Payload length in bytes.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Whether the payload is empty.
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Converts to the inner buffer.
    pub fn into_inner(self) -> Vec<u8> {
        self.data
    }

    /// Builds the `OP_RETURN` script carrying this payload.
    pub fn to_script(&self) -> OpretFmtResult<ScriptBuf> {
        encode_data_carrier(&self.data)
    }
}

impl TryFrom<Vec<u8>> for DataCarrier {
    type Error = OpretFmtError;

    fn try_from(data: Vec<u8>) -> Result<Self, Self::Error> {
        Self::new(data)
    }
}

impl TryFrom<&Script> for DataCarrier {
    type Error = OpretFmtError;

    fn try_from(script: &Script) -> Result<Self, Self::Error> {
        decode_data_carrier(script).map(|data| Self {
            data: data.to_vec(),
        })
    }
}

impl From<DataCarrier> for Vec<u8> {
    fn from(carrier: DataCarrier) -> Self {
        carrier.data
    }
}

impl AsRef<[u8]> for DataCarrier {
    fn as_ref(&self) -> &[u8] {
        &self.data
    }
}
