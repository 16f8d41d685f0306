use crate::{
    MAX_ROW_BYTES,
    row::Row,
    serialize::{SerializeError, deserialize_bounded, serialize},
};

///
/// RowCodec
///
/// Encodes rows for the spill file. Implementations must round-trip every
/// value variant exactly.
///

pub trait RowCodec: Send + Sync {
    fn encode(&self, row: &Row) -> Result<Vec<u8>, SerializeError>;

    fn decode(&self, bytes: &[u8]) -> Result<Row, SerializeError>;
}

///
/// CborRowCodec
///
/// Default codec: serde + CBOR, bounded by `MAX_ROW_BYTES` on decode.
///

#[derive(Clone, Copy, Debug, Default)]
pub struct CborRowCodec;

impl RowCodec for CborRowCodec {
    fn encode(&self, row: &Row) -> Result<Vec<u8>, SerializeError> {
        serialize(row)
    }

    fn decode(&self, bytes: &[u8]) -> Result<Row, SerializeError> {
        deserialize_bounded(bytes, MAX_ROW_BYTES)
    }
}

///
/// TESTS
///
