//! Encoding and decoding of command and event payloads.
//!
//! Payloads are JSON documents. An empty payload is read as `null`, so commands without
//! arguments may send nothing at all.

use serde::{de::DeserializeOwned, Serialize};

#[derive(Debug, derive_more::Display, derive_more::Error)]
#[display("Failed to decode payload: {_0}")]
pub struct DecodeError(serde_json::Error);

#[derive(Debug, derive_more::Display, derive_more::Error)]
#[display("Failed to encode payload: {_0}")]
pub struct EncodeError(serde_json::Error);

#[derive(Clone, Copy, Debug, Default)]
pub struct Codec;

impl Codec {
    pub fn decode<T: DeserializeOwned>(&self, payload: &[u8]) -> Result<T, DecodeError> {
        let payload = if payload.is_empty() { &b"null"[..] } else { payload };
        serde_json::from_slice(payload).map_err(DecodeError)
    }

    pub fn encode<T: Serialize + ?Sized>(&self, value: &T) -> Result<Vec<u8>, EncodeError> {
        serde_json::to_vec(value).map_err(EncodeError)
    }
}
