//! Serialization adapter between wire bytes and market types.
//!
//! The pricing and routing code never sees bytes; callers decode here first.
//! The format is JSON via `serde_json`, with decimals and integer amounts as
//! strings so every value survives a round trip exactly.

use crate::engine::GenesisState;
use crate::market::msgs::{MarketMsg, RouteChangeProposal};
use serde::de::DeserializeOwned;
use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CodecError {
    #[error("encode failed: {0}")]
    Encode(#[source] serde_json::Error),
    #[error("decode failed: {0}")]
    Decode(#[source] serde_json::Error),
}

pub fn encode<T: Serialize>(value: &T) -> Result<Vec<u8>, CodecError> {
    serde_json::to_vec(value).map_err(CodecError::Encode)
}

pub fn decode<T: DeserializeOwned>(bytes: &[u8]) -> Result<T, CodecError> {
    serde_json::from_slice(bytes).map_err(CodecError::Decode)
}

pub fn encode_msg(msg: &MarketMsg) -> Result<Vec<u8>, CodecError> {
    encode(msg)
}

pub fn decode_msg(bytes: &[u8]) -> Result<MarketMsg, CodecError> {
    decode(bytes)
}

pub fn encode_proposal(proposal: &RouteChangeProposal) -> Result<Vec<u8>, CodecError> {
    encode(proposal)
}

pub fn decode_proposal(bytes: &[u8]) -> Result<RouteChangeProposal, CodecError> {
    decode(bytes)
}

/// Pretty-printed genesis, for files people read.
pub fn encode_genesis(genesis: &GenesisState) -> Result<String, CodecError> {
    serde_json::to_string_pretty(genesis).map_err(CodecError::Encode)
}

pub fn decode_genesis(text: &str) -> Result<GenesisState, CodecError> {
    serde_json::from_str(text).map_err(CodecError::Decode)
}
