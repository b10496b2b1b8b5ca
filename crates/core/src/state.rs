//! Persistence of the loaded-module state through environment variables.
//!
//! The loaded set and the dependency map survive between invocations inside
//! the parent shell itself: the payload is serialised to canonical JSON,
//! base64-encoded, split into fixed-size chunks and stored in numbered
//! `PYENV_DATA_<k>` variables. Sorted containers keep the encoding
//! deterministic, so the payload is stable within a deployment.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

use crate::errors::StateDecodeError;

/// Prefix of the numbered persistence slots.
pub const DATA_VAR_PREFIX: &str = "PYENV_DATA_";

/// Maximum number of base64 characters stored per slot.
pub const DEFAULT_CHUNK_SIZE: usize = 100;

/// Name of persistence slot `index`.
pub fn slot_name(index: usize) -> String {
    format!("{}{}", DATA_VAR_PREFIX, index)
}

/// Concatenate the persistence slots visible through `lookup`, reading
/// `PYENV_DATA_0, PYENV_DATA_1, ...` until the first gap. Returns the
/// concatenated payload and the number of slots read.
pub fn read_slots<F>(lookup: F) -> (String, usize)
where
    F: Fn(&str) -> Option<String>,
{
    let mut payload = String::new();
    let mut index = 0;
    while let Some(chunk) = lookup(&slot_name(index)) {
        payload.push_str(&chunk);
        index += 1;
    }
    (payload, index)
}

/// Split an encoded payload into slot-sized chunks.
pub fn chunk(encoded: &str, max_chunk_size: usize) -> Vec<String> {
    // base64 output is ASCII, so byte-wise splitting is safe.
    encoded
        .as_bytes()
        .chunks(max_chunk_size)
        .map(|chunk| String::from_utf8_lossy(chunk).into_owned())
        .collect()
}

/// The payload persisted between invocations.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersistedState {
    /// Modules currently loaded.
    pub loaded: BTreeSet<String>,
    /// For each module, the set of loaded modules that depend on it.
    pub dependants: BTreeMap<String, BTreeSet<String>>,
}

impl PersistedState {
    /// Serialise to the opaque base64 payload.
    pub fn encode(&self) -> Result<String, serde_json::Error> {
        let payload = serde_json::to_vec(self)?;
        Ok(BASE64.encode(payload))
    }

    /// Decode a payload previously produced by [`PersistedState::encode`].
    pub fn decode(encoded: &str) -> Result<Self, StateDecodeError> {
        let payload = BASE64.decode(encoded)?;
        Ok(serde_json::from_slice(&payload)?)
    }
}
