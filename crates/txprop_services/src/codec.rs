//! CBOR encoding of stored records.

use crate::error::{ServiceError, ServiceResult};
use serde::de::DeserializeOwned;
use serde::Serialize;

/// Encodes a record to CBOR bytes.
pub(crate) fn encode<T: Serialize>(record: &T) -> ServiceResult<Vec<u8>> {
    let mut bytes = Vec::new();
    ciborium::into_writer(record, &mut bytes).map_err(|e| ServiceError::codec(e.to_string()))?;
    Ok(bytes)
}

/// Decodes a record from CBOR bytes.
pub(crate) fn decode<T: DeserializeOwned>(bytes: &[u8]) -> ServiceResult<T> {
    ciborium::from_reader(bytes).map_err(|e| ServiceError::codec(e.to_string()))
}
