use ber_core::errors::{BerError, ErrorInfo};
use serde::{de::DeserializeOwned, Serialize};

fn serde_error(code: &str, err: impl ToString) -> BerError {
    BerError::Serde(ErrorInfo::new(code, err.to_string()))
}

/// Serializes a value into canonical JSON bytes with sorted object keys.
///
/// Going through `serde_json::Value` sorts keys: its map is ordered by key
/// unless the `preserve_order` feature is enabled, which this workspace never
/// does. Struct fields therefore hash the same regardless of declaration order.
pub fn to_canonical_json_bytes<T: Serialize>(value: &T) -> Result<Vec<u8>, BerError> {
    let value = serde_json::to_value(value).map_err(|err| serde_error("json_serialize", err))?;
    serde_json::to_vec(&value).map_err(|err| serde_error("json_write", err))
}

/// Serializes a value into indented JSON for human readable artefacts.
pub fn to_pretty_json_bytes<T: Serialize>(value: &T) -> Result<Vec<u8>, BerError> {
    serde_json::to_vec_pretty(value).map_err(|err| serde_error("json_serialize", err))
}

/// Deserializes a value from JSON bytes.
pub fn from_json_slice<T: DeserializeOwned>(data: &[u8]) -> Result<T, BerError> {
    serde_json::from_slice(data).map_err(|err| serde_error("json_deserialize", err))
}

/// Serializes a value into YAML.
pub fn to_yaml_string<T: Serialize>(value: &T) -> Result<String, BerError> {
    serde_yaml::to_string(value).map_err(|err| serde_error("yaml_serialize", err))
}

/// Deserializes a YAML payload into the requested type.
pub fn from_yaml_slice<T: DeserializeOwned>(data: &[u8]) -> Result<T, BerError> {
    serde_yaml::from_slice(data).map_err(|err| serde_error("yaml_deserialize", err))
}
