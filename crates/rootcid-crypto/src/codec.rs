use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

/// Errors from encoding or decoding documents.
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    #[error("document is not valid JSON: {0}")]
    Decode(#[source] serde_json::Error),

    #[error("document cannot be serialized: {0}")]
    Encode(#[source] serde_json::Error),
}

/// Deterministic JSON encoding for documents.
///
/// Documents go through [`serde_json::Value`], whose maps are key-ordered,
/// and are written compactly. The same document therefore always yields the
/// same bytes regardless of how the caller built it.
pub struct DocumentCodec;

impl DocumentCodec {
    /// Encode a JSON document to its canonical bytes.
    pub fn encode(document: &Value) -> Result<Vec<u8>, CodecError> {
        serde_json::to_vec(document).map_err(CodecError::Encode)
    }

    /// Encode any serializable value by first lowering it to a [`Value`].
    pub fn encode_typed<T: Serialize>(value: &T) -> Result<Vec<u8>, CodecError> {
        let document = serde_json::to_value(value).map_err(CodecError::Encode)?;
        Self::encode(&document)
    }

    /// Decode bytes into a JSON document.
    pub fn decode(bytes: &[u8]) -> Result<Value, CodecError> {
        serde_json::from_slice(bytes).map_err(CodecError::Decode)
    }

    /// Decode bytes into a typed value.
    pub fn decode_typed<T: DeserializeOwned>(bytes: &[u8]) -> Result<T, CodecError> {
        serde_json::from_slice(bytes).map_err(CodecError::Decode)
    }
}
