//! # Serialization boundary.
//!
//! Everything that crosses a channel or the cluster bus passes through here.
//! Values are converted to plain JSON data; anything whose `Serialize` impl
//! fails (opaque handles, maps with non-string keys, ...) is **rejected** with
//! [`CodecError::Encode`] instead of being silently altered.
//!
//! ```text
//! T: Serialize ──to_plain──► serde_json::Value ──encode──► frame (JSON text)
//!                                                            │
//! T: Deserialize ◄──from_plain── Value ◄──────decode─────────┘
//! ```

use serde::{Serialize, de::DeserializeOwned};
use serde_json::Value;

use crate::error::CodecError;

/// Converts `value` into plain data.
pub fn to_plain<T: Serialize + ?Sized>(value: &T) -> Result<Value, CodecError> {
    serde_json::to_value(value).map_err(|e| CodecError::Encode {
        reason: e.to_string(),
    })
}

/// Parses plain data into a typed value.
pub fn from_plain<T: DeserializeOwned>(value: Value) -> Result<T, CodecError> {
    serde_json::from_value(value).map_err(|e| CodecError::Decode {
        reason: e.to_string(),
    })
}

/// Encodes `value` as one JSON text frame.
///
/// `max_bytes == 0` disables the size check.
pub fn encode<T: Serialize + ?Sized>(value: &T, max_bytes: usize) -> Result<String, CodecError> {
    let frame = serde_json::to_string(value).map_err(|e| CodecError::Encode {
        reason: e.to_string(),
    })?;
    if max_bytes > 0 && frame.len() > max_bytes {
        return Err(CodecError::FrameTooLarge {
            len: frame.len(),
            max: max_bytes,
        });
    }
    Ok(frame)
}

/// Decodes one JSON text frame.
pub fn decode<T: DeserializeOwned>(frame: &str) -> Result<T, CodecError> {
    serde_json::from_str(frame).map_err(|e| CodecError::Decode {
        reason: e.to_string(),
    })
}
