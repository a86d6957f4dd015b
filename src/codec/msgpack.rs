//! MsgPack codec using `rmp-serde`.
//!
//! Structs are encoded with `to_vec_named`, as maps keyed by field name,
//! so clients can decode bodies without sharing field order.
//!
//! # Example
//!
//! ```
//! use gridd::codec::MsgPackCodec;
//! use gridd::namespace::NamespaceInfo;
//!
//! let info = NamespaceInfo::new("NS1");
//! let encoded = MsgPackCodec::encode(&info).unwrap();
//! let decoded: NamespaceInfo = MsgPackCodec::decode(&encoded).unwrap();
//! assert_eq!(decoded, info);
//! ```

use crate::error::Result;

/// MessagePack codec for reply bodies.
pub struct MsgPackCodec;

impl MsgPackCodec {
    /// Encode a value to MsgPack bytes, structs as maps.
    ///
    /// # Errors
    ///
    /// Returns error if the value cannot be serialized.
    #[inline]
    pub fn encode<T: serde::Serialize>(value: &T) -> Result<Vec<u8>> {
        Ok(rmp_serde::to_vec_named(value)?)
    }

    /// Decode MsgPack bytes to a value.
    ///
    /// # Errors
    ///
    /// Returns error if the bytes cannot be deserialized to type T.
    #[inline]
    pub fn decode<T: serde::de::DeserializeOwned>(bytes: &[u8]) -> Result<T> {
        Ok(rmp_serde::from_slice(bytes)?)
    }
}
