// Copyright 2021 Google LLC
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//      http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.
//
////////////////////////////////////////////////////////////////////////////////

//! Common internal utilities.

use crate::{JoseError, Result};
use base64::{prelude::BASE64_URL_SAFE_NO_PAD, Engine as _};
use rand::{rngs::OsRng, RngCore};
use serde_json::Value;

#[cfg(test)]
mod tests;

/// Encode a byte sequence as unpadded base64url.
pub fn b64_encode(data: impl AsRef<[u8]>) -> String {
    BASE64_URL_SAFE_NO_PAD.encode(data)
}

/// Decode an unpadded base64url segment, naming the segment on failure.
pub fn b64_decode(data: &str, segment: &str) -> Result<Vec<u8>> {
    BASE64_URL_SAFE_NO_PAD
        .decode(data)
        .map_err(|_| JoseError::Parse {
            segment: segment.to_owned(),
            reason: "invalid base64url",
        })
}

/// Fill a fresh buffer of `len` bytes from the OS random number generator.
pub(crate) fn random_bytes(len: usize) -> Vec<u8> {
    let mut buf = vec![0u8; len];
    OsRng.fill_bytes(&mut buf);
    buf
}

/// Extension trait that adds failable conversion methods to [`Value`], naming
/// the offending segment in the error.
pub(crate) trait ValueTryAs {
    fn try_as_str(&self, segment: &str) -> Result<&str>;
    fn try_as_array(&self, segment: &str) -> Result<&Vec<Value>>;
    fn try_as_object(&self, segment: &str) -> Result<&serde_json::Map<String, Value>>;
    fn try_as_b64_bytes(&self, segment: &str) -> Result<Vec<u8>>;
}

impl ValueTryAs for Value {
    fn try_as_str(&self, segment: &str) -> Result<&str> {
        self.as_str().ok_or_else(|| JoseError::Parse {
            segment: segment.to_owned(),
            reason: "expected string",
        })
    }

    fn try_as_array(&self, segment: &str) -> Result<&Vec<Value>> {
        self.as_array().ok_or_else(|| JoseError::Parse {
            segment: segment.to_owned(),
            reason: "expected array",
        })
    }

    fn try_as_object(&self, segment: &str) -> Result<&serde_json::Map<String, Value>> {
        self.as_object().ok_or_else(|| JoseError::Parse {
            segment: segment.to_owned(),
            reason: "expected object",
        })
    }

    fn try_as_b64_bytes(&self, segment: &str) -> Result<Vec<u8>> {
        b64_decode(self.try_as_str(segment)?, segment)
    }
}

/// Check for an expected error.
#[cfg(test)]
pub fn expect_err<T, E: core::fmt::Debug>(result: Result<T, E>, err_msg: &str) {
    assert!(result.is_err(), "expected error containing '{}'", err_msg);
    let err = result.err();
    assert!(
        format!("{:?}", err).contains(err_msg),
        "unexpected error {:?}, doesn't contain '{}'",
        err,
        err_msg
    );
}

/// Macro that emits implementations of `Serialize` and `Deserialize` for
/// types that implement the [`AsJsonValue`](crate::AsJsonValue) trait.
macro_rules! json_serialize {
    ( $otype: ty ) => {
        impl ::serde::Serialize for $otype {
            fn serialize<S: ::serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
                let value = self
                    .clone()
                    .to_json_value()
                    .map_err(::serde::ser::Error::custom)?;
                value.serialize(serializer)
            }
        }

        impl<'de> ::serde::Deserialize<'de> for $otype {
            fn deserialize<D: ::serde::Deserializer<'de>>(
                deserializer: D,
            ) -> Result<Self, D::Error> {
                let value = ::serde_json::Value::deserialize(deserializer)?;
                Self::from_json_value(value).map_err(::serde::de::Error::custom)
            }
        }
    };
}

// Macros to reduce boilerplate when creating `SomethingBuilder` structures.

/// Add `new()` and `build()` methods to the builder.
macro_rules! builder {
    ( $otype: ty ) => {
        /// Constructor for builder.
        pub fn new() -> Self {
            Self(<$otype>::default())
        }
        /// Build the completed object.
        pub fn build(self) -> $otype {
            self.0
        }
    };
}

/// Add a setter function for an optional field to the builder.
macro_rules! builder_set_optional {
    ( $name:ident: $ftype:ty ) => {
        /// Set the associated field.
        pub fn $name(mut self, $name: $ftype) -> Self {
            self.0.$name = Some($name);
            self
        }
    };
}
